use std::{
    path::Path,
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use thiserror::Error;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

/// How long a statement waits on a locked database before failing as busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// The database thread is gone; the record store is unreachable.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WorkerUnavailable {
    #[error("database worker has stopped")]
    Stopped,
    #[error("database worker dropped the request before replying")]
    Dropped,
}

/// Owns the worker thread. Dropping the job sender ends the worker loop.
struct Worker {
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("database worker panicked before shutdown");
            }
        }
    }
}

/// SQLite handle shared by the reading source and the record store.
/// Statements run one at a time on a dedicated thread.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database at {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("WAL mode unavailable, using the default journal: {err}");
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;

    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let thread_path = path.clone();

        let thread = thread::Builder::new()
            .name("readingcard-db".into())
            .spawn(move || {
                let mut conn = match open_connection(&thread_path) {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                for job in jobs_rx {
                    job(&mut conn);
                }
                info!("database worker stopped");
            })
            .context("failed to spawn database worker thread")?;

        let worker = Worker {
            jobs: Some(jobs_tx),
            thread: Some(thread),
        };
        ready_rx
            .recv()
            .context("database worker exited before it was ready")??;

        info!("database ready at {}", path.display());
        Ok(Self {
            worker: Arc::new(worker),
        })
    }

    /// Runs `task` on the worker thread. Fails with [`WorkerUnavailable`] when
    /// the thread is gone or dies while handling the task.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let jobs = self.worker.jobs.as_ref().ok_or(WorkerUnavailable::Stopped)?;
        let (reply_tx, reply_rx) = oneshot::channel();

        jobs.send(Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                error!("database caller went away before its reply");
            }
        }))
        .map_err(|_| WorkerUnavailable::Stopped)?;

        reply_rx.await.map_err(|_| WorkerUnavailable::Dropped)?
    }
}
