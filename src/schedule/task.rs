use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::{task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;

/// Handle to a task scheduled with [`schedule_after`].
///
/// Cancellation only reaches a task that is still waiting out its delay. Once
/// the delay has elapsed the task body runs to completion.
#[derive(Debug)]
pub struct TaskHandle {
    token: CancellationToken,
    started: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

pub fn schedule_after<F>(delay: Duration, task: F) -> TaskHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let token = CancellationToken::new();
    let started = Arc::new(AtomicBool::new(false));

    let join = tokio::spawn({
        let token = token.clone();
        let started = started.clone();
        async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            started.store(true, Ordering::SeqCst);
            task.await;
        }
    });

    TaskHandle {
        token,
        started,
        join,
    }
}

impl TaskHandle {
    /// Returns true when the task was still pending and will now never run.
    pub fn cancel(&self) -> bool {
        let was_pending = self.is_pending();
        self.token.cancel();
        was_pending
    }

    pub fn is_pending(&self) -> bool {
        !self.token.is_cancelled() && !self.has_started() && !self.join.is_finished()
    }

    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
