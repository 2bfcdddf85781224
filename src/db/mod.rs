mod connection;
mod helpers;
mod migrations;
mod repositories;

pub use connection::{Database, WorkerUnavailable};
pub use repositories::records::classify_error;
