mod reading;
mod record;

pub use reading::{Reading, Trend};
pub use record::{ManagedRecord, RecordOperation, MANAGED_RECORD_NAME};
