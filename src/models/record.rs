use serde::{Deserialize, Serialize};

/// Name the managed contact record is looked up by.
pub const MANAGED_RECORD_NAME: &str = "ReadingCard";

/// The single contact record this crate creates, updates and deletes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedRecord {
    pub id: String,
    pub name: String,
    #[serde(skip)]
    pub image_data: Vec<u8>,
    pub label: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOperation {
    Add(ManagedRecord),
    Update(ManagedRecord),
    Delete(ManagedRecord),
}

impl RecordOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordOperation::Add(_) => "add",
            RecordOperation::Update(_) => "update",
            RecordOperation::Delete(_) => "delete",
        }
    }
}
