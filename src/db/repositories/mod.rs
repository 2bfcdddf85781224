pub mod readings;
pub mod records;
