pub mod analysis;
pub mod cascade;
pub mod config;
pub mod error;
pub mod report;
pub mod store;
pub mod types;

pub use error::{Error, Result, ValidationError};
pub use store::{Collection, ExportDocument, Record, RecordStore};
