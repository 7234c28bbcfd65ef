//! Filing records, the processing state machine, and the metadata store.

mod status;
mod store;
mod types;

pub use status::{ProcessingStatus, StatusError};
pub use store::{FilingStore, InMemoryFilingStore, StoreError};
pub use types::{ChunkRecord, ChunkType, Filing, ReportReference, SectionRecord};
