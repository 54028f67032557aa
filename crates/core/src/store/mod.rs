//! Production state: which tickets already have a pass on which channel.

mod sqlite;
mod types;

pub use sqlite::SqliteProductionStore;
pub use types::{Channel, PassRecord, PassStatus, ProductionStore, StatusCounts, StoreError};
