pub mod clock;
pub mod config;
pub mod context;
pub mod delivery;
pub mod metrics;
pub mod sink;
pub mod source;
pub mod store;
pub mod sync;
pub mod testing;
pub mod wallet;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use context::{CancelReason, Cancelled, RunContext};
pub use delivery::{Delivery, DeliveryError, DeliveryReceipt, MailDelivery, ObjectStoreUpload};
pub use sink::{ArtifactSink, FsArtifactSink, ObjectStoreSink, S3ObjectStore, SinkError};
pub use source::{
    sweep_check_ins, CheckAction, IssuedTicket, SourceError, SweepReport, TicketSource,
    TicketTailorClient,
};
pub use store::{Channel, PassRecord, PassStatus, ProductionStore, SqliteProductionStore, StoreError};
pub use sync::{RunReport, RunTrigger, SyncError, SyncOrchestrator, SyncScheduler, SyncSummary};
pub use wallet::{
    materialize_certificates, ApplePassGenerator, GenerationError, GoogleObjectGenerator,
    PassGenerator, WalletArtifact,
};
