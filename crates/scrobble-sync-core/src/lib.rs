pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod reconstruct;
pub mod resolver;
pub mod router;
pub mod status;
pub mod store;
pub mod webhook;

pub use error::{StoreError, SyncError};
pub use logging::{init_from_config, init_logging};
pub use orchestrator::{History, SyncOrchestrator};
pub use reconstruct::{parse_line, LogReconstructor, RETRY_SCAN_LIMIT};
pub use resolver::MediaResolver;
pub use router::{plan, DestinationCall, EventRouter};
pub use status::{ActivityRef, StatusTracker};
pub use store::{FileStore, SyncStore};
pub use webhook::{parse, Ignored, WebhookEvent};
