pub mod error;
pub mod http;
pub mod letterboxd;
pub mod request_log;
pub mod trakt;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

use scrobble_sync_config::SettingsStore;
use std::sync::Arc;
use tokio::sync::RwLock;

pub use error::DestinationError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RequestBody};
pub use letterboxd::{DiaryPublication, LetterboxdClient};
pub use request_log::{LogChannel, RequestLog};
pub use trakt::TraktClient;

/// Settings store shared between adapters and the host application
pub type SharedSettings = Arc<RwLock<SettingsStore>>;
