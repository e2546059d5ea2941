pub mod activity;
pub mod destination;
pub mod log_entry;
pub mod media;
pub mod media_record;
pub mod outcome;

pub use activity::{imdb_id_from_guid, Activity, ActivityId, ActivityKind, IMDB_GUID_PREFIX};
pub use destination::{Destination, UnknownDestination};
pub use log_entry::{DiaryLogEntry, LogEntry, TraktLogEntry, TraktRatedItem};
pub use media::MediaKind;
pub use media_record::{MediaAttributes, MediaRecord, MediaRecordId};
pub use outcome::{InvalidOutcome, Outcome};
