pub mod discovery;
pub mod extractor;
pub mod timestamp;

pub use discovery::{discover_files, DiscoveryError};
pub use extractor::{extract_events, ExtractError, LogEvent};
