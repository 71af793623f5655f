pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::{
    AppConfig, EnrichmentConfig, KNOWN_SOURCES, LibraryConfig, MatchingConfig, SourcesConfig,
};
pub use error::{CoreError, ExitCode, Result};
pub use models::*;

pub use storage::{find_entry, load_documents, load_entries, parse_document, save_entries};
