pub mod library;
pub mod notes;

pub use library::{find_entry, load_entries, save_entries};
pub use notes::{load_documents, parse_document};
