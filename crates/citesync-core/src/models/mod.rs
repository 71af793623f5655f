pub mod document;
pub mod entry;
pub mod record;

pub use document::*;
pub use entry::*;
pub use record::*;
