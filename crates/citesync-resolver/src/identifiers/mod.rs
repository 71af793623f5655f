pub mod doi;
pub mod title;

pub use doi::{Identifier, normalize_identifier};
pub use title::{NormalizedTitle, normalize_title};
