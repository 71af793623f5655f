pub mod completeness;
pub mod coordinator;
pub mod merge;

pub use completeness::{CompletenessPredicate, RequiredFields};
pub use coordinator::{EnrichmentCoordinator, EnrichmentResult, SourceReport};
pub use merge::merge_partial;
