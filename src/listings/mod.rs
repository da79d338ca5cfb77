pub mod lifecycle;
pub mod repository;
pub mod search;

pub use lifecycle::{ListingDraft, ListingManager};
pub use repository::{ListingCollection, ListingRepository};
pub use search::{filter_listings, results_summary, text_matches, FilterCriteria};
