pub mod affinity;
pub mod catalog;
pub mod exploration;
pub mod feed;
pub mod recall;
pub mod session;

pub use affinity::{AffinityTable, ReactionProcessor};
pub use catalog::{CatalogProvider, InMemoryCatalog};
pub use exploration::EventPolicy;
pub use feed::FeedScheduler;
pub use recall::CandidateRanker;
pub use session::SessionStore;
