pub mod config;
pub mod jobs;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use jobs::IdleFlushJob;
pub use services::{
    AffinityTable, CandidateRanker, EventPolicy, FeedScheduler, InMemoryCatalog, ReactionProcessor,
    SessionStore,
};
