pub mod global_search;

pub use global_search::{CommunityAnswer, GlobalSearchEngine, GlobalSearchResult};
