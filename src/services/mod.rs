pub mod search_history;

pub use search_history::{record_in_background, SearchHistoryRetention};
