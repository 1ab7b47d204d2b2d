/// Database model definitions.
pub mod models;
/// Round, post, vote and leaderboard persistence.
pub mod round_store;
/// Storage abstraction layer for database operations.
pub mod storage;
