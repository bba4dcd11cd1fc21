/// Database model definitions.
pub mod models;
/// Game and participant storage operations.
pub mod santa_store;
/// Storage abstraction layer for database operations.
pub mod storage;
