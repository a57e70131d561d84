/// Persisted document shapes.
pub mod models;
/// Room persistence: the CAS store trait and its backends.
pub mod room_store;
/// Storage abstraction layer for database operations.
pub mod storage;
