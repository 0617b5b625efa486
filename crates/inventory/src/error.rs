use thiserror::Error;

/// Errors that can occur when interacting with the inventory store.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The store could not be reached. Produced by remote transports and by
    /// test doubles simulating an unreachable service; the in-process stores
    /// never return it.
    #[error("Inventory service unreachable: {0}")]
    Unreachable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for inventory store operations.
pub type Result<T> = std::result::Result<T, InventoryError>;
