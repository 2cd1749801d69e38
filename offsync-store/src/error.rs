use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid store or index name: {name:?}")]
    InvalidName { name: String },

    #[error("Index catalog must declare at least one index")]
    EmptyCatalog,

    #[error("Duplicate index name in catalog: {name}")]
    DuplicateIndex { name: String },

    #[error("No index named {name} is declared for this store")]
    UnknownIndex { name: String },

    #[error("Invalid {column} timestamp on record {id}: {message}")]
    InvalidTimestamp {
        column: String,
        id: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
