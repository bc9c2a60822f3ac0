use thiserror::Error;

#[derive(Error, Debug)]
pub enum TailError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend unreachable: {0}")]
    Connection(String),

    #[error("Collection missing: {database}/{collection}")]
    CollectionMissing { database: String, collection: String },

    #[error("Collection is not capped: {database}/{collection}")]
    NotCapped { database: String, collection: String },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Tailable cursor exhausted")]
    CursorExhausted,

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Output sink rejected event: {0}")]
    Sink(String),
}

impl TailError {
    /// True for conditions the worker recovers from without terminating.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TailError::QueryFailed(_) | TailError::CursorExhausted)
    }
}

pub type Result<T> = std::result::Result<T, TailError>;

/// Map a driver error to the tailing taxonomy.
///
/// Server error codes: 26 = NamespaceNotFound, 43 = CursorNotFound,
/// 136 = CappedPositionLost, 237 = CursorKilled.
pub(crate) fn classify_driver_error(
    e: mongodb::error::Error,
    database: &str,
    collection: &str,
) -> TailError {
    use mongodb::error::ErrorKind;

    match e.kind.as_ref() {
        ErrorKind::Command(c) if c.code == 26 => TailError::CollectionMissing {
            database: database.to_string(),
            collection: collection.to_string(),
        },
        ErrorKind::Command(c) if matches!(c.code, 43 | 136 | 237) => TailError::CursorExhausted,
        ErrorKind::ServerSelection { message, .. } => TailError::Connection(message.clone()),
        ErrorKind::Io(io) => TailError::Connection(io.to_string()),
        _ if is_dead_cursor_error(&e) => TailError::CursorExhausted,
        _ => TailError::QueryFailed(e.to_string()),
    }
}

/// String fallback for cursor-death reports that arrive without a code.
fn is_dead_cursor_error<E: std::fmt::Display>(e: &E) -> bool {
    let err_str = e.to_string().to_lowercase();
    err_str.contains("cursor") && (err_str.contains("not found") || err_str.contains("killed"))
        || err_str.contains("cappedpositionlost")
}
