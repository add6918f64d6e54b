use crate::model::ValidationError;
use crate::types::RoomId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("item instance not found: {0}")]
    ItemNotFound(String),

    #[error("stop is not open: {0}")]
    StopNotOpen(String),

    #[error("room {0} is managed automatically and cannot be toggled")]
    RoomNotToggleable(RoomId),

    #[error("unknown catalog item: {0}")]
    UnknownCatalogItem(String),

    #[error("invalid tag selection: {0}")]
    InvalidTag(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
