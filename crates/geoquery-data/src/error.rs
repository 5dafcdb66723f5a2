use thiserror::Error;

use crate::feature::{ContainerId, FeatureId};

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Feature {feature} not found in container {container}")]
    FeatureNotFound {
        container: ContainerId,
        feature: FeatureId,
    },
    #[error("Rank table unavailable for container {0}")]
    RankTableUnavailable(ContainerId),
    #[error("Malformed container data: {0}")]
    Malformed(String),
}
