use super::binder::Rejection;
use super::store::EntitySet;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Backend request failed: {0}")]
    Transport(String),
    #[error("{set:?} does not accept a {kind} payload")]
    UnsupportedPayload { set: EntitySet, kind: &'static str },
    #[error("Backend answered with a {0} where another record was expected")]
    UnexpectedRecord(&'static str),
    #[error("Failed to encode record: {0}")]
    Encode(String),
    #[error(transparent)]
    Decode(#[from] minicbor::decode::Error),
    #[error(transparent)]
    Sled(#[from] sled::Error),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LineError {
    #[error("There is no movement line at position {0}")]
    NoSuchLine(usize),
    #[error("No asset is recorded for purchase order item {0:?}")]
    NoAsset(String),
    #[error("Movement line ids are exhausted")]
    IdsExhausted,
}

#[derive(thiserror::Error, Debug)]
pub enum BindError {
    #[error("Record rejected: {}", .0.key)]
    Rejected(Rejection),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("A request for this record is already in flight")]
    Busy,
    #[error("No record is bound")]
    NotBound,
    #[error("Operation needs a {0} session")]
    WrongRecordKind(&'static str),
    #[error(transparent)]
    Line(#[from] LineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LookupError {
    #[error("No search parameter was given")]
    NoParameter,
    #[error("{0:?} is not a dd.MM.yyyy date")]
    InvalidDate(String),
}

impl LookupError {
    pub fn message_key(&self) -> &'static str {
        match self {
            LookupError::NoParameter => "vhNoParameter",
            LookupError::InvalidDate(_) => "vhInvalidDate",
        }
    }
}
