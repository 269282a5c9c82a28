//! Storage-layer error type: datastore failures wrap `rusqlite::Error`,
//! domain precondition failures reuse `legion_core::KernelError` so a
//! caller at the CLI boundary gets one consistent exit-code mapping.

use legion_core::KernelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("datastore error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Flow(#[from] legion_flows::LoadError),
}

impl StoreError {
    pub fn exit_code(&self) -> i32 {
        match self {
            StoreError::Kernel(k) => k.exit_code(),
            StoreError::Sqlite(_) | StoreError::Io(_) | StoreError::Flow(_) => 1,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
