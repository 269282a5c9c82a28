//! §6 exit codes: `0` success, `1` user/internal error, `2` precondition
//! failure, `4` authorization denial. (`3`, daemon graceful shutdown, is
//! `legiond`'s alone — nothing here ever returns it.)

use legion_core::KernelError;
use legion_storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Flow(#[from] legion_flows::LoadError),
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Store(e) => e.exit_code(),
            CliError::Flow(_) => 1,
            CliError::Usage(_) => 1,
        }
    }
}

impl From<KernelError> for CliError {
    fn from(err: KernelError) -> Self {
        CliError::Store(StoreError::from(err))
    }
}

pub type CliResult<T> = Result<T, CliError>;
