use thiserror::Error;

use snap_blob::BlobError;
use snap_records::RecordError;

pub type RepairResult<T> = Result<T, RepairError>;

#[derive(Error, Debug)]
pub enum RepairError {
    #[error("Record store error: {0}")]
    Records(#[from] RecordError),

    #[error("Object store error: {0}")]
    Storage(#[from] BlobError),
}
