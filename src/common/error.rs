use thiserror::Error;

use super::types::{FrameId, PageId};

/// Storage engine error types
#[derive(Error, Debug)]
pub enum StratumError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool is out of frames: all pages are pinned")]
    OutOfFrames,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Frame {0} is out of range for the replacer")]
    InvalidFrameId(FrameId),

    #[error("Frame {0} is not evictable")]
    FrameNotEvictable(FrameId),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Index name {0:?} exceeds the header record limit")]
    IndexNameTooLong(String),

    #[error("Header page cannot hold more index records")]
    HeaderFull,
}

pub type Result<T> = std::result::Result<T, StratumError>;
