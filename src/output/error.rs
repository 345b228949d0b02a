// ABOUTME: Error types for writing rendered job files
// ABOUTME: Wraps filesystem failures with the path that was being written

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Write error: {message}")]
    WriteError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OutputError>;
