//! Scene model error types

use thiserror::Error;

/// Errors raised while building or validating scene data
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Invalid entity type tag: {0}")]
    InvalidEntityType(u8),

    #[error("Invalid texture format: {0:#x}")]
    InvalidTextureFormat(u16),

    #[error("Invalid constraint type tag: {0}")]
    InvalidConstraintType(u8),

    #[error("Pixel buffer size {actual} does not match {width}x{height} ({expected} bytes)")]
    PixelSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Skeleton mismatch: {bones} bone paths, {bindposes} bindposes")]
    SkeletonMismatch { bones: usize, bindposes: usize },
}

/// Result type for scene operations
pub type Result<T> = std::result::Result<T, SceneError>;
