//! Storage construction errors

use core::fmt;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// `stripe_count` was zero
    NoStripes,

    /// Each stripe would get fewer than `StripedLru::MIN_STRIPE_BYTES`
    StripeTooSmall { per_stripe: usize },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NoStripes => write!(f, "stripe count must be > 0"),
            StorageError::StripeTooSmall { per_stripe } => {
                write!(f, "storage size too small: {} bytes per stripe", per_stripe)
            }
        }
    }
}

impl std::error::Error for StorageError {}
