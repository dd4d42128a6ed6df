//! Conversion between cached values and the bytes stored on disk.

use crate::error::{CacheError, Result};

/// A value that can live in both tiers of a [`UnifiedCache`](crate::UnifiedCache).
///
/// The memory tier keeps values as they are; the disk tier stores
/// `encode()`'s bytes and rebuilds values with `decode()` on a promotion.
///
/// # Examples
///
/// ```
/// use trackcache_core::{CacheError, Payload};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Score(u32);
///
/// impl Payload for Score {
///     fn encode(&self) -> Vec<u8> {
///         self.0.to_le_bytes().to_vec()
///     }
///
///     fn decode(key: &str, bytes: &[u8]) -> Result<Self, CacheError> {
///         let raw: [u8; 4] = bytes.try_into().map_err(|_| CacheError::Decode {
///             key: key.to_string(),
///             reason: format!("expected 4 bytes, got {}", bytes.len()),
///         })?;
///         Ok(Score(u32::from_le_bytes(raw)))
///     }
/// }
///
/// let bytes = Score(7).encode();
/// assert_eq!(Score::decode("k", &bytes).unwrap(), Score(7));
/// ```
pub trait Payload: Sized {
    fn encode(&self) -> Vec<u8>;

    /// Rebuilds a value; `key` is only used to label errors.
    fn decode(key: &str, bytes: &[u8]) -> Result<Self>;
}

impl Payload for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        self.clone()
    }

    fn decode(_key: &str, bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl Payload for String {
    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CacheError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}
