//! Checksum algorithms for file contents

use crate::error::{StowageError, StowageResult};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::fmt;
use std::str::FromStr;

/// Supported checksum algorithms
///
/// All digests are rendered as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// MD5 (default)
    #[default]
    Md5,
    /// SHA-1
    Sha1,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl ChecksumAlgorithm {
    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Hex digest of `bytes`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stowage::node::ChecksumAlgorithm;
    ///
    /// assert_eq!(
    ///     ChecksumAlgorithm::Md5.digest(b""),
    ///     "d41d8cd98f00b204e9800998ecf8427e"
    /// );
    /// ```
    #[must_use]
    pub fn digest(self, bytes: &[u8]) -> String {
        match self {
            Self::Md5 => hex_digest::<md5::Md5>(bytes),
            Self::Sha1 => hex_digest::<sha1::Sha1>(bytes),
            Self::Sha256 => hex_digest::<sha2::Sha256>(bytes),
            Self::Sha384 => hex_digest::<sha2::Sha384>(bytes),
            Self::Sha512 => hex_digest::<sha2::Sha512>(bytes),
        }
    }
}

fn hex_digest<D: Digest>(bytes: &[u8]) -> String {
    hex::encode(D::digest(bytes))
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = StowageError;

    fn from_str(s: &str) -> StowageResult<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(StowageError::resolution(s, "unsupported checksum algorithm")),
        }
    }
}
