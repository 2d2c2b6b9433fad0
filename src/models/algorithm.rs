//! Digest algorithms and normalisation modes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported digest algorithms.
///
/// The set is closed. Declaration order is the enumeration order used to
/// break ties when benchmarking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    /// BLAKE2b with a 512-bit output. Default for deduplication.
    #[default]
    #[serde(rename = "blake2b-512", alias = "blake2b")]
    Blake2b512,
    /// SHA-2, 256-bit.
    #[serde(rename = "sha256", alias = "sha-256")]
    Sha256,
    /// SHA-2, 512-bit.
    #[serde(rename = "sha512", alias = "sha-512")]
    Sha512,
    /// SHA-3, 256-bit.
    #[serde(rename = "sha3-256")]
    Sha3_256,
    /// SHA-3, 512-bit.
    #[serde(rename = "sha3-512")]
    Sha3_512,
}

impl HashAlgorithm {
    /// Returns all algorithms in enumeration order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Blake2b512,
            Self::Sha256,
            Self::Sha512,
            Self::Sha3_256,
            Self::Sha3_512,
        ]
    }

    /// Returns the canonical name, as persisted in the `algorithm` column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Blake2b512 => "blake2b-512",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Sha3_256 => "sha3-256",
            Self::Sha3_512 => "sha3-512",
        }
    }

    /// Digest size in bits.
    #[must_use]
    pub const fn output_bits(&self) -> usize {
        match self {
            Self::Sha256 | Self::Sha3_256 => 256,
            Self::Blake2b512 | Self::Sha512 | Self::Sha3_512 => 512,
        }
    }

    /// Length of the lowercase hex encoding of a digest.
    #[must_use]
    pub const fn hex_len(&self) -> usize {
        self.output_bits() / 4
    }

    /// Position in enumeration order.
    #[must_use]
    pub const fn ordinal(&self) -> usize {
        *self as usize
    }

    /// Parses an algorithm name.
    ///
    /// Matching is case-insensitive and accepts the common spellings
    /// (`sha-256`, `SHA256`, `blake2b`, `sha3_512`, ...).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedAlgorithm`] for any name outside the set.
    pub fn parse(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace('_', "-");
        match key.as_str() {
            "blake2b" | "blake2b-512" | "blake2b512" => Ok(Self::Blake2b512),
            "sha256" | "sha-256" | "sha2-256" => Ok(Self::Sha256),
            "sha512" | "sha-512" | "sha2-512" => Ok(Self::Sha512),
            "sha3-256" | "sha3256" => Ok(Self::Sha3_256),
            "sha3-512" | "sha3512" => Ok(Self::Sha3_512),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// How the bytes fed to the fingerprint engine are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    /// Extract text, normalise it, and hash the canonical bytes.
    #[default]
    #[serde(rename = "content", alias = "content_only", alias = "content-only")]
    ContentOnly,
    /// Hash the raw document bytes (legacy path, metadata-sensitive).
    Raw,
}

impl NormalizationMode {
    /// Returns the mode as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ContentOnly => "content",
            Self::Raw => "raw",
        }
    }

    /// Parses a mode name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "content" | "content-only" | "content_only" => Ok(Self::ContentOnly),
            "raw" | "raw-fallback" | "bytes" => Ok(Self::Raw),
            other => Err(Error::InvalidInput(format!(
                "unknown normalization mode '{other}' (expected 'content' or 'raw')"
            ))),
        }
    }
}

impl fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NormalizationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
