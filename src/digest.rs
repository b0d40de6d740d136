//! Content digests
//!
//! A [`Digest`] is the universal key of the registry: every blob and manifest
//! is addressed by `algorithm:hex`. Digests are validated on construction and
//! ordered lexicographically so sets of them iterate deterministically.

use crate::error::{GcError, Result};
use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Algorithm::Sha256),
            "sha384" => Some(Algorithm::Sha384),
            "sha512" => Some(Algorithm::Sha512),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha384 => "sha384",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Number of hex characters in an encoded digest of this algorithm
    pub fn hex_len(&self) -> usize {
        match self {
            Algorithm::Sha256 => 64,
            Algorithm::Sha384 => 96,
            Algorithm::Sha512 => 128,
        }
    }

    fn hash(&self, data: &[u8]) -> String {
        match self {
            Algorithm::Sha256 => hex::encode(sha2::Sha256::digest(data)),
            Algorithm::Sha384 => hex::encode(sha2::Sha384::digest(data)),
            Algorithm::Sha512 => hex::encode(sha2::Sha512::digest(data)),
        }
    }
}

/// Validated `algorithm:hex` content identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    value: String,
}

impl Digest {
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: &str| GcError::InvalidDigest {
            digest: value.to_string(),
            reason: reason.to_string(),
        };

        let (algorithm, hex_part) = value
            .split_once(':')
            .ok_or_else(|| invalid("missing algorithm separator"))?;
        let algorithm =
            Algorithm::from_name(algorithm).ok_or_else(|| invalid("unsupported algorithm"))?;

        if hex_part.len() != algorithm.hex_len() {
            return Err(invalid(&format!(
                "expected {} hex characters, got {}",
                algorithm.hex_len(),
                hex_part.len()
            )));
        }
        if !hex_part
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(invalid("encoded part must be lowercase hex"));
        }

        Ok(Digest {
            value: value.to_string(),
        })
    }

    /// SHA256 digest of the given content
    pub fn from_bytes(data: &[u8]) -> Self {
        Digest {
            value: format!("sha256:{}", Algorithm::Sha256.hash(data)),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        // Validated in `parse`, so the prefix is always a known algorithm
        match self.value.split_once(':').map(|(alg, _)| alg) {
            Some("sha384") => Algorithm::Sha384,
            Some("sha512") => Algorithm::Sha512,
            _ => Algorithm::Sha256,
        }
    }

    /// Encoded (hex) portion without the algorithm prefix
    pub fn hex(&self) -> &str {
        self.value
            .split_once(':')
            .map(|(_, hex_part)| hex_part)
            .unwrap_or(&self.value)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Truncated form for display
    pub fn short(&self) -> String {
        if self.value.len() > 19 {
            format!("{}...", &self.value[..19])
        } else {
            self.value.clone()
        }
    }

    /// Verify data matches this digest
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        let computed = self.algorithm().hash(data);
        if computed != self.hex() {
            return Err(GcError::InvalidDigest {
                digest: self.value.clone(),
                reason: format!(
                    "content mismatch, computed {}:{}",
                    self.algorithm().name(),
                    computed
                ),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Digest {
    type Err = GcError;

    fn from_str(s: &str) -> Result<Self> {
        Digest::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = GcError;

    fn try_from(value: String) -> Result<Self> {
        Digest::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_from_bytes() {
        let digest = Digest::from_bytes(b"hello world");
        assert_eq!(digest.as_str(), HELLO);
        assert_eq!(digest.algorithm(), Algorithm::Sha256);
        assert_eq!(
            digest.hex(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Digest::parse(HELLO).is_ok());
        assert!(Digest::parse("sha256:invalid").is_err());
        assert!(Digest::parse("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9").is_err());
        assert!(Digest::parse("md5:d41d8cd98f00b204e9800998ecf8427e").is_err());
        assert!(Digest::parse(&HELLO.to_uppercase().replace("SHA256", "sha256")).is_err());
    }

    #[test]
    fn test_sha512_length() {
        let value = format!("sha512:{}", "a".repeat(128));
        let digest = Digest::parse(&value).unwrap();
        assert_eq!(digest.algorithm(), Algorithm::Sha512);
        assert!(Digest::parse(&format!("sha512:{}", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_verify() {
        let digest = Digest::parse(HELLO).unwrap();
        assert!(digest.verify(b"hello world").is_ok());
        assert!(digest.verify(b"hello there").is_err());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let digest = Digest::parse(HELLO).unwrap();
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", HELLO));

        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, digest);
        assert!(serde_json::from_str::<Digest>("\"sha256:nope\"").is_err());
    }

    #[test]
    fn test_short() {
        let digest = Digest::parse(HELLO).unwrap();
        assert_eq!(digest.short(), "sha256:b94d27b9934d...");
    }
}
