//! Verification tokens: a hash over canonically encoded match positions.

use crate::error::{Result, TranscryptError};
use crate::matcher::MatchPosition;
use digest::Digest;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use sha3::Sha3_256;
use std::fmt;

pub const TOKEN_LEN: usize = 32;

const COMMITMENT_DOMAIN: &[u8] = b"transcrypt_commitment_v1";

/// Hash used to derive tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenHash {
    #[default]
    Sha256,
    Sha3,
    Blake3,
}

impl std::str::FromStr for TokenHash {
    type Err = TranscryptError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha3" | "sha3-256" => Ok(Self::Sha3),
            "blake3" => Ok(Self::Blake3),
            _ => Err(TranscryptError::UnsupportedAlgorithm(format!("hash: {}", s))),
        }
    }
}

impl fmt::Display for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sha256 => "sha256",
            Self::Sha3 => "sha3",
            Self::Blake3 => "blake3",
        };
        f.write_str(name)
    }
}

impl TokenHash {
    fn hash_parts(&self, parts: &[&[u8]]) -> [u8; TOKEN_LEN] {
        match self {
            Self::Sha256 => digest_parts::<Sha256>(parts),
            Self::Sha3 => digest_parts::<Sha3_256>(parts),
            Self::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                for part in parts {
                    hasher.update(part);
                }
                *hasher.finalize().as_bytes()
            }
        }
    }
}

fn digest_parts<D: Digest>(parts: &[&[u8]]) -> [u8; TOKEN_LEN] {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; TOKEN_LEN];
    out.copy_from_slice(&hasher.finalize()[..TOKEN_LEN]);
    out
}

/// 32-byte token regenerated from a private recipe
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerificationToken([u8; TOKEN_LEN]);

impl VerificationToken {
    pub fn from_bytes(bytes: [u8; TOKEN_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }

    /// One-way commitment: SHA3-256 over a domain tag and the token
    pub fn commitment(&self) -> [u8; TOKEN_LEN] {
        digest_parts::<Sha3_256>(&[COMMITMENT_DOMAIN, &self.0])
    }

    pub fn ct_eq(&self, other: &Self) -> bool {
        constant_time_compare(&self.0, &other.0)
    }
}

/// Constant-time comparison to prevent timing attacks
pub(crate) fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Hash the matches as big-endian `u64`s followed by the salt.
///
/// Positions must be strictly ascending.
pub fn derive(matches: &[MatchPosition], salt: &[u8], hash: TokenHash) -> Result<VerificationToken> {
    if matches.is_empty() {
        return Err(TranscryptError::InvalidMatches("no match positions".into()));
    }
    if let Some(pair) = matches.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(TranscryptError::InvalidMatches(format!(
            "positions not strictly ascending: {} then {}",
            pair[0], pair[1]
        )));
    }

    let encoded: Vec<u8> = matches.iter().flat_map(|m| m.to_be_bytes()).collect();
    Ok(VerificationToken(hash.hash_parts(&[&encoded, salt])))
}

impl fmt::Display for VerificationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for VerificationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerificationToken({})", self)
    }
}

impl std::str::FromStr for VerificationToken {
    type Err = TranscryptError;
    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; TOKEN_LEN];
        hex::decode_to_slice(s.trim(), &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for VerificationToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VerificationToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_encoding_sha256() {
        let token = derive(&[1, 2], b"salt", TokenHash::Sha256).unwrap();

        let mut hasher = Sha256::new();
        hasher.update(1u64.to_be_bytes());
        hasher.update(2u64.to_be_bytes());
        hasher.update(b"salt");
        assert_eq!(token.as_bytes()[..], hasher.finalize()[..]);
    }

    #[test]
    fn test_blake3_matches_direct_hash() {
        let token = derive(&[7], b"", TokenHash::Blake3).unwrap();
        let expected = blake3::hash(&7u64.to_be_bytes());
        assert_eq!(token.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn test_hash_salt_and_positions_all_matter() {
        let base = derive(&[3, 9, 40], b"salt", TokenHash::Sha3).unwrap();
        assert_eq!(base, derive(&[3, 9, 40], b"salt", TokenHash::Sha3).unwrap());
        assert_ne!(base, derive(&[3, 9, 41], b"salt", TokenHash::Sha3).unwrap());
        assert_ne!(base, derive(&[3, 9, 40], b"salz", TokenHash::Sha3).unwrap());
        assert_ne!(base, derive(&[3, 9, 40], b"salt", TokenHash::Sha256).unwrap());
        assert_ne!(base, derive(&[3, 9, 40], b"salt", TokenHash::Blake3).unwrap());
    }

    #[test]
    fn test_rejects_unordered_positions() {
        assert!(matches!(
            derive(&[5, 5], b"", TokenHash::default()),
            Err(TranscryptError::InvalidMatches(_))
        ));
        assert!(derive(&[9, 2], b"", TokenHash::default()).is_err());
        assert!(derive(&[], b"", TokenHash::default()).is_err());
    }

    #[test]
    fn test_commitment_differs_from_token() {
        let token = derive(&[0], b"x", TokenHash::default()).unwrap();
        assert_ne!(&token.commitment(), token.as_bytes());
        assert_eq!(token.commitment(), token.commitment());
    }

    #[test]
    fn test_hex_and_serde() {
        let token = derive(&[1, 4, 9], b"salt", TokenHash::Blake3).unwrap();
        let text = token.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<VerificationToken>().unwrap(), token);
        assert!("abcd".parse::<VerificationToken>().is_err());

        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{}\"", text));
        let back: VerificationToken = serde_json::from_str(&json).unwrap();
        assert!(back.ct_eq(&token));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2]));
    }

    #[test]
    fn test_hash_names() {
        assert_eq!("SHA3".parse::<TokenHash>().unwrap(), TokenHash::Sha3);
        assert_eq!("blake3".parse::<TokenHash>().unwrap(), TokenHash::Blake3);
        assert!("md5".parse::<TokenHash>().is_err());
        assert_eq!(TokenHash::Sha256.to_string(), "sha256");
    }
}
