//! Identifier helpers: hex digests and deterministic v1 UUIDs

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::{NoContext, Timestamp, Uuid, Variant};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentError {
    #[error("Unsupported hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Timestamp provided neither in seconds nor milliseconds format: {0}")]
    InvalidTimestamp(u64),
}

/// Digest algorithms accepted by [`hash`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for HashAlgorithm {
    type Err = IdentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "").as_str() {
            "sha224" => Ok(HashAlgorithm::Sha224),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(IdentError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Lowercase hex digest of `data`
pub fn hash(algorithm: HashAlgorithm, data: &str) -> String {
    debug!(%algorithm, len = data.len(), "hash: called");
    match algorithm {
        HashAlgorithm::Sha224 => format!("{:x}", Sha224::digest(data.as_bytes())),
        HashAlgorithm::Sha256 => format!("{:x}", Sha256::digest(data.as_bytes())),
        HashAlgorithm::Sha384 => format!("{:x}", Sha384::digest(data.as_bytes())),
        HashAlgorithm::Sha512 => format!("{:x}", Sha512::digest(data.as_bytes())),
    }
}

/// Build a v1 UUID that is stable for a given identifier and timestamp
///
/// `timestamp` is Unix time in seconds (10 digits) or milliseconds
/// (13 digits). The node id is the first six bytes of the identifier's
/// SHA-256 hex digest and the clock sequence is always zero.
pub fn generate_uuid(identifier: &str, timestamp: u64) -> Result<Uuid, IdentError> {
    debug!(%identifier, timestamp, "generate_uuid: called");
    let millis = match timestamp.to_string().len() {
        13 => timestamp,
        10 => {
            warn!(
                "generate_uuid: timestamp {} is in seconds, converted to {} ms",
                timestamp,
                timestamp * 1000
            );
            timestamp * 1000
        }
        _ => return Err(IdentError::InvalidTimestamp(timestamp)),
    };

    let digest = hash(HashAlgorithm::Sha256, identifier);
    let mut node = [0u8; 6];
    node.copy_from_slice(&digest.as_bytes()[..6]);

    let secs = millis / 1000;
    let nanos = ((millis % 1000) * 1_000_000) as u32;
    let ts = Timestamp::from_unix(NoContext, secs, nanos);

    Ok(Uuid::new_v1(ts, &node))
}

/// Parse the hyphenated form only, with an RFC 4122 variant and version 1-8
///
/// The nil UUID is accepted as well.
fn parse_strict(value: &str) -> Option<Uuid> {
    if value.len() != 36 {
        return None;
    }
    let uuid = Uuid::try_parse(value).ok()?;
    if uuid.is_nil() {
        return Some(uuid);
    }
    let version = uuid.get_version_num();
    ((1..=8).contains(&version) && uuid.get_variant() == Variant::RFC4122).then_some(uuid)
}

/// Check that `value` is a hyphenated UUID with a known version
pub fn validate_uuid(value: &str) -> bool {
    parse_strict(value).is_some()
}

/// Version number of a valid UUID string
pub fn uuid_version(value: &str) -> Option<usize> {
    parse_strict(value).map(|uuid| uuid.get_version_num())
}
