//! Opaque public identifiers for sequential record ids.
//!
//! Internal primary keys never leave the process. Every resource id that is
//! rendered into a response goes through [`OpaqueId`], and every id that arrives
//! in a path is decoded back before it reaches the store. The transform is
//! keyless: anyone holding this crate can reverse it, so it hides the sequence
//! and tags the entity kind but is not a secret.
//!
//! Scheme v1 buffer (8 bytes, before masking):
//!
//! | byte | field |
//! |------|-------|
//! | 0 | checksum: first byte of SHA-256 over bytes 1..8 |
//! | 1 | scheme version |
//! | 2..4 | entity kind tag, big endian |
//! | 4..8 | local id, big endian |
//!
//! Bytes 1..8 are XOR-masked with a stream derived from the checksum so that
//! neighbouring ids do not produce neighbouring strings. The buffer is rendered
//! as unpadded URL-safe base64 (11 characters).

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Current identifier scheme version.
pub const SCHEME_V1: u8 = 1;

/// Largest local id scheme v1 can carry.
pub const MAX_LOCAL_ID: u64 = u32::MAX as u64;

const V1_LEN: usize = 8;
const MASK_SALT: [u8; V1_LEN] = [0x00, 0x5a, 0xc3, 0x1e, 0x97, 0x6b, 0xd4, 0x29];

/// Errors produced while encoding or decoding opaque identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("malformed identifier: {0}")]
    Malformed(&'static str),
    #[error("local id {value} exceeds the encodable maximum {max}")]
    OutOfRange { value: u64, max: u64 },
    #[error("unsupported identifier scheme version {0}")]
    UnsupportedVersion(u8),
    #[error("identifier refers to a {found}, expected a {expected}")]
    KindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },
}

impl IdError {
    /// True for every failure caused by client-supplied text.
    pub fn is_client_error(&self) -> bool {
        matches!(self, IdError::Malformed(_) | IdError::KindMismatch { .. })
    }
}

/// Entity kinds that share the opaque identifier space. Each kind has its own tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Company,
    Position,
    Contract,
    Role,
    Permission,
    UserPosition,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::User,
        EntityKind::Company,
        EntityKind::Position,
        EntityKind::Contract,
        EntityKind::Role,
        EntityKind::Permission,
        EntityKind::UserPosition,
    ];

    pub const fn tag(self) -> u16 {
        match self {
            EntityKind::User => 1,
            EntityKind::Company => 2,
            EntityKind::Position => 3,
            EntityKind::Contract => 4,
            EntityKind::Role => 5,
            EntityKind::Permission => 6,
            EntityKind::UserPosition => 7,
        }
    }

    pub fn from_tag(tag: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Company => "company",
            EntityKind::Position => "position",
            EntityKind::Contract => "contract",
            EntityKind::Role => "role",
            EntityKind::Permission => "permission",
            EntityKind::UserPosition => "user_position",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded (or about to be encoded) public identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpaqueId {
    local_id: u32,
    kind: EntityKind,
    version: u8,
}

impl OpaqueId {
    /// Build a scheme v1 identifier. Fails with [`IdError::OutOfRange`] above [`MAX_LOCAL_ID`].
    pub fn new(local_id: u64, kind: EntityKind) -> Result<Self, IdError> {
        Self::with_version(local_id, kind, SCHEME_V1)
    }

    pub fn with_version(local_id: u64, kind: EntityKind, version: u8) -> Result<Self, IdError> {
        if version != SCHEME_V1 {
            return Err(IdError::UnsupportedVersion(version));
        }
        let local_id = u32::try_from(local_id).map_err(|_| IdError::OutOfRange {
            value: local_id,
            max: MAX_LOCAL_ID,
        })?;
        Ok(Self {
            local_id,
            kind,
            version,
        })
    }

    pub fn local_id(&self) -> u64 {
        u64::from(self.local_id)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Canonical public text form.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_bytes())
    }

    /// Parse any well-formed identifier regardless of kind.
    pub fn decode(value: &str) -> Result<Self, IdError> {
        if value.is_empty() {
            return Err(IdError::Malformed("empty identifier"));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| IdError::Malformed("invalid character or length"))?;
        if bytes.len() < 2 {
            return Err(IdError::Malformed("identifier too short"));
        }

        let checksum = bytes[0];
        let version = bytes[1] ^ mask_byte(checksum, 1);
        if version != SCHEME_V1 {
            return Err(IdError::Malformed("unsupported scheme version"));
        }
        if bytes.len() != V1_LEN {
            return Err(IdError::Malformed("wrong length for scheme version"));
        }

        let mut plain = [0u8; V1_LEN];
        for (index, byte) in bytes.iter().enumerate().skip(1) {
            plain[index] = byte ^ mask_byte(checksum, index);
        }
        if checksum_of(&plain) != checksum {
            return Err(IdError::Malformed("checksum mismatch"));
        }

        let tag = u16::from_be_bytes([plain[2], plain[3]]);
        let kind = EntityKind::from_tag(tag).ok_or(IdError::Malformed("unknown entity kind"))?;
        let local_id = u32::from_be_bytes([plain[4], plain[5], plain[6], plain[7]]);

        Ok(Self {
            local_id,
            kind,
            version,
        })
    }

    /// Parse an identifier and assert that it names the expected kind.
    pub fn decode_as(value: &str, expected: EntityKind) -> Result<Self, IdError> {
        let id = Self::decode(value)?;
        if id.kind != expected {
            return Err(IdError::KindMismatch {
                expected,
                found: id.kind,
            });
        }
        Ok(id)
    }

    fn to_bytes(self) -> [u8; V1_LEN] {
        let mut plain = [0u8; V1_LEN];
        plain[1] = self.version;
        plain[2..4].copy_from_slice(&self.kind.tag().to_be_bytes());
        plain[4..8].copy_from_slice(&self.local_id.to_be_bytes());

        let checksum = checksum_of(&plain);
        let mut out = [0u8; V1_LEN];
        out[0] = checksum;
        for index in 1..V1_LEN {
            out[index] = plain[index] ^ mask_byte(checksum, index);
        }
        out
    }
}

fn checksum_of(plain: &[u8; V1_LEN]) -> u8 {
    Sha256::digest(&plain[1..])[0]
}

fn mask_byte(checksum: u8, index: usize) -> u8 {
    checksum.rotate_left(index as u32) ^ MASK_SALT[index]
}

/// Encode a local id of the given kind with the current scheme.
pub fn encode(local_id: u64, kind: EntityKind) -> Result<String, IdError> {
    OpaqueId::new(local_id, kind).map(|id| id.encode())
}

/// Decode an identifier into its local id and kind.
pub fn decode(value: &str) -> Result<(u64, EntityKind), IdError> {
    OpaqueId::decode(value).map(|id| (id.local_id(), id.kind()))
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for OpaqueId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for OpaqueId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for OpaqueId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OpaqueId::decode(&raw).map_err(serde::de::Error::custom)
    }
}
