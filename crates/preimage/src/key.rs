//! Contains the [PreimageKey] type, which is used to identify preimages that may be fetched from
//! the preimage oracle.

use crate::errors::PreimageOracleError;
use alloy_primitives::{keccak256, B256};
#[cfg(feature = "rkyv")]
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
#[cfg(feature = "serde")]
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use sha2::{Digest, Sha256};

/// <https://specs.optimism.io/experimental/fault-proof/index.html#pre-image-key-types>
///
/// The zero type byte is illegal and has no variant.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
#[cfg_attr(
    feature = "rkyv",
    derive(Archive, RkyvSerialize, RkyvDeserialize),
    rkyv(derive(Eq, PartialEq, Ord, PartialOrd, Hash))
)]
#[cfg_attr(feature = "serde", derive(SerdeSerialize, SerdeDeserialize))]
pub enum PreimageKeyType {
    /// Local key types are local to a given instance of a fault-proof and context dependent.
    /// Commonly these local keys are mapped to bootstrap data for the fault proof program.
    Local = 1,
    /// Keccak256 key types are global and context independent. Preimages are mapped from the
    /// low-order 31 bytes of the preimage's `keccak256` digest to the preimage itself.
    #[default]
    Keccak256 = 2,
    /// GlobalGeneric key types are reserved for future use.
    GlobalGeneric = 3,
    /// Sha256 key types are global and context independent. Preimages are mapped from the
    /// low-order 31 bytes of the preimage's `sha256` digest to the preimage itself.
    Sha256 = 4,
    /// Blob key types are global and context independent. Blob keys are constructed as
    /// `keccak256(commitment ++ z)`, and then the high-order byte of the digest is set to the
    /// type byte.
    Blob = 5,
    /// Precompile key types are global and context independent. Precompile keys are constructed as
    /// `keccak256(precompile_addr ++ input)`, and then the high-order byte of the digest is set to
    /// the type byte.
    Precompile = 6,
}

impl PreimageKeyType {
    /// Returns `true` if preimages under this key type are addressed by their own digest, and can
    /// therefore be verified without any additional context.
    pub const fn is_content_addressed(&self) -> bool {
        matches!(self, Self::Keccak256 | Self::Sha256)
    }
}

impl TryFrom<u8> for PreimageKeyType {
    type Error = PreimageOracleError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let key_type = match value {
            1 => Self::Local,
            2 => Self::Keccak256,
            3 => Self::GlobalGeneric,
            4 => Self::Sha256,
            5 => Self::Blob,
            6 => Self::Precompile,
            _ => return Err(PreimageOracleError::UnsupportedKeyKind(value)),
        };
        Ok(key_type)
    }
}

/// A preimage key is a 32-byte value that identifies a preimage that may be fetched from the
/// oracle.
///
/// **Layout**:
/// |  Bits   | Description |
/// |---------|-------------|
/// | [0, 1)  | Type byte   |
/// | [1, 32) | Data        |
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(
    feature = "rkyv",
    derive(Archive, RkyvSerialize, RkyvDeserialize),
    rkyv(derive(Eq, PartialEq, Ord, PartialOrd, Hash))
)]
#[cfg_attr(feature = "serde", derive(SerdeSerialize, SerdeDeserialize))]
pub struct PreimageKey {
    data: [u8; 31],
    key_type: PreimageKeyType,
}

impl PreimageKey {
    /// Creates a new [PreimageKey] from a 32-byte value and a [PreimageKeyType]. The 32-byte value
    /// will be truncated to 31 bytes by taking the low-order 31 bytes.
    pub fn new(key: [u8; 32], key_type: PreimageKeyType) -> Self {
        let mut data = [0u8; 31];
        data.copy_from_slice(&key[1..]);
        Self { data, key_type }
    }

    /// Creates a new local [PreimageKey] from a 64-bit local identifier. The local identifier will
    /// be written into the low-order 8 bytes of the big-endian 31-byte data field.
    pub fn new_local(local_ident: u64) -> Self {
        let mut data = [0u8; 31];
        data[23..].copy_from_slice(&local_ident.to_be_bytes());
        Self { data, key_type: PreimageKeyType::Local }
    }

    /// Creates a new keccak256 [PreimageKey] from a 32-byte keccak256 digest. The digest will be
    /// truncated to 31 bytes by taking the low-order 31 bytes.
    pub fn new_keccak256(digest: [u8; 32]) -> Self {
        Self::new(digest, PreimageKeyType::Keccak256)
    }

    /// Creates a new sha256 [PreimageKey] from a 32-byte sha256 digest. The digest will be
    /// truncated to 31 bytes by taking the low-order 31 bytes.
    pub fn new_sha256(digest: [u8; 32]) -> Self {
        Self::new(digest, PreimageKeyType::Sha256)
    }

    /// Creates the keccak256 [PreimageKey] that addresses `preimage`.
    pub fn keccak256_of(preimage: &[u8]) -> Self {
        Self::new_keccak256(keccak256(preimage).0)
    }

    /// Creates the sha256 [PreimageKey] that addresses `preimage`.
    pub fn sha256_of(preimage: &[u8]) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(preimage));
        Self::new_sha256(digest)
    }

    /// Creates the [PreimageKey] that addresses `preimage` under a content-addressed `key_type`.
    /// Returns `None` for key types that are not content addressed.
    pub fn content_addressed(key_type: PreimageKeyType, preimage: &[u8]) -> Option<Self> {
        match key_type {
            PreimageKeyType::Keccak256 => Some(Self::keccak256_of(preimage)),
            PreimageKeyType::Sha256 => Some(Self::sha256_of(preimage)),
            _ => None,
        }
    }

    /// Returns the [PreimageKeyType] for the [PreimageKey].
    pub const fn key_type(&self) -> PreimageKeyType {
        self.key_type
    }
}

impl From<PreimageKey> for [u8; 32] {
    fn from(key: PreimageKey) -> Self {
        let mut rendered_key = [0u8; 32];
        rendered_key[0] = key.key_type as u8;
        rendered_key[1..].copy_from_slice(&key.data);
        rendered_key
    }
}

impl From<PreimageKey> for B256 {
    fn from(value: PreimageKey) -> Self {
        let raw: [u8; 32] = value.into();
        Self::from(raw)
    }
}

impl TryFrom<[u8; 32]> for PreimageKey {
    type Error = PreimageOracleError;

    fn try_from(value: [u8; 32]) -> Result<Self, Self::Error> {
        let key_type = PreimageKeyType::try_from(value[0])?;
        Ok(Self::new(value, key_type))
    }
}

impl TryFrom<B256> for PreimageKey {
    type Error = PreimageOracleError;

    fn try_from(value: B256) -> Result<Self, Self::Error> {
        Self::try_from(value.0)
    }
}

impl core::fmt::Display for PreimageKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let raw: [u8; 32] = (*self).into();
        write!(f, "{}", B256::from(raw))
    }
}
