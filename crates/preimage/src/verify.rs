//! Verification of pre-images against the keys they were requested under.

use crate::{
    errors::{PreimageOracleError, PreimageOracleResult},
    PreimageKey, PreimageKeyType,
};
use alloy_primitives::B256;

/// A [PreimageVerifier] checks that a payload is the pre-image of a raw 32-byte key.
///
/// Verifiers are free to support more key kinds than [StandardVerifier], for example by holding
/// the context needed to recompute blob or precompile keys.
pub trait PreimageVerifier {
    /// Verify that `preimage` is the pre-image of `key`.
    fn verify(&self, key: &[u8; 32], preimage: &[u8]) -> PreimageOracleResult<()>;
}

/// The [PreimageVerifier] that applies [verify_preimage].
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardVerifier;

impl PreimageVerifier for StandardVerifier {
    fn verify(&self, key: &[u8; 32], preimage: &[u8]) -> PreimageOracleResult<()> {
        verify_preimage(key, preimage)
    }
}

/// Verify that `preimage` is the pre-image of the raw `key`.
///
/// - [PreimageKeyType::Local] keys are context dependent and always pass.
/// - [PreimageKeyType::Keccak256] and [PreimageKeyType::Sha256] keys pass if the digest of the
///   payload, with its first byte replaced by the type byte, equals the key. Empty payloads are
///   rejected.
/// - Every other type byte fails with [PreimageOracleError::UnsupportedKeyKind].
pub fn verify_preimage(key: &[u8; 32], preimage: &[u8]) -> PreimageOracleResult<()> {
    let key_type = PreimageKeyType::try_from(key[0])?;
    if key_type == PreimageKeyType::Local {
        return Ok(());
    }
    if !key_type.is_content_addressed() {
        return Err(PreimageOracleError::UnsupportedKeyKind(key[0]));
    }

    let expected = PreimageKey::content_addressed(key_type, preimage).map(<[u8; 32]>::from);
    if preimage.is_empty() || expected != Some(*key) {
        return Err(PreimageOracleError::IncorrectData(B256::from(*key)));
    }

    Ok(())
}
