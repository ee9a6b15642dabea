//! Signer recovery for `personal_sign` signatures.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};

use crate::identity::Address;
use crate::protocol::{CanonicalMessage, Signature};

/// Recover the address that signed `message`.
///
/// Returns `None` for any signature that does not decode to a valid
/// secp256k1 recoverable signature. High-S signatures are normalized first,
/// flipping the recovery parity to match.
pub fn recover_signer(message: &CanonicalMessage, signature: &Signature) -> Option<Address> {
    let parity = signature.parity()?;
    let mut ecdsa = EcdsaSignature::from_slice(signature.rs()).ok()?;
    let mut y_odd = parity == 1;

    if let Some(normalized) = ecdsa.normalize_s() {
        ecdsa = normalized;
        y_odd = !y_odd;
    }

    let recovery_id = RecoveryId::new(y_odd, false);
    let digest = message.personal_sign_hash();
    let key = VerifyingKey::recover_from_prehash(&digest, &ecdsa, recovery_id).ok()?;
    Some(Address::from_verifying_key(&key))
}
