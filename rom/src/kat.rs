/*++

Licensed under the Apache-2.0 license.

File Name:

    kat.rs

Abstract:

    File contains the boot-time known-answer tests. Every cryptographic
    primitive proves itself against a fixed vector before the boot flow
    trusts it.

--*/

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use vaultboot_error::{VaultbootError, VaultbootResult};

/// SHA-256 of "abc" (FIPS 180-2 example vector).
const SHA256_ABC_DIGEST: [u8; 32] = [
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22,
    0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00,
    0x15, 0xad,
];

/// HMAC-SHA-256 tag from RFC 4231 test case 1.
const HMAC_RFC4231_TC1_TAG: [u8; 32] = [
    0xb0, 0x34, 0x4c, 0x61, 0xd8, 0xdb, 0x38, 0x53, 0x5c, 0xa8, 0xaf, 0xce, 0xaf, 0x0b, 0xf1,
    0x2b, 0x88, 0x1d, 0xc2, 0x00, 0xc9, 0x83, 0x3d, 0xa7, 0x26, 0xe9, 0x37, 0x6c, 0x2e, 0x32,
    0xcf, 0xf7,
];

/// AES-256-GCM tag for all-zero key, all-zero nonce, empty plaintext.
const AES256_GCM_EMPTY_TAG: [u8; 16] = [
    0x53, 0x0f, 0x8a, 0xfb, 0xc7, 0x45, 0x36, 0xb9, 0xa9, 0x63, 0xb4, 0xf1, 0xc4, 0xcb, 0x73,
    0x8b,
];

/// Execute all boot-time known-answer tests.
pub fn execute_kat() -> VaultbootResult<()> {
    log::info!("[kat] ++");
    sha256_kat()?;
    hmac256_kat()?;
    aes256_gcm_kat()?;
    ed25519_kat()?;
    log::info!("[kat] --");
    Ok(())
}

fn sha256_kat() -> VaultbootResult<()> {
    let digest: [u8; 32] = Sha256::digest(b"abc").into();
    if digest != SHA256_ABC_DIGEST {
        return Err(VaultbootError::KAT_SHA256_DIGEST_MISMATCH);
    }
    Ok(())
}

fn hmac256_kat() -> VaultbootResult<()> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&[0x0b; 20])
        .map_err(|_| VaultbootError::KAT_HMAC256_TAG_MISMATCH)?;
    mac.update(b"Hi There");
    let tag: [u8; 32] = mac.finalize().into_bytes().into();
    if tag != HMAC_RFC4231_TC1_TAG {
        return Err(VaultbootError::KAT_HMAC256_TAG_MISMATCH);
    }
    Ok(())
}

fn aes256_gcm_kat() -> VaultbootResult<()> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&[0u8; 32]));
    let mut empty: [u8; 0] = [];
    let tag: [u8; 16] = cipher
        .encrypt_in_place_detached((&[0u8; 12]).into(), &[], &mut empty)
        .map_err(|_| VaultbootError::KAT_AES256_GCM_TAG_MISMATCH)?
        .into();
    if tag != AES256_GCM_EMPTY_TAG {
        return Err(VaultbootError::KAT_AES256_GCM_TAG_MISMATCH);
    }
    Ok(())
}

/// Pairwise sign/verify consistency check.
fn ed25519_kat() -> VaultbootResult<()> {
    let signing_key = SigningKey::from_bytes(&[0x4B; 32]);
    let message = b"vaultboot kat";
    let signature = signing_key.sign(message);
    VerifyingKey::from(&signing_key)
        .verify(message, &signature)
        .map_err(|_| VaultbootError::KAT_ED25519_CONSISTENCY_FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_kats_pass() {
        execute_kat().unwrap();
    }

    #[test]
    fn test_individual_kats() {
        sha256_kat().unwrap();
        hmac256_kat().unwrap();
        aes256_gcm_kat().unwrap();
        ed25519_kat().unwrap();
    }
}
