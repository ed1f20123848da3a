/*++

Licensed under the Apache-2.0 license.

File Name:

    verifier.rs

Abstract:

    Image verification environment backed by the SoC capabilities and the
    software crypto primitives.

--*/

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use vaultboot_drivers::SocPlatform;
use vaultboot_error::{VaultbootError, VaultbootResult};
use vaultboot_image_verify::ImageVerificationEnv;

/// ROM Firmware Verification Environment
pub struct RomImageVerificationEnv<'a, P: SocPlatform> {
    soc: &'a P,
}

impl<'a, P: SocPlatform> RomImageVerificationEnv<'a, P> {
    pub fn new(soc: &'a P) -> Self {
        Self { soc }
    }
}

impl<P: SocPlatform> ImageVerificationEnv for RomImageVerificationEnv<'_, P> {
    /// Calculate SHA-256 digest over `data`.
    fn sha256_digest(&mut self, data: &[u8]) -> VaultbootResult<[u8; 32]> {
        Ok(Sha256::digest(data).into())
    }

    /// Verify an Ed25519 signature over `tbs`.
    fn signature_verify(
        &mut self,
        tbs: &[u8],
        pub_key: &[u8; 32],
        sig: &[u8; 64],
    ) -> VaultbootResult<bool> {
        let key = VerifyingKey::from_bytes(pub_key)
            .map_err(|_| VaultbootError::IMAGE_VERIFIER_VERIFY_FAILURE)?;
        Ok(key.verify(tbs, &Signature::from_bytes(sig)).is_ok())
    }

    /// Vendor public key provisioned in fuses.
    fn vendor_pub_key(&self) -> [u8; 32] {
        self.soc.vendor_pub_key()
    }
}
