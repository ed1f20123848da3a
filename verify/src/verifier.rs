/*++

Licensed under the Apache-2.0 license.

File Name:

    verifier.rs

Abstract:

    This file is the main implementation of the firmware image verifier.

--*/

use crate::{ImageHeader, ImageVerificationEnv, ImageVerificationInfo, IMAGE_MARKER, MAX_IMAGE_SIZE};
use vaultboot_cfi::{launder, JitterSource, LayeredOutcome, LayeredVerifier};
use vaultboot_error::{VaultbootError, VaultbootResult};

/// Sentinel recorded for a passing signature sub-check.
const SIG_CONFIRMED: u32 = 0x5159_C3A5;

/// Firmware image verifier.
///
/// Every check is jittered and the digest and signature results go through
/// the layered verifier, so a single glitch cannot turn a rejected image
/// into an accepted one.
pub struct FirmwareVerifier<Env: ImageVerificationEnv> {
    /// Verification environment.
    env: Env,
}

impl<Env: ImageVerificationEnv> FirmwareVerifier<Env> {
    /// Create a new instance of `FirmwareVerifier`.
    ///
    /// # Arguments
    ///
    /// * `env` - Environment
    pub fn new(env: Env) -> Self {
        Self { env }
    }

    /// Verify a firmware image.
    ///
    /// # Arguments
    ///
    /// * `jitter`  - Jitter source
    /// * `header`  - Image header
    /// * `payload` - Image payload to verify
    ///
    /// # Returns
    ///
    /// * `ImageVerificationInfo` - Authenticated image information
    pub fn verify(
        &mut self,
        jitter: &mut JitterSource,
        header: &ImageHeader,
        payload: &[u8],
    ) -> VaultbootResult<ImageVerificationInfo> {
        jitter.jitter_default();
        if launder(header.marker) != IMAGE_MARKER {
            return Err(VaultbootError::IMAGE_VERIFIER_HEADER_MARKER_MISMATCH);
        }

        jitter.jitter_default();
        if header.image_size == 0
            || header.image_size > MAX_IMAGE_SIZE
            || payload.len() != header.image_size as usize
        {
            return Err(VaultbootError::IMAGE_VERIFIER_SIZE_INVALID);
        }

        let load_end = header
            .load_addr
            .checked_add(header.image_size)
            .ok_or(VaultbootError::IMAGE_VERIFIER_SIZE_INVALID)?;
        if header.entry_point < header.load_addr || header.entry_point >= load_end {
            return Err(VaultbootError::IMAGE_VERIFIER_ENTRY_POINT_INVALID);
        }

        self.verify_digest(jitter, header, payload)?;
        self.verify_signature(jitter, header)?;

        log::info!("[verify] image {} accepted", header.candidate_version());

        Ok(ImageVerificationInfo {
            version: header.candidate_version(),
            image_size: header.image_size,
            load_addr: header.load_addr,
            entry_point: header.entry_point,
            digest: header.digest,
        })
    }

    /// Compare the computed payload digest against the header, word by
    /// word through the layered verifier.
    fn verify_digest(
        &mut self,
        jitter: &mut JitterSource,
        header: &ImageHeader,
        payload: &[u8],
    ) -> VaultbootResult<()> {
        let digest = self.env.sha256_digest(payload)?;

        let actual = digest_words(&digest);
        let expected = digest_words(&header.digest);
        let outcome = LayeredVerifier::new(jitter).verify_words(&actual, &expected);
        if outcome != LayeredOutcome::AllValid {
            return Err(VaultbootError::IMAGE_VERIFIER_DIGEST_MISMATCH);
        }

        Ok(())
    }

    /// Check the header signature twice and cross-confirm both results.
    fn verify_signature(
        &mut self,
        jitter: &mut JitterSource,
        header: &ImageHeader,
    ) -> VaultbootResult<()> {
        let pub_key = self.env.vendor_pub_key();

        jitter.jitter_default();
        let first = self
            .env
            .signature_verify(header.tbs(), &pub_key, &header.signature)?;
        if !launder(first) {
            return Err(VaultbootError::IMAGE_VERIFIER_SIGNATURE_INVALID);
        }

        jitter.jitter_default();
        let second = self
            .env
            .signature_verify(header.tbs(), &pub_key, &header.signature)?;

        let facts = [sig_word(first), sig_word(second)];
        let outcome =
            LayeredVerifier::new(jitter).verify_words(&facts, &[SIG_CONFIRMED, SIG_CONFIRMED]);
        if outcome != LayeredOutcome::AllValid {
            return Err(VaultbootError::IMAGE_VERIFIER_SIGNATURE_INVALID);
        }

        Ok(())
    }
}

fn sig_word(passed: bool) -> u32 {
    if passed {
        SIG_CONFIRMED
    } else {
        0
    }
}

fn digest_words(digest: &[u8; 32]) -> [u32; 8] {
    let mut words = [0u32; 8];
    for (i, chunk) in digest.chunks_exact(4).enumerate() {
        words[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::FromZeroes;

    const PAYLOAD_DIGEST: [u8; 32] = [0xD1; 32];
    const VENDOR_KEY: [u8; 32] = [0x33; 32];

    struct TestEnv {
        digest: [u8; 32],
        verify_result: bool,
        vendor_pub_key: [u8; 32],
    }

    impl Default for TestEnv {
        fn default() -> Self {
            Self {
                digest: PAYLOAD_DIGEST,
                verify_result: true,
                vendor_pub_key: VENDOR_KEY,
            }
        }
    }

    impl ImageVerificationEnv for TestEnv {
        fn sha256_digest(&mut self, _data: &[u8]) -> VaultbootResult<[u8; 32]> {
            Ok(self.digest)
        }

        fn signature_verify(
            &mut self,
            _tbs: &[u8],
            _pub_key: &[u8; 32],
            _sig: &[u8; 64],
        ) -> VaultbootResult<bool> {
            Ok(self.verify_result)
        }

        fn vendor_pub_key(&self) -> [u8; 32] {
            self.vendor_pub_key
        }
    }

    fn test_header(payload_len: u32) -> ImageHeader {
        let mut header = ImageHeader::new_zeroed();
        header.marker = IMAGE_MARKER;
        header.version = 0x0100_0000;
        header.image_size = payload_len;
        header.load_addr = 0x0800_0000;
        header.entry_point = 0x0800_0400;
        header.digest = PAYLOAD_DIGEST;
        header
    }

    fn jitter() -> JitterSource {
        JitterSource::new([0x5Au8; 16])
    }

    #[test]
    fn test_header_marker_mismatch() {
        let mut header = test_header(1024);
        header.marker = 0x1234_5678;
        let payload = [0u8; 1024];
        let mut jitter = jitter();
        let result =
            FirmwareVerifier::new(TestEnv::default()).verify(&mut jitter, &header, &payload);
        assert_eq!(
            result.err(),
            Some(VaultbootError::IMAGE_VERIFIER_HEADER_MARKER_MISMATCH)
        );
    }

    #[test]
    fn test_zero_size_rejected() {
        let header = test_header(0);
        let mut jitter = jitter();
        let result = FirmwareVerifier::new(TestEnv::default()).verify(&mut jitter, &header, &[]);
        assert_eq!(result.err(), Some(VaultbootError::IMAGE_VERIFIER_SIZE_INVALID));
    }

    #[test]
    fn test_oversize_rejected() {
        let mut header = test_header(1024);
        header.image_size = MAX_IMAGE_SIZE + 1;
        let payload = [0u8; 1024];
        let mut jitter = jitter();
        let result =
            FirmwareVerifier::new(TestEnv::default()).verify(&mut jitter, &header, &payload);
        assert_eq!(result.err(), Some(VaultbootError::IMAGE_VERIFIER_SIZE_INVALID));
    }

    #[test]
    fn test_payload_length_mismatch_rejected() {
        let header = test_header(1024);
        let payload = [0u8; 512];
        let mut jitter = jitter();
        let result =
            FirmwareVerifier::new(TestEnv::default()).verify(&mut jitter, &header, &payload);
        assert_eq!(result.err(), Some(VaultbootError::IMAGE_VERIFIER_SIZE_INVALID));
    }

    #[test]
    fn test_entry_point_outside_load_region() {
        let mut header = test_header(1024);
        header.entry_point = header.load_addr + header.image_size;
        let payload = [0u8; 1024];
        let mut jitter = jitter();
        let result =
            FirmwareVerifier::new(TestEnv::default()).verify(&mut jitter, &header, &payload);
        assert_eq!(
            result.err(),
            Some(VaultbootError::IMAGE_VERIFIER_ENTRY_POINT_INVALID)
        );
    }

    #[test]
    fn test_digest_mismatch_rejected() {
        let header = test_header(1024);
        let payload = [0u8; 1024];
        let env = TestEnv {
            digest: [0xEE; 32],
            ..TestEnv::default()
        };
        let mut jitter = jitter();
        let result = FirmwareVerifier::new(env).verify(&mut jitter, &header, &payload);
        assert_eq!(
            result.err(),
            Some(VaultbootError::IMAGE_VERIFIER_DIGEST_MISMATCH)
        );
    }

    #[test]
    fn test_signature_failure_rejected() {
        let header = test_header(1024);
        let payload = [0u8; 1024];
        let env = TestEnv {
            verify_result: false,
            ..TestEnv::default()
        };
        let mut jitter = jitter();
        let result = FirmwareVerifier::new(env).verify(&mut jitter, &header, &payload);
        assert_eq!(
            result.err(),
            Some(VaultbootError::IMAGE_VERIFIER_SIGNATURE_INVALID)
        );
    }

    #[test]
    fn test_valid_image_yields_info() {
        let header = test_header(1024);
        let payload = [0u8; 1024];
        let mut jitter = jitter();
        let info = FirmwareVerifier::new(TestEnv::default())
            .verify(&mut jitter, &header, &payload)
            .unwrap();

        assert_eq!(info.version, header.candidate_version());
        assert_eq!(info.image_size, 1024);
        assert_eq!(info.load_addr, 0x0800_0000);
        assert_eq!(info.entry_point, 0x0800_0400);
        assert_eq!(info.digest, PAYLOAD_DIGEST);
    }

    #[test]
    fn test_header_tbs_excludes_signature() {
        let header = test_header(1024);
        assert_eq!(header.tbs().len(), crate::IMAGE_HEADER_TBS_LEN);
        assert_eq!(ImageHeader::LEN, crate::IMAGE_HEADER_TBS_LEN + 64);
    }
}
