/*++

Licensed under the Apache-2.0 license.

File Name:

    puf.rs

Abstract:

    File contains API for reconstructing the device secret from the
    physically unclonable fingerprint using a code-offset fuzzy extractor.

--*/

use crate::otp_layout::{PUF_ENROLLED_MAGIC, PUF_ENROLLED_SLOT, PUF_HELPER_BASE_SLOT};
use crate::soc::{EntropySource, FingerprintSource, OtpStore, FINGERPRINT_SIZE};
use crate::trng::Trng;
use sha2::{Digest, Sha256};
use vaultboot_error::{VaultbootError, VaultbootResult};
use zeroize::Zeroize;

/// Repetition factor of the error-correcting code. Each seed bit is spread
/// over this many fingerprint bits; up to one flipped bit per group is
/// corrected, a split group fails closed.
const REPETITION: usize = 4;

/// Extractor seed length: one seed bit per repetition group.
const SEED_SIZE: usize = FINGERPRINT_SIZE / REPETITION;

/// Domain separation label of the secret extraction step.
const EXTRACT_LABEL: &[u8] = b"vaultboot puf extract v1";

/// The PUF-reconstructed base secret.
///
/// Never persisted; exists transiently in working memory and is zeroized
/// on drop.
#[derive(Zeroize, zeroize::ZeroizeOnDrop)]
pub struct DeviceSecret {
    bytes: [u8; 32],
}

impl DeviceSecret {
    pub(crate) fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl core::fmt::Debug for DeviceSecret {
    /// Redacted: the secret never reaches a log or error path.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("DeviceSecret(..)")
    }
}

/// Physically-unclonable secret reconstruction.
pub enum Puf {}

impl Puf {
    /// True once helper data has been enrolled.
    pub fn is_enrolled(soc: &impl OtpStore) -> bool {
        soc.read_word(PUF_ENROLLED_SLOT) == Some(PUF_ENROLLED_MAGIC)
    }

    /// First-boot enrollment.
    ///
    /// Derives helper data from a fresh fingerprint reading and a random
    /// extractor seed, and persists only the helper data. The seed and the
    /// fingerprint are zeroized before returning on every path.
    pub fn enroll<E: FingerprintSource + OtpStore + EntropySource>(
        trng: &mut Trng,
        env: &mut E,
    ) -> VaultbootResult<()> {
        if Self::is_enrolled(env) {
            return Err(VaultbootError::DRIVER_PUF_ALREADY_ENROLLED);
        }

        let mut seed: [u8; SEED_SIZE] = trng.generate_array(env)?;
        let mut codeword = [0u8; FINGERPRINT_SIZE];
        encode_repetition(&seed, &mut codeword);

        let mut fingerprint = [0u8; FINGERPRINT_SIZE];
        env.read_raw_fingerprint(&mut fingerprint);

        let mut helper = [0u8; FINGERPRINT_SIZE];
        for i in 0..FINGERPRINT_SIZE {
            helper[i] = codeword[i] ^ fingerprint[i];
        }

        seed.zeroize();
        codeword.zeroize();
        fingerprint.zeroize();

        for (i, chunk) in helper.chunks_exact(4).enumerate() {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if !env.write_once(PUF_HELPER_BASE_SLOT + i, word) {
                return Err(VaultbootError::DRIVER_PUF_STORE_WRITE);
            }
        }
        if !env.write_once(PUF_ENROLLED_SLOT, PUF_ENROLLED_MAGIC) {
            return Err(VaultbootError::DRIVER_PUF_STORE_WRITE);
        }

        log::info!("[puf] enrollment complete");
        Ok(())
    }

    /// Regenerate the device secret from a fresh fingerprint reading and
    /// the persisted helper data.
    ///
    /// Deterministic across boots on the same physical device; fails
    /// closed with no output when error correction cannot converge.
    pub fn reconstruct<E: FingerprintSource + OtpStore>(
        env: &mut E,
    ) -> VaultbootResult<DeviceSecret> {
        if !Self::is_enrolled(env) {
            return Err(VaultbootError::DRIVER_PUF_NOT_ENROLLED);
        }

        let mut helper = [0u8; FINGERPRINT_SIZE];
        for i in 0..FINGERPRINT_SIZE / 4 {
            let word = env
                .read_word(PUF_HELPER_BASE_SLOT + i)
                .ok_or(VaultbootError::DRIVER_PUF_HELPER_DATA_CORRUPT)?;
            helper[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }

        let mut fingerprint = [0u8; FINGERPRINT_SIZE];
        env.read_raw_fingerprint(&mut fingerprint);

        let mut codeword = [0u8; FINGERPRINT_SIZE];
        for i in 0..FINGERPRINT_SIZE {
            codeword[i] = helper[i] ^ fingerprint[i];
        }
        fingerprint.zeroize();

        let mut seed = [0u8; SEED_SIZE];
        let decoded = decode_repetition(&codeword, &mut seed);
        codeword.zeroize();
        if !decoded {
            seed.zeroize();
            return Err(VaultbootError::DRIVER_PUF_DECODE_FAILURE);
        }

        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(EXTRACT_LABEL);
        let secret = DeviceSecret {
            bytes: hasher.finalize().into(),
        };
        seed.zeroize();

        Ok(secret)
    }
}

fn bit(buf: &[u8], index: usize) -> u8 {
    (buf[index / 8] >> (index % 8)) & 1
}

fn set_bit(buf: &mut [u8], index: usize) {
    buf[index / 8] |= 1 << (index % 8);
}

/// Spread each seed bit over `REPETITION` consecutive codeword bits.
fn encode_repetition(seed: &[u8; SEED_SIZE], codeword: &mut [u8; FINGERPRINT_SIZE]) {
    for i in 0..SEED_SIZE * 8 {
        if bit(seed, i) == 1 {
            for r in 0..REPETITION {
                set_bit(codeword, i * REPETITION + r);
            }
        }
    }
}

/// Majority-decode each repetition group. Returns false on a split vote.
fn decode_repetition(codeword: &[u8; FINGERPRINT_SIZE], seed: &mut [u8; SEED_SIZE]) -> bool {
    for i in 0..SEED_SIZE * 8 {
        let mut ones = 0usize;
        for r in 0..REPETITION {
            ones += bit(codeword, i * REPETITION + r) as usize;
        }
        if ones * 2 == REPETITION {
            return false;
        }
        if ones * 2 > REPETITION {
            set_bit(seed, i);
        }
    }
    true
}
