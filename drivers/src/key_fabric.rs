/*++

Licensed under the Apache-2.0 license.

File Name:

    key_fabric.rs

Abstract:

    File contains API for hardware-bound key derivation and authenticated
    key wrapping on top of the PUF-reconstructed device secret.

--*/

use crate::kdf::hmac_kdf;
use crate::puf::DeviceSecret;
use crate::soc::EntropySource;
use crate::trng::Trng;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key};
use vaultboot_error::{VaultbootError, VaultbootResult};
use zeroize::Zeroize;

/// Derived key length in bytes.
pub const KEY_SIZE: usize = 32;

/// Largest plaintext a wrapped key can carry.
pub const WRAP_CAPACITY: usize = 48;

/// Wrap nonce length (AES-256-GCM).
pub const WRAP_NONCE_SIZE: usize = 12;

/// Wrap authentication tag length.
pub const WRAP_TAG_SIZE: usize = 16;

/// Label of the internal key-encryption key. Never handed out.
const WRAPPING_LABEL: &[u8] = b"wrapping_key";

/// Shared derivation context binding keys to this engine.
const FABRIC_CONTEXT: &[u8] = b"vaultboot key fabric v1";

/// Purpose tag of a derived key. Keys with different purposes are
/// computationally independent even though they share one base secret.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Encryption = 0x01,
    Signing = 0x02,
    Attestation = 0x03,
    Storage = 0x04,
}

impl KeyType {
    pub const ALL: [KeyType; 4] = [
        KeyType::Encryption,
        KeyType::Signing,
        KeyType::Attestation,
        KeyType::Storage,
    ];

    /// Domain separation label of the derivation.
    pub fn label(self) -> &'static [u8] {
        match self {
            KeyType::Encryption => b"encryption_key",
            KeyType::Signing => b"signing_key",
            KeyType::Attestation => b"attestation_key",
            KeyType::Storage => b"storage_key",
        }
    }

    pub fn from_word(word: u32) -> Option<Self> {
        match word {
            0x01 => Some(KeyType::Encryption),
            0x02 => Some(KeyType::Signing),
            0x03 => Some(KeyType::Attestation),
            0x04 => Some(KeyType::Storage),
            _ => None,
        }
    }

    fn cache_index(self) -> usize {
        self as u32 as usize - 1
    }
}

/// A purpose-bound key derived from the device secret. Zeroized on drop.
#[derive(Zeroize, zeroize::ZeroizeOnDrop)]
pub struct DerivedKey {
    #[zeroize(skip)]
    kind: KeyType,
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_raw(kind: KeyType, bytes: [u8; KEY_SIZE]) -> Self {
        Self { kind, bytes }
    }

    pub fn kind(&self) -> KeyType {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl core::fmt::Debug for DerivedKey {
    /// Redacted: derived keys never reach a log or error path.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "DerivedKey({:?})", self.kind)
    }
}

/// An authenticated, encrypted key blob.
#[derive(Debug, Clone)]
pub struct WrappedKey {
    pub ciphertext: [u8; WRAP_CAPACITY],
    pub len: usize,
    pub nonce: [u8; WRAP_NONCE_SIZE],
    pub tag: [u8; WRAP_TAG_SIZE],
    pub key_type: KeyType,
    pub version: u32,
}

/// Plaintext released by a successful unwrap. Zeroized on drop.
#[derive(Zeroize, zeroize::ZeroizeOnDrop)]
pub struct UnwrappedKey {
    bytes: [u8; WRAP_CAPACITY],
    len: usize,
}

impl UnwrappedKey {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Key derivation and wrapping engine.
pub enum KeyFabric {}

impl KeyFabric {
    /// Derive a purpose-bound key from the device secret.
    pub fn derive(secret: &DeviceSecret, kind: KeyType) -> VaultbootResult<DerivedKey> {
        let mut bytes = [0u8; KEY_SIZE];
        if let Err(err) = hmac_kdf(
            secret.as_bytes(),
            kind.label(),
            Some(FABRIC_CONTEXT),
            &mut bytes,
        ) {
            bytes.zeroize();
            return Err(err);
        }
        Ok(DerivedKey { kind, bytes })
    }

    /// Authenticate-and-encrypt `plaintext` under a freshly derived
    /// wrapping key. The wrapping key is zeroized before returning on
    /// every path.
    pub fn wrap(
        secret: &DeviceSecret,
        trng: &mut Trng,
        entropy: &mut impl EntropySource,
        plaintext: &[u8],
        key_type: KeyType,
        version: u32,
    ) -> VaultbootResult<WrappedKey> {
        if plaintext.len() > WRAP_CAPACITY {
            return Err(VaultbootError::DRIVER_KEY_FABRIC_PLAINTEXT_TOO_LARGE);
        }

        let mut wrapping = [0u8; KEY_SIZE];
        if let Err(err) = hmac_kdf(
            secret.as_bytes(),
            WRAPPING_LABEL,
            Some(FABRIC_CONTEXT),
            &mut wrapping,
        ) {
            wrapping.zeroize();
            return Err(err);
        }

        let nonce: [u8; WRAP_NONCE_SIZE] = match trng.generate_array(entropy) {
            Ok(nonce) => nonce,
            Err(err) => {
                wrapping.zeroize();
                return Err(err);
            }
        };

        let mut buffer = [0u8; WRAP_CAPACITY];
        let len = plaintext.len();
        buffer[..len].copy_from_slice(plaintext);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&wrapping));
        let aad = wrap_aad(key_type, version);
        let result = cipher.encrypt_in_place_detached((&nonce).into(), &aad, &mut buffer[..len]);
        wrapping.zeroize();

        match result {
            Ok(tag) => Ok(WrappedKey {
                ciphertext: buffer,
                len,
                nonce,
                tag: tag.into(),
                key_type,
                version,
            }),
            Err(_) => {
                buffer.zeroize();
                Err(VaultbootError::DRIVER_KEY_FABRIC_WRAP_FAILURE)
            }
        }
    }

    /// Verify and decrypt a wrapped key.
    ///
    /// Tag verification is constant time. On failure no plaintext escapes:
    /// the working buffer is zeroized before the error returns.
    pub fn unwrap(secret: &DeviceSecret, wrapped: &WrappedKey) -> VaultbootResult<UnwrappedKey> {
        if wrapped.len > WRAP_CAPACITY {
            return Err(VaultbootError::DRIVER_KEY_FABRIC_UNWRAP_AUTH_FAILURE);
        }

        let mut wrapping = [0u8; KEY_SIZE];
        if let Err(err) = hmac_kdf(
            secret.as_bytes(),
            WRAPPING_LABEL,
            Some(FABRIC_CONTEXT),
            &mut wrapping,
        ) {
            wrapping.zeroize();
            return Err(err);
        }

        let mut buffer = wrapped.ciphertext;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&wrapping));
        let aad = wrap_aad(wrapped.key_type, wrapped.version);
        let result = cipher.decrypt_in_place_detached(
            (&wrapped.nonce).into(),
            &aad,
            &mut buffer[..wrapped.len],
            (&wrapped.tag).into(),
        );
        wrapping.zeroize();

        match result {
            Ok(()) => Ok(UnwrappedKey {
                bytes: buffer,
                len: wrapped.len,
            }),
            Err(_) => {
                buffer.zeroize();
                Err(VaultbootError::DRIVER_KEY_FABRIC_UNWRAP_AUTH_FAILURE)
            }
        }
    }
}

/// Associated data binding a wrapped blob to its type and version.
fn wrap_aad(key_type: KeyType, version: u32) -> [u8; 8] {
    let mut aad = [0u8; 8];
    aad[..4].copy_from_slice(&(key_type as u32).to_le_bytes());
    aad[4..].copy_from_slice(&version.to_le_bytes());
    aad
}

/// Working-memory home of derived key material during boot.
///
/// The tamper response erases this cache; individual keys also zeroize on
/// drop.
pub struct KeyCache {
    slots: [Option<DerivedKey>; 4],
}

impl KeyCache {
    pub fn new() -> Self {
        Self {
            slots: [None, None, None, None],
        }
    }

    pub fn store(&mut self, key: DerivedKey) {
        let index = key.kind().cache_index();
        self.slots[index] = Some(key);
    }

    pub fn get(&self, kind: KeyType) -> Option<&DerivedKey> {
        self.slots[kind.cache_index()].as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Zeroize and drop every cached key.
    pub fn erase_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(key) = slot.as_mut() {
                key.zeroize();
            }
            *slot = None;
        }
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puf::DeviceSecret;

    struct TestEntropy(u8);

    impl EntropySource for TestEntropy {
        fn try_fill(&mut self, dest: &mut [u8]) -> bool {
            for b in dest.iter_mut() {
                self.0 = self.0.wrapping_mul(197).wrapping_add(3);
                *b = self.0;
            }
            true
        }
    }

    fn secret() -> DeviceSecret {
        DeviceSecret::from_bytes([0x42; 32])
    }

    #[test]
    fn test_derive_is_deterministic_per_type() {
        let secret = secret();
        for kind in KeyType::ALL {
            let a = KeyFabric::derive(&secret, kind).unwrap();
            let b = KeyFabric::derive(&secret, kind).unwrap();
            assert_eq!(a.as_bytes(), b.as_bytes());
        }
    }

    #[test]
    fn test_derived_keys_are_independent() {
        let secret = secret();
        let keys: Vec<[u8; 32]> = KeyType::ALL
            .iter()
            .map(|&kind| *KeyFabric::derive(&secret, kind).unwrap().as_bytes())
            .collect();
        for i in 0..keys.len() {
            for j in i + 1..keys.len() {
                assert_ne!(keys[i], keys[j]);
            }
        }
    }

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let secret = secret();
        let mut trng = Trng::new();
        let mut entropy = TestEntropy(0x55);

        for (i, kind) in KeyType::ALL.into_iter().enumerate() {
            let plaintext = [i as u8 + 1; 32];
            let wrapped =
                KeyFabric::wrap(&secret, &mut trng, &mut entropy, &plaintext, kind, 1).unwrap();
            let unwrapped = KeyFabric::unwrap(&secret, &wrapped).unwrap();
            assert_eq!(unwrapped.as_slice(), &plaintext);
        }
    }

    #[test]
    fn test_ciphertext_differs_from_plaintext() {
        let secret = secret();
        let mut trng = Trng::new();
        let mut entropy = TestEntropy(0x55);
        let plaintext = [0xAA; 32];
        let wrapped = KeyFabric::wrap(
            &secret,
            &mut trng,
            &mut entropy,
            &plaintext,
            KeyType::Storage,
            1,
        )
        .unwrap();
        assert_ne!(&wrapped.ciphertext[..32], &plaintext);
    }

    #[test]
    fn test_flipped_ciphertext_bit_fails_auth() {
        let secret = secret();
        let mut trng = Trng::new();
        let mut entropy = TestEntropy(0x55);
        let wrapped = KeyFabric::wrap(
            &secret,
            &mut trng,
            &mut entropy,
            &[0x5A; 32],
            KeyType::Encryption,
            1,
        )
        .unwrap();

        for bit in [0usize, 9, 100, 255] {
            let mut corrupt = wrapped.clone();
            corrupt.ciphertext[bit / 8] ^= 1 << (bit % 8);
            assert_eq!(
                KeyFabric::unwrap(&secret, &corrupt).err(),
                Some(VaultbootError::DRIVER_KEY_FABRIC_UNWRAP_AUTH_FAILURE)
            );
        }
    }

    #[test]
    fn test_flipped_tag_bit_fails_auth() {
        let secret = secret();
        let mut trng = Trng::new();
        let mut entropy = TestEntropy(0x55);
        let wrapped = KeyFabric::wrap(
            &secret,
            &mut trng,
            &mut entropy,
            &[0x5A; 32],
            KeyType::Encryption,
            1,
        )
        .unwrap();

        for bit in 0..WRAP_TAG_SIZE * 8 {
            let mut corrupt = wrapped.clone();
            corrupt.tag[bit / 8] ^= 1 << (bit % 8);
            assert!(KeyFabric::unwrap(&secret, &corrupt).is_err());
        }
    }

    #[test]
    fn test_mismatched_type_tag_fails_auth() {
        let secret = secret();
        let mut trng = Trng::new();
        let mut entropy = TestEntropy(0x55);
        let mut wrapped = KeyFabric::wrap(
            &secret,
            &mut trng,
            &mut entropy,
            &[0x5A; 32],
            KeyType::Encryption,
            1,
        )
        .unwrap();

        wrapped.key_type = KeyType::Signing;
        assert!(KeyFabric::unwrap(&secret, &wrapped).is_err());
    }

    #[test]
    fn test_oversized_plaintext_rejected() {
        let secret = secret();
        let mut trng = Trng::new();
        let mut entropy = TestEntropy(0x55);
        let result = KeyFabric::wrap(
            &secret,
            &mut trng,
            &mut entropy,
            &[0u8; WRAP_CAPACITY + 1],
            KeyType::Storage,
            1,
        );
        assert_eq!(
            result.err(),
            Some(VaultbootError::DRIVER_KEY_FABRIC_PLAINTEXT_TOO_LARGE)
        );
    }

    #[test]
    fn test_key_cache_store_get_erase() {
        let secret = secret();
        let mut cache = KeyCache::new();
        assert!(cache.is_empty());

        cache.store(KeyFabric::derive(&secret, KeyType::Attestation).unwrap());
        assert!(cache.get(KeyType::Attestation).is_some());
        assert!(cache.get(KeyType::Signing).is_none());
        assert!(!cache.is_empty());

        cache.erase_all();
        assert!(cache.is_empty());
        assert!(cache.get(KeyType::Attestation).is_none());
    }
}
