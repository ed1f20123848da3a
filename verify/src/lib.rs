/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Firmware image verification library.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

mod verifier;

use vaultboot_drivers::Version;
use vaultboot_error::VaultbootResult;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

pub use verifier::FirmwareVerifier;

/// Marker every firmware header must carry.
pub const IMAGE_MARKER: u32 = 0x464D_5750;

/// Largest acceptable image payload in bytes.
pub const MAX_IMAGE_SIZE: u32 = 0x0010_0000;

/// Length of the signed prefix of the header (everything before the
/// signature field).
pub const IMAGE_HEADER_TBS_LEN: usize = 56;

/// Firmware image header.
///
/// The signature covers the header prefix, which binds the version, the
/// load layout and the payload digest.
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Clone, Copy, Debug)]
pub struct ImageHeader {
    pub marker: u32,

    /// Packed candidate version (`major << 24 | minor << 16 | patch`).
    pub version: u32,

    pub image_size: u32,

    pub load_addr: u32,

    pub entry_point: u32,

    pub reserved: u32,

    /// SHA-256 digest of the payload.
    pub digest: [u8; 32],

    /// Ed25519 signature over the header prefix.
    pub signature: [u8; 64],
}

impl ImageHeader {
    /// Size of the header on the wire.
    pub const LEN: usize = core::mem::size_of::<Self>();

    /// The signed prefix of the header.
    pub fn tbs(&self) -> &[u8] {
        &self.as_bytes()[..IMAGE_HEADER_TBS_LEN]
    }

    /// Candidate version carried by the header.
    pub fn candidate_version(&self) -> Version {
        Version::from_word(self.version)
    }
}

/// Verified image information
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageVerificationInfo {
    /// Authenticated candidate version.
    pub version: Version,

    /// Payload size in bytes.
    pub image_size: u32,

    /// Load address
    pub load_addr: u32,

    /// Entry Point
    pub entry_point: u32,

    /// Digest of the payload.
    pub digest: [u8; 32],
}

/// Image Verification Environment
pub trait ImageVerificationEnv {
    /// Calculate SHA-256 digest over `data`.
    fn sha256_digest(&mut self, data: &[u8]) -> VaultbootResult<[u8; 32]>;

    /// Verify an Ed25519 signature over `tbs`.
    fn signature_verify(
        &mut self,
        tbs: &[u8],
        pub_key: &[u8; 32],
        sig: &[u8; 64],
    ) -> VaultbootResult<bool>;

    /// Vendor public key provisioned in fuses.
    fn vendor_pub_key(&self) -> [u8; 32];
}
