/*++

Licensed under the Apache-2.0 license.

File Name:

    kdf.rs

Abstract:

    A KDF implementation that is compliant with SP 800-108 (counter mode,
    HMAC-SHA-256 PRF).

--*/

use hmac::{Hmac, Mac};
use sha2::Sha256;
use vaultboot_error::{VaultbootError, VaultbootResult};
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// Calculate HMAC-SHA-256-KDF
///
/// # Arguments
///
/// * `key` - KDF key
/// * `label` - Label for the KDF. If `context` is omitted, this is considered
///             the fixed input data.
/// * `context` - Context for KDF. If present, a NULL byte is included between
///               the label and context.
/// * `output` - Location to store the output
pub fn hmac_kdf(
    key: &[u8],
    label: &[u8],
    context: Option<&[u8]>,
    output: &mut [u8],
) -> VaultbootResult<()> {
    let mut offset = 0usize;
    let mut counter: u32 = 1;

    while offset < output.len() {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|_| VaultbootError::DRIVER_KEY_FABRIC_KDF_FAILURE)?;

        mac.update(&counter.to_be_bytes());
        mac.update(label);
        if let Some(context) = context {
            mac.update(&[0x00]);
            mac.update(context);
        }

        let mut block: [u8; 32] = mac.finalize().into_bytes().into();
        let take = (output.len() - offset).min(block.len());
        output[offset..offset + take].copy_from_slice(&block[..take]);
        block.zeroize();

        offset += take;
        counter += 1;
    }

    Ok(())
}
