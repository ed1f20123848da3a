/*++

Licensed under the Apache-2.0 license.

File Name:

    report.rs

Abstract:

    File contains the attestation report, its canonical binary encoding,
    the structured text export and the report signature operations.

--*/

use crate::key_fabric::DerivedKey;
use crate::rollback::Version;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use vaultboot_error::{VaultbootError, VaultbootResult};

/// Report format version.
pub const REPORT_FORMAT_VERSION: u32 = 1;

/// Freshness nonce length.
pub const NONCE_SIZE: usize = 16;

/// Report signature length (Ed25519).
pub const SIGNATURE_SIZE: usize = 64;

/// Measurement log capacity.
pub const MAX_MEASUREMENTS: usize = 16;

/// Event log capacity.
pub const MAX_EVENTS: usize = 32;

/// Event note capacity in bytes.
pub const NOTE_CAPACITY: usize = 64;

/// Upper bound of the binary encoding, including the signature field.
pub const MAX_WIRE_SIZE: usize = 4096;

/// Magic word leading the binary encoding.
const WIRE_MAGIC: u32 = 0x5642_4154;

mod tag {
    pub const VERSION: u8 = 1;
    pub const NONCE: u8 = 2;
    pub const BOOT_COUNT: u8 = 3;
    pub const FIRMWARE_VERSION: u8 = 4;
    pub const SECURITY_STATUS: u8 = 5;
    pub const TAMPER_EVENTS: u8 = 6;
    pub const UPTIME: u8 = 7;
    pub const MEASUREMENT: u8 = 8;
    pub const EVENT: u8 = 9;
    pub const SIGNATURE: u8 = 10;
}

bitflags::bitflags! {
    /// Security posture flags carried by the report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SecurityStatus: u32 {
        const ROOT_OF_TRUST_VERIFIED = 0x01;
        const ISOLATION_ACTIVE       = 0x02;
        const DEBUG_LOCKED           = 0x04;
        const ANTI_ROLLBACK_ENFORCED = 0x08;
        const PUF_ENROLLED           = 0x10;
        const TAMPER_MONITORING      = 0x20;
        const LEDGER_LOCKED          = 0x40;
    }
}

/// A single boot-stage measurement.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Stage identifier.
    pub stage: u32,

    /// SHA-256 digest of the measured data.
    pub digest: [u8; 32],
}

/// Bounded free-text note of an event log entry.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EventNote {
    bytes: [u8; NOTE_CAPACITY],
    len: u8,
}

impl EventNote {
    pub fn new(text: &str) -> VaultbootResult<Self> {
        if text.len() > NOTE_CAPACITY {
            return Err(VaultbootError::DRIVER_ATTESTATION_NOTE_TOO_LONG);
        }
        let mut bytes = [0u8; NOTE_CAPACITY];
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        Ok(Self {
            bytes,
            len: text.len() as u8,
        })
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl Default for EventNote {
    fn default() -> Self {
        Self {
            bytes: [0u8; NOTE_CAPACITY],
            len: 0,
        }
    }
}

impl core::fmt::Debug for EventNote {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// A single event log entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventLogEntry {
    pub kind: u32,
    pub data: u32,
    pub timestamp: u64,
    pub note: EventNote,
}

/// Signed, serializable record of what booted and under what conditions.
///
/// Created once per boot attempt that reaches the attestation stage,
/// signed exactly once, exported any number of times in either format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationReport {
    pub version: u32,
    pub nonce: [u8; NONCE_SIZE],
    pub boot_count: u32,
    pub firmware_version: Version,
    pub security_status: SecurityStatus,
    /// Cumulative tamper event count at generation time.
    pub tamper_events: u32,
    pub uptime: u64,
    pub(crate) measurements: [Measurement; MAX_MEASUREMENTS],
    pub(crate) measurement_count: usize,
    pub(crate) events: [EventLogEntry; MAX_EVENTS],
    pub(crate) event_count: usize,
    pub(crate) signature: [u8; SIGNATURE_SIZE],
    pub(crate) signed: bool,
}

impl AttestationReport {
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements[..self.measurement_count]
    }

    pub fn events(&self) -> &[EventLogEntry] {
        &self.events[..self.event_count]
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn signature(&self) -> Option<&[u8; SIGNATURE_SIZE]> {
        self.signed.then_some(&self.signature)
    }

    /// Sign the report. One-way and single-use per report instance.
    ///
    /// The signature covers the canonical binary encoding of every field
    /// except the signature itself.
    pub fn sign(&mut self, key: &DerivedKey) -> VaultbootResult<()> {
        if self.signed {
            return Err(VaultbootError::DRIVER_ATTESTATION_ALREADY_SIGNED);
        }

        let mut tbs = [0u8; MAX_WIRE_SIZE];
        let len = self.encode_tbs(&mut tbs)?;

        let signing_key = SigningKey::from_bytes(key.as_bytes());
        self.signature = signing_key.sign(&tbs[..len]).to_bytes();
        self.signed = true;
        Ok(())
    }

    /// Check the report signature against an attestation verifying key.
    pub fn verify(&self, verifying_key: &[u8; 32]) -> VaultbootResult<()> {
        if !self.signed {
            return Err(VaultbootError::DRIVER_ATTESTATION_NOT_SIGNED);
        }

        let key = VerifyingKey::from_bytes(verifying_key)
            .map_err(|_| VaultbootError::DRIVER_ATTESTATION_BAD_KEY)?;

        let mut tbs = [0u8; MAX_WIRE_SIZE];
        let len = self.encode_tbs(&mut tbs)?;

        key.verify(&tbs[..len], &Signature::from_bytes(&self.signature))
            .map_err(|_| VaultbootError::DRIVER_ATTESTATION_SIGNATURE_INVALID)
    }

    /// Canonical to-be-signed encoding: every field except the signature.
    fn encode_tbs(&self, out: &mut [u8]) -> VaultbootResult<usize> {
        let mut w = Writer::new(out);
        w.bytes(&WIRE_MAGIC.to_le_bytes())?;
        w.field_u32(tag::VERSION, self.version)?;
        w.field_bytes(tag::NONCE, &self.nonce)?;
        w.field_u32(tag::BOOT_COUNT, self.boot_count)?;
        w.field_u32(tag::FIRMWARE_VERSION, self.firmware_version.to_word())?;
        w.field_u32(tag::SECURITY_STATUS, self.security_status.bits())?;
        w.field_u32(tag::TAMPER_EVENTS, self.tamper_events)?;
        w.field_u64(tag::UPTIME, self.uptime)?;

        for m in self.measurements() {
            let mut entry = [0u8; 36];
            entry[..4].copy_from_slice(&m.stage.to_le_bytes());
            entry[4..].copy_from_slice(&m.digest);
            w.field_bytes(tag::MEASUREMENT, &entry)?;
        }

        for e in self.events() {
            let note = e.note.as_str().as_bytes();
            let mut entry = [0u8; 18 + NOTE_CAPACITY];
            entry[..4].copy_from_slice(&e.kind.to_le_bytes());
            entry[4..8].copy_from_slice(&e.data.to_le_bytes());
            entry[8..16].copy_from_slice(&e.timestamp.to_le_bytes());
            entry[16..18].copy_from_slice(&(note.len() as u16).to_le_bytes());
            entry[18..18 + note.len()].copy_from_slice(note);
            w.field_bytes(tag::EVENT, &entry[..18 + note.len()])?;
        }

        Ok(w.len())
    }

    /// Compact binary export: the canonical encoding plus the signature.
    pub fn export_binary(&self, out: &mut [u8]) -> VaultbootResult<usize> {
        if !self.signed {
            return Err(VaultbootError::DRIVER_ATTESTATION_NOT_SIGNED);
        }
        let tbs_len = self.encode_tbs(out)?;
        let mut w = Writer::offset(out, tbs_len);
        w.field_bytes(tag::SIGNATURE, &self.signature)?;
        Ok(w.len())
    }

    /// Decode a compact binary export.
    ///
    /// The encoding is canonical; any reordered, duplicated or trailing
    /// field is malformed, not ignored.
    pub fn decode_binary(bytes: &[u8]) -> VaultbootResult<Self> {
        let mut r = Reader::new(bytes);

        if r.u32()? != WIRE_MAGIC {
            return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
        }

        let version = r.field_u32(tag::VERSION)?;
        let nonce_bytes = r.field(tag::NONCE)?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);

        let boot_count = r.field_u32(tag::BOOT_COUNT)?;
        let firmware_version = Version::from_word(r.field_u32(tag::FIRMWARE_VERSION)?);
        let security_status = SecurityStatus::from_bits_retain(r.field_u32(tag::SECURITY_STATUS)?);
        let tamper_events = r.field_u32(tag::TAMPER_EVENTS)?;
        let uptime = r.field_u64(tag::UPTIME)?;

        let mut measurements = [Measurement::default(); MAX_MEASUREMENTS];
        let mut measurement_count = 0usize;
        while r.peek_tag()? == tag::MEASUREMENT {
            let entry = r.field(tag::MEASUREMENT)?;
            if entry.len() != 36 || measurement_count == MAX_MEASUREMENTS {
                return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
            }
            let mut digest = [0u8; 32];
            digest.copy_from_slice(&entry[4..]);
            measurements[measurement_count] = Measurement {
                stage: u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]),
                digest,
            };
            measurement_count += 1;
        }

        let mut events = [EventLogEntry::default(); MAX_EVENTS];
        let mut event_count = 0usize;
        while r.peek_tag()? == tag::EVENT {
            let entry = r.field(tag::EVENT)?;
            if entry.len() < 18 || event_count == MAX_EVENTS {
                return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
            }
            let note_len = u16::from_le_bytes([entry[16], entry[17]]) as usize;
            if entry.len() != 18 + note_len || note_len > NOTE_CAPACITY {
                return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
            }
            let note_str = core::str::from_utf8(&entry[18..])
                .map_err(|_| VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED)?;
            events[event_count] = EventLogEntry {
                kind: u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]),
                data: u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]),
                timestamp: u64::from_le_bytes([
                    entry[8], entry[9], entry[10], entry[11], entry[12], entry[13], entry[14],
                    entry[15],
                ]),
                note: EventNote::new(note_str)?,
            };
            event_count += 1;
        }

        let signature_bytes = r.field(tag::SIGNATURE)?;
        if signature_bytes.len() != SIGNATURE_SIZE || !r.is_empty() {
            return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
        }
        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(signature_bytes);

        Ok(Self {
            version,
            nonce,
            boot_count,
            firmware_version,
            security_status,
            tamper_events,
            uptime,
            measurements,
            measurement_count,
            events,
            event_count,
            signature,
            signed: true,
        })
    }
}

/// Verifying key matching the key the report was signed with.
pub fn attestation_verifying_key(key: &DerivedKey) -> [u8; 32] {
    let signing_key = SigningKey::from_bytes(key.as_bytes());
    VerifyingKey::from(&signing_key).to_bytes()
}

/// Bounds-checked TLV writer.
struct Writer<'a> {
    out: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(out: &'a mut [u8]) -> Self {
        Self { out, pos: 0 }
    }

    fn offset(out: &'a mut [u8], pos: usize) -> Self {
        Self { out, pos }
    }

    fn len(&self) -> usize {
        self.pos
    }

    fn bytes(&mut self, data: &[u8]) -> VaultbootResult<()> {
        if self.pos + data.len() > self.out.len() {
            return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_BUFFER_TOO_SMALL);
        }
        self.out[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        Ok(())
    }

    fn field_bytes(&mut self, tag: u8, payload: &[u8]) -> VaultbootResult<()> {
        self.bytes(&[tag])?;
        self.bytes(&(payload.len() as u16).to_le_bytes())?;
        self.bytes(payload)
    }

    fn field_u32(&mut self, tag: u8, value: u32) -> VaultbootResult<()> {
        self.field_bytes(tag, &value.to_le_bytes())
    }

    fn field_u64(&mut self, tag: u8, value: u64) -> VaultbootResult<()> {
        self.field_bytes(tag, &value.to_le_bytes())
    }
}

/// Bounds-checked TLV reader.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn take(&mut self, n: usize) -> VaultbootResult<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> VaultbootResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn peek_tag(&self) -> VaultbootResult<u8> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED)
    }

    /// Read one field, requiring the expected tag.
    fn field(&mut self, expected_tag: u8) -> VaultbootResult<&'a [u8]> {
        let tag = self.take(1)?[0];
        if tag != expected_tag {
            return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
        }
        let len_bytes = self.take(2)?;
        let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
        self.take(len)
    }

    fn field_u32(&mut self, expected_tag: u8) -> VaultbootResult<u32> {
        let b = self.field(expected_tag)?;
        if b.len() != 4 {
            return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
        }
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn field_u64(&mut self, expected_tag: u8) -> VaultbootResult<u64> {
        let b = self.field(expected_tag)?;
        if b.len() != 8 {
            return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
        }
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

#[cfg(feature = "std")]
mod json {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct MeasurementDoc {
        stage: u32,
        digest: String,
    }

    #[derive(Serialize, Deserialize)]
    struct EventDoc {
        kind: u32,
        data: u32,
        timestamp: u64,
        note: String,
    }

    /// Structured text form of the report. Field order mirrors the binary
    /// encoding; byte fields are hex encoded.
    #[derive(Serialize, Deserialize)]
    struct ReportDoc {
        version: u32,
        nonce: String,
        boot_count: u32,
        firmware_version: String,
        security_status: u32,
        tamper_events: u32,
        uptime: u64,
        measurements: Vec<MeasurementDoc>,
        events: Vec<EventDoc>,
        signature: String,
    }

    fn hex_array<const N: usize>(text: &str) -> VaultbootResult<[u8; N]> {
        let bytes =
            hex::decode(text).map_err(|_| VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED)?;
        if bytes.len() != N {
            return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    impl AttestationReport {
        /// Self-describing structured text export.
        pub fn export_json(&self) -> VaultbootResult<String> {
            if !self.signed {
                return Err(VaultbootError::DRIVER_ATTESTATION_NOT_SIGNED);
            }

            let doc = ReportDoc {
                version: self.version,
                nonce: hex::encode(self.nonce),
                boot_count: self.boot_count,
                firmware_version: self.firmware_version.to_string(),
                security_status: self.security_status.bits(),
                tamper_events: self.tamper_events,
                uptime: self.uptime,
                measurements: self
                    .measurements()
                    .iter()
                    .map(|m| MeasurementDoc {
                        stage: m.stage,
                        digest: hex::encode(m.digest),
                    })
                    .collect(),
                events: self
                    .events()
                    .iter()
                    .map(|e| EventDoc {
                        kind: e.kind,
                        data: e.data,
                        timestamp: e.timestamp,
                        note: e.note.as_str().to_string(),
                    })
                    .collect(),
                signature: hex::encode(self.signature),
            };

            serde_json::to_string_pretty(&doc)
                .map_err(|_| VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED)
        }

        /// Decode a structured text export.
        pub fn from_json(text: &str) -> VaultbootResult<Self> {
            let doc: ReportDoc = serde_json::from_str(text)
                .map_err(|_| VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED)?;

            if doc.measurements.len() > MAX_MEASUREMENTS || doc.events.len() > MAX_EVENTS {
                return Err(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED);
            }

            let mut measurements = [Measurement::default(); MAX_MEASUREMENTS];
            for (slot, m) in measurements.iter_mut().zip(doc.measurements.iter()) {
                *slot = Measurement {
                    stage: m.stage,
                    digest: hex_array(&m.digest)?,
                };
            }

            let mut events = [EventLogEntry::default(); MAX_EVENTS];
            for (slot, e) in events.iter_mut().zip(doc.events.iter()) {
                *slot = EventLogEntry {
                    kind: e.kind,
                    data: e.data,
                    timestamp: e.timestamp,
                    note: EventNote::new(&e.note)?,
                };
            }

            Ok(Self {
                version: doc.version,
                nonce: hex_array(&doc.nonce)?,
                boot_count: doc.boot_count,
                firmware_version: doc
                    .firmware_version
                    .parse()
                    .map_err(|_| VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED)?,
                security_status: SecurityStatus::from_bits_retain(doc.security_status),
                tamper_events: doc.tamper_events,
                uptime: doc.uptime,
                measurements,
                measurement_count: doc.measurements.len(),
                events,
                event_count: doc.events.len(),
                signature: hex_array(&doc.signature)?,
                signed: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_fabric::{DerivedKey, KeyType};

    fn attestation_key() -> DerivedKey {
        DerivedKey::from_raw(KeyType::Attestation, [0x31; 32])
    }

    fn sample_report() -> AttestationReport {
        let mut measurements = [Measurement::default(); MAX_MEASUREMENTS];
        measurements[0] = Measurement {
            stage: 1,
            digest: [0xAB; 32],
        };
        measurements[1] = Measurement {
            stage: 2,
            digest: [0xCD; 32],
        };

        let mut events = [EventLogEntry::default(); MAX_EVENTS];
        events[0] = EventLogEntry {
            kind: 1,
            data: 0,
            timestamp: 17,
            note: EventNote::new("boot started").unwrap(),
        };
        events[1] = EventLogEntry {
            kind: 4,
            data: 1,
            timestamp: 29,
            note: EventNote::new("debug port locked").unwrap(),
        };

        AttestationReport {
            version: REPORT_FORMAT_VERSION,
            nonce: [0x5F; NONCE_SIZE],
            boot_count: 7,
            firmware_version: Version::new(1, 2, 3),
            security_status: SecurityStatus::ROOT_OF_TRUST_VERIFIED | SecurityStatus::DEBUG_LOCKED,
            tamper_events: 0,
            uptime: 123_456,
            measurements,
            measurement_count: 2,
            events,
            event_count: 2,
            signature: [0u8; SIGNATURE_SIZE],
            signed: false,
        }
    }

    #[test]
    fn test_sign_is_single_use() {
        let mut report = sample_report();
        let key = attestation_key();
        report.sign(&key).unwrap();
        assert!(report.is_signed());
        assert_eq!(
            report.sign(&key),
            Err(VaultbootError::DRIVER_ATTESTATION_ALREADY_SIGNED)
        );
    }

    #[test]
    fn test_signature_verifies() {
        let mut report = sample_report();
        let key = attestation_key();
        report.sign(&key).unwrap();
        report.verify(&attestation_verifying_key(&key)).unwrap();
    }

    #[test]
    fn test_tampered_report_fails_verification() {
        let mut report = sample_report();
        let key = attestation_key();
        report.sign(&key).unwrap();

        report.boot_count += 1;
        assert_eq!(
            report.verify(&attestation_verifying_key(&key)),
            Err(VaultbootError::DRIVER_ATTESTATION_SIGNATURE_INVALID)
        );
    }

    #[test]
    fn test_unsigned_report_rejects_export_and_verify() {
        let report = sample_report();
        let key = attestation_key();
        let mut out = [0u8; MAX_WIRE_SIZE];
        assert_eq!(
            report.export_binary(&mut out),
            Err(VaultbootError::DRIVER_ATTESTATION_NOT_SIGNED)
        );
        assert_eq!(
            report.verify(&attestation_verifying_key(&key)),
            Err(VaultbootError::DRIVER_ATTESTATION_NOT_SIGNED)
        );
    }

    #[test]
    fn test_binary_round_trip() {
        let mut report = sample_report();
        report.sign(&attestation_key()).unwrap();

        let mut out = [0u8; MAX_WIRE_SIZE];
        let len = report.export_binary(&mut out).unwrap();
        let decoded = AttestationReport::decode_binary(&out[..len]).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_json_round_trip() {
        let mut report = sample_report();
        report.sign(&attestation_key()).unwrap();

        let text = report.export_json().unwrap();
        let decoded = AttestationReport::from_json(&text).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_formats_decode_to_identical_reports() {
        let mut report = sample_report();
        report.sign(&attestation_key()).unwrap();

        let mut out = [0u8; MAX_WIRE_SIZE];
        let len = report.export_binary(&mut out).unwrap();
        let from_binary = AttestationReport::decode_binary(&out[..len]).unwrap();
        let from_text = AttestationReport::from_json(&report.export_json().unwrap()).unwrap();
        assert_eq!(from_binary, from_text);

        // The decoded signature still verifies.
        let key = attestation_key();
        from_binary.verify(&attestation_verifying_key(&key)).unwrap();
        from_text.verify(&attestation_verifying_key(&key)).unwrap();
    }

    #[test]
    fn test_truncated_binary_is_malformed() {
        let mut report = sample_report();
        report.sign(&attestation_key()).unwrap();

        let mut out = [0u8; MAX_WIRE_SIZE];
        let len = report.export_binary(&mut out).unwrap();
        assert_eq!(
            AttestationReport::decode_binary(&out[..len - 1]).err(),
            Some(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED)
        );
    }

    #[test]
    fn test_trailing_bytes_are_malformed() {
        let mut report = sample_report();
        report.sign(&attestation_key()).unwrap();

        let mut out = [0u8; MAX_WIRE_SIZE];
        let len = report.export_binary(&mut out).unwrap();
        assert_eq!(
            AttestationReport::decode_binary(&out[..len + 1]).err(),
            Some(VaultbootError::DRIVER_ATTESTATION_WIRE_MALFORMED)
        );
    }

    #[test]
    fn test_wire_fits_worst_case() {
        let mut report = sample_report();
        report.measurement_count = MAX_MEASUREMENTS;
        for (i, m) in report.measurements.iter_mut().enumerate() {
            m.stage = i as u32;
            m.digest = [i as u8; 32];
        }
        report.event_count = MAX_EVENTS;
        let long_note =
            EventNote::new(core::str::from_utf8(&[b'x'; NOTE_CAPACITY]).unwrap()).unwrap();
        for e in report.events.iter_mut() {
            e.note = long_note;
        }
        report.sign(&attestation_key()).unwrap();

        let mut out = [0u8; MAX_WIRE_SIZE];
        let len = report.export_binary(&mut out).unwrap();
        let decoded = AttestationReport::decode_binary(&out[..len]).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_note_capacity_enforced() {
        let text = "x".repeat(NOTE_CAPACITY + 1);
        assert_eq!(
            EventNote::new(&text).err(),
            Some(VaultbootError::DRIVER_ATTESTATION_NOTE_TOO_LONG)
        );
    }
}
