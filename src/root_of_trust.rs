//! Root of trust record carried under tag 704 of an authorization list.
//!
//! ```asn1
//! RootOfTrust ::= SEQUENCE {
//!     verifiedBootKey            OCTET_STRING,
//!     deviceLocked               BOOLEAN,
//!     verifiedBootState          VerifiedBootState,
//!     verifiedBootHash           OCTET_STRING,  -- attestation v3 and later
//! }
//! ```

use std::fmt;

use der::asn1::{AnyRef, OctetStringRef};
use der::{Encode, Sequence};
use serde::Serialize;

use crate::asn1::{read_boolean, read_integer, read_octets, DerNode};
use crate::error::{AttestationError, Result};

const VERIFIED_BOOT_KEY_INDEX: usize = 0;
const DEVICE_LOCKED_INDEX: usize = 1;
const VERIFIED_BOOT_STATE_INDEX: usize = 2;
const VERIFIED_BOOT_HASH_INDEX: usize = 3;

/// Raw `VerifiedBootState` ENUMERATED value.
///
/// Values outside the four known states are kept as-is so they can still be
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VerifiedBootState(pub i64);

impl VerifiedBootState {
    pub const VERIFIED: Self = Self(0);
    pub const SELF_SIGNED: Self = Self(1);
    pub const UNVERIFIED: Self = Self(2);
    pub const FAILED: Self = Self(3);

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn label(self) -> String {
        match self {
            Self::VERIFIED => "Verified".to_string(),
            Self::SELF_SIGNED => "Self-signed".to_string(),
            Self::UNVERIFIED => "Unverified".to_string(),
            Self::FAILED => "Failed".to_string(),
            Self(other) => format!("Unknown ({other})"),
        }
    }
}

impl fmt::Display for VerifiedBootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootOfTrust {
    #[serde(with = "hex_bytes")]
    pub verified_boot_key: Vec<u8>,
    pub device_locked: bool,
    pub verified_boot_state: VerifiedBootState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_boot_hash: Option<Vec<u8>>,
}

impl RootOfTrust {
    /// Decode a `RootOfTrust` SEQUENCE.
    pub fn decode(node: &DerNode) -> Result<Self> {
        let DerNode::Sequence(elements) = node else {
            return Err(AttestationError::MalformedEncoding(format!(
                "expected SEQUENCE for root of trust, found {}",
                node.kind()
            )));
        };
        if elements.len() <= VERIFIED_BOOT_STATE_INDEX {
            return Err(AttestationError::MalformedEncoding(format!(
                "root of trust has {} elements, expected at least 3",
                elements.len()
            )));
        }

        let verified_boot_hash = match elements.get(VERIFIED_BOOT_HASH_INDEX) {
            Some(node) => Some(read_octets(node)?.to_vec()),
            None => None,
        };

        Ok(Self {
            verified_boot_key: read_octets(&elements[VERIFIED_BOOT_KEY_INDEX])?.to_vec(),
            device_locked: read_boolean(&elements[DEVICE_LOCKED_INDEX])?,
            verified_boot_state: VerifiedBootState(read_integer(
                &elements[VERIFIED_BOOT_STATE_INDEX],
            )?),
            verified_boot_hash,
        })
    }

    pub fn is_device_locked(&self) -> bool {
        self.device_locked
    }

    pub fn verified_boot_state(&self) -> VerifiedBootState {
        self.verified_boot_state
    }

    /// Locked bootloader running firmware that passed verified boot.
    pub fn is_trusted_boot(&self) -> bool {
        self.device_locked && self.verified_boot_state == VerifiedBootState::VERIFIED
    }

    /// DER encoding of this record.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        // der's derived enums only cover known variants, so the boot state is
        // written as raw ENUMERATED content taken from the INTEGER encoding.
        let state = self.verified_boot_state.raw().to_der().map_err(encode_error)?;
        let state_content = state.get(2..).unwrap_or_default();

        let encoded = RootOfTrustDer {
            verified_boot_key: OctetStringRef::new(&self.verified_boot_key)
                .map_err(encode_error)?,
            device_locked: self.device_locked,
            verified_boot_state: AnyRef::new(der::Tag::Enumerated, state_content)
                .map_err(encode_error)?,
            verified_boot_hash: self
                .verified_boot_hash
                .as_deref()
                .map(OctetStringRef::new)
                .transpose()
                .map_err(encode_error)?,
        };
        encoded.to_der().map_err(encode_error)
    }
}

#[derive(Sequence)]
struct RootOfTrustDer<'a> {
    verified_boot_key: OctetStringRef<'a>,
    device_locked: bool,
    verified_boot_state: AnyRef<'a>,
    verified_boot_hash: Option<OctetStringRef<'a>>,
}

fn encode_error(err: der::Error) -> AttestationError {
    AttestationError::MalformedEncoding(format!("failed to encode root of trust: {err}"))
}

pub(crate) mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_OF_TRUST: &str = concat!(
        "304a", // SEQUENCE len 0x4a
        "0420", // OCTET STRING len 32
        "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
        "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
        "0101", // BOOLEAN len 1
        "00",   // false
        "0a01", // ENUMERATED len 1
        "02",   // Unverified(2)
        "0420", // OCTET STRING len 32
        "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee",
        "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee",
    );

    fn decode_hex(input: &str) -> Result<RootOfTrust> {
        let node = DerNode::decode(&hex::decode(input).unwrap(), 8).unwrap();
        RootOfTrust::decode(&node)
    }

    #[test]
    fn test_decode_root_of_trust() {
        let rot = decode_hex(ROOT_OF_TRUST).unwrap();
        assert_eq!(rot.verified_boot_key, vec![0xbb; 32]);
        assert!(!rot.is_device_locked());
        assert_eq!(rot.verified_boot_state(), VerifiedBootState::UNVERIFIED);
        assert_eq!(rot.verified_boot_hash, Some(vec![0xee; 32]));
        assert!(!rot.is_trusted_boot());
    }

    #[test]
    fn test_decode_three_field_root_of_trust() {
        let rot = decode_hex(concat!(
            "3009",   // SEQUENCE len 9
            "0401aa", // OCTET STRING aa
            "0101ff", // BOOLEAN true
            "0a0100", // ENUMERATED Verified(0)
        ))
        .unwrap();
        assert_eq!(rot.verified_boot_key, vec![0xaa]);
        assert!(rot.is_trusted_boot());
        assert_eq!(rot.verified_boot_hash, None);
    }

    #[test]
    fn test_decode_rejects_short_sequence() {
        let err = decode_hex("30060401aa0101ff").unwrap_err();
        assert!(matches!(err, AttestationError::MalformedEncoding(_)));
    }

    #[test]
    fn test_decode_rejects_non_sequence() {
        let err = decode_hex("0401aa").unwrap_err();
        assert!(matches!(err, AttestationError::MalformedEncoding(_)));
    }

    #[test]
    fn test_decode_rejects_wrong_field_type() {
        let err = decode_hex(concat!(
            "3009",   // SEQUENCE len 9
            "0401aa", // OCTET STRING aa
            "020101", // INTEGER where a BOOLEAN belongs
            "0a0100", // ENUMERATED Verified(0)
        ))
        .unwrap_err();
        assert_eq!(
            err,
            AttestationError::TypeMismatch {
                expected: "BOOLEAN",
                found: "INTEGER",
            }
        );
    }

    #[test]
    fn test_unknown_boot_state_is_kept() {
        let rot = decode_hex(concat!(
            "3009",   // SEQUENCE len 9
            "0401aa", // OCTET STRING aa
            "0101ff", // BOOLEAN true
            "0a0109", // ENUMERATED 9
        ))
        .unwrap();
        assert_eq!(rot.verified_boot_state().raw(), 9);
        assert_eq!(rot.verified_boot_state().label(), "Unknown (9)");
        assert!(!rot.is_trusted_boot());
    }

    #[test]
    fn test_boot_state_labels() {
        assert_eq!(VerifiedBootState::VERIFIED.label(), "Verified");
        assert_eq!(VerifiedBootState::SELF_SIGNED.label(), "Self-signed");
        assert_eq!(VerifiedBootState::UNVERIFIED.label(), "Unverified");
        assert_eq!(VerifiedBootState::FAILED.label(), "Failed");
        assert_eq!(VerifiedBootState(-4).to_string(), "Unknown (-4)");
        for raw in [-1000, -1, 4, 255, i64::MAX] {
            let label = VerifiedBootState(raw).label();
            assert_eq!(label, format!("Unknown ({raw})"));
        }
    }

    #[test]
    fn test_to_der_reproduces_input() {
        let input = hex::decode(ROOT_OF_TRUST).unwrap();
        let rot = decode_hex(ROOT_OF_TRUST).unwrap();
        assert_eq!(rot.to_der().unwrap(), input);
    }

    #[test]
    fn test_to_der_keeps_unknown_state() {
        let rot = RootOfTrust {
            verified_boot_key: vec![1, 2, 3],
            device_locked: true,
            verified_boot_state: VerifiedBootState(300),
            verified_boot_hash: None,
        };
        let encoded = rot.to_der().unwrap();
        let expected = concat!(
            "300c",       // SEQUENCE len 12
            "0403010203", // OCTET STRING 010203
            "0101ff",     // BOOLEAN true
            "0a02012c",   // ENUMERATED 300
        );
        assert_eq!(hex::encode(&encoded), expected);
        let node = DerNode::decode(&encoded, 8).unwrap();
        assert_eq!(RootOfTrust::decode(&node).unwrap(), rot);
    }

    #[test]
    fn test_negative_boot_state_round_trips() {
        let input = concat!(
            "3009",   // SEQUENCE len 9
            "0401aa", // OCTET STRING aa
            "0101ff", // BOOLEAN true
            "0a01ff", // ENUMERATED -1
        );
        let rot = decode_hex(input).unwrap();
        assert_eq!(rot.verified_boot_state(), VerifiedBootState(-1));
        assert_eq!(rot.verified_boot_state().label(), "Unknown (-1)");
        assert_eq!(hex::encode(rot.to_der().unwrap()), input);

        let input = concat!(
            "300a",     // SEQUENCE len 10
            "0401aa",   // OCTET STRING aa
            "0101ff",   // BOOLEAN true
            "0a0200ff", // ENUMERATED 255
        );
        let rot = decode_hex(input).unwrap();
        assert_eq!(rot.verified_boot_state(), VerifiedBootState(255));
        assert_eq!(hex::encode(rot.to_der().unwrap()), input);
    }

    #[test]
    fn test_serialize_hex_key() {
        let rot = decode_hex(concat!(
            "3009",   // SEQUENCE len 9
            "0401aa", // OCTET STRING aa
            "0101ff", // BOOLEAN true
            "0a0100", // ENUMERATED Verified(0)
        ))
        .unwrap();
        let json = serde_json::to_value(&rot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "verified_boot_key": "aa",
                "device_locked": true,
                "verified_boot_state": 0,
            })
        );
    }
}
