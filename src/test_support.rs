//! DER builders and a fake certificate for unit tests.

use std::collections::HashMap;

use crate::attestation::{AttestationCertificate, KEY_ATTESTATION_OID};
use crate::root_of_trust::VerifiedBootState;

pub fn tlv(tag: &[u8], content: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    match content.len() {
        len @ 0..=0x7f => out.push(len as u8),
        len @ 0x80..=0xff => out.extend_from_slice(&[0x81, len as u8]),
        len => out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]),
    }
    out.extend_from_slice(content);
    out
}

pub fn seq(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(&[0x30], &parts.concat())
}

pub fn set(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(&[0x31], &parts.concat())
}

pub fn octets(bytes: &[u8]) -> Vec<u8> {
    tlv(&[0x04], bytes)
}

pub fn boolean(value: bool) -> Vec<u8> {
    tlv(&[0x01], &[if value { 0xff } else { 0x00 }])
}

/// Small non-negative INTEGER.
pub fn int(value: u8) -> Vec<u8> {
    if value < 0x80 {
        tlv(&[0x02], &[value])
    } else {
        tlv(&[0x02], &[0x00, value])
    }
}

pub fn enumerated(value: u8) -> Vec<u8> {
    tlv(&[0x0a], &[value])
}

/// `[tag] EXPLICIT` wrapper, context-specific and constructed.
pub fn tagged(tag: u32, inner: Vec<u8>) -> Vec<u8> {
    let header = match tag {
        0..=0x1e => vec![0xa0 | tag as u8],
        0x1f..=0x7f => vec![0xbf, tag as u8],
        _ => vec![0xbf, (tag >> 7) as u8 | 0x80, (tag & 0x7f) as u8],
    };
    tlv(&header, &inner)
}

pub fn root_of_trust(locked: bool, state: VerifiedBootState) -> Vec<u8> {
    seq(&[
        octets(&[0xbb; 32]),
        boolean(locked),
        enumerated(state.raw() as u8),
        octets(&[0xee; 32]),
    ])
}

pub fn authorization_list(purposes: &[u8], root_of_trust: Option<Vec<u8>>) -> Vec<u8> {
    let mut entries = Vec::new();
    if !purposes.is_empty() {
        let values: Vec<Vec<u8>> = purposes.iter().map(|p| int(*p)).collect();
        entries.push(tagged(1, set(&values)));
    }
    entries.push(tagged(2, int(3)));
    if let Some(rot) = root_of_trust {
        entries.push(tagged(704, rot));
    }
    seq(&entries)
}

pub fn key_description(challenge: &[u8], software: Vec<u8>, tee: Vec<u8>) -> Vec<u8> {
    seq(&[
        tlv(&[0x02], &[0x01, 0x2c]),
        enumerated(1),
        tlv(&[0x02], &[0x01, 0x2c]),
        enumerated(1),
        octets(challenge),
        octets(&[]),
        software,
        tee,
    ])
}

#[derive(Debug, Default, Clone)]
pub struct FakeCertificate {
    pub issuer: String,
    pub extensions: HashMap<&'static str, Vec<u8>>,
    pub der: Vec<u8>,
}

impl FakeCertificate {
    pub fn plain(issuer: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            extensions: HashMap::new(),
            der: issuer.as_bytes().to_vec(),
        }
    }

    pub fn attested(issuer: &str, key_description: Vec<u8>) -> Self {
        Self::plain(issuer).with_extension(KEY_ATTESTATION_OID, key_description)
    }

    pub fn with_extension(mut self, oid: &'static str, value: Vec<u8>) -> Self {
        self.extensions.insert(oid, value);
        self
    }
}

impl AttestationCertificate for FakeCertificate {
    fn extension_value(&self, oid: &str) -> Option<&[u8]> {
        self.extensions.get(oid).map(Vec::as_slice)
    }

    fn issuer_name(&self) -> String {
        self.issuer.clone()
    }

    fn encoded_der(&self) -> &[u8] {
        &self.der
    }
}
