//! Authorization lists (`softwareEnforced` / `teeEnforced`).
//!
//! An authorization list is a SEQUENCE of explicitly tagged entries keyed by
//! KeyMint tag number. Only the purpose set and the root of trust take part
//! in the boot state decision; every other tag is skipped so that fields
//! added by newer platform versions do not break parsing.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::asn1::{read_integer_set, DerNode, SequenceCursor};
use crate::error::Result;
use crate::root_of_trust::RootOfTrust;

pub const KM_ENUM_REP: u32 = 2 << 28;
pub const KM_BYTES: u32 = 9 << 28;
pub const KEYMASTER_TAG_TYPE_MASK: u32 = 0x0FFF_FFFF;

pub const KM_TAG_PURPOSE: u32 = KM_ENUM_REP | 1;
pub const KM_TAG_ROOT_OF_TRUST: u32 = KM_BYTES | 704;

/// `KeyPurpose::ATTEST_KEY`.
pub const KM_PURPOSE_ATTEST_KEY: i64 = 7;

/// Tag number as it appears on the wire, without the type bits.
pub const fn tag_number(tag: u32) -> u32 {
    tag & KEYMASTER_TAG_TYPE_MASK
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthorizationRecord {
    pub purposes: BTreeSet<i64>,
    pub root_of_trust: Option<RootOfTrust>,
}

impl AuthorizationRecord {
    pub fn parse(sequence: &DerNode) -> Result<Self> {
        let mut record = Self::default();
        let mut cursor = SequenceCursor::new(sequence)?;

        while let Some((tag, value)) = cursor.read_tagged()? {
            match tag {
                t if t == tag_number(KM_TAG_PURPOSE) => {
                    record.purposes = read_integer_set(value)?;
                }
                t if t == tag_number(KM_TAG_ROOT_OF_TRUST) => {
                    record.root_of_trust = Some(RootOfTrust::decode(value)?);
                }
                _ => {}
            }
        }
        Ok(record)
    }

    pub fn root_of_trust(&self) -> Option<&RootOfTrust> {
        self.root_of_trust.as_ref()
    }

    pub fn has_purpose(&self, purpose: i64) -> bool {
        self.purposes.contains(&purpose)
    }
}
