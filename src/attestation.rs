use std::collections::BTreeSet;

use serde::Serialize;
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

use crate::asn1::{parse_sequence_from_bytes, read_octets, DerNode};
use crate::authorization::AuthorizationRecord;
use crate::error::{AttestationError, Result};
use crate::root_of_trust::hex_bytes;

// Android KeyStore Attestation Extension OID
pub const KEY_ATTESTATION_OID: &str = "1.3.6.1.4.1.11129.2.1.17";
// Entity Attestation Token encoding of the same data
pub const EAT_OID: &str = "1.3.6.1.4.1.11129.2.1.25";
pub const CRL_DISTRIBUTION_POINTS_OID: &str = "2.5.29.31";

pub const ATTESTATION_CHALLENGE_INDEX: usize = 4;
pub const SW_ENFORCED_INDEX: usize = 6;
pub const TEE_ENFORCED_INDEX: usize = 7;

/// The certificate capabilities the attestation parser relies on.
pub trait AttestationCertificate {
    /// Raw `extnValue` bytes of the extension with the given dotted OID.
    fn extension_value(&self, oid: &str) -> Option<&[u8]>;

    fn issuer_name(&self) -> String;

    fn encoded_der(&self) -> &[u8];

    /// Hex SHA-256 of the DER encoding.
    fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.encoded_der()))
    }
}

/// An X.509 certificate decoded with `x509-parser`.
pub struct ParsedCertificate<'a> {
    der: &'a [u8],
    cert: X509Certificate<'a>,
}

impl<'a> ParsedCertificate<'a> {
    pub fn from_der(der: &'a [u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| AttestationError::Certificate(format!("Failed to parse certificate: {}", e)))?;
        Ok(Self { der, cert })
    }
}

impl AttestationCertificate for ParsedCertificate<'_> {
    fn extension_value(&self, oid: &str) -> Option<&[u8]> {
        self.cert
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == oid)
            .map(|ext| ext.value)
    }

    fn issuer_name(&self) -> String {
        self.cert.issuer().to_string()
    }

    fn encoded_der(&self) -> &[u8] {
        self.der
    }
}

/// Locate and decode the key attestation extension of a certificate.
/// 1. Requires the Android KeyStore attestation extension.
/// 2. Rejects certificates that also carry the EAT extension.
/// 3. Warns about a CRL distribution point on the attested certificate.
/// 4. Decodes the extension payload into the `KeyDescription` sequence.
pub fn locate_attestation_sequence<C>(cert: &C, max_depth: u32) -> Result<DerNode>
where
    C: AttestationCertificate + ?Sized,
{
    // 1. Attestation extension (absent on most intermediates, not an error)
    let Some(extension) = cert.extension_value(KEY_ATTESTATION_OID) else {
        return Err(AttestationError::NotAttested {
            issuer: cert.issuer_name(),
        });
    };

    // 2. Competing encodings
    if cert.extension_value(EAT_OID).is_some() {
        return Err(AttestationError::ConflictingExtensions);
    }

    // 3. Attested certificates are not expected to be revocable through a CRL
    if cert.extension_value(CRL_DISTRIBUTION_POINTS_OID).is_some() {
        tracing::warn!(
            issuer = %cert.issuer_name(),
            "CRL Distribution Points extension found in attested certificate"
        );
    }

    // 4. Payload
    if extension.is_empty() {
        return Err(AttestationError::MalformedEncoding(
            "empty attestation extension".to_string(),
        ));
    }
    parse_sequence_from_bytes(extension, max_depth)
}

/// The parts of the `KeyDescription` sequence used for the boot state decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyDescription {
    #[serde(with = "hex_bytes")]
    pub attestation_challenge: Vec<u8>,
    pub software_enforced: AuthorizationRecord,
    pub tee_enforced: AuthorizationRecord,
}

impl KeyDescription {
    pub fn from_sequence(sequence: &DerNode) -> Result<Self> {
        let attestation_challenge =
            read_octets(sequence.object_at(ATTESTATION_CHALLENGE_INDEX)?)?.to_vec();
        let software_enforced = AuthorizationRecord::parse(sequence.object_at(SW_ENFORCED_INDEX)?)?;
        let tee_enforced = AuthorizationRecord::parse(sequence.object_at(TEE_ENFORCED_INDEX)?)?;

        Ok(Self {
            attestation_challenge,
            software_enforced,
            tee_enforced,
        })
    }

    pub fn from_certificate<C>(cert: &C, max_depth: u32) -> Result<Self>
    where
        C: AttestationCertificate + ?Sized,
    {
        let sequence = locate_attestation_sequence(cert, max_depth)?;
        Self::from_sequence(&sequence)
    }

    /// Key purposes, taken from the TEE list when it declares any.
    pub fn declared_purposes(&self) -> &BTreeSet<i64> {
        if !self.tee_enforced.purposes.is_empty() {
            &self.tee_enforced.purposes
        } else {
            &self.software_enforced.purposes
        }
    }
}
