// Android Key Attestation - Boot State Verification
// =================================================
// Walks an attestation certificate chain, decodes the KeyStore attestation
// extension and reports whether the device booted locked and verified.

pub mod asn1;
pub mod attestation;
pub mod authorization;
pub mod chain;
pub mod config;
pub mod error;
pub mod root_of_trust;

#[cfg(test)]
mod test_support;

pub use attestation::{AttestationCertificate, KeyDescription, ParsedCertificate};
pub use authorization::AuthorizationRecord;
pub use chain::{
    evaluate_chain, has_attestation_purpose, ChainEvaluation, Enforcement, Verdict,
    ATTESTATION_UNAVAILABLE,
};
pub use config::{AttestationConfig, ScanOrder};
pub use error::AttestationError;
pub use root_of_trust::{RootOfTrust, VerifiedBootState};

use serde::Serialize;

uniffi::setup_scaffolding!();

// ============================================================================
// FFI Records
// ============================================================================

/// What the mobile side receives for one chain evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, uniffi::Record)]
pub struct AttestationSummary {
    pub verdict: Verdict,
    pub detail: String,
    pub attestation_challenge: Option<Vec<u8>>,
    pub certificate_fingerprint: Option<String>,
}

impl From<&ChainEvaluation> for AttestationSummary {
    fn from(eval: &ChainEvaluation) -> Self {
        Self {
            verdict: eval.verdict,
            detail: eval.detail.clone(),
            attestation_challenge: eval.attestation_challenge().map(<[u8]>::to_vec),
            certificate_fingerprint: eval.certificate_fingerprint.clone(),
        }
    }
}

impl AttestationSummary {
    fn unavailable() -> Self {
        Self {
            verdict: Verdict::CriticalError,
            detail: ATTESTATION_UNAVAILABLE.to_string(),
            attestation_challenge: None,
            certificate_fingerprint: None,
        }
    }
}

// ============================================================================
// Chain Evaluation
// ============================================================================

/// Evaluate a DER certificate chain (leaf first) with the default configuration.
#[uniffi::export]
pub fn evaluate_certificate_chain(chain: Vec<Vec<u8>>) -> AttestationSummary {
    evaluate_certificate_chain_with_config(chain, AttestationConfig::default())
}

#[uniffi::export]
pub fn evaluate_certificate_chain_with_config(
    chain: Vec<Vec<u8>>,
    config: AttestationConfig,
) -> AttestationSummary {
    if let Err(err) = config.validate() {
        tracing::error!(error = %err, "Rejected attestation configuration");
        return AttestationSummary {
            verdict: Verdict::Error,
            ..AttestationSummary::unavailable()
        };
    }

    // Unparseable certificates are treated like certificates without the extension
    let parsed: Vec<ParsedCertificate<'_>> = chain
        .iter()
        .enumerate()
        .filter_map(|(index, der)| match ParsedCertificate::from_der(der) {
            Ok(cert) => Some(cert),
            Err(err) => {
                tracing::warn!(index, error = %err, "Skipping unparseable certificate");
                None
            }
        })
        .collect();

    match evaluate_chain(&parsed, &config) {
        Ok(eval) => AttestationSummary::from(&eval),
        Err(err) => {
            tracing::error!(error = %err, "Attestation chain rejected");
            AttestationSummary::unavailable()
        }
    }
}

/// Whether a single DER certificate's attestation declares `ATTEST_KEY`.
#[uniffi::export]
pub fn certificate_has_attestation_purpose(certificate: Vec<u8>) -> bool {
    match ParsedCertificate::from_der(&certificate) {
        Ok(cert) => has_attestation_purpose(&cert, &AttestationConfig::default()),
        Err(err) => {
            tracing::debug!(error = %err, "Purpose check on unparseable certificate");
            false
        }
    }
}

/// The text shown to the user for a summary.
#[uniffi::export]
pub fn attestation_result_text(summary: AttestationSummary) -> String {
    if summary.verdict.is_failure() {
        ATTESTATION_UNAVAILABLE.to_string()
    } else {
        summary.detail
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[uniffi::export]
pub fn parse_attestation_config(json: String) -> Result<AttestationConfig, AttestationError> {
    AttestationConfig::from_json(&json)
}
