//! Certificate chain walk and boot state decision.

use serde::Serialize;

use crate::attestation::{AttestationCertificate, KeyDescription};
use crate::authorization::KM_PURPOSE_ATTEST_KEY;
use crate::config::AttestationConfig;
use crate::error::{AttestationError, Result};
use crate::root_of_trust::RootOfTrust;

/// Shown in place of the detail when no boot state could be determined.
pub const ATTESTATION_UNAVAILABLE: &str = "Could not run attestation. See log for reason.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, uniffi::Enum)]
pub enum Verdict {
    /// Locked bootloader, verified boot state `Verified`.
    Locked,
    Unlocked,
    /// The evaluation could not run, e.g. a rejected configuration.
    Error,
    /// No usable attestation, or an attestation without a root of trust.
    CriticalError,
}

impl Verdict {
    /// Legacy numeric result codes.
    pub fn code(self) -> i32 {
        match self {
            Verdict::Locked => 1,
            Verdict::Unlocked => 0,
            Verdict::Error => -1,
            Verdict::CriticalError => -2,
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Verdict::Error | Verdict::CriticalError)
    }
}

/// Which authorization list decided the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    TrustedEnvironment,
    Software,
}

/// Result of one chain evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainEvaluation {
    pub verdict: Verdict,
    pub detail: String,
    pub decided_by: Option<Enforcement>,
    /// Index (leaf first) of the certificate carrying the attestation.
    pub certificate_index: Option<usize>,
    pub certificate_fingerprint: Option<String>,
    pub key_description: Option<KeyDescription>,
}

impl ChainEvaluation {
    pub fn attestation_challenge(&self) -> Option<&[u8]> {
        self.key_description
            .as_ref()
            .map(|desc| desc.attestation_challenge.as_slice())
    }
}

/// Outcome of probing one certificate.
enum Probe {
    Attested(KeyDescription),
    Skipped(AttestationError),
}

fn probe<C: AttestationCertificate>(cert: &C, config: &AttestationConfig) -> Result<Probe> {
    match KeyDescription::from_certificate(cert, config.max_der_depth) {
        Ok(desc) => Ok(Probe::Attested(desc)),
        Err(AttestationError::ConflictingExtensions) => Err(AttestationError::ConflictingExtensions),
        Err(err) => Ok(Probe::Skipped(err)),
    }
}

/// Walk `chain` (stored leaf first) and derive the boot state verdict.
///
/// The first certificate, in `config.scan_order`, whose attestation
/// extension decodes wins. Per-certificate failures only skip that
/// certificate; a certificate carrying two attestation encodings aborts the
/// evaluation with [`AttestationError::ConflictingExtensions`].
pub fn evaluate_chain<C: AttestationCertificate>(
    chain: &[C],
    config: &AttestationConfig,
) -> Result<ChainEvaluation> {
    let mut attested = None;

    for index in config.scan_order.indices(chain.len()) {
        let cert = &chain[index];
        match probe(cert, config)? {
            Probe::Attested(desc) => {
                tracing::debug!(index, issuer = %cert.issuer_name(), "Attestation extension parsed");
                attested = Some((index, cert.fingerprint(), desc));
                break;
            }
            Probe::Skipped(AttestationError::NotAttested { issuer }) => {
                tracing::debug!(index, %issuer, "Certificate carries no attestation extension");
            }
            Probe::Skipped(err) => {
                tracing::warn!(index, issuer = %cert.issuer_name(), error = %err, "Skipping certificate");
            }
        }
    }

    let Some((index, fingerprint, desc)) = attested else {
        tracing::error!(chain_len = chain.len(), "No certificate in the chain carries a usable attestation");
        return Ok(ChainEvaluation {
            verdict: Verdict::CriticalError,
            detail: ATTESTATION_UNAVAILABLE.to_string(),
            decided_by: None,
            certificate_index: None,
            certificate_fingerprint: None,
            key_description: None,
        });
    };

    let (verdict, detail, decided_by) = decide(&desc);
    tracing::info!(?verdict, ?decided_by, index, "Attestation chain evaluated");

    Ok(ChainEvaluation {
        verdict,
        detail,
        decided_by,
        certificate_index: Some(index),
        certificate_fingerprint: Some(fingerprint),
        key_description: Some(desc),
    })
}

/// TEE enforced root of trust first. The software list is only consulted
/// when the TEE list has no root of trust, and never turns an `Unlocked`
/// verdict back into `Locked`.
fn decide(desc: &KeyDescription) -> (Verdict, String, Option<Enforcement>) {
    let mut verdict = Verdict::CriticalError;
    let mut detail = ATTESTATION_UNAVAILABLE.to_string();
    let mut decided_by = None;

    if let Some(rot) = desc.tee_enforced.root_of_trust() {
        verdict = boot_verdict(rot);
        detail = describe(rot);
        decided_by = Some(Enforcement::TrustedEnvironment);
    }

    if decided_by.is_none() && verdict != Verdict::Unlocked {
        if let Some(rot) = desc.software_enforced.root_of_trust() {
            verdict = boot_verdict(rot);
            detail = describe(rot);
            decided_by = Some(Enforcement::Software);
        }
    }

    if decided_by.is_none() {
        tracing::error!("Attestation carries no root of trust");
    }
    (verdict, detail, decided_by)
}

fn boot_verdict(rot: &RootOfTrust) -> Verdict {
    if rot.is_trusted_boot() {
        Verdict::Locked
    } else {
        Verdict::Unlocked
    }
}

fn describe(rot: &RootOfTrust) -> String {
    format!(
        "Verified Boot State: {}\nIs Device Locked: {}",
        rot.verified_boot_state().label(),
        rot.is_device_locked()
    )
}

/// Whether the certificate's attestation declares the `ATTEST_KEY` purpose.
///
/// Advisory only: any parse failure yields `false`.
pub fn has_attestation_purpose<C: AttestationCertificate + ?Sized>(
    cert: &C,
    config: &AttestationConfig,
) -> bool {
    match KeyDescription::from_certificate(cert, config.max_der_depth) {
        Ok(desc) => desc.declared_purposes().contains(&KM_PURPOSE_ATTEST_KEY),
        Err(err) => {
            tracing::debug!(error = %err, "Purpose check failed");
            false
        }
    }
}
