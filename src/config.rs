use serde::{Deserialize, Serialize};

use crate::error::{AttestationError, Result};

/// Deepest DER nesting a well-formed `KeyDescription` needs
/// (KeyDescription > AuthorizationList > [704] > RootOfTrust > field).
pub const MIN_DER_DEPTH: u32 = 4;
pub const DEFAULT_DER_DEPTH: u32 = 16;

/// Order in which the certificate chain is scanned for the attestation extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    /// Last certificate (the root) first.
    #[default]
    RootToLeaf,
    LeafToRoot,
}

impl ScanOrder {
    /// Chain indices in scan order, for a chain stored leaf first.
    pub fn indices(self, len: usize) -> Vec<usize> {
        match self {
            ScanOrder::RootToLeaf => (0..len).rev().collect(),
            ScanOrder::LeafToRoot => (0..len).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(default)]
pub struct AttestationConfig {
    pub scan_order: ScanOrder,
    /// Maximum DER nesting accepted when decoding untrusted extensions.
    pub max_der_depth: u32,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            scan_order: ScanOrder::default(),
            max_der_depth: DEFAULT_DER_DEPTH,
        }
    }
}

impl AttestationConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AttestationError::Config(format!("Invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_der_depth < MIN_DER_DEPTH {
            return Err(AttestationError::Config(format!(
                "max_der_depth must be at least {}, got {}",
                MIN_DER_DEPTH, self.max_der_depth
            )));
        }
        Ok(())
    }
}
