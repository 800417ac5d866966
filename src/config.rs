//! Transfer configuration, loaded from an optional TOML file.
//!
//! ```toml
//! block_size = 1024          # payload bytes per frame, index not included
//! frames_per_second = 1.0
//! lead_in_ms = 5000
//! inactivity_ms = 2000
//! loss_policy = "log-and-continue"   # or "fail-fast"
//!
//! [symbol]
//! module_scale = 4
//! quiet_zone = 4
//! error_correction = "M"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::encoder::validate_block_size;
use crate::reassembler::{LossPolicy, DEFAULT_INACTIVITY};
use crate::{Result, TransferError, DEFAULT_BLOCK_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

/// Rendering parameters for each frame symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolConfig {
    /// Pixels per QR module.
    pub module_scale: u32,
    /// Light border, in modules.
    pub quiet_zone: u32,
    pub error_correction: ErrorCorrection,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        SymbolConfig {
            module_scale: 4,
            quiet_zone: 4,
            error_correction: ErrorCorrection::M,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Payload bytes per frame. The 8-byte index is not counted.
    pub block_size: usize,
    pub frames_per_second: f64,
    /// Pause before the first frame is shown.
    pub lead_in_ms: u64,
    /// Silence that finalizes a capture session.
    pub inactivity_ms: u64,
    pub loss_policy: LossPolicy,
    pub symbol: SymbolConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            frames_per_second: 1.0,
            lead_in_ms: 5000,
            inactivity_ms: DEFAULT_INACTIVITY.as_millis() as u64,
            loss_policy: LossPolicy::LogAndContinue,
            symbol: SymbolConfig::default(),
        }
    }
}

impl TransferConfig {
    /// Load from a TOML file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: TransferConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_block_size(self.block_size)?;
        if !self.frames_per_second.is_finite() || self.frames_per_second <= 0.0 {
            return Err(TransferError::InvalidConfig(format!(
                "frames_per_second must be positive, got {}",
                self.frames_per_second
            )));
        }
        if self.inactivity_ms == 0 {
            return Err(TransferError::InvalidConfig(
                "inactivity_ms must be greater than zero".into(),
            ));
        }
        if self.symbol.module_scale == 0 {
            return Err(TransferError::InvalidConfig(
                "symbol.module_scale must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn inactivity(&self) -> Duration {
        Duration::from_millis(self.inactivity_ms)
    }

    pub fn lead_in(&self) -> Duration {
        Duration::from_millis(self.lead_in_ms)
    }
}
