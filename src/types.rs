//! Core value types shared by strategies, arbiter and scan loop
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbology of a decoded code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarcodeFormat {
    Qr,
    Code128,
    Ean13,
    Ean8,
    Code39,
    UpcA,
    UpcE,
    Codabar,
    I2of5,
    DataMatrix,
    Unknown,
}

impl BarcodeFormat {
    /// One-dimensional (linear) symbologies
    pub fn is_linear(&self) -> bool {
        matches!(
            self,
            BarcodeFormat::Code128
                | BarcodeFormat::Ean13
                | BarcodeFormat::Ean8
                | BarcodeFormat::Code39
                | BarcodeFormat::UpcA
                | BarcodeFormat::UpcE
                | BarcodeFormat::Codabar
                | BarcodeFormat::I2of5
        )
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BarcodeFormat::Qr => "QR",
            BarcodeFormat::Code128 => "CODE128",
            BarcodeFormat::Ean13 => "EAN13",
            BarcodeFormat::Ean8 => "EAN8",
            BarcodeFormat::Code39 => "CODE39",
            BarcodeFormat::UpcA => "UPC_A",
            BarcodeFormat::UpcE => "UPC_E",
            BarcodeFormat::Codabar => "CODABAR",
            BarcodeFormat::I2of5 => "I2OF5",
            BarcodeFormat::DataMatrix => "DATA_MATRIX",
            BarcodeFormat::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A single successful decode. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult {
    pub text: String,
    pub format: BarcodeFormat,
    /// Name of the strategy that produced the result
    pub strategy_used: &'static str,
}

impl DecodeResult {
    pub fn new(text: impl Into<String>, format: BarcodeFormat, strategy_used: &'static str) -> Self {
        Self {
            text: text.into(),
            format,
            strategy_used,
        }
    }
}

/// A detection that passed validation and the cooldown window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionEvent {
    pub result: DecodeResult,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl DetectionEvent {
    /// Decoded text, the only field the application layer needs
    pub fn text(&self) -> &str {
        &self.result.text
    }
}

/// Lifecycle of one decode strategy within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Uninitialized,
    Initializing,
    Ready,
    Unavailable,
    Failed,
}

impl StrategyState {
    /// Never consulted again this session
    pub fn is_terminal(&self) -> bool {
        matches!(self, StrategyState::Unavailable | StrategyState::Failed)
    }
}

/// Identifies a strategy in the configured priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Native,
    Ml,
    Linear,
    Qr,
}

impl StrategyKind {
    pub fn default_order() -> Vec<StrategyKind> {
        vec![
            StrategyKind::Native,
            StrategyKind::Ml,
            StrategyKind::Linear,
            StrategyKind::Qr,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_formats() {
        assert!(BarcodeFormat::Ean13.is_linear());
        assert!(BarcodeFormat::I2of5.is_linear());
        assert!(!BarcodeFormat::Qr.is_linear());
        assert!(!BarcodeFormat::DataMatrix.is_linear());
    }

    #[test]
    fn test_terminal_states() {
        assert!(StrategyState::Failed.is_terminal());
        assert!(StrategyState::Unavailable.is_terminal());
        assert!(!StrategyState::Initializing.is_terminal());
        assert!(!StrategyState::Ready.is_terminal());
    }

    #[test]
    fn test_strategy_kind_serde_names() {
        let json = serde_json::to_string(&StrategyKind::default_order()).unwrap();
        assert_eq!(json, r#"["native","ml","linear","qr"]"#);
    }
}
