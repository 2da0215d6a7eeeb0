//! Payload validation
//!
//! A decode that passes the strategy can still be a misread. Validators run
//! before the debouncer; a rejection is treated exactly like "no detection".
use std::sync::LazyLock;

use regex::Regex;

use crate::error::InvalidDetectionFormat;
use crate::types::{BarcodeFormat, DecodeResult};

pub trait PayloadValidator: Send {
    fn validate(&self, result: &DecodeResult) -> Result<(), InvalidDetectionFormat>;
}

fn reject(result: &DecodeResult, reason: impl Into<String>) -> InvalidDetectionFormat {
    InvalidDetectionFormat {
        text: result.text.clone(),
        reason: reason.into(),
    }
}

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("digit pattern is valid"));

/// GS1 element string separator
const GROUP_SEPARATOR: char = '\u{1d}';

/// C0 controls that never appear in real payloads. Line breaks, tabs and the
/// GS1 separator are ordinary data.
fn is_stray_control(c: char) -> bool {
    c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r' | GROUP_SEPARATOR)
}

/// Rejects blank payloads and payloads with stray control characters
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicValidator;

impl PayloadValidator for BasicValidator {
    fn validate(&self, result: &DecodeResult) -> Result<(), InvalidDetectionFormat> {
        if result.text.trim().is_empty() {
            return Err(reject(result, "empty payload"));
        }
        if result.text.chars().any(is_stray_control) {
            return Err(reject(result, "control characters in payload"));
        }
        Ok(())
    }
}

/// `BasicValidator` plus length and check-digit rules for retail symbologies
#[derive(Debug, Clone, Copy, Default)]
pub struct RetailCodeValidator;

impl RetailCodeValidator {
    pub fn new() -> Self {
        Self
    }

    fn expected_len(format: BarcodeFormat) -> Option<usize> {
        match format {
            BarcodeFormat::Ean13 => Some(13),
            BarcodeFormat::Ean8 => Some(8),
            BarcodeFormat::UpcA => Some(12),
            _ => None,
        }
    }
}

/// GS1 mod-10: weights 3,1,3,... from the digit left of the check digit
pub(crate) fn gs1_check_digit_ok(code: &str) -> bool {
    let digits: Vec<u32> = code.chars().filter_map(|c| c.to_digit(10)).collect();
    let Some((&check, body)) = digits.split_last() else {
        return false;
    };

    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
        .sum();
    (10 - sum % 10) % 10 == check
}

impl PayloadValidator for RetailCodeValidator {
    fn validate(&self, result: &DecodeResult) -> Result<(), InvalidDetectionFormat> {
        BasicValidator.validate(result)?;

        let Some(len) = Self::expected_len(result.format) else {
            return Ok(());
        };
        if result.text.len() != len || !DIGITS.is_match(&result.text) {
            return Err(reject(
                result,
                format!("{} needs exactly {} digits", result.format, len),
            ));
        }
        if !gs1_check_digit_ok(&result.text) {
            return Err(reject(result, "check digit mismatch"));
        }
        Ok(())
    }
}
