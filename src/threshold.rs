//! Score threshold sent with each prediction request.

use anyhow::{anyhow, Result};
use std::fmt;

/// Minimum confidence in `[0, 1]` the service should keep.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Threshold(f64);

impl Threshold {
    pub const DEFAULT: Threshold = Threshold(0.5);

    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(anyhow!("threshold must be between 0 and 1, got {}", value));
        }
        Ok(Self(value))
    }

    /// Slider semantics: out-of-range input snaps to the nearest bound.
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::DEFAULT;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("threshold must be a number, got '{}'", raw.trim()))?;
        Self::new(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Two-decimal form used for labels and the query parameter.
    ///
    /// Rounds the exact binary value, with exact halves going up
    /// (0.125 gives "0.13", 0.045 gives "0.04").
    pub fn formatted(self) -> String {
        to_fixed_2(self.0)
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

/// `{:.1100}` prints every digit of any `f64`, so the digit after the
/// hundredths decides the rounding without a second binary rounding step.
fn to_fixed_2(value: f64) -> String {
    let exact = format!("{:.1100}", value);
    let (whole, fraction) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let digit = |i: usize| u64::from(fraction.as_bytes().get(i).map_or(0, |b| b - b'0'));
    let whole: u64 = whole.parse().unwrap_or(0);
    let mut cents = whole * 100 + digit(0) * 10 + digit(1);
    if digit(2) >= 5 {
        cents += 1;
    }
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// The optional slider and its mirrored label.
#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdControl {
    value: Threshold,
    label: String,
}

impl ThresholdControl {
    pub fn new(initial: Threshold) -> Self {
        Self {
            value: initial,
            label: initial.formatted(),
        }
    }

    /// Handles an input event; the label always follows the value.
    pub fn input(&mut self, raw: f64) {
        self.value = Threshold::clamped(raw);
        self.label = self.value.formatted();
    }

    pub fn value(&self) -> Threshold {
        self.value
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}
