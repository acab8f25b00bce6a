use std::fmt;
use std::sync::Arc;

use crate::errors::{ScoutError, ScoutResult};

/// Longest pattern accepted, in bytes
pub const MAX_PATTERN_LEN: usize = 255;

/// An immutable byte pattern shared read-only by every worker.
///
/// Cloning is cheap: all clones point at the same bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Pattern {
    bytes: Arc<[u8]>,
}

impl Pattern {
    /// Creates a pattern from raw bytes, rejecting empty and oversize input
    pub fn new(bytes: impl Into<Vec<u8>>) -> ScoutResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ScoutError::invalid_pattern("pattern must not be empty"));
        }
        if bytes.len() > MAX_PATTERN_LEN {
            return Err(ScoutError::pattern_too_long(bytes.len()));
        }
        Ok(Self {
            bytes: bytes.into(),
        })
    }

    /// Decodes a hex string such as `"DEADbeef"` into a pattern.
    ///
    /// Digits are taken in pairs. A trailing unpaired digit becomes a byte of
    /// its own value, so `"ABC"` decodes to `[0xAB, 0x0C]`. Anything but hex
    /// digits is rejected, including a `0x` prefix.
    pub fn from_hex(digits: &str) -> ScoutResult<Self> {
        if digits.is_empty() {
            return Err(ScoutError::invalid_pattern("pattern must not be empty"));
        }
        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ScoutError::invalid_pattern(format!(
                "'{}' is not a hex digit",
                bad
            )));
        }
        if digits.len() > 2 * MAX_PATTERN_LEN {
            return Err(ScoutError::pattern_too_long(digits.len().div_ceil(2)));
        }

        let bytes = digits
            .as_bytes()
            .chunks(2)
            .map(|pair| pair.iter().fold(0u8, |acc, &d| (acc << 4) | nibble(d)))
            .collect::<Vec<_>>();

        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Input is validated as ASCII hex before this is called.
fn nibble(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({})", self)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.bytes.iter() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
