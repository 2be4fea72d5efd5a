//! Size tokens and sector arithmetic.

use std::str::FromStr;

use crate::errors::{LayoutError, SpecError};

const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;
const TIB: u64 = 1 << 40;

/// A parsed partition size request.
///
/// `10g` asks for ten binary gigabytes. A trailing `+` marks the
/// partition as its disk's grow partition; the byte count is then a
/// floor, raised to absorb all free space when the disk commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSpec {
    bytes: u64,
    grow: bool,
}

impl SizeSpec {
    /// Parse a size token: `<number>[m|g|t][+]`.
    ///
    /// Plain numbers are bytes. Suffixes are binary (`m` = 2^20,
    /// `g` = 2^30, `t` = 2^40) and case-insensitive. A fixed size of
    /// zero is rejected; a zero grow floor (`0+`) is legal, with the
    /// real size resolved at commit.
    pub fn parse(token: &str) -> Result<Self, SpecError> {
        let invalid = || SpecError::InvalidSizeFormat(token.to_string());

        let (body, grow) = match token.strip_suffix('+') {
            Some(body) => (body, true),
            None => (token, false),
        };

        let (digits, multiplier) = match body.chars().next_back() {
            Some(c) if c.eq_ignore_ascii_case(&'m') => (&body[..body.len() - 1], MIB),
            Some(c) if c.eq_ignore_ascii_case(&'g') => (&body[..body.len() - 1], GIB),
            Some(c) if c.eq_ignore_ascii_case(&'t') => (&body[..body.len() - 1], TIB),
            Some(_) => (body, 1),
            None => return Err(invalid()),
        };

        let magnitude: u64 = digits.parse().map_err(|_| invalid())?;
        let bytes = magnitude.checked_mul(multiplier).ok_or_else(invalid)?;

        if bytes == 0 && !grow {
            return Err(invalid());
        }

        Ok(Self { bytes, grow })
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// True when this partition absorbs its disk's free space at commit.
    pub fn grows(&self) -> bool {
        self.grow
    }
}

impl FromStr for SizeSpec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Convert a byte count to whole sectors, discarding any remainder.
pub fn bytes_to_sectors(bytes: u64, sector_size: u32) -> Result<u64, LayoutError> {
    if sector_size == 0 {
        return Err(LayoutError::InvalidSectorSize(sector_size));
    }
    Ok(bytes / u64::from(sector_size))
}

/// Render a byte count for human-facing output.
pub fn display_bytes(bytes: u64) -> String {
    if bytes >= TIB {
        format!("{:.1} TiB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else {
        format!("{bytes} B")
    }
}
