//! Native and issued-currency amounts.
//!
//! Amounts are parsed from decimal strings without floating point. XRP is
//! converted to drops (truncated at 6 fractional digits); issued values are
//! clamped to 16 fractional digits rounding down, then normalised to the
//! ledger's mantissa/exponent form.

use std::fmt;

use serde::Serialize;

use crate::error::{WalletError, WalletResult};
use crate::ledger::keys::{decode_address, is_valid_address};

pub const DROPS_PER_XRP: u64 = 1_000_000;

/// Total XRP supply in drops.
pub const MAX_DROPS: u64 = 100_000_000_000 * DROPS_PER_XRP;

const MIN_MANTISSA: u64 = 1_000_000_000_000_000;
const MIN_EXPONENT: i32 = -96;
const MAX_EXPONENT: i32 = 80;
const MAX_FRACTION_DIGITS: usize = 16;

fn invalid(msg: impl Into<String>) -> WalletError {
    WalletError::Serialization(msg.into())
}

/// Split `"-12.34"` into (negative, integer digits, fraction digits).
fn split_decimal(input: &str) -> WalletResult<(bool, &str, &str)> {
    let s = input.trim();
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part) {
        return Err(invalid(format!("'{}' is not a decimal number", input)));
    }
    Ok((negative, int_part, frac_part))
}

/// Convert an XRP decimal string to drops.
pub fn parse_xrp_to_drops(input: &str) -> WalletResult<u64> {
    let (negative, int_part, frac_part) = split_decimal(input)?;
    if negative {
        return Err(invalid("XRP amount must not be negative"));
    }
    let frac: String = frac_part
        .chars()
        .chain(std::iter::repeat('0'))
        .take(6)
        .collect();
    let whole: u64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid("XRP amount too large"))?
    };
    let drops = whole
        .checked_mul(DROPS_PER_XRP)
        .and_then(|d| d.checked_add(frac.parse::<u64>().unwrap_or(0)))
        .filter(|&d| d <= MAX_DROPS)
        .ok_or_else(|| invalid("XRP amount exceeds total supply"))?;
    Ok(drops)
}

/// Render drops as an XRP decimal string.
pub fn drops_to_xrp(drops: u64) -> String {
    let whole = drops / DROPS_PER_XRP;
    let frac = drops % DROPS_PER_XRP;
    if frac == 0 {
        whole.to_string()
    } else {
        let frac = format!("{:06}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

/// Issued-currency value in normalised mantissa/exponent form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedValue {
    negative: bool,
    mantissa: u64,
    exponent: i32,
}

impl IssuedValue {
    pub const ZERO: IssuedValue = IssuedValue {
        negative: false,
        mantissa: 0,
        exponent: 0,
    };

    /// Parse a decimal string, keeping at most 16 fractional digits (rounded down).
    pub fn parse(input: &str) -> WalletResult<Self> {
        let (negative, int_part, frac_part) = split_decimal(input)?;
        let frac_part = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS)];

        let digits = format!("{}{}", int_part, frac_part);
        let digits = digits.trim_start_matches('0');
        let mut exponent = -(frac_part.len() as i32);
        if digits.is_empty() {
            return Ok(Self::ZERO);
        }

        // Keep 16 significant digits, rounding down.
        let kept = &digits[..digits.len().min(16)];
        exponent += (digits.len() - kept.len()) as i32;
        let mut mantissa: u64 = kept.parse().map_err(|_| invalid("amount out of range"))?;

        while mantissa < MIN_MANTISSA {
            mantissa *= 10;
            exponent -= 1;
        }

        if exponent > MAX_EXPONENT {
            return Err(invalid("amount too large"));
        }
        if exponent < MIN_EXPONENT {
            return Ok(Self::ZERO);
        }
        Ok(Self {
            negative,
            mantissa,
            exponent,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub fn is_negative(&self) -> bool {
        self.negative && !self.is_zero()
    }

    /// 64-bit wire form (without currency and issuer).
    pub fn to_bits(&self) -> u64 {
        if self.is_zero() {
            return 0x8000_0000_0000_0000;
        }
        let mut bits = 0x8000_0000_0000_0000 | self.mantissa;
        if !self.negative {
            bits |= 0x4000_0000_0000_0000;
        }
        bits | (((self.exponent + 97) as u64) << 54)
    }
}

impl fmt::Display for IssuedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let digits = self.mantissa.to_string();
        let sign = if self.negative { "-" } else { "" };
        let point = digits.len() as i32 + self.exponent;
        let text = if point <= 0 {
            format!("0.{}{}", "0".repeat((-point) as usize), digits)
        } else if point as usize >= digits.len() {
            format!("{}{}", digits, "0".repeat(point as usize - digits.len()))
        } else {
            let (int_part, frac_part) = digits.split_at(point as usize);
            format!("{}.{}", int_part, frac_part)
        };
        let text = if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            text
        };
        write!(f, "{}{}", sign, text)
    }
}

/// Currency code of an issued amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    code: String,
    bytes: [u8; 20],
}

impl Currency {
    /// Accepts 3-12 alphanumeric characters (not `XRP`) or 40 hex characters.
    ///
    /// Three-character codes use the standard layout; longer ones are stored
    /// as left-aligned ASCII in the 160-bit form.
    pub fn parse(code: &str) -> WalletResult<Self> {
        let code = code.trim();
        let mut bytes = [0u8; 20];

        if code.len() == 40 && code.bytes().all(|b| b.is_ascii_hexdigit()) {
            let raw = hex::decode(code).map_err(|_| invalid("invalid hex currency"))?;
            bytes.copy_from_slice(&raw);
            if bytes[0] == 0 {
                return Err(invalid("hex currency must not use the standard layout"));
            }
        } else if (3..=12).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            if code.eq_ignore_ascii_case("XRP") {
                return Err(invalid("XRP is not an issued currency"));
            }
            if code.len() == 3 {
                bytes[12..15].copy_from_slice(code.as_bytes());
            } else {
                bytes[..code.len()].copy_from_slice(code.as_bytes());
            }
        } else {
            return Err(invalid(format!("invalid currency code '{}'", code)));
        }

        Ok(Self {
            code: code.to_string(),
            bytes,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn to_bytes(&self) -> [u8; 20] {
        self.bytes
    }
}

pub fn is_valid_currency(code: &str) -> bool {
    Currency::parse(code).is_ok()
}

/// Issued-currency amount: value, currency and issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedAmount {
    pub value: IssuedValue,
    pub currency: Currency,
    pub issuer: String,
}

impl IssuedAmount {
    pub fn new(value: &str, currency: &str, issuer: &str) -> WalletResult<Self> {
        if !is_valid_address(issuer) {
            return Err(invalid(format!("invalid issuer address '{}'", issuer)));
        }
        Ok(Self {
            value: IssuedValue::parse(value)?,
            currency: Currency::parse(currency)?,
            issuer: issuer.to_string(),
        })
    }
}

/// Amount of a payment or trust line limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    /// Native XRP, in drops.
    Xrp(u64),
    Issued(IssuedAmount),
}

impl Amount {
    pub fn xrp(value: &str) -> WalletResult<Self> {
        Ok(Amount::Xrp(parse_xrp_to_drops(value)?))
    }

    pub fn is_positive(&self) -> bool {
        match self {
            Amount::Xrp(drops) => *drops > 0,
            Amount::Issued(a) => !a.value.is_zero() && !a.value.is_negative(),
        }
    }

    /// Wire form: 8 bytes native, 48 bytes issued.
    pub fn to_bytes(&self) -> WalletResult<Vec<u8>> {
        match self {
            Amount::Xrp(drops) => {
                if *drops > MAX_DROPS {
                    return Err(invalid("XRP amount exceeds total supply"));
                }
                Ok((drops | 0x4000_0000_0000_0000).to_be_bytes().to_vec())
            }
            Amount::Issued(a) => {
                let issuer = decode_address(&a.issuer)
                    .ok_or_else(|| invalid(format!("invalid issuer address '{}'", a.issuer)))?;
                let mut out = Vec::with_capacity(48);
                out.extend_from_slice(&a.value.to_bits().to_be_bytes());
                out.extend_from_slice(&a.currency.to_bytes());
                out.extend_from_slice(&issuer);
                Ok(out)
            }
        }
    }
}

/// JSON view for display.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AmountView {
    Drops(String),
    Issued {
        value: String,
        currency: String,
        issuer: String,
    },
}

impl From<&Amount> for AmountView {
    fn from(amount: &Amount) -> Self {
        match amount {
            Amount::Xrp(drops) => AmountView::Drops(drops.to_string()),
            Amount::Issued(a) => AmountView::Issued {
                value: a.value.to_string(),
                currency: a.currency.code().to_string(),
                issuer: a.issuer.clone(),
            },
        }
    }
}
