//! Typed program inputs.
//!
//! Inputs arrive as strings (`"100u64"`, `"aleo1…"`, `"{ owner: … }"`) and are
//! classified and checked here before anything is proved or broadcast.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use shroud_address::{ADDRESS_PREFIX, Address, AddressError};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralType {
    U8,
    U16,
    U32,
    U64,
    U128,
    I8,
    I16,
    I32,
    I64,
    I128,
    Field,
    Group,
    Scalar,
    Boolean,
    Address,
    Record,
}

const INTEGER_TYPES: [(&str, LiteralType); 10] = [
    ("u128", LiteralType::U128),
    ("i128", LiteralType::I128),
    ("u64", LiteralType::U64),
    ("i64", LiteralType::I64),
    ("u32", LiteralType::U32),
    ("i32", LiteralType::I32),
    ("u16", LiteralType::U16),
    ("i16", LiteralType::I16),
    ("u8", LiteralType::U8),
    ("i8", LiteralType::I8),
];

const FIELD_TYPES: [(&str, LiteralType); 3] = [
    ("field", LiteralType::Field),
    ("group", LiteralType::Group),
    ("scalar", LiteralType::Scalar),
];

impl LiteralType {
    fn is_signed(&self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::I128
        )
    }

    /// Inclusive integer bounds, `None` for non-integer types.
    fn bounds(&self) -> Option<(i128, u128)> {
        let bounds = match self {
            Self::U8 => (0, u8::MAX as u128),
            Self::U16 => (0, u16::MAX as u128),
            Self::U32 => (0, u32::MAX as u128),
            Self::U64 => (0, u64::MAX as u128),
            Self::U128 => (0, u128::MAX),
            Self::I8 => (i8::MIN as i128, i8::MAX as u128),
            Self::I16 => (i16::MIN as i128, i16::MAX as u128),
            Self::I32 => (i32::MIN as i128, i32::MAX as u128),
            Self::I64 => (i64::MIN as i128, i64::MAX as u128),
            Self::I128 => (i128::MIN, i128::MAX as u128),
            _ => return None,
        };
        Some(bounds)
    }
}

impl fmt::Display for LiteralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::Field => "field",
            Self::Group => "group",
            Self::Scalar => "scalar",
            Self::Boolean => "boolean",
            Self::Address => "address",
            Self::Record => "record",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum LiteralError {
    #[error("input is empty")]
    Empty,
    #[error("cannot determine the type of `{0}`")]
    UnknownType(String),
    #[error("`{text}` is not a valid {ty} literal")]
    InvalidNumber { ty: LiteralType, text: String },
    #[error("`{text}` is out of range for {ty}")]
    OutOfRange { ty: LiteralType, text: String },
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

/// A program input tagged with its ledger type.
/// The original text is kept as the canonical form sent to the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Literal {
    ty: LiteralType,
    text: String,
}

impl Literal {
    pub fn ty(&self) -> LiteralType {
        self.ty
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Parses every input, failing on the first bad one with its index.
    pub fn parse_all<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<Literal>, (usize, LiteralError)> {
        inputs
            .iter()
            .enumerate()
            .map(|(i, s)| s.as_ref().parse().map_err(|e| (i, e)))
            .collect()
    }
}

impl FromStr for Literal {
    type Err = LiteralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(LiteralError::Empty);
        }

        let ty = if text.starts_with('{') {
            validate_record(text)?;
            LiteralType::Record
        } else if text == "true" || text == "false" {
            LiteralType::Boolean
        } else if text.starts_with(ADDRESS_PREFIX) {
            text.parse::<Address>()?;
            LiteralType::Address
        } else if let Some((body, ty)) = split_suffix(text, &INTEGER_TYPES) {
            check_integer(body, ty, text)?;
            ty
        } else if let Some((body, ty)) = split_suffix(text, &FIELD_TYPES) {
            if !is_digits(body) {
                return Err(LiteralError::InvalidNumber {
                    ty,
                    text: text.to_string(),
                });
            }
            ty
        } else {
            return Err(LiteralError::UnknownType(text.to_string()));
        };

        Ok(Self {
            ty,
            text: text.to_string(),
        })
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

fn split_suffix<'a>(
    text: &'a str,
    table: &[(&str, LiteralType)],
) -> Option<(&'a str, LiteralType)> {
    table
        .iter()
        .find_map(|(suffix, ty)| text.strip_suffix(suffix).map(|body| (body, *ty)))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn check_integer(body: &str, ty: LiteralType, text: &str) -> Result<(), LiteralError> {
    let invalid = || LiteralError::InvalidNumber {
        ty,
        text: text.to_string(),
    };
    let out_of_range = || LiteralError::OutOfRange {
        ty,
        text: text.to_string(),
    };

    let (negative, digits) = match body.strip_prefix('-') {
        Some(rest) if ty.is_signed() => (true, rest),
        Some(_) => return Err(invalid()),
        None => (false, body),
    };
    if digits.starts_with('_') || digits.ends_with('_') {
        return Err(invalid());
    }
    let digits: String = digits.chars().filter(|c| *c != '_').collect();
    if !is_digits(&digits) {
        return Err(invalid());
    }

    let (min, max) = ty.bounds().ok_or_else(invalid)?;
    let magnitude: u128 = digits.parse().map_err(|_| out_of_range())?;
    if negative {
        // |min| fits in u128 for every signed width
        if magnitude > min.unsigned_abs() {
            return Err(out_of_range());
        }
    } else if magnitude > max {
        return Err(out_of_range());
    }
    Ok(())
}

/// Checks the `{ key: value, ... }` shape of a record plaintext.
/// Entry values are opaque to us; the proof backend decodes them.
fn validate_record(text: &str) -> Result<(), LiteralError> {
    let malformed = |msg: &str| LiteralError::MalformedRecord(msg.to_string());

    let inner = text
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| malformed("record must be wrapped in braces"))?;

    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed("unbalanced braces"))?;
            }
            ',' if depth == 0 => {
                entries.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(malformed("unbalanced braces"));
    }
    entries.push(&inner[start..]);

    if entries.len() == 1 && entries[0].trim().is_empty() {
        return Err(malformed("record has no entries"));
    }

    let mut has_owner = false;
    for entry in entries {
        let (key, value) = entry
            .split_once(':')
            .ok_or_else(|| malformed("entry is missing `:`"))?;
        let key = key.trim();
        if !crate::is_identifier(key) {
            return Err(LiteralError::MalformedRecord(format!(
                "invalid entry name `{}`",
                key
            )));
        }
        if value.trim().is_empty() {
            return Err(LiteralError::MalformedRecord(format!(
                "entry `{}` has no value",
                key
            )));
        }
        has_owner |= key == "owner";
    }

    if !has_owner {
        return Err(malformed("record has no `owner` entry"));
    }
    Ok(())
}
