//! Input Encoding
//!
//! Documents are parsed as UTF-8. UTF-16 input (BOM or `<\0` sniffing) is
//! transcoded first; a UTF-8 BOM is skipped.

use crate::error::{ParseError, ParseErrorKind, Position};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        match input {
            [0xFF, 0xFE, ..] | [b'<', 0x00, ..] => XmlEncoding::Utf16Le,
            [0xFE, 0xFF, ..] | [0x00, b'<', ..] => XmlEncoding::Utf16Be,
            _ => XmlEncoding::Utf8,
        }
    }
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Return the input as UTF-8, borrowing when no conversion is needed
pub fn to_utf8(input: &[u8]) -> Result<Cow<'_, [u8]>, ParseError> {
    match XmlEncoding::detect(input) {
        XmlEncoding::Utf8 => {
            let body = input.strip_prefix(UTF8_BOM).unwrap_or(input);
            match std::str::from_utf8(body) {
                Ok(_) => Ok(Cow::Borrowed(body)),
                Err(e) => {
                    let offset = e.valid_up_to();
                    let end = (offset + e.error_len().unwrap_or(1)).min(body.len());
                    Err(ParseError::at(
                        ParseErrorKind::InvalidEncoding,
                        &body[offset..end],
                        body,
                        offset,
                    ))
                }
            }
        }
        XmlEncoding::Utf16Le => utf16_to_utf8(input, [0xFF, 0xFE], u16::from_le_bytes).map(Cow::Owned),
        XmlEncoding::Utf16Be => utf16_to_utf8(input, [0xFE, 0xFF], u16::from_be_bytes).map(Cow::Owned),
    }
}

fn utf16_to_utf8(input: &[u8], bom: [u8; 2], unit: fn([u8; 2]) -> u16) -> Result<Vec<u8>, ParseError> {
    let bytes = input.strip_prefix(&bom[..]).unwrap_or(input);
    if bytes.len() % 2 != 0 {
        return Err(ParseError::new(
            ParseErrorKind::InvalidEncoding,
            "odd number of bytes in UTF-16 input",
            Position::default(),
        ));
    }
    let code_units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| unit([chunk[0], chunk[1]]))
        .collect();
    String::from_utf16(&code_units)
        .map(String::into_bytes)
        .map_err(|e| ParseError::new(ParseErrorKind::InvalidEncoding, e.to_string(), Position::default()))
}
