//! Core XML parsing primitives
//!
//! This module contains the fundamental building blocks for XML parsing:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Names: XML 1.0 name and character classes
//! - Entities: XML entity decoding with Cow (zero-copy when possible)
//! - Encoding: UTF-16 detection and conversion to UTF-8
//! - DTD: internal subset declarations used for validation

pub mod dtd;
pub mod encoding;
pub mod entities;
pub mod names;
pub mod scanner;
