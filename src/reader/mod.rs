//! XML Reader Module
//!
//! - SliceReader: strict zero-copy pull reader over a byte slice
//! - Events: XML event types for pull parsing

pub mod events;
pub mod slice;

pub use events::{Attribute, EndElement, StartElement, XmlEvent};
pub use slice::SliceReader;
