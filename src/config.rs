//! Parser and engine configuration

use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Options for the built-in document parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Enforce `<!ELEMENT>`/`<!ATTLIST>` declarations of an internal DTD subset
    pub validate_dtd: bool,
    /// Keep text nodes that consist only of whitespace
    pub keep_whitespace: bool,
    /// Location the document was loaded from; `None` means the working directory
    pub base: Option<PathBuf>,
    /// Deepest element nesting accepted; the root element is depth 1
    pub max_depth: usize,
}

pub const DEFAULT_MAX_DEPTH: usize = 256;

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            validate_dtd: true,
            keep_whitespace: false,
            base: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    pub fn validate_dtd(mut self, on: bool) -> Self {
        self.validate_dtd = on;
        self
    }

    pub fn keep_whitespace(mut self, on: bool) -> Self {
        self.keep_whitespace = on;
        self
    }

    pub fn base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Configuration for [`crate::engine::XmlEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub parse: ParseOptions,
    /// Number of compiled path expressions kept in the LRU cache
    pub path_cache_capacity: NonZeroUsize,
}

pub const DEFAULT_PATH_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => unreachable!(),
};

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            parse: ParseOptions::default(),
            path_cache_capacity: DEFAULT_PATH_CACHE_CAPACITY,
        }
    }
}
