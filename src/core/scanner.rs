//! SIMD-accelerated XML scanning using memchr
//!
//! Uses memchr crate for fast byte searching with SIMD acceleration:
//! - SSE2 (default x86_64)
//! - AVX2 (runtime detection)
//! - NEON (aarch64)

use memchr::{memchr, memmem};

/// Cursor over the input with delimiter search
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    #[inline]
    pub fn new(input: &'a [u8]) -> Self {
        Scanner { input, pos: 0 }
    }

    #[inline]
    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    #[inline]
    pub fn slice(&self, start: usize, end: usize) -> &'a [u8] {
        &self.input[start..end]
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    #[inline]
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.remaining().starts_with(prefix)
    }

    /// Skip whitespace characters (space, tab, newline, carriage return)
    #[inline]
    pub fn skip_whitespace(&mut self) -> usize {
        let start = self.pos;
        while self.pos < self.input.len() && is_whitespace(self.input[self.pos]) {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Find next '<' (tag start)
    #[inline]
    pub fn find_tag_start(&self) -> Option<usize> {
        memchr(b'<', self.remaining()).map(|i| self.pos + i)
    }

    /// Find the absolute position of a multi-byte delimiter such as `-->`
    #[inline]
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        memmem::find(self.remaining(), needle).map(|i| self.pos + i)
    }

    /// Find a byte outside of quoted literals
    pub fn find_unquoted(&self, target: u8) -> Option<usize> {
        let mut quote: Option<u8> = None;
        for (i, &b) in self.remaining().iter().enumerate() {
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => quote = Some(b),
                None if b == target => return Some(self.pos + i),
                None => {}
            }
        }
        None
    }

    /// Consume a run of bytes that can belong to a name token
    pub fn take_name_token(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || matches!(b, b'/' | b'>' | b'=' | b'<' | b'"' | b'\'' | b'?' | b'[' | b';') {
                break;
            }
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }
}

/// Check if byte is XML whitespace
#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_tag_start() {
        let mut scanner = Scanner::new(b"hello <world>");
        assert_eq!(scanner.find_tag_start(), Some(6));
        scanner.advance(7);
        assert_eq!(scanner.find_tag_start(), None);
    }

    #[test]
    fn test_find_unquoted_skips_literals() {
        let scanner = Scanner::new(b"a x='>' y=\"'>\">rest");
        assert_eq!(scanner.find_unquoted(b'>'), Some(14));
    }

    #[test]
    fn test_take_name_token() {
        let mut scanner = Scanner::new(b"ns:item attr='1'>");
        assert_eq!(scanner.take_name_token(), b"ns:item");
        assert_eq!(scanner.skip_whitespace(), 1);
        assert_eq!(scanner.take_name_token(), b"attr");
    }

    #[test]
    fn test_find_multibyte() {
        let scanner = Scanner::new(b"<!-- note -->tail");
        assert_eq!(scanner.find(b"-->"), Some(10));
    }
}
