//! Path Lexer
//!
//! Tokenizes path expressions. Every token carries its byte offset so the
//! parser can point at the offending spot.

use crate::core::names::{is_name_char, is_name_start_char};

/// Path token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Slash,       // /
    DoubleSlash, // //
    Dot,         // .
    DoubleDot,   // ..
    At,          // @
    Pipe,        // |
    Star,        // *
    DoubleColon, // ::

    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]

    Number(f64),
    /// NCName or `prefix:local`
    Name(String),
    /// `prefix:*`
    PrefixWildcard(String),

    /// Anything the grammar has no use for (operators, literals, ...)
    Unexpected(char),

    Eof,
}

/// A token and where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Path lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    /// Advance by n bytes
    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if matches!(c, ' ' | '\t' | '\n' | '\r') {
                self.advance(1);
            } else {
                break;
            }
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Spanned {
        self.skip_whitespace();
        let offset = self.pos;
        let Some(c) = self.peek() else {
            return Spanned { token: Token::Eof, offset };
        };

        let token = match c {
            '/' => self.one_or_two('/', Token::Slash, Token::DoubleSlash),
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            '.' => self.one_or_two('.', Token::Dot, Token::DoubleDot),
            '@' => self.single(Token::At),
            '|' => self.single(Token::Pipe),
            '*' => self.single(Token::Star),
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            '[' => self.single(Token::LeftBracket),
            ']' => self.single(Token::RightBracket),
            ':' if self.peek_at(1) == Some(':') => {
                self.advance(2);
                Token::DoubleColon
            }
            '0'..='9' => self.read_number(),
            c if is_name_start_char(c) && c != ':' => self.read_name(),
            c => {
                self.advance(c.len_utf8());
                Token::Unexpected(c)
            }
        };
        Spanned { token, offset }
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance(1);
        token
    }

    fn one_or_two(&mut self, repeat: char, one: Token, two: Token) -> Token {
        self.advance(1);
        if self.peek() == Some(repeat) {
            self.advance(1);
            two
        } else {
            one
        }
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(1);
        }
        if self.peek() == Some('.') {
            self.advance(1);
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance(1);
            }
        }
        let value = self.input[start..self.pos].parse().unwrap_or(f64::NAN);
        Token::Number(value)
    }

    fn read_ncname(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) && c != ':' {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    /// Read an NCName, a `prefix:local` QName or a `prefix:*` wildcard
    fn read_name(&mut self) -> Token {
        let prefix = self.read_ncname();
        if self.peek() != Some(':') || self.peek_at(1) == Some(':') {
            return Token::Name(prefix.to_string());
        }
        match self.peek_at(1) {
            Some('*') => {
                self.advance(2);
                Token::PrefixWildcard(prefix.to_string())
            }
            Some(c) if is_name_start_char(c) && c != ':' => {
                self.advance(1);
                let local = self.read_ncname();
                Token::Name(format!("{prefix}:{local}"))
            }
            _ => Token::Name(prefix.to_string()),
        }
    }

    /// Tokenize entire input (without the trailing `Eof`)
    pub fn tokenize(&mut self) -> Vec<Spanned> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token();
            if spanned.token == Token::Eof {
                break;
            }
            tokens.push(spanned);
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_simple_path() {
        assert_eq!(
            tokens("/root/child"),
            vec![
                Token::Slash,
                Token::Name("root".to_string()),
                Token::Slash,
                Token::Name("child".to_string()),
            ]
        );
    }

    #[test]
    fn test_descendant_and_parent() {
        assert_eq!(
            tokens("//item/.."),
            vec![Token::DoubleSlash, Token::Name("item".to_string()), Token::Slash, Token::DoubleDot]
        );
    }

    #[test]
    fn test_axis_and_qname() {
        assert_eq!(
            tokens("child::soap:Body/ns:*"),
            vec![
                Token::Name("child".to_string()),
                Token::DoubleColon,
                Token::Name("soap:Body".to_string()),
                Token::Slash,
                Token::PrefixWildcard("ns".to_string()),
            ]
        );
    }

    #[test]
    fn test_names_with_dots_and_dashes() {
        assert_eq!(tokens("a.b-c"), vec![Token::Name("a.b-c".to_string())]);
    }

    #[test]
    fn test_predicate_number() {
        let toks = tokens("item[2]");
        assert_eq!(toks[2], Token::Number(2.0));
    }

    #[test]
    fn test_offsets() {
        let spans = Lexer::new("a | b").tokenize();
        assert_eq!(spans.iter().map(|s| s.offset).collect::<Vec<_>>(), vec![0, 2, 4]);
    }

    #[test]
    fn test_unexpected() {
        assert_eq!(tokens("a=b")[1], Token::Unexpected('='));
    }
}
