//! Path Parser
//!
//! Recursive descent parser for the location-path subset:
//!
//! ```text
//! Expr      := Path ('|' Path)*
//! Path      := '/' RelPath? | '//' RelPath | RelPath
//! RelPath   := Step (('/' | '//') Step)*
//! Step      := '.' | '..' | (Axis '::')? NodeTest Predicate*
//! NodeTest  := '*' | Prefix ':*' | QName | 'node()' | 'text()'
//! Predicate := '[' (Number | 'last()' | Expr) ']'
//! ```

use super::lexer::{Lexer, Spanned, Token};
use crate::error::PathError;

/// Path expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(LocationPath),
    /// Union of two expressions (|)
    Union(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// Starts at the document node
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// Location step in a path
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Predicate>,
}

impl Step {
    fn new(axis: Axis, node_test: NodeTest) -> Self {
        Step {
            axis,
            node_test,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    FollowingSibling,
    PrecedingSibling,
    Self_,
    Namespace,
}

impl Axis {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "child" => Some(Axis::Child),
            "descendant" => Some(Axis::Descendant),
            "descendant-or-self" => Some(Axis::DescendantOrSelf),
            "parent" => Some(Axis::Parent),
            "ancestor" => Some(Axis::Ancestor),
            "following-sibling" => Some(Axis::FollowingSibling),
            "preceding-sibling" => Some(Axis::PrecedingSibling),
            "self" => Some(Axis::Self_),
            "namespace" => Some(Axis::Namespace),
            _ => None,
        }
    }

    /// Reverse axes count proximity positions backwards from the context node
    pub fn is_reverse(self) -> bool {
        matches!(self, Axis::Ancestor | Axis::PrecedingSibling | Axis::Parent)
    }
}

/// Node test in a location step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// `*`: any node of the axis' principal type
    Any,
    /// Name (possibly `prefix:local`) of the principal type
    Name(String),
    /// `prefix:*`
    PrefixWildcard(String),
    /// `node()`
    Node,
    /// `text()`
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `[n]`
    Position(f64),
    /// `[last()]`
    Last,
    /// `[path]`: true when the path selects anything
    Exists(Expr),
}

/// Path parser
pub struct Parser<'a> {
    input: &'a str,
    lexer: Lexer<'a>,
    current: Spanned,
    peeked: Option<Spanned>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Parser {
            input,
            lexer,
            current,
            peeked: None,
        }
    }

    /// Parse a complete expression
    pub fn parse(&mut self) -> Result<Expr, PathError> {
        if self.current.token == Token::Eof {
            return Err(self.error("empty path expression"));
        }
        let expr = self.parse_union()?;
        if self.current.token != Token::Eof {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    fn advance(&mut self) {
        self.current = match self.peeked.take() {
            Some(next) => next,
            None => self.lexer.next_token(),
        };
    }

    /// Check the token after the current one without consuming it
    fn peek_is(&mut self, token: &Token) -> bool {
        let next = match self.peeked.take() {
            Some(next) => next,
            None => self.lexer.next_token(),
        };
        let matched = next.token == *token;
        self.peeked = Some(next);
        matched
    }

    fn error(&self, message: impl Into<String>) -> PathError {
        PathError::new(message, self.input, self.current.offset)
    }

    fn unexpected(&self) -> PathError {
        match &self.current.token {
            Token::Eof => self.error("unexpected end of expression"),
            Token::At => self.error("attribute selection is not supported"),
            token => self.error(format!("unexpected {}", describe(token))),
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), PathError> {
        if self.current.token == token {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_union(&mut self) -> Result<Expr, PathError> {
        let mut left = Expr::Path(self.parse_path()?);
        while self.current.token == Token::Pipe {
            self.advance();
            let right = Expr::Path(self.parse_path()?);
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_path(&mut self) -> Result<LocationPath, PathError> {
        let mut steps = Vec::new();
        let absolute = match self.current.token {
            Token::Slash => {
                self.advance();
                // A lone `/` selects the document node
                if !self.starts_step() {
                    return Ok(LocationPath { absolute: true, steps });
                }
                true
            }
            Token::DoubleSlash => {
                self.advance();
                steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
                true
            }
            _ => false,
        };

        steps.push(self.parse_step()?);
        loop {
            match self.current.token {
                Token::Slash => self.advance(),
                Token::DoubleSlash => {
                    self.advance();
                    steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
                }
                _ => break,
            }
            steps.push(self.parse_step()?);
        }
        Ok(LocationPath { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.current.token,
            Token::Dot | Token::DoubleDot | Token::Star | Token::Name(_) | Token::PrefixWildcard(_) | Token::At
        )
    }

    fn parse_step(&mut self) -> Result<Step, PathError> {
        match self.current.token {
            Token::Dot => {
                self.advance();
                return Ok(Step::new(Axis::Self_, NodeTest::Node));
            }
            Token::DoubleDot => {
                self.advance();
                return Ok(Step::new(Axis::Parent, NodeTest::Node));
            }
            _ => {}
        }

        let mut axis = Axis::Child;
        if let Token::Name(name) = self.current.token.clone() {
            if self.peek_is(&Token::DoubleColon) {
                axis = match Axis::from_name(&name) {
                    Some(axis) => axis,
                    None if name == "attribute" => return Err(self.error("attribute selection is not supported")),
                    None => return Err(self.error(format!("unknown axis {name:?}"))),
                };
                self.advance();
                self.advance();
            }
        }

        let node_test = self.parse_node_test()?;
        let mut step = Step::new(axis, node_test);
        while self.current.token == Token::LeftBracket {
            self.advance();
            step.predicates.push(self.parse_predicate()?);
            self.expect(Token::RightBracket)?;
        }
        Ok(step)
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, PathError> {
        let call = self.peek_is(&Token::LeftParen);
        let test = match &self.current.token {
            Token::Star => NodeTest::Any,
            Token::PrefixWildcard(prefix) => NodeTest::PrefixWildcard(prefix.clone()),
            Token::Name(name) if call => {
                let test = match name.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    other => return Err(self.error(format!("unsupported function {other}()"))),
                };
                self.advance();
                self.advance();
                if self.current.token != Token::RightParen {
                    return Err(self.unexpected());
                }
                test
            }
            Token::Name(name) => NodeTest::Name(name.clone()),
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(test)
    }

    fn parse_predicate(&mut self) -> Result<Predicate, PathError> {
        let call = self.peek_is(&Token::LeftParen);
        match &self.current.token {
            Token::Number(n) => {
                let n = *n;
                self.advance();
                Ok(Predicate::Position(n))
            }
            Token::Name(name) if name == "last" && call => {
                self.advance();
                self.advance();
                self.expect(Token::RightParen)?;
                Ok(Predicate::Last)
            }
            _ => Ok(Predicate::Exists(self.parse_union()?)),
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Slash => "'/'".to_string(),
        Token::DoubleSlash => "'//'".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::DoubleDot => "'..'".to_string(),
        Token::At => "'@'".to_string(),
        Token::Pipe => "'|'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::DoubleColon => "'::'".to_string(),
        Token::LeftParen => "'('".to_string(),
        Token::RightParen => "')'".to_string(),
        Token::LeftBracket => "'['".to_string(),
        Token::RightBracket => "']'".to_string(),
        Token::Number(n) => format!("number {n}"),
        Token::Name(name) => format!("name {name:?}"),
        Token::PrefixWildcard(prefix) => format!("'{prefix}:*'"),
        Token::Unexpected(c) => format!("{c:?}"),
        Token::Eof => "end of expression".to_string(),
    }
}

/// Parse a path expression
pub fn parse(input: &str) -> Result<Expr, PathError> {
    Parser::new(input).parse()
}
