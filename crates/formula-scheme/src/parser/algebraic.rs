//! Reader for infix arithmetic.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! addition       := multiplication (('+' | '-') multiplication)*
//! multiplication := exponentiation (('*' | '/') exponentiation)*
//! exponentiation := term ('^' exponentiation)?
//! term           := NUMBER | SYMBOL | '(' addition ')'
//! ```
//!
//! `+ - * /` associate to the left and `^` to the right. There is no unary `+`/`-`.

use std::fmt;

use crate::atom::atom;
use crate::error::{SchemeError, SchemeResult};
use crate::expr::Expr;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Op(char),
    Atom(Expr),
    LParen,
    RParen,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Op(op) => write!(f, "{op}"),
            Token::Atom(expr) => write!(f, "{expr}"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn next_token(&mut self) -> SchemeResult<Token> {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}

        let Some(ch) = self.chars.next() else {
            return Ok(Token::Eof);
        };

        match ch {
            '+' | '-' | '*' | '/' | '^' => Ok(Token::Op(ch)),
            '(' => Ok(Token::LParen),
            ')' => Ok(Token::RParen),
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some(c) = self.chars.next_if(|c| is_word_char(*c)) {
                    word.push(c);
                }
                Ok(Token::Atom(atom(&word)))
            }
            other => Err(SchemeError::syntax(
                "unexpected character",
                other.to_string(),
            )),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokenize all of `input`, ending with [`Token::Eof`]. Fails on the first unexpected character.
pub fn tokenize(input: &str) -> SchemeResult<Vec<Token>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token == Token::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> SchemeResult<Self> {
        let mut lexer = Lexer::new(input);
        let lookahead = lexer.next_token()?;
        Ok(Self { lexer, lookahead })
    }

    fn bump(&mut self) -> SchemeResult<Token> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.lookahead, next))
    }

    fn error<T>(&self, expected: &str) -> SchemeResult<T> {
        Err(SchemeError::syntax(
            format!("expected {expected}"),
            self.lookahead.to_string(),
        ))
    }

    /// Consume the lookahead if it is one of `ops`.
    fn match_op(&mut self, ops: &[char]) -> SchemeResult<Option<char>> {
        match self.lookahead {
            Token::Op(op) if ops.contains(&op) => {
                self.bump()?;
                Ok(Some(op))
            }
            _ => Ok(None),
        }
    }

    fn parse(&mut self) -> SchemeResult<Expr> {
        let tree = self.addition()?;
        if self.lookahead != Token::Eof {
            return self.error("end of input");
        }
        Ok(tree)
    }

    fn addition(&mut self) -> SchemeResult<Expr> {
        let mut left = self.multiplication()?;
        while let Some(op) = self.match_op(&['+', '-'])? {
            let right = self.multiplication()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn multiplication(&mut self) -> SchemeResult<Expr> {
        let mut left = self.exponentiation()?;
        while let Some(op) = self.match_op(&['*', '/'])? {
            let right = self.exponentiation()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn exponentiation(&mut self) -> SchemeResult<Expr> {
        let base = self.term()?;
        match self.match_op(&['^'])? {
            Some(op) => {
                let exponent = self.exponentiation()?;
                Ok(binary(op, base, exponent))
            }
            None => Ok(base),
        }
    }

    fn term(&mut self) -> SchemeResult<Expr> {
        match &self.lookahead {
            Token::Atom(expr) => {
                let expr = expr.clone();
                self.bump()?;
                Ok(expr)
            }
            Token::LParen => {
                self.bump()?;
                let tree = self.addition()?;
                if self.lookahead != Token::RParen {
                    return self.error("')'");
                }
                self.bump()?;
                Ok(tree)
            }
            _ => self.error("term"),
        }
    }
}

fn binary(op: char, left: Expr, right: Expr) -> Expr {
    Expr::List(vec![Expr::Symbol(op.to_string()), left, right])
}

pub fn parse(input: &str) -> SchemeResult<Expr> {
    Parser::new(input)?.parse()
}
