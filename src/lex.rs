use std::fmt::Display;

use miette::{Diagnostic, Error, LabeledSpan, NamedSource, SourceSpan, miette};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
#[error("Unexpected character '{token}'")]
#[diagnostic(help("remove or correct the character: `{token}`"))]
pub struct LexicalError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this character")]
    bad_bit: SourceSpan,

    pub token: char,
}

impl LexicalError {
    pub fn line(&self) -> usize {
        self.src.inner()[..=self.bad_bit.offset()].lines().count()
    }

    pub fn offset(&self) -> usize {
        self.bad_bit.offset()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: &'de str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    Minus,
    Plus,
    Star,
    Slash,
    /// Reserved by the lexical grammar; the evaluator rejects it.
    Ident,
    Number(f64),
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.literal;
        match self.kind {
            TokenKind::Minus => write!(f, "MINUS {lit} null"),
            TokenKind::Plus => write!(f, "PLUS {lit} null"),
            TokenKind::Star => write!(f, "STAR {lit} null"),
            TokenKind::Slash => write!(f, "SLASH {lit} null"),
            TokenKind::Ident => write!(f, "IDENTIFIER {lit} null"),
            TokenKind::Number(n) => {
                if n == n.trunc() {
                    write!(f, "NUMBER {lit} {n}.0")
                } else {
                    write!(f, "NUMBER {lit} {n}")
                }
            }
        }
    }
}

pub struct Lexer<'de> {
    whole: &'de str,
    rest: &'de str,
    pub byte: usize,
}

impl<'de> Lexer<'de> {
    pub fn new(input: &'de str) -> Self {
        Lexer {
            whole: input,
            rest: input,
            byte: 0,
        }
    }

    pub fn whole(&self) -> &'de str {
        self.whole
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut chars = self.rest.chars();
            let c = chars.next()?;
            let literal = &self.rest[..c.len_utf8()];
            let cur = self.rest;
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Start {
                Ident,
                Number,
            }

            let process = |kind: TokenKind| Some(Ok(Token { kind, literal }));

            let started = match c {
                '-' => return process(TokenKind::Minus),
                '+' => return process(TokenKind::Plus),
                '*' => return process(TokenKind::Star),
                '/' => return process(TokenKind::Slash),
                'a'..='z' => Start::Ident,
                '0'..='9' => Start::Number,
                // a lone dot only starts a number when a digit follows
                '.' if self.rest.starts_with(|c: char| c.is_ascii_digit()) => Start::Number,
                ' ' | '\r' | '\t' | '\n' => continue, // Skip whitespace
                c => {
                    return Some(Err(LexicalError {
                        src: NamedSource::new("<expression>", self.whole.to_string()),
                        bad_bit: SourceSpan::from(self.byte - c.len_utf8()..self.byte),
                        token: c,
                    }
                    .into()));
                }
            };

            match started {
                Start::Ident => {
                    let first_non_ident = cur
                        .find(|c: char| !c.is_ascii_lowercase())
                        .unwrap_or(cur.len());

                    let literal = &cur[..first_non_ident];

                    let extra_bytes = literal.len() - c.len_utf8();
                    self.byte += extra_bytes;
                    self.rest = &self.rest[extra_bytes..];

                    return Some(Ok(Token {
                        kind: TokenKind::Ident,
                        literal,
                    }));
                }
                Start::Number => {
                    // digits, then at most one dot and its trailing digits;
                    // a second dot ends the literal
                    let bytes = cur.as_bytes();
                    let mut end = 0;
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                    if end < bytes.len() && bytes[end] == b'.' {
                        end += 1;
                        while end < bytes.len() && bytes[end].is_ascii_digit() {
                            end += 1;
                        }
                    }

                    let literal = &cur[..end];

                    let extra_bytes = literal.len() - c.len_utf8();
                    self.byte += extra_bytes;
                    self.rest = &self.rest[extra_bytes..];

                    let n = match literal.parse() {
                        Ok(n) => n,
                        Err(e) => {
                            return Some(Err(miette!(
                                code = "ParseFloatError",
                                url =
                                    "https://doc.rust-lang.org/std/num/struct.ParseFloatError.html",
                                labels = vec![LabeledSpan::at(
                                    self.byte - literal.len()..self.byte,
                                    "this numeric literal"
                                )],
                                "{e}",
                            )
                            .with_source_code(self.whole.to_string())));
                        }
                    };

                    return Some(Ok(Token {
                        kind: TokenKind::Number(n),
                        literal,
                    }));
                }
            }
        }
    }
}
