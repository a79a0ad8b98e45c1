use std::fmt::Display;

use miette::{Diagnostic, Error, NamedSource, SourceSpan};
use thiserror::Error;

use crate::lex::{Lexer, TokenKind};

#[derive(Error, Debug, Diagnostic)]
#[error("operator `{op}` is missing an operand")]
#[diagnostic(help("every operator needs a value on each side it applies to"))]
pub struct StackUnderflowError {
    #[source_code]
    src: NamedSource<String>,

    #[label("in this expression")]
    bad_bit: SourceSpan,

    pub op: Op,
}

#[derive(Error, Debug, Diagnostic)]
#[error("expected a single result, found {values} values")]
#[diagnostic(help(
    "an empty expression produces no value; adjacent numbers with no operator between them produce more than one"
))]
pub struct MalformedExpressionError {
    #[source_code]
    src: NamedSource<String>,

    #[label("in this expression")]
    bad_bit: SourceSpan,

    pub values: usize,
}

#[derive(Error, Debug, Diagnostic)]
#[error("`{literal}` is not an operator the evaluator knows")]
#[diagnostic(help(
    "identifiers are reserved by the lexical grammar but carry no meaning here; this is an internal invariant, not an input problem"
))]
pub struct UnknownOperatorError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this token")]
    bad_bit: SourceSpan,

    pub literal: String,
}

/// The operator-descriptor table: each operator carries its precedence and
/// associativity, read-only for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Unary negation, written `-` but resolved by context.
    Neg,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

impl Op {
    pub fn precedence(self) -> u8 {
        match self {
            Op::Neg => 3,
            Op::Mul | Op::Div => 2,
            Op::Add | Op::Sub => 1,
        }
    }

    pub fn assoc(self) -> Assoc {
        match self {
            Op::Neg => Assoc::Right,
            Op::Add | Op::Sub | Op::Mul | Op::Div => Assoc::Left,
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Neg | Op::Sub => write!(f, "-"),
            Op::Add => write!(f, "+"),
            Op::Mul => write!(f, "*"),
            Op::Div => write!(f, "/"),
        }
    }
}

/// Two-stack operator-precedence engine. Reduces operators as soon as
/// precedence allows instead of emitting postfix, so no tree is built.
pub struct Evaluator<'de> {
    lexer: Lexer<'de>,
    values: Vec<f64>,
    operators: Vec<Op>,
    previous: Option<TokenKind>,
}

impl<'de> Evaluator<'de> {
    pub fn new(input: &'de str) -> Self {
        Evaluator {
            lexer: Lexer::new(input),
            values: Vec::new(),
            operators: Vec::new(),
            previous: None,
        }
    }

    /// Consumes the whole token sequence and yields the single result.
    pub fn run(mut self) -> Result<f64, Error> {
        while let Some(token) = self.lexer.next() {
            let token = token?;
            match token.kind {
                TokenKind::Number(n) => self.values.push(n),
                TokenKind::Minus => {
                    let op = if self.unary_position() { Op::Neg } else { Op::Sub };
                    self.shift(op)?;
                }
                TokenKind::Plus => self.shift(Op::Add)?,
                TokenKind::Star => self.shift(Op::Mul)?,
                TokenKind::Slash => self.shift(Op::Div)?,
                TokenKind::Ident => {
                    return Err(UnknownOperatorError {
                        src: NamedSource::new("<expression>", self.lexer.whole().to_string()),
                        bad_bit: SourceSpan::from(
                            self.lexer.byte - token.literal.len()..self.lexer.byte,
                        ),
                        literal: token.literal.to_string(),
                    }
                    .into());
                }
            }
            self.previous = Some(token.kind);
        }

        while let Some(op) = self.operators.pop() {
            self.reduce(op)?;
        }

        match self.values.as_slice() {
            [result] => Ok(*result),
            _ => Err(MalformedExpressionError {
                src: NamedSource::new("<expression>", self.lexer.whole().to_string()),
                bad_bit: SourceSpan::from(0..self.lexer.whole().len()),
                values: self.values.len(),
            }
            .into()),
        }
    }

    /// A `-` is unary at the start of the expression or right after
    /// another operator.
    fn unary_position(&self) -> bool {
        matches!(
            self.previous,
            None | Some(
                TokenKind::Minus | TokenKind::Plus | TokenKind::Star | TokenKind::Slash
            )
        )
    }

    fn shift(&mut self, incoming: Op) -> Result<(), Error> {
        while let Some(&top) = self.operators.last() {
            let reduce_first = top.precedence() > incoming.precedence()
                || (top.precedence() == incoming.precedence()
                    && incoming.assoc() == Assoc::Left);
            if !reduce_first {
                break;
            }
            self.operators.pop();
            self.reduce(top)?;
        }
        self.operators.push(incoming);
        Ok(())
    }

    fn reduce(&mut self, op: Op) -> Result<(), Error> {
        if let Op::Neg = op {
            let x = self.pop_value(op)?;
            self.values.push(-x);
            return Ok(());
        }

        let right = self.pop_value(op)?;
        let left = self.pop_value(op)?;
        // division by zero keeps IEEE-754 semantics: inf, -inf or NaN
        self.values.push(match op {
            Op::Add => left + right,
            Op::Sub => left - right,
            Op::Mul => left * right,
            Op::Div => left / right,
            Op::Neg => unreachable!("handled above"),
        });
        Ok(())
    }

    fn pop_value(&mut self, op: Op) -> Result<f64, Error> {
        self.values.pop().ok_or_else(|| {
            StackUnderflowError {
                src: NamedSource::new("<expression>", self.lexer.whole().to_string()),
                bad_bit: SourceSpan::from(0..self.lexer.whole().len()),
                op,
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(input: &str) -> f64 {
        Evaluator::new(input).run().expect("evaluates")
    }

    fn eval_err(input: &str) -> Error {
        Evaluator::new(input).run().expect_err("fails")
    }

    #[test]
    fn single_number() {
        assert_eq!(eval("42"), 42.0);
        assert_eq!(eval("12.5"), 12.5);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(eval("2+3*4"), 14.0);
        assert_eq!(eval("3*4+2"), 14.0);
        assert_eq!(eval("2+8/4"), 4.0);
    }

    #[test]
    fn equal_precedence_reduces_left_to_right() {
        assert_eq!(eval("8-3-2"), 3.0);
        assert_eq!(eval("8/4/2"), 1.0);
        assert_eq!(eval("1-2+3"), 2.0);
    }

    #[test]
    fn unary_minus() {
        assert_eq!(eval("-3+4"), 1.0);
        assert_eq!(eval("2*-3"), -6.0);
        assert_eq!(eval("-2*3"), -6.0);
        assert_eq!(eval("-5"), -5.0);
    }

    #[test]
    fn double_negation() {
        assert_eq!(eval("--3"), 3.0);
        assert_eq!(eval("---3"), -3.0);
    }

    #[test]
    fn division_by_zero_is_not_an_error() {
        assert_eq!(eval("5/0"), f64::INFINITY);
        assert_eq!(eval("-5/0"), f64::NEG_INFINITY);
        assert!(eval("0/0").is_nan());
    }

    #[test]
    fn whitespace_tolerated() {
        assert_eq!(eval(" 3 + 4 "), 7.0);
    }

    #[test]
    fn leading_dot_decimals() {
        assert_eq!(eval(".5+.5"), 1.0);
    }

    #[test]
    fn empty_input_is_malformed() {
        let err = eval_err("");
        let err = err
            .downcast_ref::<MalformedExpressionError>()
            .expect("malformed");
        assert_eq!(err.values, 0);
    }

    #[test]
    fn adjacent_numbers_are_malformed() {
        let err = eval_err("3 4");
        let err = err
            .downcast_ref::<MalformedExpressionError>()
            .expect("malformed");
        assert_eq!(err.values, 2);
    }

    #[test]
    fn lone_operator_underflows() {
        let err = eval_err("+");
        let err = err
            .downcast_ref::<StackUnderflowError>()
            .expect("underflow");
        assert_eq!(err.op, Op::Add);
    }

    #[test]
    fn trailing_operator_underflows() {
        let err = eval_err("5-");
        assert!(err.downcast_ref::<StackUnderflowError>().is_some());
    }

    #[test]
    fn identifier_is_rejected_as_unknown_operator() {
        let err = eval_err("1+ans");
        let err = err
            .downcast_ref::<UnknownOperatorError>()
            .expect("unknown operator");
        assert_eq!(err.literal, "ans");
    }

    #[test]
    fn unary_binds_tighter_than_division() {
        // -(8)/4/2, not -(8/4/2) by accident of stacking
        assert_eq!(eval("-8/4/2"), -1.0);
        assert_eq!(eval("6/-2"), -3.0);
    }
}
