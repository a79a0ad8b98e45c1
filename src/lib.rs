pub mod eval;
pub mod lex;

pub use eval::{
    Assoc, Evaluator, MalformedExpressionError, Op, StackUnderflowError, UnknownOperatorError,
};
pub use lex::{Lexer, LexicalError, Token, TokenKind};

/// Evaluates an arithmetic expression in one pass over its tokens.
///
/// Recognizes integers and decimals, `+ - * /` and unary minus; no
/// parentheses. Division by zero follows IEEE-754 rather than failing.
pub fn evaluate(expression: &str) -> Result<f64, miette::Error> {
    Evaluator::new(expression).run()
}
