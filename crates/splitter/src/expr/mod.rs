//! A small boolean expression language for event filters.
//!
//! Expressions read string fields by name and support comparison,
//! membership, string operators (`contains`, `startsWith`, `endsWith`,
//! `matches`), arithmetic, and the built-ins in [`functions::BUILTINS`].

pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;

use engine_core::{Error, Result};

pub use eval::{Env, ExprValue};
use parser::Expr;

/// A compiled expression.
#[derive(Debug, Clone)]
pub struct Program {
    source: String,
    root: Expr,
}

impl Program {
    /// Parses `source` and checks every function it calls exists.
    pub fn compile(source: &str) -> Result<Self> {
        let root = parser::parse(lexer::tokenize(source)?)?;
        check_calls(&root)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn run(&self, env: &Env) -> Result<ExprValue> {
        eval::eval(&self.root, env)
    }
}

fn check_calls(expr: &Expr) -> Result<()> {
    match expr {
        Expr::Call(name, args) => {
            if !functions::is_builtin(name) {
                return Err(Error::expression(format!("unknown function {}", name)));
            }
            args.iter().try_for_each(check_calls)
        }
        Expr::List(items) => items.iter().try_for_each(check_calls),
        Expr::Not(inner) | Expr::Neg(inner) => check_calls(inner),
        Expr::Binary(_, left, right) => {
            check_calls(left)?;
            check_calls(right)
        }
        Expr::Literal(_) | Expr::Field(_) => Ok(()),
    }
}
