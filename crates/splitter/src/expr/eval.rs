//! Tree-walking evaluator.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use engine_core::{Error, Result};

use super::functions;
use super::parser::{BinaryOp, Expr, Literal};

#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ExprValue>),
}

impl ExprValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "array",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "{:?}", v),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for ExprValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ExprValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Variables visible to an expression. Missing names evaluate to nil.
pub type Env = HashMap<String, ExprValue>;

pub fn eval(expr: &Expr, env: &Env) -> Result<ExprValue> {
    match expr {
        Expr::Literal(literal) => Ok(match literal {
            Literal::Nil => ExprValue::Nil,
            Literal::Bool(v) => ExprValue::Bool(*v),
            Literal::Int(v) => ExprValue::Int(*v),
            Literal::Float(v) => ExprValue::Float(*v),
            Literal::Str(v) => ExprValue::Str(v.clone()),
        }),
        Expr::Field(name) => Ok(env.get(name).cloned().unwrap_or(ExprValue::Nil)),
        Expr::List(items) => Ok(ExprValue::List(
            items.iter().map(|i| eval(i, env)).collect::<Result<_>>()?,
        )),
        Expr::Not(inner) => Ok(ExprValue::Bool(!as_bool(eval(inner, env)?, "not")?)),
        Expr::Neg(inner) => match eval(inner, env)? {
            ExprValue::Int(v) => v
                .checked_neg()
                .map(ExprValue::Int)
                .ok_or_else(|| Error::expression("integer overflow")),
            ExprValue::Float(v) => Ok(ExprValue::Float(-v)),
            other => Err(mismatch("-", &other, None)),
        },
        Expr::Binary(BinaryOp::And, left, right) => {
            if !as_bool(eval(left, env)?, "and")? {
                return Ok(ExprValue::Bool(false));
            }
            Ok(ExprValue::Bool(as_bool(eval(right, env)?, "and")?))
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            if as_bool(eval(left, env)?, "or")? {
                return Ok(ExprValue::Bool(true));
            }
            Ok(ExprValue::Bool(as_bool(eval(right, env)?, "or")?))
        }
        Expr::Binary(op, left, right) => binary(*op, eval(left, env)?, eval(right, env)?),
        Expr::Call(name, args) => {
            let args = args.iter().map(|a| eval(a, env)).collect::<Result<Vec<_>>>()?;
            Ok(functions::call(name, &args))
        }
    }
}

fn as_bool(value: ExprValue, op: &str) -> Result<bool> {
    match value {
        ExprValue::Bool(v) => Ok(v),
        other => Err(Error::expression(format!(
            "operator {} expects bool, got {}",
            op,
            other.type_name()
        ))),
    }
}

fn mismatch(op: &str, left: &ExprValue, right: Option<&ExprValue>) -> Error {
    match right {
        Some(right) => Error::expression(format!(
            "invalid operation: {} {} {}",
            left.type_name(),
            op,
            right.type_name()
        )),
        None => Error::expression(format!("invalid operation: {}{}", op, left.type_name())),
    }
}

fn equal(left: &ExprValue, right: &ExprValue) -> bool {
    match (left, right) {
        (ExprValue::Int(_) | ExprValue::Float(_), ExprValue::Int(_) | ExprValue::Float(_)) => {
            left.as_f64() == right.as_f64()
        }
        _ => left == right,
    }
}

fn compare(left: &ExprValue, right: &ExprValue) -> Option<Ordering> {
    match (left, right) {
        (ExprValue::Int(a), ExprValue::Int(b)) => Some(a.cmp(b)),
        (ExprValue::Str(a), ExprValue::Str(b)) => Some(a.cmp(b)),
        _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
    }
}

fn binary(op: BinaryOp, left: ExprValue, right: ExprValue) -> Result<ExprValue> {
    use ExprValue::*;
    let symbol = match op {
        BinaryOp::Eq => return Ok(Bool(equal(&left, &right))),
        BinaryOp::Ne => return Ok(Bool(!equal(&left, &right))),
        BinaryOp::In | BinaryOp::NotIn => {
            let List(items) = &right else {
                return Err(mismatch("in", &left, Some(&right)));
            };
            let found = items.iter().any(|item| equal(&left, item));
            return Ok(Bool(found == (op == BinaryOp::In)));
        }
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Contains => "contains",
        BinaryOp::Matches => "matches",
        BinaryOp::StartsWith => "startsWith",
        BinaryOp::EndsWith => "endsWith",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::And | BinaryOp::Or => unreachable_logic(op)?,
    };

    match op {
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering =
                compare(&left, &right).ok_or_else(|| mismatch(symbol, &left, Some(&right)))?;
            Ok(Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith => match (&left, &right) {
            (Str(a), Str(b)) => Ok(Bool(match op {
                BinaryOp::Contains => a.contains(b.as_str()),
                BinaryOp::StartsWith => a.starts_with(b.as_str()),
                _ => a.ends_with(b.as_str()),
            })),
            _ => Err(mismatch(symbol, &left, Some(&right))),
        },
        BinaryOp::Matches => match (&left, &right) {
            (Str(a), Str(pattern)) => functions::regex(pattern)
                .map(|re| Bool(re.is_match(a)))
                .ok_or_else(|| Error::expression(format!("invalid regex {:?}", pattern))),
            _ => Err(mismatch(symbol, &left, Some(&right))),
        },
        BinaryOp::Add => match (&left, &right) {
            (Str(a), Str(b)) => Ok(Str(format!("{}{}", a, b))),
            (Int(a), Int(b)) => a.checked_add(*b).map(Int).ok_or_else(overflow),
            _ => float_op(symbol, &left, &right, |a, b| a + b),
        },
        BinaryOp::Sub => match (&left, &right) {
            (Int(a), Int(b)) => a.checked_sub(*b).map(Int).ok_or_else(overflow),
            _ => float_op(symbol, &left, &right, |a, b| a - b),
        },
        BinaryOp::Mul => match (&left, &right) {
            (Int(a), Int(b)) => a.checked_mul(*b).map(Int).ok_or_else(overflow),
            _ => float_op(symbol, &left, &right, |a, b| a * b),
        },
        BinaryOp::Div => {
            if right.as_f64() == Some(0.0) {
                return Err(Error::expression("division by zero"));
            }
            float_op(symbol, &left, &right, |a, b| a / b)
        }
        BinaryOp::Rem => match (&left, &right) {
            (Int(_), Int(0)) => Err(Error::expression("division by zero")),
            (Int(a), Int(b)) => a.checked_rem(*b).map(Int).ok_or_else(overflow),
            _ => Err(mismatch(symbol, &left, Some(&right))),
        },
        _ => unreachable_logic(op).map(|_| Nil),
    }
}

fn float_op(
    symbol: &str,
    left: &ExprValue,
    right: &ExprValue,
    f: impl Fn(f64, f64) -> f64,
) -> Result<ExprValue> {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok(ExprValue::Float(f(a, b))),
        _ => Err(mismatch(symbol, left, Some(right))),
    }
}

fn overflow() -> Error {
    Error::expression("integer overflow")
}

fn unreachable_logic(op: BinaryOp) -> Result<&'static str> {
    Err(Error::internal(format!("{:?} is evaluated with short-circuiting", op)))
}
