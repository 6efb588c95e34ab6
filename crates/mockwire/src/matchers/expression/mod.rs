//! Constrained expression matcher.
//!
//! Evaluates a boolean expression over the extracted request value, bound as `it`,
//! e.g. `int.Parse(it) > 1` or `it.StartsWith("abc") && it.Length < 10`.
//! Only comparisons, arithmetic, logical operators and a fixed set of string and
//! conversion members are available; there is no access to I/O or host state.
//!
//! # Module Structure
//!
//! - `parser` - Tokenizer and parser producing an `Expr` tree

mod parser;

use super::matcher::{MatchBehaviour, MatchScore, Matcher};
use crate::error::ConfigError;
use parser::{BinaryOp, Conversion, Expr, Member, UnaryOp};
use std::cmp::Ordering;

/// Runtime value produced while evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
        }
    }

    fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Str(s) => s.clone(),
        }
    }
}

type EvalResult = Result<Value, String>;

fn eval(expr: &Expr, it: &str) -> EvalResult {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::It => Ok(Value::Str(it.to_string())),
        Expr::Unary(op, inner) => match (op, eval(inner, it)?) {
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
            (op, value) => Err(format!("cannot apply {op:?} to {}", value.type_name())),
        },
        Expr::Binary(BinaryOp::And, left, right) => {
            if !as_bool(eval(left, it)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(as_bool(eval(right, it)?)?))
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            if as_bool(eval(left, it)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(as_bool(eval(right, it)?)?))
        }
        Expr::Binary(op, left, right) => binary(*op, eval(left, it)?, eval(right, it)?),
        Expr::Convert(conversion, inner) => convert(*conversion, eval(inner, it)?),
        Expr::Member(target, member, args) => {
            let target = eval(target, it)?;
            let args = args
                .iter()
                .map(|arg| eval(arg, it))
                .collect::<Result<Vec<_>, _>>()?;
            member_call(target, *member, args)
        }
    }
}

fn as_bool(value: Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(format!("expected bool, found {}", other.type_name())),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> EvalResult {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => None,
            }
            .ok_or_else(|| {
                format!(
                    "cannot compare {} with {}",
                    left.type_name(),
                    right.type_name()
                )
            })?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (l @ Value::Str(_), r) | (l, r @ Value::Str(_)) => {
                Ok(Value::Str(l.render() + &r.render()))
            }
            (l, r) => Err(format!("cannot add {} and {}", l.type_name(), r.type_name())),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
                return Err(format!(
                    "arithmetic on {} and {}",
                    left.type_name(),
                    right.type_name()
                ));
            };
            let result = match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div if *b == 0.0 => return Err("division by zero".to_string()),
                BinaryOp::Div => a / b,
                _ if *b == 0.0 => return Err("division by zero".to_string()),
                _ => a % b,
            };
            Ok(Value::Number(result))
        }
        BinaryOp::And => Ok(Value::Bool(as_bool(left)? && as_bool(right)?)),
        BinaryOp::Or => Ok(Value::Bool(as_bool(left)? || as_bool(right)?)),
    }
}

fn convert(conversion: Conversion, value: Value) -> EvalResult {
    match (conversion, value) {
        (Conversion::IsNullOrEmpty, Value::Null) => Ok(Value::Bool(true)),
        (Conversion::IsNullOrEmpty, Value::Str(s)) => Ok(Value::Bool(s.is_empty())),
        (Conversion::Integer, Value::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(|n| Value::Number(n as f64))
            .map_err(|e| format!("'{s}' is not an integer: {e}")),
        (Conversion::Float, Value::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|e| format!("'{s}' is not a number: {e}")),
        (Conversion::Integer, Value::Number(n)) => Ok(Value::Number(n.trunc())),
        (Conversion::Float, Value::Number(n)) => Ok(Value::Number(n)),
        (conversion, value) => Err(format!(
            "cannot apply {conversion:?} to {}",
            value.type_name()
        )),
    }
}

fn member_call(target: Value, member: Member, args: Vec<Value>) -> EvalResult {
    let Value::Str(s) = target else {
        return Err(format!(
            "{member:?} requires a string, found {}",
            target.type_name()
        ));
    };
    Ok(match member {
        Member::Length => Value::Number(s.chars().count() as f64),
        Member::StartsWith => Value::Bool(s.starts_with(string_arg(&args, member)?)),
        Member::EndsWith => Value::Bool(s.ends_with(string_arg(&args, member)?)),
        Member::Contains => Value::Bool(s.contains(string_arg(&args, member)?)),
        Member::ToLower => Value::Str(s.to_lowercase()),
        Member::ToUpper => Value::Str(s.to_uppercase()),
        Member::Trim => Value::Str(s.trim().to_string()),
    })
}

fn string_arg(args: &[Value], member: Member) -> Result<&str, String> {
    match args.first() {
        Some(Value::Str(a)) => Ok(a.as_str()),
        _ => Err(format!("{member:?} expects a string argument")),
    }
}

/// Matcher evaluating a boolean expression against the value.
///
/// Evaluation failures (for example `int.Parse` of a non-number) count as a
/// mismatch rather than an error.
#[derive(Debug, Clone)]
pub struct ExpressionMatcher {
    sources: Vec<String>,
    expressions: Vec<Expr>,
    behaviour: MatchBehaviour,
}

impl ExpressionMatcher {
    pub fn new(expression: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_patterns(vec![expression.into()], MatchBehaviour::AcceptOnMatch)
    }

    pub fn with_patterns(
        sources: Vec<String>,
        behaviour: MatchBehaviour,
    ) -> Result<Self, ConfigError> {
        let expressions = sources
            .iter()
            .map(|source| {
                parser::parse(source).map_err(|message| ConfigError::InvalidExpression {
                    expression: source.clone(),
                    message,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            sources,
            expressions,
            behaviour,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.sources
    }

    fn evaluate(expr: &Expr, input: &str) -> bool {
        matches!(eval(expr, input), Ok(Value::Bool(true)))
    }
}

impl Matcher for ExpressionMatcher {
    fn name(&self) -> &'static str {
        "LinqMatcher"
    }

    fn behaviour(&self) -> MatchBehaviour {
        self.behaviour
    }

    fn raw_score(&self, input: &str) -> f64 {
        MatchScore::from_bool(
            self.expressions
                .iter()
                .any(|expr| Self::evaluate(expr, input)),
        )
    }
}
