//! Tokenizer and recursive-descent parser for matcher expressions.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! or         := and (("||" | "or") and)*
//! and        := equality (("&&" | "and") equality)*
//! equality   := comparison (("==" | "!=") comparison)*
//! comparison := additive (("<" | "<=" | ">" | ">=") additive)*
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/" | "%") unary)*
//! unary      := ("!" | "not" | "-") unary | postfix
//! postfix    := primary ("." IDENT ("(" args ")")?)*
//! primary    := NUMBER | STRING | "true" | "false" | "null" | "it"
//!             | TYPE "." IDENT "(" args ")" | "(" or ")"
//! ```

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Dot,
    Comma,
    LParen,
    RParen,
    Op(&'static str),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Ident(i) => write!(f, "{i}"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Op(op) => write!(f, "{op}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Static conversion functions (`int.Parse(x)` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Integer,
    Float,
    IsNullOrEmpty,
}

/// Instance members callable on a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member {
    Length,
    StartsWith,
    EndsWith,
    Contains,
    ToLower,
    ToUpper,
    Trim,
}

impl Member {
    fn parse(name: &str) -> Option<(Self, usize)> {
        let member = match name {
            "Length" => (Member::Length, 0),
            "StartsWith" => (Member::StartsWith, 1),
            "EndsWith" => (Member::EndsWith, 1),
            "Contains" => (Member::Contains, 1),
            "ToLower" | "ToLowerInvariant" => (Member::ToLower, 0),
            "ToUpper" | "ToUpperInvariant" => (Member::ToUpper, 0),
            "Trim" => (Member::Trim, 0),
            _ => return None,
        };
        Some(member)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    It,
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Convert(Conversion, Box<Expr>),
    Member(Box<Expr>, Member, Vec<Expr>),
}

/// Upper bound on the number of tokens in one expression.
pub const MAX_TOKENS: usize = 4096;
/// Upper bound on parenthesis, argument and unary nesting while parsing.
pub const MAX_NESTING: usize = 64;
/// Upper bound on the depth of the parsed tree, which bounds evaluation recursion.
pub const MAX_TREE_DEPTH: usize = 256;

pub fn parse(source: &str) -> Result<Expr, String> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    if tokens.len() > MAX_TOKENS {
        return Err(format!(
            "expression has {} tokens, at most {MAX_TOKENS} are allowed",
            tokens.len()
        ));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or()?;
    if let Some(token) = parser.peek() {
        return Err(format!("unexpected token '{token}'"));
    }
    if tree_depth(&expr) > MAX_TREE_DEPTH {
        return Err(format!("expression is nested deeper than {MAX_TREE_DEPTH} levels"));
    }
    Ok(expr)
}

/// Depth of the tree, walked with an explicit stack.
fn tree_depth(root: &Expr) -> usize {
    let mut deepest = 0;
    let mut stack = vec![(root, 1)];
    while let Some((expr, depth)) = stack.pop() {
        deepest = deepest.max(depth);
        match expr {
            Expr::Unary(_, inner) | Expr::Convert(_, inner) => stack.push((inner, depth + 1)),
            Expr::Binary(_, left, right) => {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
            Expr::Member(target, _, args) => {
                stack.push((target, depth + 1));
                stack.extend(args.iter().map(|arg| (arg, depth + 1)));
            }
            _ => {}
        }
    }
    deepest
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = chars
                                .get(i + 1)
                                .ok_or_else(|| "unterminated escape".to_string())?;
                            value.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                other => *other,
                            });
                            i += 2;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    // a dot followed by a letter is member access, not a decimal point
                    if chars[i] == '.' && !chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
                        break;
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let op = match two.as_str() {
                    "&&" => Some("&&"),
                    "||" => Some("||"),
                    "==" => Some("=="),
                    "!=" => Some("!="),
                    "<=" => Some("<="),
                    ">=" => Some(">="),
                    _ => None,
                };
                if let Some(op) = op {
                    tokens.push(Token::Op(op));
                    i += 2;
                    continue;
                }
                let op = match c {
                    '<' => "<",
                    '>' => ">",
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    '%' => "%",
                    '!' => "!",
                    other => return Err(format!("unexpected character '{other}'")),
                };
                tokens.push(Token::Op(op));
                i += 1;
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Run `parse` one nesting level deeper, failing past `MAX_NESTING`.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, String>,
    ) -> Result<T, String> {
        if self.depth >= MAX_NESTING {
            return Err(format!("expression nests deeper than {MAX_NESTING} levels"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected '{expected}', found '{token}'")),
            None => Err(format!("expected '{expected}', found end of expression")),
        }
    }

    /// Consume the next token when it is one of the given operators or keywords.
    fn eat_op(&mut self, ops: &[(&str, BinaryOp)]) -> Option<BinaryOp> {
        let found = match self.peek() {
            Some(Token::Op(op)) => ops.iter().find(|(name, _)| *name == *op),
            Some(Token::Ident(word)) => ops.iter().find(|(name, _)| *name == word.as_str()),
            _ => None,
        };
        let op = found.map(|(_, op)| *op)?;
        self.pos += 1;
        Some(op)
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, String>,
    ) -> Result<Expr, String> {
        let mut left = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            let right = next(self)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn or(&mut self) -> Result<Expr, String> {
        self.binary_level(&[("||", BinaryOp::Or), ("or", BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[("&&", BinaryOp::And), ("and", BinaryOp::And)],
            Self::equality,
        )
    }

    fn equality(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, String> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::term)
    }

    fn term(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, String> {
        let op = match self.peek() {
            Some(Token::Op("!")) => Some(UnaryOp::Not),
            Some(Token::Ident(word)) if word == "not" => Some(UnaryOp::Not),
            Some(Token::Op("-")) => Some(UnaryOp::Neg),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                let inner = self.nested(Self::unary)?;
                Ok(Expr::Unary(op, Box::new(inner)))
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            let name = match self.next() {
                Some(Token::Ident(name)) => name,
                other => return Err(format!("expected member name, found {other:?}")),
            };
            let (member, arity) =
                Member::parse(&name).ok_or_else(|| format!("unsupported member '{name}'"))?;
            let args = if member == Member::Length {
                Vec::new()
            } else {
                self.arguments()?
            };
            if args.len() != arity {
                return Err(format!(
                    "'{name}' takes {arity} argument(s), {} given",
                    args.len()
                ));
            }
            expr = Expr::Member(Box::new(expr), member, args);
        }
        Ok(expr)
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, String> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.nested(Self::or)?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                Some(token) => return Err(format!("expected ',' or ')', found '{token}'")),
                None => return Err("unclosed argument list".to_string()),
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::LParen) => {
                let inner = self.nested(Self::or)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(word)) => match word.as_str() {
                "it" => Ok(Expr::It),
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                type_name => self.static_call(type_name),
            },
            Some(token) => Err(format!("unexpected token '{token}'")),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn static_call(&mut self, type_name: &str) -> Result<Expr, String> {
        self.expect(Token::Dot)?;
        let method = match self.next() {
            Some(Token::Ident(method)) => method,
            other => return Err(format!("expected method name, found {other:?}")),
        };
        let conversion = match (type_name, method.as_str()) {
            ("int" | "long" | "Int32" | "Int64", "Parse") => Conversion::Integer,
            ("double" | "decimal" | "float" | "Double" | "Decimal", "Parse") => Conversion::Float,
            ("string" | "String", "IsNullOrEmpty") => Conversion::IsNullOrEmpty,
            _ => return Err(format!("unsupported function '{type_name}.{method}'")),
        };
        let mut args = self.arguments()?;
        if args.len() != 1 {
            return Err(format!("'{type_name}.{method}' takes exactly one argument"));
        }
        let arg = args.remove(0);
        Ok(Expr::Convert(conversion, Box::new(arg)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_parse_comparison() {
        let expr = parse("int.Parse(it) > 1").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Gt,
                Box::new(Expr::Convert(Conversion::Integer, Box::new(Expr::It))),
                Box::new(Expr::Number(1.0)),
            )
        );
    }

    #[test]
    fn test_precedence_of_and_over_or() {
        let expr = parse("true || false && false").unwrap();
        assert!(matches!(expr, Expr::Binary(BinaryOp::Or, _, _)));
    }

    #[test]
    fn test_member_chain() {
        let expr = parse("it.ToLower().StartsWith(\"ab\")").unwrap();
        assert!(matches!(expr, Expr::Member(_, Member::StartsWith, _)));
    }

    #[test]
    fn test_decimal_literal_and_member_access() {
        assert_eq!(parse("1.5").unwrap(), Expr::Number(1.5));
        assert!(parse("it.Length > 2.5").is_ok());
    }

    #[test]
    fn test_rejects_unknown_functions() {
        assert!(parse("System.IO.File.Delete(it)").is_err());
        assert!(parse("it.GetType()").is_err());
        assert!(parse("int.Parse(it) >").is_err());
        assert!(parse("(1 + 2").is_err());
        assert!(parse("").is_err());
        assert!(parse("it = 1").is_err());
    }

    #[test]
    fn test_rejects_deep_nesting() {
        let depth = 10_000;
        let source = format!("{}it == \"x\"{}", "(".repeat(depth), ")".repeat(depth));
        let err = parse(&source).unwrap_err();
        assert!(err.contains("tokens"), "{err}");

        let source = format!(
            "{}it == \"x\"{}",
            "(".repeat(MAX_NESTING + 1),
            ")".repeat(MAX_NESTING + 1)
        );
        let err = parse(&source).unwrap_err();
        assert!(err.contains("nests deeper"), "{err}");

        let source = format!("{}true", "!".repeat(MAX_NESTING + 1));
        assert!(parse(&source).is_err());

        let nested = format!("{}it{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(parse(&nested).unwrap(), Expr::It);
    }

    #[test]
    fn test_rejects_long_chains() {
        let chain = vec!["1"; MAX_TREE_DEPTH + 1].join(" + ");
        let err = parse(&chain).unwrap_err();
        assert!(err.contains("nested deeper"), "{err}");

        let members = format!("it{}", ".Trim()".repeat(MAX_TREE_DEPTH));
        assert!(parse(&members).is_err());

        let chain = vec!["1"; 50].join(" + ");
        assert!(parse(&format!("{chain} > 0")).is_ok());

        let huge = vec!["1"; MAX_TOKENS].join("+");
        let err = parse(&huge).unwrap_err();
        assert!(err.contains("tokens"), "{err}");
    }

    #[test]
    fn test_wrong_arity() {
        assert!(parse("it.StartsWith()").is_err());
        assert!(parse("it.ToUpper(1)").is_err());
    }
}
