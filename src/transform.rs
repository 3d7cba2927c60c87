//! Grade transform: a small arithmetic expression over one variable `x`.
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/') unary)*
//! unary := '-' unary | power
//! power := atom ('^' unary)?
//! atom  := number | 'x' | ident '(' expr (',' expr)* ')' | '(' expr ')'
//! ```
//!
//! Expressions are parsed once into a tree and only ever evaluated, never
//! executed.

use std::fmt;
use std::str::FromStr;

use crate::error::GradeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Abs,
    Sqrt,
    Exp,
    Ln,
    Floor,
    Ceil,
    Round,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Func::Abs,
            "sqrt" => Func::Sqrt,
            "exp" => Func::Exp,
            "ln" => Func::Ln,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "round" => Func::Round,
            "min" => Func::Min,
            "max" => Func::Max,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Func::Min | Func::Max => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Func::Abs => args[0].abs(),
            Func::Sqrt => args[0].sqrt(),
            Func::Exp => args[0].exp(),
            Func::Ln => args[0].ln(),
            Func::Floor => args[0].floor(),
            Func::Ceil => args[0].ceil(),
            Func::Round => args[0].round(),
            Func::Min => args[0].min(args[1]),
            Func::Max => args[0].max(args[1]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Var,
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

impl Expr {
    fn eval(&self, x: f64) -> f64 {
        match self {
            Expr::Num(n) => *n,
            Expr::Var => x,
            Expr::Neg(e) => -e.eval(x),
            Expr::Add(a, b) => a.eval(x) + b.eval(x),
            Expr::Sub(a, b) => a.eval(x) - b.eval(x),
            Expr::Mul(a, b) => a.eval(x) * b.eval(x),
            Expr::Div(a, b) => a.eval(x) / b.eval(x),
            Expr::Pow(a, b) => a.eval(x).powf(b.eval(x)),
            Expr::Call(f, args) => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(x)).collect();
                f.apply(&values)
            }
        }
    }
}

/// A parsed transform. Evaluation is total: bad inputs show up as NaN or
/// infinities, which the aggregator rejects.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    source: String,
    expr: Expr,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            source: "x".to_string(),
            expr: Expr::Var,
        }
    }

    pub fn parse(source: &str) -> Result<Self, GradeError> {
        let mut parser = Parser {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            call_depth: 0,
        };
        let expr = parser.expr()?;
        parser.skip_ws();
        if parser.pos < parser.bytes.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn apply(&self, x: f64) -> f64 {
        self.expr.eval(x)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl FromStr for Transform {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct Parser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    call_depth: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> GradeError {
        GradeError::InvalidExpression {
            expression: self.source.to_string(),
            offset: self.pos,
            reason: reason.to_string(),
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr, GradeError> {
        let mut lhs = self.term()?;
        loop {
            if self.eat(b'+') {
                lhs = Expr::Add(Box::new(lhs), Box::new(self.term()?));
            } else if self.eat(b'-') {
                lhs = Expr::Sub(Box::new(lhs), Box::new(self.term()?));
            } else {
                return Ok(lhs);
            }
        }
    }

    fn term(&mut self) -> Result<Expr, GradeError> {
        let mut lhs = self.unary()?;
        loop {
            if self.eat(b'*') {
                lhs = Expr::Mul(Box::new(lhs), Box::new(self.unary()?));
            } else if self.eat(b'/') {
                lhs = Expr::Div(Box::new(lhs), Box::new(self.unary()?));
            } else {
                return Ok(lhs);
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, GradeError> {
        if self.eat(b'-') {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.power()
    }

    // Right-associative: 2^3^2 == 2^(3^2).
    fn power(&mut self) -> Result<Expr, GradeError> {
        let base = self.atom()?;
        if self.eat(b'^') {
            return Ok(Expr::Pow(Box::new(base), Box::new(self.unary()?)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, GradeError> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if !self.eat(b')') {
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.ident(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn number(&mut self) -> Result<Expr, GradeError> {
        let start = self.pos;
        let mut seen_sep = false;
        while let Some(&c) = self.bytes.get(self.pos) {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if (c == b'.' || (c == b',' && self.call_depth == 0))
                && !seen_sep
                && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit)
            {
                // Inside a call the comma separates arguments.
                seen_sep = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = self.source[start..self.pos].replace(',', ".");
        text.parse::<f64>().map(Expr::Num).map_err(|_| {
            self.pos = start;
            self.error("invalid number")
        })
    }

    fn ident(&mut self) -> Result<Expr, GradeError> {
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
        {
            self.pos += 1;
        }
        let source = self.source;
        let name = &source[start..self.pos];
        if name == "x" {
            return Ok(Expr::Var);
        }

        let func = Func::lookup(name).ok_or_else(|| {
            self.pos = start;
            self.error("unknown identifier")
        })?;
        if !self.eat(b'(') {
            return Err(self.error("expected '(' after function name"));
        }
        self.call_depth += 1;
        let mut args = vec![self.expr()?];
        while self.eat(b',') {
            args.push(self.expr()?);
        }
        self.call_depth -= 1;
        if !self.eat(b')') {
            return Err(self.error("expected ')'"));
        }
        if args.len() != func.arity() {
            return Err(self.error("wrong number of arguments"));
        }
        Ok(Expr::Call(func, args))
    }
}
