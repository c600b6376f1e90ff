//! Custom value formulas.
//!
//! A formula is plain arithmetic over measurement field names, for example
//! `aggregatedCPUTime / profilerHits`. Validation only looks at the names;
//! evaluation binds each name to a [`SensorValues`] field and runs a small
//! recursive-descent evaluator (`+ - * / %`, unary sign, parentheses,
//! decimal literals). Nothing outside the bound fields is reachable.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::FormulaError;
use crate::measurement::{SensorField, SensorValues};
use crate::representation::{Representation, ValueSelection};

static NAME_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("static name regex compiles"));

/// Maximal alphabetic runs of `formula`, in order of appearance.
pub fn extract_tokens(formula: &str) -> Vec<&str> {
    NAME_RUN.find_iter(formula).map(|m| m.as_str()).collect()
}

/// Check a formula and report why it is rejected.
pub fn validate_formula(formula: &str) -> Result<(), FormulaError> {
    if formula.trim().is_empty() {
        return Err(FormulaError::Empty);
    }
    let mut unknown: Vec<String> = Vec::new();
    for token in extract_tokens(formula) {
        if SensorField::from_name(token).is_none() && !unknown.iter().any(|u| u == token) {
            unknown.push(token.to_string());
        }
    }
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(FormulaError::UnknownTokens(unknown))
    }
}

/// `false` iff the formula is missing, empty, or names an unknown field.
pub fn check_formula_validity(formula: Option<&str>) -> bool {
    match formula {
        Some(f) => validate_formula(f).is_ok(),
        None => false,
    }
}

/// Value selected by `representation` for one vector.
///
/// Plain field selections return the field value unchanged. Formula
/// selections are validated first; a formula that passes validation and then
/// fails to evaluate yields [`FormulaError::Evaluation`]. Non-finite results
/// (division by zero) resolve to 0.
pub fn calc_or_return_sensor_value(
    values: &SensorValues,
    representation: &Representation,
) -> Result<f64, FormulaError> {
    match representation.selection {
        ValueSelection::Field(field) => Ok(values.get(field)),
        ValueSelection::CustomFormula => {
            let source = representation.formula.as_deref().unwrap_or("");
            let formula = Formula::parse(source)?;
            Ok(formula.eval(values))
        }
    }
}

/// A validated, parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        validate_formula(source)?;
        let tokens = tokenize(source).map_err(|reason| FormulaError::Evaluation {
            formula: source.to_string(),
            reason,
        })?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser
            .parse_complete()
            .map_err(|reason| FormulaError::Evaluation {
                formula: source.to_string(),
                reason,
            })?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `values`; non-finite results become 0.
    pub fn eval(&self, values: &SensorValues) -> f64 {
        let result = self.expr.eval(values);
        if result.is_finite() { result } else { 0.0 }
    }

    /// Fields the formula reads, without duplicates.
    pub fn fields(&self) -> Vec<SensorField> {
        let mut out = Vec::new();
        self.expr.collect_fields(&mut out);
        out
    }
}

// ============================================================================
// Expression tree
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Field(SensorField),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, values: &SensorValues) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Field(field) => values.get(*field),
            Expr::Neg(inner) => -inner.eval(values),
            Expr::Binary(op, lhs, rhs) => {
                let a = lhs.eval(values);
                let b = rhs.eval(values);
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Rem => a % b,
                }
            }
        }
    }

    fn collect_fields(&self, out: &mut Vec<SensorField>) {
        match self {
            Expr::Number(_) => {}
            Expr::Field(field) => {
                if !out.contains(field) {
                    out.push(*field);
                }
            }
            Expr::Neg(inner) => inner.collect_fields(out),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_fields(out);
                rhs.collect_fields(out);
            }
        }
    }
}

// ============================================================================
// Tokenizer and parser
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Name(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal
                .parse::<f64>()
                .map_err(|_| format!("invalid number '{}'", literal))?;
            tokens.push(Token::Number(value));
        } else if c.is_ascii_alphabetic() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphabetic() {
                i += 1;
            }
            tokens.push(Token::Name(chars[start..i].iter().collect()));
        } else {
            match c {
                '+' | '-' | '*' | '/' | '%' => tokens.push(Token::Op(c)),
                '(' => tokens.push(Token::LParen),
                ')' => tokens.push(Token::RParen),
                other => return Err(format!("unexpected character '{}'", other)),
            }
            i += 1;
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_complete(&mut self) -> Result<Expr, String> {
        let expr = self.parse_sum()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(format!("unexpected token {:?}", token)),
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_product()?;
        while let Some(Token::Op(c @ ('+' | '-'))) = self.peek() {
            let op = if *c == '+' { BinOp::Add } else { BinOp::Sub };
            self.pos += 1;
            let rhs = self.parse_product()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_product(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        while let Some(Token::Op(c @ ('*' | '/' | '%'))) = self.peek() {
            let op = match c {
                '*' => BinOp::Mul,
                '/' => BinOp::Div,
                _ => BinOp::Rem,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Name(name)) => SensorField::from_name(&name)
                .map(Expr::Field)
                .ok_or_else(|| format!("unknown field '{}'", name)),
            Some(Token::LParen) => {
                let inner = self.parse_sum()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("unexpected end of formula".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representation::DisplayMode;

    fn formula_repr(formula: &str) -> Representation {
        Representation::formula(formula, DisplayMode::Absolute)
    }

    #[test]
    fn validity_requires_known_names() {
        assert!(check_formula_validity(Some("aggregatedCPUTime/profilerHits")));
        assert!(check_formula_validity(Some("2 * (selfCPUTime + 1)")));
        assert!(!check_formula_validity(Some("unknownField + 1")));
        assert!(!check_formula_validity(Some("")));
        assert!(!check_formula_validity(Some("   ")));
        assert!(!check_formula_validity(None));
    }

    #[test]
    fn unknown_tokens_are_reported_once() {
        let err = validate_formula("foo + foo * selfCPUTime - bar").unwrap_err();
        assert_eq!(
            err,
            FormulaError::UnknownTokens(vec!["foo".to_string(), "bar".to_string()])
        );
    }

    #[test]
    fn divides_cpu_time_by_hits() {
        let values = SensorValues {
            aggregated_cpu_time: 100.0,
            profiler_hits: 4.0,
            ..Default::default()
        };
        let repr = formula_repr("aggregatedCPUTime/profilerHits");
        assert_eq!(calc_or_return_sensor_value(&values, &repr), Ok(25.0));
    }

    #[test]
    fn unknown_field_is_rejected_before_evaluation() {
        let repr = formula_repr("unknownField + 1");
        let err = calc_or_return_sensor_value(&SensorValues::default(), &repr).unwrap_err();
        assert!(matches!(err, FormulaError::UnknownTokens(_)));
    }

    #[test]
    fn field_selection_passes_value_through() {
        let values = SensorValues {
            self_cpu_time: 12.5,
            ..Default::default()
        };
        let repr = Representation::field(SensorField::SelfCpuTime, DisplayMode::Absolute);
        assert_eq!(calc_or_return_sensor_value(&values, &repr), Ok(12.5));

        let repr = Representation::field(SensorField::ExternCpuTime, DisplayMode::Absolute);
        assert_eq!(calc_or_return_sensor_value(&values, &repr), Ok(0.0));
    }

    #[test]
    fn precedence_and_unary_minus() {
        let values = SensorValues {
            profiler_hits: 2.0,
            self_cpu_time: 3.0,
            ..Default::default()
        };
        let f = Formula::parse("profilerHits + selfCPUTime * 4").expect("parse");
        assert_eq!(f.eval(&values), 14.0);
        let f = Formula::parse("(profilerHits + selfCPUTime) * 4").expect("parse");
        assert_eq!(f.eval(&values), 20.0);
        let f = Formula::parse("-profilerHits + 10 % 4").expect("parse");
        assert_eq!(f.eval(&values), 0.0);
        let f = Formula::parse("selfCPUTime / 2 / 3").expect("parse");
        assert_eq!(f.eval(&values), 0.5);
    }

    #[test]
    fn division_by_zero_resolves_to_zero() {
        let f = Formula::parse("selfCPUTime / profilerHits").expect("parse");
        assert_eq!(f.eval(&SensorValues::default()), 0.0);
    }

    #[test]
    fn syntax_errors_after_validation_are_internal() {
        for bad in ["(selfCPUTime", "selfCPUTime +", "selfCPUTime $ 2", "2 selfCPUTime"] {
            let err = Formula::parse(bad).unwrap_err();
            assert!(
                matches!(err, FormulaError::Evaluation { .. }),
                "{bad} should be an evaluation error, got {err:?}"
            );
        }
    }

    #[test]
    fn collects_referenced_fields() {
        let f = Formula::parse("selfCPUTime + profilerHits * selfCPUTime").expect("parse");
        assert_eq!(
            f.fields(),
            vec![SensorField::SelfCpuTime, SensorField::ProfilerHits]
        );
        assert_eq!(f.source(), "selfCPUTime + profilerHits * selfCPUTime");
    }
}
