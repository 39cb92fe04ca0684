//! Boolean tests over identifier fields.
//!
//! Expressions are parsed once into an [`Expr`] tree and evaluated per
//! individual. Field references are written `%name%`:
//!
//! ```text
//! %age% == 1 and (%sex% != 0 or %location% == "creek")
//! ```
use crate::error::{GenepopError, Result};
use crate::identifier::{FieldValue, IdSchema, IdValues};
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(FieldValue),
    Bool(bool),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

enum Operand<'a> {
    Value(&'a FieldValue),
    Bool(bool),
}

impl Expr {
    pub fn field(name: &str) -> Self {
        Self::Field(name.to_owned())
    }

    pub fn compare(lhs: Expr, op: CmpOp, rhs: Expr) -> Self {
        Self::Compare(Box::new(lhs), op, Box::new(rhs))
    }

    /// `%field% == value`
    pub fn equals(field: &str, value: FieldValue) -> Self {
        Self::compare(Self::field(field), CmpOp::Eq, Self::Literal(value))
    }

    pub fn and(self, other: Expr) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn parse(expression: &str) -> Result<Self> {
        Parser::new(expression)?.parse()
    }

    /// Names of every field referenced.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = vec![];
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Field(name) => out.push(name),
            Self::Literal(_) | Self::Bool(_) => {}
            Self::Compare(a, _, b) | Self::And(a, b) | Self::Or(a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
            Self::Not(a) => a.collect_fields(out),
        }
    }

    fn operand<'a>(&'a self, values: &'a IdValues<'_>) -> Result<Operand<'a>> {
        match self {
            Self::Field(name) => values.get(name).map(Operand::Value).ok_or_else(|| {
                GenepopError::Expression {
                    expression: format!("%{}%", name),
                    reason: "no such identifier field".into(),
                }
            }),
            Self::Literal(v) => Ok(Operand::Value(v)),
            _ => self.evaluate(values).map(Operand::Bool),
        }
    }

    pub fn evaluate(&self, values: &IdValues<'_>) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::And(a, b) => Ok(a.evaluate(values)? && b.evaluate(values)?),
            Self::Or(a, b) => Ok(a.evaluate(values)? || b.evaluate(values)?),
            Self::Not(a) => Ok(!a.evaluate(values)?),
            Self::Compare(a, op, b) => {
                let ordering = match (a.operand(values)?, b.operand(values)?) {
                    (Operand::Bool(x), Operand::Bool(y)) => Some(x.cmp(&y)),
                    (Operand::Value(x), Operand::Value(y)) => x.compare(y),
                    _ => None,
                };
                ordering.map(|o| op.holds(o)).ok_or_else(|| GenepopError::Expression {
                    expression: format!("{:?}", self),
                    reason: "operands cannot be compared".into(),
                })
            }
            Self::Field(_) | Self::Literal(_) => match self.operand(values)? {
                Operand::Value(v) => Err(GenepopError::Expression {
                    expression: v.to_string(),
                    reason: "not a boolean".into(),
                }),
                Operand::Bool(b) => Ok(b),
            },
        }
    }
}

/// A named test.
#[derive(Clone, Debug, PartialEq)]
pub struct Criterion {
    pub name: String,
    pub expr: Expr,
}

/// A list of tests an individual must all pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Criteria {
    criteria: Vec<Criterion>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, expr: Expr) -> &mut Self {
        self.criteria.push(Criterion {
            name: name.to_owned(),
            expr,
        });
        self
    }

    /// Parses and adds a `%field%` expression.
    pub fn add_expression(&mut self, name: &str, expression: &str) -> Result<&mut Self> {
        let expr = Expr::parse(expression)?;
        Ok(self.add(name, expr))
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.iter()
    }

    /// A new set holding only the criteria at `indices`.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        let criteria = indices
            .iter()
            .map(|&i| {
                self.criteria.get(i).cloned().ok_or_else(|| GenepopError::InvalidParameter {
                    operation: "criteria subset",
                    reason: format!("index {} out of range for {} criteria", i, self.criteria.len()),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { criteria })
    }

    /// Checks every referenced field exists in `schema`.
    pub fn validate(&self, schema: &IdSchema) -> Result<()> {
        for criterion in &self.criteria {
            for field in criterion.expr.fields() {
                if schema.position(field).is_none() {
                    return Err(GenepopError::Expression {
                        expression: criterion.name.clone(),
                        reason: format!("no identifier field named \"{}\"", field),
                    });
                }
            }
        }
        Ok(())
    }

    /// True when every criterion holds. An empty set is an error.
    pub fn all_true(&self, values: &IdValues<'_>) -> Result<bool> {
        if self.criteria.is_empty() {
            return Err(GenepopError::InvalidParameter {
                operation: "criteria test",
                reason: "no criteria to test".into(),
            });
        }
        for criterion in &self.criteria {
            if !criterion.expr.evaluate(values)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Field(String),
    Number(FieldValue),
    Str(String),
    Op(CmpOp),
    And,
    Or,
    Not,
    True,
    False,
    Open,
    Close,
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(expression: &'a str) -> Result<Self> {
        Ok(Self {
            expression,
            tokens: tokenize(expression)?,
            pos: 0,
        })
    }

    fn error(&self, reason: &str) -> GenepopError {
        GenepopError::Expression {
            expression: self.expression.to_owned(),
            reason: reason.to_owned(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse(mut self) -> Result<Expr> {
        let expr = self.or()?;
        if self.pos < self.tokens.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            expr = expr.or(self.and()?);
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            expr = expr.and(self.not()?);
        }
        Ok(expr)
    }

    fn not(&mut self) -> Result<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.atom()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.atom()?;
            return Ok(Expr::compare(lhs, op, rhs));
        }
        Ok(lhs)
    }

    fn atom(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Field(name)) => Ok(Expr::Field(name)),
            Some(Token::Number(v)) => Ok(Expr::Literal(v)),
            Some(Token::Str(s)) => Ok(Expr::Literal(FieldValue::Str(s))),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Open) => {
                let expr = self.or()?;
                match self.next() {
                    Some(Token::Close) => Ok(expr),
                    _ => Err(self.error("missing closing parenthesis")),
                }
            }
            Some(_) => Err(self.error("expected a field, literal or parenthesis")),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let error = |reason: String| GenepopError::Expression {
        expression: expression.to_owned(),
        reason,
    };
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = vec![];
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
        match c {
            _ if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '%' | '"' | '\'' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&x| x == c)
                    .map(|p| p + i + 1)
                    .ok_or_else(|| error(format!("unterminated {} at {}", c, i)))?;
                let text: String = chars[i + 1..end].iter().collect();
                tokens.push(if c == '%' {
                    Token::Field(text)
                } else {
                    Token::Str(text)
                });
                i = end + 1;
            }
            _ if ["==", "!=", "<=", ">=", "&&", "||"].contains(&two.as_str()) => {
                tokens.push(match two.as_str() {
                    "==" => Token::Op(CmpOp::Eq),
                    "!=" => Token::Op(CmpOp::Ne),
                    "<=" => Token::Op(CmpOp::Le),
                    ">=" => Token::Op(CmpOp::Ge),
                    "&&" => Token::And,
                    _ => Token::Or,
                });
                i += 2;
            }
            '<' | '>' | '!' => {
                tokens.push(match c {
                    '<' => Token::Op(CmpOp::Lt),
                    '>' => Token::Op(CmpOp::Gt),
                    _ => Token::Not,
                });
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = match text.parse::<i64>() {
                    Ok(n) => FieldValue::Int(n),
                    Err(_) => FieldValue::Float(
                        text.parse()
                            .map_err(|_| error(format!("bad number \"{}\"", text)))?,
                    ),
                };
                tokens.push(Token::Number(value));
            }
            _ if c.is_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_alphanumeric() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => return Err(error(format!("unknown word \"{}\"", word))),
                });
            }
            _ => return Err(error(format!("unexpected character '{}'", c))),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{FieldType, IdSchemaBuilder};
    use std::error::Error;

    fn schema() -> IdSchema {
        IdSchemaBuilder::new()
            .field("num", FieldType::Int)
            .field("age", FieldType::Int)
            .field("p1", FieldType::Int)
            .field("p2", FieldType::Int)
            .field("location", FieldType::Str)
            .build()
    }

    #[test]
    fn test_parse_and_evaluate() -> std::result::Result<(), Box<dyn Error>> {
        let schema = schema();
        let values = schema.parse("33;1;3;4;mystream")?;
        assert!(Expr::parse("%age% == 1")?.evaluate(&values)?);
        assert!(Expr::parse("%location% == \"mystream\"")?.evaluate(&values)?);
        assert!(!Expr::parse("%age% > 1 or %p1% >= 4")?.evaluate(&values)?);
        assert!(Expr::parse("not (%p1% == %p2%) and %num% < 40")?.evaluate(&values)?);
        assert!(Expr::parse("%age% == 1.0 && true")?.evaluate(&values)?);
        Ok(())
    }

    #[test]
    fn test_precedence_and_binds_tighter() -> std::result::Result<(), Box<dyn Error>> {
        let expr = Expr::parse("%a% == 1 or %b% == 2 and %c% == 3")?;
        match expr {
            Expr::Or(_, rhs) => assert!(matches!(*rhs, Expr::And(_, _))),
            other => panic!("unexpected tree {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        for bad in &["%age == 1", "%age% ==", "(%age% == 1", "%age% = 1", "%age% == 1 1", "age == 1"] {
            assert!(
                matches!(Expr::parse(bad), Err(GenepopError::Expression { .. })),
                "{} should not parse",
                bad
            );
        }
    }

    #[test]
    fn test_string_number_comparison_is_an_error() -> std::result::Result<(), Box<dyn Error>> {
        let schema = schema();
        let values = schema.parse("33;1;3;4;mystream")?;
        assert!(Expr::parse("%location% == 3")?.evaluate(&values).is_err());
        assert!(Expr::parse("%age%")?.evaluate(&values).is_err());
        Ok(())
    }

    #[test]
    fn test_criteria_all_true_and_subset() -> std::result::Result<(), Box<dyn Error>> {
        let schema = schema();
        let values = schema.parse("33;1;3;4;mystream")?;
        let mut criteria = Criteria::new();
        criteria
            .add_expression("agetest", "%age% == 1")?
            .add_expression("loctest", "%location% == \"elsewhere\"")?;
        criteria.validate(&schema)?;
        assert!(!criteria.all_true(&values)?);
        assert!(criteria.subset(&[0])?.all_true(&values)?);
        assert!(criteria.subset(&[2]).is_err());
        assert!(Criteria::new().all_true(&values).is_err());
        Ok(())
    }

    #[test]
    fn test_validate_unknown_field() -> std::result::Result<(), Box<dyn Error>> {
        let mut criteria = Criteria::new();
        criteria.add_expression("bad", "%weight% > 3")?;
        assert!(criteria.validate(&schema()).is_err());
        Ok(())
    }
}
