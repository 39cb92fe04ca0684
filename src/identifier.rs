//! Structured individual identifiers.
//!
//! Simulated Genepop files pack fields such as sex, parents and age into
//! the identifier, e.g. `12;1;3;4;2` read under the schema
//! `id;sex;father;mother;age`. An [`IdSchema`] names and types those
//! fields so sampling can select on them.
use crate::error::{GenepopError, Result};
use crate::source::GenepopSource;
use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Str,
}

/// A typed identifier field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    /// The value as a number, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Str(_) => None,
        }
    }

    /// The value as an integer, accepting floats with no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    /// Compares two values: numbers with numbers, strings with strings.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Field names, types and the delimiter of an identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct IdSchema {
    names: Vec<String>,
    types: Vec<FieldType>,
    delimiter: u8,
}

/// The values of one identifier under an [`IdSchema`].
#[derive(Clone, Debug, PartialEq)]
pub struct IdValues<'schema> {
    schema: &'schema IdSchema,
    values: Vec<FieldValue>,
}

impl<'schema> IdValues<'schema> {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.schema.position(name).map(|i| &self.values[i])
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn schema(&self) -> &IdSchema {
        self.schema
    }
}

fn parse_field(identifier: &str, name: &str, field_type: FieldType, raw: &str) -> Result<FieldValue> {
    let raw = raw.trim();
    let error = |what: &str| GenepopError::IdentifierField {
        identifier: identifier.to_owned(),
        reason: format!("field \"{}\" value \"{}\" is not {}", name, raw, what),
    };
    match field_type {
        FieldType::Int => raw.parse().map(FieldValue::Int).map_err(|_| error("an integer")),
        FieldType::Float => raw.parse().map(FieldValue::Float).map_err(|_| error("a number")),
        FieldType::Str => Ok(FieldValue::Str(raw.to_owned())),
    }
}

impl IdSchema {
    /// The schema of identifiers written by the age-structured simulation:
    /// `id;sex;father;mother;age`.
    pub fn age_structure() -> Self {
        IdSchemaBuilder::new()
            .field("id", FieldType::Float)
            .field("sex", FieldType::Int)
            .field("father", FieldType::Float)
            .field("mother", FieldType::Float)
            .field("age", FieldType::Float)
            .build()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.position(name).map(|i| self.types[i])
    }

    /// Checks that every name in `names` is a field of this schema.
    pub fn require(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|n| self.position(n).is_none()) {
            None => Ok(()),
            Some(missing) => Err(GenepopError::InvalidParameter {
                operation: "identifier schema",
                reason: format!("no field named \"{}\" in {:?}", missing, self.names),
            }),
        }
    }

    /// Parses one identifier into typed field values.
    pub fn parse<'s>(&'s self, identifier: &str) -> Result<IdValues<'s>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .flexible(true)
            .quoting(false)
            .from_reader(identifier.as_bytes());
        let record = reader.records().next().transpose()?.unwrap_or_default();

        if record.len() != self.names.len() {
            return Err(GenepopError::IdentifierField {
                identifier: identifier.to_owned(),
                reason: format!(
                    "{} fields found, schema {:?} has {}",
                    record.len(),
                    self.names,
                    self.names.len()
                ),
            });
        }

        let values = record
            .iter()
            .zip(self.names.iter().zip(self.types.iter()))
            .map(|(raw, (name, t))| parse_field(identifier, name, *t, raw))
            .collect::<Result<Vec<_>>>()?;

        Ok(IdValues {
            schema: self,
            values,
        })
    }

    /// Parses the identifier of every individual in `population`.
    ///
    /// Entries are `(individual number, values)` in file order.
    pub fn parse_population<'s>(
        &'s self,
        source: &GenepopSource,
        population: usize,
    ) -> Result<Vec<(usize, IdValues<'s>)>> {
        source
            .identifiers(population)?
            .iter()
            .enumerate()
            .map(|(idx, id)| Ok((idx + 1, self.parse(id)?)))
            .collect()
    }
}

/// Builds an [`IdSchema`].
pub struct IdSchemaBuilder {
    names: Vec<String>,
    types: Vec<FieldType>,
    delimiter: u8,
}

impl Default for IdSchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSchemaBuilder {
    /// Construct a new schema builder with `;` as the delimiter
    pub fn new() -> Self {
        Self {
            names: vec![],
            types: vec![],
            delimiter: b';',
        }
    }

    pub fn delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    pub fn field(&mut self, name: &str, field_type: FieldType) -> &mut Self {
        self.names.push(name.to_owned());
        self.types.push(field_type);
        self
    }

    pub fn build(&self) -> IdSchema {
        IdSchema {
            names: self.names.clone(),
            types: self.types.clone(),
            delimiter: self.delimiter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn location_schema() -> IdSchema {
        IdSchemaBuilder::new()
            .field("num", FieldType::Int)
            .field("age", FieldType::Int)
            .field("p1", FieldType::Int)
            .field("p2", FieldType::Int)
            .field("location", FieldType::Str)
            .build()
    }

    #[test]
    fn test_parse_typed_fields() -> std::result::Result<(), Box<dyn Error>> {
        let schema = location_schema();
        let values = schema.parse("33;1;3;4;mystream")?;
        assert_eq!(values.get("num"), Some(&FieldValue::Int(33)));
        assert_eq!(values.get("age"), Some(&FieldValue::Int(1)));
        assert_eq!(values.get("location"), Some(&FieldValue::Str("mystream".into())));
        assert_eq!(values.get("nope"), None);
        Ok(())
    }

    #[test]
    fn test_field_count_mismatch() {
        let schema = location_schema();
        assert!(matches!(
            schema.parse("33;1;3"),
            Err(GenepopError::IdentifierField { .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let schema = location_schema();
        assert!(matches!(
            schema.parse("33;x;3;4;s"),
            Err(GenepopError::IdentifierField { .. })
        ));
    }

    #[test]
    fn test_age_structure_schema() -> std::result::Result<(), Box<dyn Error>> {
        let schema = IdSchema::age_structure();
        let values = schema.parse("12.0;1;3.0;4.0;2.0")?;
        assert_eq!(values.get("sex"), Some(&FieldValue::Int(1)));
        assert_eq!(values.get("age").and_then(|v| v.as_i64()), Some(2));
        assert_eq!(values.get("mother").and_then(|v| v.as_f64()), Some(4.0));
        Ok(())
    }

    #[test]
    fn test_custom_delimiter() -> std::result::Result<(), Box<dyn Error>> {
        let schema = IdSchemaBuilder::new()
            .delimiter(b'_')
            .field("site", FieldType::Str)
            .field("n", FieldType::Int)
            .build();
        let values = schema.parse("creek_7")?;
        assert_eq!(values.get("n"), Some(&FieldValue::Int(7)));
        Ok(())
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(FieldValue::Int(2).compare(&FieldValue::Float(2.0)), Some(Ordering::Equal));
        assert_eq!(FieldValue::Float(1.5).compare(&FieldValue::Int(2)), Some(Ordering::Less));
        assert_eq!(FieldValue::Str("a".into()).compare(&FieldValue::Int(2)), None);
    }
}
