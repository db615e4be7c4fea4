use serde::{Deserialize, Serialize};

use super::error::{RecordError, RecordResult, SchemaViolation};
use super::value::{DataType, Value};

/// Attribute definition with constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
    pub not_null: bool,
    pub primary_key: bool,
}

impl Attribute {
    /// Create a new attribute definition
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        not_null: bool,
        primary_key: bool,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            not_null,
            primary_key,
        }
    }

    /// Declared length for CHAR/VARCHAR attributes, `None` otherwise
    pub fn declared_length(&self) -> Option<usize> {
        self.data_type.declared_length()
    }

    fn check(&self, value: &Value) -> Result<(), SchemaViolation> {
        if value.is_null() {
            if self.not_null {
                return Err(SchemaViolation::NotNull {
                    attribute: self.name.clone(),
                });
            }
            return Ok(());
        }

        if !self.data_type.accepts(value) {
            return Err(SchemaViolation::TypeMismatch {
                attribute: self.name.clone(),
                expected: self.data_type.to_string(),
                actual: value.type_name().to_string(),
            });
        }

        if let (Some(max), Value::String(s)) = (self.declared_length(), value) {
            let actual = s.chars().count();
            if actual > max {
                return Err(SchemaViolation::TooLong {
                    attribute: self.name.clone(),
                    max,
                    actual,
                });
            }
        }

        Ok(())
    }
}

/// Ordered attribute list with exactly one primary key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Attribute>", into = "Vec<Attribute>")]
pub struct Schema {
    attributes: Vec<Attribute>,
    primary_key: usize,
}

impl Schema {
    /// Create a schema, checking that it has exactly one primary key and no
    /// duplicate attribute names
    pub fn new(attributes: Vec<Attribute>) -> RecordResult<Self> {
        if attributes.is_empty() {
            return Err(RecordError::InvalidSchema(
                "a schema needs at least one attribute".to_string(),
            ));
        }

        for (i, attr) in attributes.iter().enumerate() {
            if attributes[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&attr.name))
            {
                return Err(RecordError::InvalidSchema(format!(
                    "duplicate attribute name '{}'",
                    attr.name
                )));
            }
        }

        let keys: Vec<usize> = attributes
            .iter()
            .enumerate()
            .filter(|(_, a)| a.primary_key)
            .map(|(i, _)| i)
            .collect();
        let primary_key = match keys.as_slice() {
            [idx] => *idx,
            [] => {
                return Err(RecordError::InvalidSchema(
                    "no primary key attribute".to_string(),
                ));
            }
            _ => {
                return Err(RecordError::InvalidSchema(format!(
                    "{} primary key attributes, expected exactly one",
                    keys.len()
                )));
            }
        };

        Ok(Self {
            attributes,
            primary_key,
        })
    }

    /// Get all attributes
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Get attribute count
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Get a specific attribute
    pub fn attribute(&self, idx: usize) -> Option<&Attribute> {
        self.attributes.get(idx)
    }

    /// Find attribute index by name (case-insensitive)
    pub fn find_attribute(&self, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Position of the primary key attribute
    pub fn primary_key_index(&self) -> usize {
        self.primary_key
    }

    pub fn primary_key(&self) -> &Attribute {
        &self.attributes[self.primary_key]
    }

    /// Validate a record against this schema: arity, then NOT NULL, type
    /// and declared length per attribute
    pub fn validate_record(&self, values: &[Value]) -> Result<(), SchemaViolation> {
        if values.len() != self.attributes.len() {
            return Err(SchemaViolation::Arity {
                expected: self.attributes.len(),
                actual: values.len(),
            });
        }

        for (value, attr) in values.iter().zip(&self.attributes) {
            attr.check(value)?;
        }

        Ok(())
    }
}

impl TryFrom<Vec<Attribute>> for Schema {
    type Error = RecordError;

    fn try_from(attributes: Vec<Attribute>) -> RecordResult<Self> {
        Schema::new(attributes)
    }
}

impl From<Schema> for Vec<Attribute> {
    fn from(schema: Schema) -> Self {
        schema.attributes
    }
}
