//! Extracted output values, shaped like the Arrow schema they were built against.

/// One output value. Units and scales come from the field's Arrow type:
/// `Decimal` holds the big-endian two's-complement unscaled integer at the
/// field's scale, `Timestamp`/`Time` are counts of the field's time unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bytes(Vec<u8>),
    String(String),
    Decimal(Vec<u8>),
    Timestamp(i64),
    Time(i64),
    List(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// `Null` for `None`, otherwise the converted value.
    pub fn from_option<T: Into<Value>>(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Record(v)
    }
}

/// Ordered `(name, value)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Builder-style [`Record::push`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Remove and return the named value.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(field, _)| field == name)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_preserves_order_and_lookup() {
        let mut record = Record::new().with("b", 2).with("a", "x");
        assert_eq!(
            record.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            ["b", "a"]
        );
        assert_eq!(record.get("a"), Some(&Value::String("x".into())));
        assert_eq!(record.get("missing"), None);
        assert_eq!(record.take("b"), Some(Value::Int32(2)));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn option_maps_to_null() {
        assert!(Value::from_option::<String>(None).is_null());
        assert_eq!(Value::from_option(Some(true)), Value::Boolean(true));
    }
}
