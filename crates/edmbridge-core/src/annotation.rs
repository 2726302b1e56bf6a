//! Metadata annotations and their output schemas.
//!
//! v2 annotations are flat `name -> string` attributes. v4 annotations carry
//! a CSDL expression tree; every node kind has a fixed record shape, with a
//! `name` field holding the node kind. The schema builder and the value
//! builder walk the same tree, so a value built from an annotation always
//! matches the schema built from it.

use arrow::datatypes::{DataType, Field, Fields};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SchemaError;
use crate::naming::{NameSet, annotation_name, normalize_name};
use crate::schema::list_of;
use crate::value::{Record, Value};

pub const TERM: &str = "term";
pub const QUALIFIER: &str = "qualifier";
pub const EXPRESSION: &str = "expression";
pub const ANNOTATIONS: &str = "annotations";

pub const NAME: &str = "name";
pub const VALUE: &str = "value";
pub const ITEMS: &str = "items";
pub const TYPE: &str = "type";
pub const MAX_LENGTH: &str = "maxLength";
pub const PRECISION: &str = "precision";
pub const SCALE: &str = "scale";
pub const SRID: &str = "srid";
pub const LEFT: &str = "left";
pub const RIGHT: &str = "right";
pub const GUARD: &str = "guard";
pub const THEN: &str = "then";
pub const ELSE: &str = "else";
pub const PROPERTY_VALUES: &str = "propertyValues";
pub const FUNCTION: &str = "function";
pub const PARAMETERS: &str = "parameters";
pub const ELEMENT_NAME: &str = "elementName";

/// Annotations attached to one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "version", content = "items", rename_all = "lowercase")]
pub enum PropertyAnnotations {
    /// Ordered `(attribute name, value)` pairs, e.g. `("sap:label", "Price")`.
    V2(Vec<(String, String)>),
    V4(Vec<Annotation>),
}

impl PropertyAnnotations {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::V2(attributes) => attributes.is_empty(),
            Self::V4(annotations) => annotations.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub term: String,
    #[serde(default)]
    pub qualifier: Option<String>,
    #[serde(default)]
    pub expression: Option<Expression>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Annotation {
    pub fn new(term: impl Into<String>, expression: Expression) -> Self {
        Self {
            term: term.into(),
            qualifier: None,
            expression: Some(expression),
            annotations: Vec::new(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Normalized field name.
    pub fn field_name(&self) -> String {
        annotation_name(&self.term, self.qualifier.as_deref())
    }

    fn source_name(&self) -> String {
        match self.qualifier.as_deref().filter(|q| !q.is_empty()) {
            Some(q) => format!("{q}_{}", self.term),
            None => self.term.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstantKind {
    Binary,
    Bool,
    Date,
    DateTimeOffset,
    Decimal,
    Duration,
    EnumMember,
    Float,
    Guid,
    Int,
    String,
    TimeOfDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Has,
    In,
}

/// Shared shape of `Cast` and `IsOf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeFacets {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, deserialize_with = "facet")]
    pub max_length: Option<u64>,
    #[serde(default, deserialize_with = "facet")]
    pub precision: Option<u32>,
    #[serde(default, deserialize_with = "facet")]
    pub scale: Option<u32>,
    #[serde(default)]
    pub srid: Option<String>,
    pub value: Box<Expression>,
}

/// Numeric facet read through `serde_json::Value`: facets sit inside the
/// `kind`-tagged [`Expression`], whose buffered numbers only `Value` decodes
/// under arbitrary-precision parsing.
fn facet<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let Some(value) = Option::<serde_json::Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    value
        .as_u64()
        .and_then(|n| T::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("invalid facet value {value}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub property: String,
    pub value: Expression,
}

/// CSDL annotation expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Expression {
    Constant {
        #[serde(rename = "type")]
        constant: ConstantKind,
        value: String,
    },
    Path {
        value: String,
    },
    AnnotationPath {
        value: String,
    },
    LabeledElementReference {
        value: String,
    },
    NavigationPropertyPath {
        value: String,
    },
    PropertyPath {
        value: String,
    },
    Null,
    Logical {
        op: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Not {
        value: Box<Expression>,
    },
    Cast(TypeFacets),
    IsOf(TypeFacets),
    Collection {
        #[serde(default)]
        items: Vec<Expression>,
    },
    If {
        guard: Box<Expression>,
        then: Box<Expression>,
        #[serde(rename = "else")]
        otherwise: Box<Expression>,
    },
    LabeledElement {
        #[serde(rename = "elementName")]
        element_name: String,
        value: Box<Expression>,
    },
    Record {
        #[serde(default, rename = "type")]
        type_name: Option<String>,
        #[serde(default, rename = "propertyValues")]
        property_values: Vec<PropertyValue>,
    },
    Apply {
        #[serde(default)]
        function: Option<String>,
        #[serde(default)]
        parameters: Vec<Expression>,
    },
    UrlRef {
        value: Box<Expression>,
    },
}

impl Expression {
    pub fn string(value: impl Into<String>) -> Self {
        Self::Constant {
            constant: ConstantKind::String,
            value: value.into(),
        }
    }

    pub fn path(value: impl Into<String>) -> Self {
        Self::Path {
            value: value.into(),
        }
    }

    /// Value of the `name` field.
    pub fn kind_name(&self) -> String {
        let name = match self {
            Self::Constant { constant, .. } => return format!("{constant:?}"),
            Self::Logical { op, .. } => return format!("{op:?}"),
            Self::Path { .. } => "Path",
            Self::AnnotationPath { .. } => "AnnotationPath",
            Self::LabeledElementReference { .. } => "LabeledElementReference",
            Self::NavigationPropertyPath { .. } => "NavigationPropertyPath",
            Self::PropertyPath { .. } => "PropertyPath",
            Self::Null => "Null",
            Self::Not { .. } => "Not",
            Self::Cast(_) => "Cast",
            Self::IsOf(_) => "IsOf",
            Self::Collection { .. } => "Collection",
            Self::If { .. } => "If",
            Self::LabeledElement { .. } => "LabeledElement",
            Self::Record { .. } => "Record",
            Self::Apply { .. } => "Apply",
            Self::UrlRef { .. } => "UrlRef",
        };
        name.to_string()
    }

    /// Text of single-value kinds; `None` for `Null` and composite kinds.
    fn single_value(&self) -> Option<&str> {
        match self {
            Self::Constant { value, .. }
            | Self::Path { value }
            | Self::AnnotationPath { value }
            | Self::LabeledElementReference { value }
            | Self::NavigationPropertyPath { value }
            | Self::PropertyPath { value } => Some(value),
            _ => None,
        }
    }
}

fn utf8(name: &str, nullable: bool) -> Field {
    Field::new(name, DataType::Utf8, nullable)
}

fn nested(name: &str, expression: &Expression) -> Result<Field, SchemaError> {
    Ok(Field::new(name, expression_type(Some(expression))?, false))
}

fn single_value_type() -> DataType {
    DataType::Struct(Fields::from(vec![utf8(NAME, false), utf8(VALUE, true)]))
}

/// Output type for one expression node. `None` (an annotation without a
/// value) shares the single-value shape.
pub fn expression_type(expression: Option<&Expression>) -> Result<DataType, SchemaError> {
    let Some(expression) = expression else {
        return Ok(single_value_type());
    };
    let mut fields = vec![utf8(NAME, false)];
    match expression {
        Expression::Constant { .. }
        | Expression::Path { .. }
        | Expression::AnnotationPath { .. }
        | Expression::LabeledElementReference { .. }
        | Expression::NavigationPropertyPath { .. }
        | Expression::PropertyPath { .. }
        | Expression::Null => return Ok(single_value_type()),
        Expression::Logical { left, right, .. } => {
            fields.push(nested(LEFT, left)?);
            fields.push(nested(RIGHT, right)?);
        }
        Expression::Not { value } | Expression::UrlRef { value } => {
            fields.push(nested(VALUE, value)?);
        }
        Expression::Cast(facets) | Expression::IsOf(facets) => {
            fields.extend([
                utf8(TYPE, false),
                utf8(MAX_LENGTH, true),
                utf8(PRECISION, true),
                utf8(SCALE, true),
                utf8(SRID, true),
                nested(VALUE, &facets.value)?,
            ]);
        }
        Expression::Collection { items } => {
            // Collection items are type-compatible; the first one decides.
            if let Some(first) = items.first() {
                let item = expression_type(Some(first))?;
                fields.push(Field::new(ITEMS, list_of(item), true));
            }
        }
        Expression::If {
            guard,
            then,
            otherwise,
        } => {
            fields.push(nested(GUARD, guard)?);
            fields.push(nested(THEN, then)?);
            fields.push(nested(ELSE, otherwise)?);
        }
        Expression::LabeledElement { value, .. } => {
            fields.push(utf8(ELEMENT_NAME, false));
            fields.push(nested(VALUE, value)?);
        }
        Expression::Record {
            property_values, ..
        } => {
            fields.push(utf8(TYPE, true));
            if !property_values.is_empty() {
                let mut names = NameSet::new();
                let mut values = Vec::with_capacity(property_values.len());
                for pv in property_values {
                    let field_name = normalize_name(&pv.property);
                    names.insert(&field_name, &pv.property)?;
                    values.push(nested(&field_name, &pv.value)?);
                }
                fields.push(Field::new(
                    PROPERTY_VALUES,
                    DataType::Struct(Fields::from(values)),
                    true,
                ));
            }
        }
        Expression::Apply { parameters, .. } => {
            fields.push(utf8(FUNCTION, true));
            if !parameters.is_empty() {
                let params = parameters
                    .iter()
                    .enumerate()
                    .map(|(i, p)| nested(&parameter_name(i), p))
                    .collect::<Result<Vec<_>, _>>()?;
                fields.push(Field::new(
                    PARAMETERS,
                    DataType::Struct(Fields::from(params)),
                    false,
                ));
            }
        }
    }
    Ok(DataType::Struct(Fields::from(fields)))
}

fn parameter_name(index: usize) -> String {
    format!("parameter_{index}")
}

/// Output type for one v4 annotation including its nested annotations.
pub fn annotation_type(annotation: &Annotation) -> Result<DataType, SchemaError> {
    let mut fields = vec![
        utf8(TERM, false),
        utf8(QUALIFIER, true),
        Field::new(
            EXPRESSION,
            expression_type(annotation.expression.as_ref())?,
            false,
        ),
    ];
    if !annotation.annotations.is_empty() {
        fields.push(Field::new(
            ANNOTATIONS,
            DataType::Struct(v4_fields(&annotation.annotations)?),
            false,
        ));
    }
    Ok(DataType::Struct(Fields::from(fields)))
}

fn v4_fields(annotations: &[Annotation]) -> Result<Fields, SchemaError> {
    let mut names = NameSet::new();
    let mut fields = Vec::with_capacity(annotations.len());
    for annotation in annotations {
        let name = annotation.field_name();
        names.insert(&name, &annotation.source_name())?;
        fields.push(Field::new(&name, annotation_type(annotation)?, false));
    }
    Ok(Fields::from(fields))
}

/// Fields of the `metadata-annotations` record for one property.
pub fn metadata_fields(annotations: &PropertyAnnotations) -> Result<Fields, SchemaError> {
    match annotations {
        PropertyAnnotations::V2(attributes) => {
            let mut names = NameSet::new();
            let mut fields = Vec::with_capacity(attributes.len());
            for (attribute, _) in attributes {
                let name = normalize_name(attribute);
                names.insert(&name, attribute)?;
                fields.push(utf8(&name, true));
            }
            Ok(Fields::from(fields))
        }
        PropertyAnnotations::V4(annotations) => v4_fields(annotations),
    }
}

/// Value tree matching [`expression_type`].
pub fn expression_value(expression: Option<&Expression>) -> Record {
    let Some(expression) = expression else {
        return Record::new().with(NAME, "Null").with(VALUE, Value::Null);
    };
    let record = Record::new().with(NAME, expression.kind_name());
    match expression {
        Expression::Constant { .. }
        | Expression::Path { .. }
        | Expression::AnnotationPath { .. }
        | Expression::LabeledElementReference { .. }
        | Expression::NavigationPropertyPath { .. }
        | Expression::PropertyPath { .. }
        | Expression::Null => record.with(VALUE, Value::from_option(expression.single_value())),
        Expression::Logical { left, right, .. } => record
            .with(LEFT, expression_value(Some(left)))
            .with(RIGHT, expression_value(Some(right))),
        Expression::Not { value } | Expression::UrlRef { value } => {
            record.with(VALUE, expression_value(Some(value)))
        }
        Expression::Cast(facets) | Expression::IsOf(facets) => record
            .with(TYPE, facets.type_name.as_str())
            .with(MAX_LENGTH, Value::from_option(facets.max_length.map(|v| v.to_string())))
            .with(PRECISION, Value::from_option(facets.precision.map(|v| v.to_string())))
            .with(SCALE, Value::from_option(facets.scale.map(|v| v.to_string())))
            .with(SRID, Value::from_option(facets.srid.clone()))
            .with(VALUE, expression_value(Some(&facets.value))),
        Expression::Collection { items } => {
            if items.is_empty() {
                return record;
            }
            let items = items
                .iter()
                .map(|item| Value::Record(expression_value(Some(item))))
                .collect();
            record.with(ITEMS, Value::List(items))
        }
        Expression::If {
            guard,
            then,
            otherwise,
        } => record
            .with(GUARD, expression_value(Some(guard)))
            .with(THEN, expression_value(Some(then)))
            .with(ELSE, expression_value(Some(otherwise))),
        Expression::LabeledElement {
            element_name,
            value,
        } => record
            .with(ELEMENT_NAME, element_name.as_str())
            .with(VALUE, expression_value(Some(value))),
        Expression::Record {
            type_name,
            property_values,
        } => {
            let record = record.with(TYPE, Value::from_option(type_name.clone()));
            if property_values.is_empty() {
                return record;
            }
            let values = property_values.iter().fold(Record::new(), |acc, pv| {
                acc.with(normalize_name(&pv.property), expression_value(Some(&pv.value)))
            });
            record.with(PROPERTY_VALUES, values)
        }
        Expression::Apply {
            function,
            parameters,
        } => {
            let record = record.with(FUNCTION, Value::from_option(function.clone()));
            if parameters.is_empty() {
                return record;
            }
            let params = parameters
                .iter()
                .enumerate()
                .fold(Record::new(), |acc, (i, p)| {
                    acc.with(parameter_name(i), expression_value(Some(p)))
                });
            record.with(PARAMETERS, params)
        }
    }
}

/// Value tree matching [`annotation_type`].
pub fn annotation_value(annotation: &Annotation) -> Record {
    let record = Record::new()
        .with(TERM, annotation.term.as_str())
        .with(QUALIFIER, Value::from_option(annotation.qualifier.clone()))
        .with(EXPRESSION, expression_value(annotation.expression.as_ref()));
    if annotation.annotations.is_empty() {
        return record;
    }
    record.with(ANNOTATIONS, v4_values(&annotation.annotations))
}

fn v4_values(annotations: &[Annotation]) -> Record {
    annotations.iter().fold(Record::new(), |acc, annotation| {
        acc.with(annotation.field_name(), annotation_value(annotation))
    })
}

/// Value of the `metadata-annotations` record for one property.
pub fn metadata_value(annotations: &PropertyAnnotations) -> Record {
    match annotations {
        PropertyAnnotations::V2(attributes) => {
            attributes.iter().fold(Record::new(), |acc, (name, value)| {
                acc.with(normalize_name(name), value.as_str())
            })
        }
        PropertyAnnotations::V4(annotations) => v4_values(annotations),
    }
}
