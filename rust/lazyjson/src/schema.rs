//! The target shape of a document: objects with named fields, homogeneous lists
//! and scalars.

use std::{fmt, sync::Arc};

use ahash::AHashSet;
use lazyjson_common::{Error, Result, error::StdErrorBoxed};

use crate::value::Scalar;

/// Decodes a custom scalar from its JSON text.
///
/// `text` is the unescaped content of a JSON string, or the literal text of a number,
/// `true` or `false`. Returning `None` materializes the field as null.
pub trait Converter: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn convert(&self, text: &str) -> std::result::Result<Option<Scalar>, StdErrorBoxed>;
}

#[derive(Clone)]
pub enum ScalarKind {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    /// Constants matched by name, stored by ordinal.
    Enum(Arc<[String]>),
    Custom(Arc<dyn Converter>),
}

impl ScalarKind {
    pub fn name(&self) -> &str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Byte => "byte",
            ScalarKind::Short => "short",
            ScalarKind::Int => "int",
            ScalarKind::Long => "long",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Char => "char",
            ScalarKind::String => "string",
            ScalarKind::Enum(_) => "enum",
            ScalarKind::Custom(converter) => converter.name(),
        }
    }

    /// Value of a primitive field whose key is null. `None` for kinds that cannot be
    /// primitive.
    pub(crate) fn zero(&self) -> Option<Scalar> {
        let zero = match self {
            ScalarKind::Bool => Scalar::Bool(false),
            ScalarKind::Byte => Scalar::Byte(0),
            ScalarKind::Short => Scalar::Short(0),
            ScalarKind::Int => Scalar::Int(0),
            ScalarKind::Long => Scalar::Long(0),
            ScalarKind::Float => Scalar::Float(0.0),
            ScalarKind::Double => Scalar::Double(0.0),
            ScalarKind::Char => Scalar::Char('\0'),
            ScalarKind::String | ScalarKind::Enum(_) | ScalarKind::Custom(_) => return None,
        };
        Some(zero)
    }
}

impl fmt::Debug for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::Enum(values) => write!(f, "Enum({values:?})"),
            ScalarKind::Custom(converter) => write!(f, "Custom({})", converter.name()),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Shape {
    Scalar(ScalarKind),
    Object(Arc<ObjectSchema>),
    List(Box<Shape>),
}

impl Shape {
    pub fn bool() -> Shape {
        Shape::Scalar(ScalarKind::Bool)
    }

    pub fn byte() -> Shape {
        Shape::Scalar(ScalarKind::Byte)
    }

    pub fn short() -> Shape {
        Shape::Scalar(ScalarKind::Short)
    }

    pub fn int() -> Shape {
        Shape::Scalar(ScalarKind::Int)
    }

    pub fn long() -> Shape {
        Shape::Scalar(ScalarKind::Long)
    }

    pub fn float() -> Shape {
        Shape::Scalar(ScalarKind::Float)
    }

    pub fn double() -> Shape {
        Shape::Scalar(ScalarKind::Double)
    }

    pub fn char() -> Shape {
        Shape::Scalar(ScalarKind::Char)
    }

    pub fn string() -> Shape {
        Shape::Scalar(ScalarKind::String)
    }

    pub fn enumeration<I, T>(constants: I) -> Shape
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Shape::Scalar(ScalarKind::Enum(
            constants.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn custom(converter: impl Converter) -> Shape {
        Shape::Scalar(ScalarKind::Custom(Arc::new(converter)))
    }

    pub fn object(schema: Arc<ObjectSchema>) -> Shape {
        Shape::Object(schema)
    }

    pub fn list(element: Shape) -> Shape {
        Shape::List(Box::new(element))
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Shape::Scalar(kind) => kind.name().to_string(),
            Shape::Object(schema) => schema.name().to_string(),
            Shape::List(element) => format!("list<{}>", element.describe()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    json_name: Option<String>,
    shape: Shape,
    primitive: bool,
}

impl Field {
    /// Accessor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit JSON member name; when `None`, the naming strategy derives it.
    pub fn json_name(&self) -> Option<&str> {
        self.json_name.as_deref()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Primitive fields materialize a zero value instead of null.
    pub fn is_primitive(&self) -> bool {
        self.primitive
    }
}

#[derive(Debug)]
pub struct ObjectSchema {
    name: String,
    fields: Vec<Field>,
}

impl ObjectSchema {
    pub fn builder(name: impl Into<String>) -> ObjectSchemaBuilder {
        ObjectSchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

pub struct ObjectSchemaBuilder {
    name: String,
    fields: Vec<Field>,
}

impl ObjectSchemaBuilder {
    /// Adds a nullable field.
    pub fn field(self, name: impl Into<String>, shape: Shape) -> Self {
        self.push(name.into(), None, shape, false)
    }

    /// Adds a nullable field read from an explicitly named JSON member.
    pub fn field_as(
        self,
        name: impl Into<String>,
        json_name: impl Into<String>,
        shape: Shape,
    ) -> Self {
        self.push(name.into(), Some(json_name.into()), shape, false)
    }

    /// Adds a non-null scalar field; absent or null values read as zero.
    pub fn primitive(self, name: impl Into<String>, kind: ScalarKind) -> Self {
        self.push(name.into(), None, Shape::Scalar(kind), true)
    }

    pub fn build(self) -> Result<Arc<ObjectSchema>> {
        let mut names = AHashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(Error::invalid_definition(format!(
                    "{}: duplicate field `{}`",
                    self.name, field.name
                )));
            }
            if field.primitive {
                let zeroable = matches!(&field.shape, Shape::Scalar(kind) if kind.zero().is_some());
                if !zeroable {
                    return Err(Error::invalid_definition(format!(
                        "{}.{}: {} cannot be primitive",
                        self.name,
                        field.name,
                        field.shape.describe()
                    )));
                }
            }
            check_shape(&field.shape, &self.name, &field.name)?;
        }
        Ok(Arc::new(ObjectSchema {
            name: self.name,
            fields: self.fields,
        }))
    }

    fn push(
        mut self,
        name: String,
        json_name: Option<String>,
        shape: Shape,
        primitive: bool,
    ) -> Self {
        self.fields.push(Field {
            name,
            json_name,
            shape,
            primitive,
        });
        self
    }
}

fn check_shape(shape: &Shape, owner: &str, field: &str) -> Result<()> {
    match shape {
        Shape::Scalar(ScalarKind::Enum(constants)) => {
            if constants.is_empty() {
                return Err(Error::invalid_definition(format!(
                    "{owner}.{field}: enum without constants"
                )));
            }
            let mut seen = AHashSet::new();
            if let Some(dup) = constants.iter().find(|c| !seen.insert(c.as_str())) {
                return Err(Error::invalid_definition(format!(
                    "{owner}.{field}: duplicate enum constant `{dup}`"
                )));
            }
            Ok(())
        }
        Shape::List(element) => check_shape(element, owner, field),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use lazyjson_common::ErrorKind;

    use super::{ObjectSchema, ScalarKind, Shape};

    fn is_definition_error(result: lazyjson_common::Result<impl Sized>) -> bool {
        matches!(
            result.err().map(|e| e.into_kind()),
            Some(ErrorKind::InvalidDefinition { .. })
        )
    }

    #[test]
    fn test_build() {
        let address = ObjectSchema::builder("Address")
            .field("city", Shape::string())
            .build()
            .unwrap();
        let person = ObjectSchema::builder("Person")
            .field("name", Shape::string())
            .primitive("age", ScalarKind::Int)
            .field_as("home", "homeAddress", Shape::object(address))
            .field("tags", Shape::list(Shape::string()))
            .build()
            .unwrap();
        assert_eq!(person.fields().len(), 4);
        assert!(person.field("age").unwrap().is_primitive());
        assert_eq!(person.field("home").unwrap().json_name(), Some("homeAddress"));
        assert!(person.field("missing").is_none());
    }

    #[test]
    fn test_definition_errors() {
        let dup = ObjectSchema::builder("A")
            .field("x", Shape::int())
            .field("x", Shape::long())
            .build();
        assert!(is_definition_error(dup));

        let prim = ObjectSchema::builder("A")
            .primitive("s", ScalarKind::String)
            .build();
        assert!(is_definition_error(prim));

        let empty_enum = ObjectSchema::builder("A")
            .field("e", Shape::list(Shape::enumeration(Vec::<String>::new())))
            .build();
        assert!(is_definition_error(empty_enum));

        let dup_enum = ObjectSchema::builder("A")
            .field("e", Shape::enumeration(["X", "Y", "X"]))
            .build();
        assert!(is_definition_error(dup_enum));
    }
}
