//! Dispatch tables compiled from a schema.
//!
//! Every object schema becomes an [`ObjectMapper`]: one [`PropertyMapper`] per field,
//! carrying the field's slot in the flattened key layout and its decode strategy. A
//! mapper is shared by every instance of its schema. Slots are assigned in declaration
//! order: a scalar or list takes one slot, a nested object takes one presence slot
//! followed by its own fields.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use ahash::AHashMap;
use lazyjson_common::{Error, Result};

use crate::{
    config::Config,
    naming::NamingStrategy,
    schema::{ObjectSchema, ScalarKind, Shape},
};

static NEXT_MAPPER_ID: AtomicU64 = AtomicU64::new(1);

/// Decode strategy of one mapped field.
#[derive(Debug, Clone)]
pub enum PropertyMapper {
    /// Scalar that reads as null when absent.
    Boxed { slot: usize, kind: ScalarKind },
    /// Scalar that reads as zero when absent.
    Primitive { slot: usize, kind: ScalarKind },
    /// Nested object; `slot` is its presence slot.
    Object { slot: usize, mapper: Arc<ObjectMapper> },
    /// List; the key at `slot` refers to the list table.
    List { slot: usize, element: Arc<ElementMapper> },
}

impl PropertyMapper {
    pub fn slot(&self) -> usize {
        match self {
            PropertyMapper::Boxed { slot, .. }
            | PropertyMapper::Primitive { slot, .. }
            | PropertyMapper::Object { slot, .. }
            | PropertyMapper::List { slot, .. } => *slot,
        }
    }

    fn width(&self) -> usize {
        match self {
            PropertyMapper::Object { mapper, .. } => 1 + mapper.width,
            _ => 1,
        }
    }

    fn height(&self) -> usize {
        match self {
            PropertyMapper::Object { mapper, .. } => mapper.height,
            PropertyMapper::List { element, .. } => 1 + element.height,
            _ => 0,
        }
    }
}

/// A pre-resolved accessor, valid for every object of the schema it was resolved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Accessor {
    mapper: u64,
    index: usize,
}

#[derive(Debug)]
pub struct ObjectMapper {
    id: u64,
    name: String,
    /// Number of slots taken by the fields, excluding the presence slot.
    width: usize,
    height: usize,
    accessors: Vec<String>,
    properties: Vec<PropertyMapper>,
    by_accessor: AHashMap<String, usize>,
    by_json_name: AHashMap<String, usize>,
}

impl ObjectMapper {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn accessor(&self, name: &str) -> Option<Accessor> {
        self.by_accessor.get(name).map(|&index| Accessor {
            mapper: self.id,
            index,
        })
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMapper> {
        self.by_accessor.get(name).map(|&i| &self.properties[i])
    }

    /// Resolves a pre-resolved accessor to its name and mapper.
    pub(crate) fn resolve(&self, accessor: &Accessor) -> Result<(&str, &PropertyMapper)> {
        if accessor.mapper != self.id || accessor.index >= self.properties.len() {
            return Err(Error::invalid_arg(
                "accessor",
                format!("not resolved on {}", self.name),
            ));
        }
        Ok((&self.accessors[accessor.index], &self.properties[accessor.index]))
    }

    pub(crate) fn by_json_name(&self, json_name: &str) -> Option<(usize, &str, &PropertyMapper)> {
        self.by_json_name
            .get(json_name)
            .map(|&i| (i, self.accessors[i].as_str(), &self.properties[i]))
    }

    pub(crate) fn properties(&self) -> impl Iterator<Item = (&str, &PropertyMapper)> {
        self.accessors
            .iter()
            .map(String::as_str)
            .zip(self.properties.iter())
    }
}

/// What one element of a list, or the document root, decodes to.
#[derive(Debug, Clone)]
pub enum Node {
    Scalar(ScalarKind),
    Object(Arc<ObjectMapper>),
    List(Arc<ElementMapper>),
}

#[derive(Debug)]
pub struct ElementMapper {
    /// Name used in accessor identities and error messages.
    name: String,
    node: Node,
    /// Slots per element: one, plus the fields of an object element.
    width: usize,
    height: usize,
}

impl ElementMapper {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

/// Compiles the mapper of the document root, which must be an object or a list.
pub fn compile(shape: &Shape, config: &Config) -> Result<Arc<ElementMapper>> {
    if let Shape::Scalar(kind) = shape {
        return Err(Error::invalid_definition(format!(
            "root must be an object or a list, found {}",
            kind.name()
        )));
    }
    let mut compiler = Compiler {
        naming: config.naming,
        objects: AHashMap::new(),
    };
    let root = compiler.element(shape, "root".to_string())?;
    let depth = root.height;
    if depth > config.max_depth {
        return Err(Error::invalid_definition(format!(
            "nesting depth {depth} exceeds {}",
            config.max_depth
        )));
    }
    log::debug!("compiled mapper for {} (depth {depth})", shape.describe());
    Ok(root)
}

struct Compiler {
    naming: NamingStrategy,
    /// Mappers already compiled, keyed by schema address, so that a schema used in
    /// several places shares one mapper.
    objects: AHashMap<usize, Arc<ObjectMapper>>,
}

impl Compiler {
    fn element(&mut self, shape: &Shape, name: String) -> Result<Arc<ElementMapper>> {
        let (node, width, height) = match shape {
            Shape::Scalar(kind) => (Node::Scalar(kind.clone()), 1, 0),
            Shape::Object(schema) => {
                let mapper = self.object(schema)?;
                let (width, height) = (1 + mapper.width, mapper.height);
                (Node::Object(mapper), width, height)
            }
            Shape::List(inner) => {
                let element = self.element(inner, format!("{name}[]"))?;
                let height = 1 + element.height;
                (Node::List(element), 1, height)
            }
        };
        Ok(Arc::new(ElementMapper {
            name,
            node,
            width,
            height,
        }))
    }

    fn object(&mut self, schema: &Arc<ObjectSchema>) -> Result<Arc<ObjectMapper>> {
        let address = Arc::as_ptr(schema) as usize;
        if let Some(mapper) = self.objects.get(&address) {
            return Ok(mapper.clone());
        }

        let mut slot = 0;
        let mut accessors = Vec::with_capacity(schema.fields().len());
        let mut properties = Vec::with_capacity(schema.fields().len());
        let mut by_accessor = AHashMap::new();
        let mut by_json_name: AHashMap<String, usize> = AHashMap::new();
        for (index, field) in schema.fields().iter().enumerate() {
            let property = match field.shape() {
                Shape::Scalar(kind) if field.is_primitive() => PropertyMapper::Primitive {
                    slot,
                    kind: kind.clone(),
                },
                Shape::Scalar(kind) => PropertyMapper::Boxed {
                    slot,
                    kind: kind.clone(),
                },
                Shape::Object(nested) => PropertyMapper::Object {
                    slot,
                    mapper: self.object(nested)?,
                },
                Shape::List(inner) => PropertyMapper::List {
                    slot,
                    element: self.element(inner, format!("{}.{}", schema.name(), field.name()))?,
                },
            };
            slot += property.width();

            let json_name = field
                .json_name()
                .map(str::to_string)
                .unwrap_or_else(|| self.naming.apply(field.name()));
            if let Some(&other) = by_json_name.get(&json_name) {
                return Err(Error::invalid_definition(format!(
                    "{}: fields `{}` and `{}` both map to JSON member `{json_name}`",
                    schema.name(),
                    schema.fields()[other].name(),
                    field.name()
                )));
            }
            by_json_name.insert(json_name, index);
            by_accessor.insert(field.name().to_string(), index);
            accessors.push(field.name().to_string());
            properties.push(property);
        }

        let height = 1 + properties.iter().map(PropertyMapper::height).max().unwrap_or(0);
        let mapper = Arc::new(ObjectMapper {
            id: NEXT_MAPPER_ID.fetch_add(1, Ordering::Relaxed),
            name: schema.name().to_string(),
            width: slot,
            height,
            accessors,
            properties,
            by_accessor,
            by_json_name,
        });
        self.objects.insert(address, mapper.clone());
        Ok(mapper)
    }
}
