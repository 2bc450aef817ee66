//! Lazy objects and lists.
//!
//! A branch is a window onto a key storage: an object reads its fields at `base + slot`,
//! a list reads element `i` at `i * width`. Scalars are decoded from the key itself when
//! inline, or from the document text at `stream_base + key - 1` otherwise. Nested objects
//! share their parent's storage; lists are resolved through the blueprint on access.

use std::{fmt, sync::Arc};

use lazyjson_blueprint::{FixedKeys, Key, NULL_KEY};
use lazyjson_common::{Error, Result, verify_data};

use crate::{
    decode,
    mapper::{Accessor, ElementMapper, Node, ObjectMapper, PropertyMapper},
    root::Root,
    schema::ScalarKind,
    value::{Scalar, Value},
};

/// An object whose fields are materialized on access.
#[derive(Clone)]
pub struct LazyObject {
    root: Root,
    mapper: Arc<ObjectMapper>,
    keys: Arc<FixedKeys>,
    stream_base: u64,
    /// Slot of the first field.
    base: usize,
}

impl LazyObject {
    pub fn schema_name(&self) -> &str {
        self.mapper.name()
    }

    pub fn mapper(&self) -> &ObjectMapper {
        &self.mapper
    }

    /// Pre-resolves `name` for repeated calls through [`get_by`](Self::get_by).
    pub fn accessor(&self, name: &str) -> Option<Accessor> {
        self.mapper.accessor(name)
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.invoke(name, &[])
    }

    /// Calls accessor `name`. Mapped fields take no arguments; any other call goes to
    /// the unsupported accessor policy.
    pub fn invoke(&self, name: &str, args: &[String]) -> Result<Value> {
        self.root.check_open()?;
        match self.mapper.accessor(name) {
            Some(accessor) if args.is_empty() => self.get_by(&accessor),
            _ => self.root.unsupported(self.mapper.name(), name, args),
        }
    }

    pub fn get_by(&self, accessor: &Accessor) -> Result<Value> {
        self.root.check_open()?;
        let (name, property) = self.mapper.resolve(accessor)?;
        let slot = self.base + property.slot();
        match property {
            PropertyMapper::Boxed { kind, .. } | PropertyMapper::Primitive { kind, .. } => {
                let key = self.keys.get(slot)?;
                let primitive = matches!(property, PropertyMapper::Primitive { .. });
                let read = ScalarRead {
                    root: &self.root,
                    kind,
                    stream_base: self.stream_base,
                    primitive,
                };
                read.value(key, || format!("{}.{name}", self.mapper.name()), Vec::new)
            }
            PropertyMapper::Object { mapper, .. } => {
                object_value(&self.root, mapper, &self.keys, self.stream_base, slot)
            }
            PropertyMapper::List { element, .. } => {
                list_value(&self.root, element, self.keys.get(slot)?)
            }
        }
    }

    /// `true` if the field was absent or `null` in the document.
    pub fn is_null(&self, name: &str) -> Result<bool> {
        Ok(self.key(name)? == NULL_KEY)
    }

    /// Raw key of a field.
    pub fn key(&self, name: &str) -> Result<Key> {
        self.root.check_open()?;
        let property = self.mapper.property(name).ok_or_else(|| {
            Error::unsupported_accessor(format!("{}.{name}", self.mapper.name()))
        })?;
        self.keys.get(self.base + property.slot())
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        self.typed(name, "bool", Scalar::as_bool)
    }

    /// Value of an integer field that fits in `i32`.
    pub fn get_i32(&self, name: &str) -> Result<Option<i32>> {
        self.typed(name, "int", |s| s.as_i64().and_then(|v| i32::try_from(v).ok()))
    }

    pub fn get_i64(&self, name: &str) -> Result<Option<i64>> {
        self.typed(name, "integer", Scalar::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Result<Option<f64>> {
        self.typed(name, "number", Scalar::as_f64)
    }

    pub fn get_char(&self, name: &str) -> Result<Option<char>> {
        self.typed(name, "char", Scalar::as_char)
    }

    /// Text of a string field, or the constant name of an enum field.
    pub fn get_str(&self, name: &str) -> Result<Option<String>> {
        self.typed(name, "string", |s| s.as_str().map(str::to_owned))
    }

    /// Ordinal of an enum field.
    pub fn get_enum(&self, name: &str) -> Result<Option<usize>> {
        self.typed(name, "enum", |s| match s {
            Scalar::Enum { ordinal, .. } => Some(*ordinal),
            _ => None,
        })
    }

    pub fn get_object(&self, name: &str) -> Result<Option<LazyObject>> {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::Object(object) => Ok(Some(object)),
            other => Err(mismatch(name, "object", &other)),
        }
    }

    pub fn get_list(&self, name: &str) -> Result<Option<LazyList>> {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::List(list) => Ok(Some(list)),
            other => Err(mismatch(name, "list", &other)),
        }
    }

    fn typed<T, F>(&self, name: &str, expected: &str, convert: F) -> Result<Option<T>>
    where
        F: FnOnce(&Scalar) -> Option<T>,
    {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::Scalar(scalar) => match convert(&scalar) {
                Some(v) => Ok(Some(v)),
                None => Err(Error::invalid_arg(
                    name,
                    format!("expected {expected}, found {} `{scalar}`", scalar.type_name()),
                )),
            },
            other => Err(mismatch(name, expected, &other)),
        }
    }
}

impl fmt::Debug for LazyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyObject")
            .field("schema", &self.schema_name())
            .field("base", &self.base)
            .field("stream_base", &self.stream_base)
            .finish_non_exhaustive()
    }
}

/// A list whose elements are materialized on access.
#[derive(Clone)]
pub struct LazyList {
    root: Root,
    element: Arc<ElementMapper>,
    keys: Arc<FixedKeys>,
    /// Offset of the list's `[`; element offsets are relative to it.
    stream_base: u64,
    len: usize,
}

impl LazyList {
    fn new(
        root: Root,
        element: Arc<ElementMapper>,
        keys: Arc<FixedKeys>,
        stream_base: u64,
    ) -> Result<LazyList> {
        let width = element.width();
        verify_data!(
            keys,
            keys.len() % width == 0,
            "{} keys do not split into elements of width {width}",
            keys.len()
        );
        Ok(LazyList {
            len: keys.len() / width,
            root,
            element,
            keys,
            stream_base,
        })
    }

    pub fn name(&self) -> &str {
        self.element.name()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Result<Value> {
        self.root.check_open()?;
        let slot = self.slot(index)?;
        match self.element.node() {
            Node::Scalar(kind) => {
                let read = ScalarRead {
                    root: &self.root,
                    kind,
                    stream_base: self.stream_base,
                    primitive: false,
                };
                read.value(
                    self.keys.get(slot)?,
                    || format!("{}.get", self.name()),
                    || vec![index.to_string()],
                )
            }
            Node::Object(mapper) => {
                object_value(&self.root, mapper, &self.keys, self.stream_base, slot)
            }
            Node::List(element) => list_value(&self.root, element, self.keys.get(slot)?),
        }
    }

    /// Accepts `get(index)` and `len()`; everything else goes to the unsupported accessor
    /// policy.
    pub fn invoke(&self, name: &str, args: &[String]) -> Result<Value> {
        self.root.check_open()?;
        match (name, args) {
            ("get", [index]) => match index.parse::<usize>() {
                Ok(index) => self.get(index),
                Err(_) => Err(Error::invalid_arg("index", format!("`{index}` is not an index"))),
            },
            ("len", []) => Ok(Value::Scalar(Scalar::Long(self.len as i64))),
            _ => self.root.unsupported(self.name(), name, args),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Value>> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    pub fn get_object(&self, index: usize) -> Result<Option<LazyObject>> {
        match self.get(index)? {
            Value::Null => Ok(None),
            Value::Object(object) => Ok(Some(object)),
            other => Err(mismatch(self.name(), "object", &other)),
        }
    }

    pub fn get_list(&self, index: usize) -> Result<Option<LazyList>> {
        match self.get(index)? {
            Value::Null => Ok(None),
            Value::List(list) => Ok(Some(list)),
            other => Err(mismatch(self.name(), "list", &other)),
        }
    }

    /// Raw key of an element (the presence key for object elements).
    pub fn key(&self, index: usize) -> Result<Key> {
        self.root.check_open()?;
        self.keys.get(self.slot(index)?)
    }

    fn slot(&self, index: usize) -> Result<usize> {
        if index >= self.len {
            return Err(Error::out_of_bounds(
                self.name(),
                index as u64,
                self.len as u64,
            ));
        }
        Ok(index * self.element.width())
    }
}

impl fmt::Debug for LazyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyList")
            .field("name", &self.name())
            .field("len", &self.len)
            .field("stream_base", &self.stream_base)
            .finish_non_exhaustive()
    }
}

/// An object whose presence key is at `slot` of `keys`; its fields follow.
pub(crate) fn object_value(
    root: &Root,
    mapper: &Arc<ObjectMapper>,
    keys: &Arc<FixedKeys>,
    stream_base: u64,
    slot: usize,
) -> Result<Value> {
    if keys.get(slot)? == NULL_KEY {
        return Ok(Value::Null);
    }
    Ok(Value::Object(LazyObject {
        root: root.clone(),
        mapper: mapper.clone(),
        keys: keys.clone(),
        stream_base,
        base: slot + 1,
    }))
}

pub(crate) fn list_value(root: &Root, element: &Arc<ElementMapper>, key: Key) -> Result<Value> {
    if key == NULL_KEY {
        return Ok(Value::Null);
    }
    let (keys, stream_base) = root.resolve_list(key)?;
    Ok(Value::List(LazyList::new(
        root.clone(),
        element.clone(),
        keys,
        stream_base,
    )?))
}

struct ScalarRead<'a> {
    root: &'a Root,
    kind: &'a ScalarKind,
    stream_base: u64,
    primitive: bool,
}

impl ScalarRead<'_> {
    /// Materializes the scalar behind `key`; argument strings are only built when the
    /// read fails.
    fn value<N, A>(&self, key: Key, accessor: N, args: A) -> Result<Value>
    where
        N: FnOnce() -> String,
        A: FnOnce() -> Vec<String>,
    {
        if key == NULL_KEY {
            return Ok(self.default());
        }
        let accessor = accessor();
        let read = if decode::is_inline(self.kind) {
            decode::decode_inline(self.kind, key).map(Some)
        } else {
            self.root
                .read_scalar(self.kind, decode::key_offset(key, self.stream_base), &accessor)
        };
        match read {
            Ok(Some(scalar)) => Ok(Value::Scalar(scalar)),
            Ok(None) => Ok(self.default()),
            Err(e) => self.root.recover(&accessor, args(), self.default(), e),
        }
    }

    fn default(&self) -> Value {
        match self.kind.zero() {
            Some(zero) if self.primitive => Value::Scalar(zero),
            _ => Value::Null,
        }
    }
}

fn mismatch(name: &str, expected: &str, found: &Value) -> Error {
    Error::invalid_arg(
        name,
        format!("expected {expected}, found {}", found.type_name()),
    )
}
