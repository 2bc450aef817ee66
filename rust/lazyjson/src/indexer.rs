//! The indexing pass.
//!
//! Walks the document once and writes the blueprint:
//!
//! ```text
//! [list record]* [root keys] [list table]
//! list record = list(element keys) key(stream base)
//! ```
//!
//! A list record's handle is the writer position right after it; the list table holds
//! the handles in list-id order. List records are written when their closing `]` is
//! reached, so nested lists come before the lists containing them. Offsets stored in
//! element keys are relative to the list's `[`; offsets in the root keys are absolute.

use lazyjson_blueprint::{BlueprintSource, BlueprintWriter, DynamicKeys, FixedKeys, Key, NULL_KEY};
use lazyjson_common::{Error, Result};
use lazyjson_io::ByteStream;

use crate::{
    config::Config,
    decode,
    json::{JsonReader, Token, TokenKind, mismatch},
    mapper::{ElementMapper, Node, ObjectMapper, PropertyMapper},
    schema::ScalarKind,
};

pub(crate) fn index<S: ByteStream>(
    stream: S,
    root: &ElementMapper,
    config: &Config,
) -> Result<BlueprintSource> {
    let mut indexer = Indexer {
        reader: JsonReader::new(stream),
        writer: BlueprintWriter::new(config.blueprint_config())?,
        table: DynamicKeys::new(),
        config,
    };

    let keys = FixedKeys::new(root.width());
    let keys = match root.node() {
        Node::Object(mapper) => indexer.object(mapper, keys, 0, 0, 1)?,
        Node::List(element) => {
            let key = indexer.list(element, 1)?;
            keys.set(0, key)?
        }
        Node::Scalar(kind) => {
            return Err(Error::invalid_definition(format!(
                "root must be an object or a list, found {}",
                kind.name()
            )));
        }
    };
    if let Some(token) = indexer.reader.peek_token()? {
        return Err(mismatch("end of input", token));
    }

    let table = std::mem::take(&mut indexer.table).into_fixed();
    indexer.writer.put_keys(&keys)?;
    indexer.writer.put_keys(&table)?;
    log::debug!(
        "indexed {} bytes: {} list(s), {} blueprint bytes",
        indexer.reader.position(),
        table.len(),
        indexer.writer.position()
    );
    indexer.writer.close()
}

struct Indexer<'a, S> {
    reader: JsonReader<S>,
    writer: BlueprintWriter,
    /// Handles of the list records written so far, by list id.
    table: DynamicKeys,
    config: &'a Config,
}

impl<S: ByteStream> Indexer<'_, S> {
    /// Indexes an object (or null) whose presence slot is `slot`; its fields follow.
    fn object(
        &mut self,
        mapper: &ObjectMapper,
        keys: FixedKeys,
        slot: usize,
        base: u64,
        depth: usize,
    ) -> Result<FixedKeys> {
        let token = self.reader.require_token()?;
        match token.kind {
            TokenKind::Null => {
                self.reader.read_literal()?;
                return Ok(keys);
            }
            TokenKind::BeginObject => (),
            _ => return Err(type_error(mapper.name(), "object", token)),
        }
        self.reader.expect(TokenKind::BeginObject)?;
        let mut keys = keys.set(slot, decode::offset_key(token.pos, base))?;
        let at = slot + 1;
        let mut seen = vec![false; mapper.len()];

        if self.reader.require_token()?.kind == TokenKind::EndObject {
            self.reader.next_token()?;
        } else {
            loop {
                let member = self.reader.read_string()?;
                self.reader.expect(TokenKind::Colon)?;
                match mapper.by_json_name(&member) {
                    Some((index, name, property)) => {
                        seen[index] = true;
                        keys = self.property(mapper, name, property, keys, at, base, depth)?;
                    }
                    None if self.config.fail_on_unknown_fields => {
                        return Err(Error::invalid_format_msg(
                            mapper.name(),
                            format!("unknown field `{member}`"),
                        ));
                    }
                    None => self
                        .reader
                        .skip_value(self.config.max_depth.saturating_sub(depth))?,
                }

                let token = self.reader.require_token()?;
                match token.kind {
                    TokenKind::Comma => {
                        self.reader.next_token()?;
                    }
                    TokenKind::EndObject => {
                        self.reader.next_token()?;
                        break;
                    }
                    _ => return Err(mismatch("`,` or `}`", token)),
                }
            }
        }

        if self.config.fail_on_missing_fields {
            let missing = mapper
                .properties()
                .zip(&seen)
                .find(|(_, seen)| !**seen)
                .map(|((name, _), _)| name);
            if let Some(name) = missing {
                return Err(Error::invalid_format_msg(
                    mapper.name(),
                    format!("missing field `{name}`"),
                ));
            }
        }
        Ok(keys)
    }

    #[allow(clippy::too_many_arguments)]
    fn property(
        &mut self,
        owner: &ObjectMapper,
        name: &str,
        property: &PropertyMapper,
        keys: FixedKeys,
        at: usize,
        base: u64,
        depth: usize,
    ) -> Result<FixedKeys> {
        match property {
            PropertyMapper::Boxed { slot, kind } | PropertyMapper::Primitive { slot, kind } => {
                let key = self.scalar(kind, base, owner.name(), name)?;
                keys.set(at + slot, key)
            }
            PropertyMapper::Object { slot, mapper } => {
                self.object(mapper, keys, at + slot, base, depth + 1)
            }
            PropertyMapper::List { slot, element } => {
                let key = self.list(element, depth + 1)?;
                keys.set(at + slot, key)
            }
        }
    }

    fn scalar(&mut self, kind: &ScalarKind, base: u64, owner: &str, name: &str) -> Result<Key> {
        let token = self.reader.require_token()?;
        if token.kind == TokenKind::Null {
            self.reader.read_literal()?;
            return Ok(NULL_KEY);
        }
        if decode::is_inline(kind) {
            let scalar = decode::read_scalar(&mut self.reader, kind, name)?;
            return Ok(scalar.as_ref().and_then(decode::inline_key).unwrap_or(NULL_KEY));
        }
        let accepted = match kind {
            ScalarKind::Short
            | ScalarKind::Int
            | ScalarKind::Long
            | ScalarKind::Float
            | ScalarKind::Double => token.kind == TokenKind::Number,
            ScalarKind::Char | ScalarKind::String => token.kind == TokenKind::String,
            _ => matches!(
                token.kind,
                TokenKind::String | TokenKind::Number | TokenKind::True | TokenKind::False
            ),
        };
        if !accepted {
            return Err(type_error(&format!("{owner}.{name}"), kind.name(), token));
        }
        self.reader.next_token()?;
        Ok(decode::offset_key(token.pos, base))
    }

    /// Indexes a list (or null) and returns its key.
    fn list(&mut self, element: &ElementMapper, depth: usize) -> Result<Key> {
        let token = self.reader.require_token()?;
        match token.kind {
            TokenKind::Null => {
                self.reader.read_literal()?;
                return Ok(NULL_KEY);
            }
            TokenKind::BeginArray => (),
            _ => return Err(type_error(element.name(), "list", token)),
        }
        let base = self.reader.expect(TokenKind::BeginArray)?;

        let keys = match element.node() {
            Node::Object(mapper) => {
                let mut template = FixedKeys::new(element.width());
                let mut parts = Vec::new();
                self.items(|indexer| {
                    let item = indexer.object(mapper, template.reproduce(), 0, base, depth + 1)?;
                    template = item.reproduce();
                    parts.push(item);
                    Ok(())
                })?;
                FixedKeys::concat(&parts)?
            }
            Node::Scalar(kind) => {
                self.collect_keys(|indexer| indexer.scalar(kind, base, element.name(), "[]"))?
            }
            Node::List(inner) => self.collect_keys(|indexer| indexer.list(inner, depth + 1))?,
        };

        self.writer.put_keys(&keys)?;
        self.writer.put(base as Key)?;
        let id = self.table.len() as Key;
        let handle = self.writer.position() as Key;
        self.table = std::mem::take(&mut self.table).add(handle);
        Ok(id + 1)
    }

    fn collect_keys<F>(&mut self, mut next: F) -> Result<FixedKeys>
    where
        F: FnMut(&mut Self) -> Result<Key>,
    {
        let mut keys = DynamicKeys::new();
        self.items(|indexer| {
            let key = next(indexer)?;
            keys = std::mem::take(&mut keys).add(key);
            Ok(())
        })?;
        Ok(keys.into_fixed())
    }

    /// Calls `each` once per array element; the reader is just past the `[`.
    fn items<F>(&mut self, mut each: F) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<()>,
    {
        if self.reader.require_token()?.kind == TokenKind::EndArray {
            self.reader.next_token()?;
            return Ok(());
        }
        loop {
            each(self)?;
            let token = self.reader.require_token()?;
            match token.kind {
                TokenKind::Comma => {
                    self.reader.next_token()?;
                }
                TokenKind::EndArray => {
                    self.reader.next_token()?;
                    return Ok(());
                }
                _ => return Err(mismatch("`,` or `]`", token)),
            }
        }
    }
}

fn type_error(owner: &str, expected: &str, token: Token) -> Error {
    Error::invalid_format_msg(
        owner,
        format!(
            "expected {expected}, found {} at offset {}",
            token.kind.describe(),
            token.pos
        ),
    )
}

#[cfg(test)]
mod tests {
    use lazyjson_blueprint::BlueprintSource;
    use lazyjson_common::ErrorKind;
    use lazyjson_io::ReaderStream;

    use super::index;
    use crate::{
        config::Config,
        mapper::compile,
        schema::{ObjectSchema, ScalarKind, Shape},
    };

    fn run(shape: &Shape, text: &str, config: &Config) -> lazyjson_common::Result<BlueprintSource> {
        let root = compile(shape, config)?;
        index(ReaderStream::new(text.as_bytes()), &root, config)
    }

    fn point() -> Shape {
        let schema = ObjectSchema::builder("Point")
            .primitive("x", ScalarKind::Int)
            .field("visible", Shape::bool())
            .build()
            .unwrap();
        Shape::object(schema)
    }

    #[test]
    fn test_root_object_keys() {
        let text = r#"{"x": 12, "visible": true}"#;
        let source = run(&point(), text, &Config::default()).unwrap();
        let mut reader = source.reader();
        let table = reader.get_list().unwrap();
        assert!(table.is_empty());
        let keys = reader.get_list().unwrap();
        // presence at `{`, offset of `12`, inline `true`
        assert_eq!(keys.to_vec(), vec![1, 7, 2]);
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_list_records() {
        let shape = Shape::list(point());
        let text = r#"[{"x": 1}, null, {"visible": false, "x": 3}]"#;
        let source = run(&shape, text, &Config::default()).unwrap();
        let mut reader = source.reader();
        let table = reader.get_list().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(reader.get_list().unwrap().to_vec(), vec![1]);

        reader.set_position(table.get(0).unwrap() as u64).unwrap();
        assert_eq!(reader.get().unwrap(), 0);
        let elements = reader.get_list().unwrap();
        assert_eq!(
            elements.to_vec(),
            vec![
                2, 8, 0, // {"x": 1}
                0, 0, 0, // null
                18, 42, 1, // {"visible": false, "x": 3}
            ]
        );
    }

    #[test]
    fn test_nested_lists_are_written_first() {
        let shape = Shape::list(Shape::list(Shape::int()));
        let source = run(&shape, "[[1, 2], [], null, [3]]", &Config::default()).unwrap();
        let mut reader = source.reader();
        let table = reader.get_list().unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(reader.get_list().unwrap().to_vec(), vec![4]);

        reader.set_position(table.get(3).unwrap() as u64).unwrap();
        reader.get().unwrap();
        assert_eq!(reader.get_list().unwrap().to_vec(), vec![1, 2, 0, 3]);

        reader.set_position(table.get(0).unwrap() as u64).unwrap();
        assert_eq!(reader.get().unwrap(), 1);
        assert_eq!(reader.get_list().unwrap().to_vec(), vec![2, 5]);
    }

    #[test]
    fn test_unknown_and_missing_fields() {
        let text = r#"{"x": 1, "extra": {"deep": [1, 2, {"a": null}]}}"#;
        run(&point(), text, &Config::default()).unwrap();

        let strict = Config::default().with_strict_fields(true, false);
        assert!(run(&point(), text, &strict).is_err());

        let strict = Config::default().with_strict_fields(false, true);
        assert!(run(&point(), r#"{"x": 1}"#, &strict).is_err());
        run(&point(), r#"{"x": 1, "visible": null}"#, &strict).unwrap();
    }

    #[test]
    fn test_malformed_documents() {
        let config = Config::default();
        for text in [
            "",
            r#"{"x": "1"}"#,
            r#"{"x": 1,}"#,
            r#"{"x": 1} {}"#,
            r#"{"visible": 1}"#,
            r#"{"x" 1}"#,
            r#"[]"#,
        ] {
            assert!(run(&point(), text, &config).is_err(), "{text}");
        }
    }

    #[test]
    fn test_malformed_unknown_members() {
        for text in [
            r#"{"x": 1, "extra": [1 2 3]}"#,
            r#"{"x": 1, "extra": {"a" "b"}}"#,
            r#"{"x": 1, "extra": {: , :}}"#,
            r#"{"x": 1, "extra": [,,]}"#,
        ] {
            let err = run(&point(), text, &Config::default()).unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }), "{text}");
        }
    }

    #[test]
    fn test_unknown_value_depth_is_bounded() {
        let text = r#"{"skip": [[[[1]]]]}"#;
        run(&point(), text, &Config::default().with_max_depth(5)).unwrap();
        assert!(run(&point(), text, &Config::default().with_max_depth(4)).is_err());
    }
}
