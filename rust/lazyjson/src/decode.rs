//! Key encoding of inline scalars and decoding of scalars from their JSON text.

use std::{str::FromStr, sync::Arc};

use lazyjson_blueprint::Key;
use lazyjson_common::{Error, Result};
use lazyjson_io::ByteStream;

use crate::{
    json::{JsonReader, TokenKind, mismatch},
    schema::ScalarKind,
    value::Scalar,
};

const BYTE_BIAS: Key = 129;

/// Key of a value stored at document offset `pos`, relative to the stream base `base`.
pub(crate) fn offset_key(pos: u64, base: u64) -> Key {
    (pos - base) as Key + 1
}

/// Absolute offset of the value behind an offset key.
pub(crate) fn key_offset(key: Key, base: u64) -> u64 {
    base + (key - 1) as u64
}

/// Key of an inline scalar (`false = 1`, `true = 2`, byte `b + 129`, enum ordinal `+ 1`).
pub(crate) fn inline_key(scalar: &Scalar) -> Option<Key> {
    match scalar {
        Scalar::Bool(v) => Some(if *v { 2 } else { 1 }),
        Scalar::Byte(v) => Some(*v as Key + BYTE_BIAS),
        Scalar::Enum { ordinal, .. } => Some(*ordinal as Key + 1),
        _ => None,
    }
}

pub(crate) fn is_inline(kind: &ScalarKind) -> bool {
    matches!(kind, ScalarKind::Bool | ScalarKind::Byte | ScalarKind::Enum(_))
}

/// Decodes a non-null inline key of the given kind.
pub(crate) fn decode_inline(kind: &ScalarKind, key: Key) -> Result<Scalar> {
    let scalar = match kind {
        ScalarKind::Bool if key == 1 || key == 2 => Scalar::Bool(key == 2),
        ScalarKind::Byte if (1..=256).contains(&key) => Scalar::Byte((key - BYTE_BIAS) as i8),
        ScalarKind::Enum(constants) if key >= 1 && ((key - 1) as u64) < constants.len() as u64 => {
            let ordinal = (key - 1) as usize;
            Scalar::Enum {
                ordinal,
                name: Arc::from(constants[ordinal].as_str()),
            }
        }
        _ => {
            return Err(Error::invalid_format_msg(
                "key",
                format!("{key} is not a valid {} key", kind.name()),
            ));
        }
    };
    Ok(scalar)
}

/// Reads one scalar of the given kind at the reader's position. `None` for JSON null.
pub(crate) fn read_scalar<S: ByteStream>(
    reader: &mut JsonReader<S>,
    kind: &ScalarKind,
    field: &str,
) -> Result<Option<Scalar>> {
    let token = reader.require_token()?;
    if token.kind == TokenKind::Null {
        reader.read_literal()?;
        return Ok(None);
    }
    let scalar = match kind {
        ScalarKind::Bool => Scalar::Bool(reader.read_bool()?),
        ScalarKind::Byte => Scalar::Byte(parse_number(reader, "byte")?),
        ScalarKind::Short => Scalar::Short(parse_number(reader, "short")?),
        ScalarKind::Int => Scalar::Int(parse_number(reader, "int")?),
        ScalarKind::Long => Scalar::Long(parse_number(reader, "long")?),
        ScalarKind::Float => Scalar::Float(parse_number(reader, "float")?),
        ScalarKind::Double => Scalar::Double(parse_number(reader, "double")?),
        ScalarKind::Char => {
            let text = reader.read_string()?;
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Scalar::Char(c),
                _ => {
                    return Err(Error::invalid_format_msg(
                        "json",
                        format!("`{text}` at offset {} is not a single character", token.pos),
                    ));
                }
            }
        }
        ScalarKind::String => Scalar::String(reader.read_string()?.into()),
        ScalarKind::Enum(constants) => {
            let name = reader.read_string()?;
            let ordinal = constants.iter().position(|c| *c == name).ok_or_else(|| {
                Error::invalid_format_msg(
                    "json",
                    format!("unknown constant `{name}` at offset {} for {field}", token.pos),
                )
            })?;
            Scalar::Enum {
                ordinal,
                name: name.into(),
            }
        }
        ScalarKind::Custom(converter) => {
            let text = match token.kind {
                TokenKind::String => reader.read_string()?,
                TokenKind::Number => reader.read_number()?,
                TokenKind::True | TokenKind::False => {
                    reader.read_literal()?;
                    (token.kind == TokenKind::True).to_string()
                }
                _ => return Err(mismatch("scalar", token)),
            };
            return converter
                .convert(&text)
                .map_err(|e| Error::conversion(field, e));
        }
    };
    Ok(Some(scalar))
}

fn parse_number<T, S>(reader: &mut JsonReader<S>, type_name: &str) -> Result<T>
where
    T: FromStr,
    S: ByteStream,
{
    let pos = reader.require_token()?.pos;
    let text = reader.read_number()?;
    text.parse::<T>().map_err(|_| {
        Error::invalid_format_msg(
            "json",
            format!("`{text}` at offset {pos} is not a valid {type_name}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lazyjson_common::ErrorKind;
    use lazyjson_io::ReaderStream;

    use super::{decode_inline, inline_key, read_scalar};
    use crate::{json::JsonReader, schema::ScalarKind, value::Scalar};

    fn read(text: &str, kind: &ScalarKind) -> lazyjson_common::Result<Option<Scalar>> {
        let mut reader = JsonReader::new(ReaderStream::new(text.as_bytes()));
        read_scalar(&mut reader, kind, "T.f")
    }

    #[test]
    fn test_inline_keys() {
        assert_eq!(inline_key(&Scalar::Bool(false)), Some(1));
        assert_eq!(inline_key(&Scalar::Bool(true)), Some(2));
        assert_eq!(inline_key(&Scalar::Byte(-128)), Some(1));
        assert_eq!(inline_key(&Scalar::Byte(127)), Some(256));
        assert_eq!(inline_key(&Scalar::Int(1)), None);

        assert_eq!(decode_inline(&ScalarKind::Byte, 129).unwrap(), Scalar::Byte(0));
        assert_eq!(decode_inline(&ScalarKind::Bool, 2).unwrap(), Scalar::Bool(true));
        assert!(decode_inline(&ScalarKind::Bool, 3).is_err());
        assert!(decode_inline(&ScalarKind::Byte, 257).is_err());

        let colors = ScalarKind::Enum(Arc::from(vec!["RED".to_string(), "BLUE".to_string()]));
        assert_eq!(decode_inline(&colors, 2).unwrap().as_str(), Some("BLUE"));
        assert!(decode_inline(&colors, 3).is_err());
    }

    #[test]
    fn test_read_scalars() {
        assert_eq!(read("-7", &ScalarKind::Int).unwrap(), Some(Scalar::Int(-7)));
        assert_eq!(read("2.5", &ScalarKind::Double).unwrap(), Some(Scalar::Double(2.5)));
        assert_eq!(read("3", &ScalarKind::Float).unwrap(), Some(Scalar::Float(3.0)));
        assert_eq!(read("null", &ScalarKind::Long).unwrap(), None);
        assert_eq!(read("\"\\u00e9\"", &ScalarKind::Char).unwrap(), Some(Scalar::Char('é')));
        assert!(read("\"ab\"", &ScalarKind::Char).is_err());
        assert!(read("40000", &ScalarKind::Short).is_err());
        assert!(read("1.5", &ScalarKind::Int).is_err());
        assert!(read("\"1\"", &ScalarKind::Int).is_err());
    }

    struct Upper;

    impl crate::schema::Converter for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn convert(
            &self,
            text: &str,
        ) -> Result<Option<Scalar>, lazyjson_common::error::StdErrorBoxed> {
            if text.is_empty() {
                return Err("empty".into());
            }
            Ok(Some(Scalar::String(text.to_uppercase().into())))
        }
    }

    #[test]
    fn test_custom_converter() {
        let kind = ScalarKind::Custom(Arc::new(Upper));
        assert_eq!(read("\"abc\"", &kind).unwrap().unwrap().as_str(), Some("ABC"));
        assert_eq!(read("true", &kind).unwrap().unwrap().as_str(), Some("TRUE"));
        let err = read("\"\"", &kind).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Conversion { field, .. } if field == "T.f"));
    }
}
