//! Lazy, typed access to large JSON documents.
//!
//! Opening a document scans it once against a [`Shape`] and records, for every field,
//! either the value itself (booleans, bytes, enum constants) or the offset of its text.
//! The record, the *blueprint*, is all that stays in memory (or in a temporary file
//! for very large documents). Accessors then materialize values on demand:
//!
//! ```no_run
//! use lazyjson::{JsonSource, ObjectSchema, Root, ScalarKind, Shape};
//!
//! # fn main() -> lazyjson::Result<()> {
//! let person = ObjectSchema::builder("Person")
//!     .field("name", Shape::string())
//!     .primitive("age", ScalarKind::Int)
//!     .build()?;
//! let root = Root::open(JsonSource::file("people.json"), &Shape::list(Shape::object(person)))?;
//! if let Some(people) = root.list()? {
//!     for person in people.iter() {
//!         if let Some(person) = person?.into_object() {
//!             println!("{:?} is {:?}", person.get_str("name")?, person.get_i32("age")?);
//!         }
//!     }
//! }
//! root.close()?;
//! # Ok(())
//! # }
//! ```

pub mod branch;
pub mod cache;
pub mod config;
mod decode;
mod indexer;
pub mod json;
pub mod mapper;
pub mod naming;
pub mod root;
pub mod schema;
pub mod source;
pub mod value;

pub use branch::{LazyList, LazyObject};
pub use config::{Config, FailedReadPolicy, UnsupportedAccessorPolicy};
pub use lazyjson_blueprint::BackingKind;
pub use lazyjson_common::{Error, ErrorKind, Result, error::StdErrorBoxed};
pub use mapper::Accessor;
pub use naming::NamingStrategy;
pub use root::{Fallback, OpenOptions, Root};
pub use schema::{Converter, ObjectSchema, ScalarKind, Shape};
pub use source::JsonSource;
pub use value::{Scalar, Value};
