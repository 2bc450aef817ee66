//! Error taxonomy and argument checks shared by all lazyjson-* crates.

pub mod error;

pub use error::{Error, ErrorKind, Result};
