//! Field-name casing strategies.
//!
//! An accessor name is split into words at `_`, `-`, `.` and whitespace, and at case
//! boundaries (`firstName`, `HTTPServer`), then re-joined in the target style.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    /// The accessor name is used as is.
    #[default]
    Identity,
    /// `firstName`
    Camel,
    /// `FirstName`
    UpperCamel,
    /// `first_name`
    Snake,
    /// `FIRST_NAME`
    UpperSnake,
    /// `first-name`
    Kebab,
    /// `FIRST-NAME`
    UpperKebab,
    /// `first.name`
    Dot,
    /// `FIRST.NAME`
    UpperDot,
}

impl NamingStrategy {
    /// Returns the JSON member name for the accessor `name`.
    pub fn apply(self, name: &str) -> String {
        let words = split_words(name);
        match self {
            NamingStrategy::Identity => name.to_string(),
            NamingStrategy::Camel => words
                .iter()
                .enumerate()
                .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
                .collect(),
            NamingStrategy::UpperCamel => words.iter().map(|w| capitalize(w)).collect(),
            NamingStrategy::Snake => join_lower(&words, "_"),
            NamingStrategy::UpperSnake => join_upper(&words, "_"),
            NamingStrategy::Kebab => join_lower(&words, "-"),
            NamingStrategy::UpperKebab => join_upper(&words, "-"),
            NamingStrategy::Dot => join_lower(&words, "."),
            NamingStrategy::UpperDot => join_upper(&words, "."),
        }
    }
}

fn split_words(name: &str) -> Vec<String> {
    let chars = name.chars().collect::<Vec<_>>();
    let mut words = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn join_lower(words: &[String], sep: &str) -> String {
    words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(sep)
}

fn join_upper(words: &[String], sep: &str) -> String {
    words
        .iter()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join(sep)
}
