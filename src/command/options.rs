//! Normalized option map handed to command callables.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Turn a grammar key into the name commands read it by.
///
/// `<device>` becomes `device`, `--nodeletehome` becomes `_nodeletehome`
/// and inner dashes become underscores (`--allow-duplicates` ->
/// `_allow_duplicates`).
pub fn normalize_key(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(inner) = raw.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        return inner.replace('-', "_");
    }
    if let Some(long) = raw.strip_prefix("--") {
        return format!("_{}", long.replace('-', "_"));
    }
    if let Some(short) = raw.strip_prefix('-') {
        return format!("_{}", short.replace('-', "_"));
    }
    raw.replace('-', "_")
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptValue {
    Flag(bool),
    Value(Option<String>),
    List(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    values: BTreeMap<String, OptValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: OptValue) {
        self.values.insert(key.into(), value);
    }

    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(v) = self.values.remove(from) {
            self.values.insert(to.to_string(), v);
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(OptValue::Flag(true)))
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(OptValue::Value(v)) => v.as_deref(),
            Some(OptValue::List(items)) => items.first().map(String::as_str),
            _ => None,
        }
    }

    pub fn required(&self, key: &str) -> Result<&str> {
        self.value(key)
            .ok_or_else(|| Error::invalid(format!("missing value for {key}")))
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(OptValue::List(items)) => items.clone(),
            Some(OptValue::Value(Some(v))) => vec![v.clone()],
            _ => Vec::new(),
        }
    }

    /// Parse a numeric option, rejecting anything but plain digits.
    pub fn number(&self, key: &str, what: &str) -> Result<Option<u64>> {
        match self.value(key) {
            None => Ok(None),
            Some(v) if !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()) => v
                .parse()
                .map(Some)
                .map_err(|_| Error::invalid(format!("{what} is out of range"))),
            Some(_) => Err(Error::invalid(format!("{what} must be a number"))),
        }
    }
}

#[cfg(test)]
impl Options {
    pub fn with(mut self, key: &str, value: OptValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}
