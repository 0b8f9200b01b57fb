//! CIM object model as seen from the client side.
//!
//! Instances and object paths travel as JSON; property values are kept as
//! `serde_json::Value` and read through typed accessors. A reference-valued
//! property is a nested object path (`{"namespace", "class_name", "keybindings"}`).
//!
//! The [`Namespace`] trait is the seam between command modules and the
//! transport. [`bridge::BridgeNamespace`] implements it over an MCP bridge;
//! tests use the in-memory double in `memory`.

pub mod bridge;
#[cfg(test)]
pub mod memory;
pub mod target;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub const DEFAULT_NAMESPACE: &str = "root/cimv2";

/// Return code providers use for "job started"; the bridge waits for such
/// jobs, so it should never reach us, but it is not a failure either.
pub const JOB_STARTED: i64 = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPath {
    #[serde(default)]
    pub namespace: String,
    pub class_name: String,
    #[serde(default)]
    pub keybindings: BTreeMap<String, Value>,
}

impl ObjectPath {
    pub fn new(namespace: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            class_name: class_name.into(),
            keybindings: BTreeMap::new(),
        }
    }

    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keybindings.insert(name.into(), value.into());
        self
    }

    /// Key binding rendered as a string (numbers and booleans included).
    pub fn key(&self, name: &str) -> Option<String> {
        self.keybindings.get(name).and_then(value_to_string)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Reads a reference-valued property back into a path.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) if map.contains_key("class_name") => {
                serde_json::from_value(value.clone()).ok()
            }
            _ => None,
        }
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.namespace.is_empty() {
            write!(f, "{}:", self.namespace)?;
        }
        write!(f, "{}", self.class_name)?;
        let mut first = true;
        for (k, v) in &self.keybindings {
            let v = value_to_string(v).unwrap_or_default();
            write!(f, "{}{k}=\"{v}\"", if first { "." } else { "," })?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub path: ObjectPath,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Instance {
    pub fn new(path: ObjectPath) -> Self {
        Self {
            path,
            properties: Map::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn class_name(&self) -> &str {
        &self.path.class_name
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(|v| !v.is_null())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).filter(|v| !v.is_null())
    }

    pub fn string(&self, name: &str) -> Option<String> {
        self.get(name).and_then(value_to_string)
    }

    /// Property as display text, empty when absent.
    pub fn text(&self, name: &str) -> String {
        self.string(name).unwrap_or_default()
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn reference(&self, name: &str) -> Option<ObjectPath> {
        self.get(name).and_then(ObjectPath::from_value)
    }

    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
            Some(v) => value_to_string(v).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Whether every `(property, expected)` pair matches this instance.
    pub fn matches(&self, filter: &[(&str, &str)]) -> bool {
        filter
            .iter()
            .all(|(name, expected)| self.string(name).as_deref() == Some(*expected))
    }
}

/// Scalar JSON rendered the way tables show it.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(value_to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => ObjectPath::from_value(value).map(|p| p.to_string()),
    }
}

/// Formats a CIM datetime (`yyyymmddhhmmss.mmmmmmsutc`) as `YYYY/MM/DD`.
/// Interval values (`...:000`) and malformed input yield `None`.
pub fn cim_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.ends_with(":000") {
        return None;
    }
    let digits = raw.get(..8)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}/{}/{}", &digits[..4], &digits[4..6], &digits[6..8]))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodResult {
    pub return_value: Value,
    pub out: Map<String, Value>,
}

impl MethodResult {
    pub fn code(&self) -> i64 {
        match &self.return_value {
            Value::Number(n) => n.as_i64().unwrap_or(-1),
            Value::Null => 0,
            _ => -1,
        }
    }

    /// Turn a non-zero return code into [`Error::ProviderFailed`].
    pub fn check(self, method: &str) -> Result<Self> {
        let code = self.code();
        if code == 0 || code == JOB_STARTED {
            return Ok(self);
        }
        let message = self
            .out
            .get("ErrorDescription")
            .or_else(|| self.out.get("Error"))
            .and_then(value_to_string);
        Err(Error::ProviderFailed {
            method: method.to_string(),
            code,
            message,
        })
    }

    pub fn out_reference(&self, name: &str) -> Option<ObjectPath> {
        self.out.get(name).and_then(ObjectPath::from_value)
    }
}

/// Operations a command needs from a CIM namespace on one host.
pub trait Namespace {
    /// Namespace name, e.g. `root/cimv2`.
    fn name(&self) -> &str;

    fn instances(&self, class_name: &str) -> Result<Vec<Instance>>;

    fn get_instance(&self, path: &ObjectPath) -> Result<Instance>;

    fn associators(
        &self,
        path: &ObjectPath,
        assoc_class: Option<&str>,
        result_class: Option<&str>,
    ) -> Result<Vec<Instance>>;

    fn references(&self, path: &ObjectPath, result_class: Option<&str>) -> Result<Vec<Instance>>;

    fn invoke_method(
        &self,
        path: &ObjectPath,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<MethodResult>;

    fn create_instance(&self, class_name: &str, properties: Map<String, Value>)
    -> Result<ObjectPath>;

    fn modify_instance(&self, path: &ObjectPath, properties: Map<String, Value>) -> Result<()>;

    fn delete_instance(&self, path: &ObjectPath) -> Result<()>;

    fn first_instance(&self, class_name: &str, filter: &[(&str, &str)]) -> Result<Option<Instance>> {
        Ok(self
            .instances(class_name)?
            .into_iter()
            .find(|inst| inst.matches(filter)))
    }

    /// Like [`Namespace::first_instance`] with an empty filter, but a missing
    /// instance is an error: services and the computer system must exist.
    fn singleton(&self, class_name: &str) -> Result<Instance> {
        self.first_instance(class_name, &[])?
            .ok_or_else(|| Error::failed(format!("no instance of {class_name} on this host")))
    }

    fn first_associator(
        &self,
        path: &ObjectPath,
        assoc_class: Option<&str>,
        result_class: Option<&str>,
    ) -> Result<Option<Instance>> {
        Ok(self
            .associators(path, assoc_class, result_class)?
            .into_iter()
            .next())
    }

    /// Invoke and fail on a non-zero return code.
    fn call(&self, path: &ObjectPath, method: &str, params: Map<String, Value>) -> Result<MethodResult> {
        self.invoke_method(path, method, params)?.check(method)
    }
}
