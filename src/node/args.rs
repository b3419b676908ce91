//! Node argument bag
//!
//! Nodes are constructed from specs carrying an open key -> value bag of
//! primitive arguments, the in-process equivalent of the per-node `args`
//! mapping in a deployment config file.

use std::collections::HashMap;

/// A primitive argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// String value
    Str(String),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Str(s.to_owned())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Str(s)
    }
}

impl From<i64> for ArgValue {
    fn from(i: i64) -> Self {
        ArgValue::Int(i)
    }
}

impl From<f64> for ArgValue {
    fn from(x: f64) -> Self {
        ArgValue::Float(x)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

/// Open string-keyed bag of primitive arguments
#[derive(Debug, Clone, Default)]
pub struct NodeArgs {
    values: HashMap<String, ArgValue>,
}

impl NodeArgs {
    /// Empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument, builder-style
    pub fn with(mut self, key: &str, value: impl Into<ArgValue>) -> Self {
        self.values.insert(key.to_owned(), value.into());
        self
    }

    /// Raw lookup
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.values.get(key)
    }

    /// String argument, if present and a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ArgValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Integer argument, if present and an integer
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(ArgValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Float argument; integer values coerce
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(ArgValue::Float(x)) => Some(*x),
            Some(ArgValue::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }

    /// Boolean argument, if present and a boolean
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(ArgValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
