//! Node factory
//!
//! A statically registered map from node-kind key to constructor. Specs
//! name their kind by key; the manager resolves it here and constructs
//! the node with its context (name, bus handle, argument bag).

use std::collections::HashMap;
use std::sync::Arc;

use crate::node::{Node, NodeContext};

/// Constructor for one node kind
pub type NodeConstructor = Box<dyn Fn(&NodeContext) -> Arc<dyn Node> + Send + Sync>;

/// Registry of node constructors keyed by kind
#[derive(Default)]
pub struct NodeFactory {
    constructors: HashMap<String, NodeConstructor>,
}

impl NodeFactory {
    /// Empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `kind`, replacing any previous one
    pub fn register(
        &mut self,
        kind: &str,
        constructor: impl Fn(&NodeContext) -> Arc<dyn Node> + Send + Sync + 'static,
    ) {
        self.constructors
            .insert(kind.to_owned(), Box::new(constructor));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(
        mut self,
        kind: &str,
        constructor: impl Fn(&NodeContext) -> Arc<dyn Node> + Send + Sync + 'static,
    ) -> Self {
        self.register(kind, constructor);
        self
    }

    /// Look up the constructor for `kind`
    pub fn resolve(&self, kind: &str) -> Option<&NodeConstructor> {
        self.constructors.get(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}
