//! The Model facade.
//!
//! A Model owns an intern pool and a stack of environments. Parsing reads
//! the top environment's identifiers (the scanner's greedy matching) and
//! detects chemistry mode from it; the environment must not change while a
//! parse is running, which the borrow on `create` enforces. Downstream
//! plugin operations live in a separate [`Registry`] and are dispatched by
//! name against a model/node pair; the parser itself never touches them.

use std::collections::HashMap;

use super::ast::Node;
use super::error::ParseError;
use super::intern::Pool;
use super::options::Options;
use super::parser;

/// What an identifier in the environment stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Unit,
    /// A periodic-table symbol; any of these switches on chemistry mode.
    Element,
    Function,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
}

/// Identifier-to-descriptor map consulted during scanning.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    symbols: HashMap<String, Symbol>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn insert(&mut self, name: &str, kind: SymbolKind) {
        self.symbols.insert(name.to_string(), Symbol { kind });
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// The key set, for the scanner's greedy identifier matching.
    pub fn identifiers(&self) -> Vec<String> {
        self.symbols.keys().cloned().collect()
    }

    pub fn is_chemistry(&self) -> bool {
        self.symbols.values().any(|s| s.kind == SymbolKind::Element)
    }
}

/// Input accepted by [`Model::create`].
pub enum Source<'a> {
    Latex(&'a str),
    Tree(&'a Node),
}

pub struct Model {
    pool: Pool,
    base_env: Environment,
    env_stack: Vec<Environment>,
}

impl Default for Model {
    fn default() -> Self {
        Model::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Model {
            pool: Pool::new(),
            base_env: Environment::new(),
            env_stack: vec![],
        }
    }

    pub fn push_env(&mut self, env: Environment) {
        self.env_stack.push(env);
    }

    pub fn pop_env(&mut self) -> Option<Environment> {
        self.env_stack.pop()
    }

    pub fn env(&self) -> &Environment {
        self.env_stack.last().unwrap_or(&self.base_env)
    }

    /// Parse a source string or deep-copy an existing tree; an optional
    /// location tag is attached to the root.
    pub fn create(
        &mut self,
        options: &Options,
        source: Source,
        location: Option<&str>,
    ) -> Result<Node, ParseError> {
        let mut node = match source {
            Source::Latex(src) => parser::parse(options, src, self.env())?,
            Source::Tree(tree) => tree.deep_copy(),
        };
        if let Some(loc) = location {
            node.location = Some(loc.to_string());
        }
        Ok(node)
    }

    pub fn from_latex(&mut self, options: &Options, src: &str) -> Result<Node, ParseError> {
        self.create(options, Source::Latex(src), None)
    }

    /// Intern a tree into this model's pool; ids are stable for the life
    /// of the model.
    pub fn intern(&mut self, node: &Node) -> usize {
        self.pool.intern(node)
    }

    /// A fresh independent copy of the tree behind `id`.
    pub fn node(&self, id: usize) -> Option<Node> {
        self.pool.node(id)
    }
}

/// A plugin operation mounted on model/node pairs.
pub type PluginFn = fn(&Model, &Node) -> Node;

/// Registry of downstream plugin operations, keyed by name. The parser
/// only guarantees the AST shapes these operations consume.
#[derive(Default)]
pub struct Registry {
    fns: HashMap<String, PluginFn>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register(&mut self, name: &str, f: PluginFn) {
        self.fns.insert(name.to_string(), f);
    }

    pub fn dispatch(&self, name: &str, model: &Model, node: &Node) -> Option<Node> {
        self.fns.get(name).map(|f| f(model, node))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math_interpreter::ast::Op;

    #[test]
    fn test_env_stack() {
        let mut model = Model::new();
        assert!(!model.env().is_chemistry());

        let mut env = Environment::new();
        env.insert("Na", SymbolKind::Element);
        model.push_env(env);
        assert!(model.env().is_chemistry());

        model.pop_env();
        assert!(!model.env().is_chemistry());
    }

    #[test]
    fn test_create_from_latex() {
        let mut model = Model::new();
        let node = model.from_latex(&Options::default(), "1+2").unwrap();
        assert_eq!(node.op, Op::Add);
    }

    #[test]
    fn test_create_from_tree_is_a_copy() {
        let mut model = Model::new();
        let original = Node::var("x");
        let copy = model
            .create(&Options::default(), Source::Tree(&original), Some("here"))
            .unwrap();
        assert_eq!(copy.op, Op::Var);
        assert_eq!(copy.location.as_deref(), Some("here"));
        assert!(original.location.is_none());
    }

    #[test]
    fn test_intern_round_trip() {
        let mut model = Model::new();
        let node = model.from_latex(&Options::default(), "x+1").unwrap();
        let id = model.intern(&node);
        let back = model.node(id).unwrap();
        assert_eq!(back.op, node.op);
        assert_eq!(back.arity(), node.arity());
    }

    #[test]
    fn test_registry_dispatch() {
        fn degree(_m: &Model, n: &Node) -> Node {
            n.deep_copy()
        }
        let mut registry = Registry::new();
        registry.register("degree", degree);

        let model = Model::new();
        let node = Node::var("x");
        assert!(registry.dispatch("degree", &model, &node).is_some());
        assert!(registry.dispatch("missing", &model, &node).is_none());
    }
}
