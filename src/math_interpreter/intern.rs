//! Content-addressable AST store.
//!
//! Structurally identical subtrees share one dense numeric id. The key of a
//! node is its operator, its arity and the ids of its interned children
//! (leaf payloads stand in for themselves); non-default bracket pairs are
//! appended so `[a]` and `(a)` do not collide. Ids are handed out from 1;
//! index 0 is reserved. Entries are append-only and live as long as the
//! pool.

use std::collections::HashMap;

use super::ast::{Arg, Node, NodeFlags, NumberFormat, Op};
use super::token::TokenKind;

#[derive(Debug, Clone)]
enum Part {
    Str(String),
    Id(usize),
}

#[derive(Debug, Clone)]
struct Record {
    op: Op,
    parts: Vec<Part>,
    lbrk: Option<TokenKind>,
    rbrk: Option<TokenKind>,
}

#[derive(Debug)]
pub struct Pool {
    records: Vec<Option<Record>>,
    ids: HashMap<String, usize>,
}

impl Default for Pool {
    fn default() -> Self {
        Pool::new()
    }
}

impl Pool {
    pub fn new() -> Self {
        Pool {
            records: vec![None],
            ids: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Intern `node` and every subtree below it; returns the node's id.
    pub fn intern(&mut self, node: &Node) -> usize {
        let mut parts = Vec::with_capacity(node.args.len());
        let mut key_parts: Vec<String> = Vec::with_capacity(node.args.len());
        for arg in &node.args {
            match arg {
                Arg::Str(s) => {
                    key_parts.push(s.clone());
                    parts.push(Part::Str(s.clone()));
                }
                Arg::Node(child) => {
                    let id = self.intern(child);
                    key_parts.push(id.to_string());
                    parts.push(Part::Id(id));
                }
            }
        }

        let mut key = format!("{:?} {} {}", node.op, node.args.len(), key_parts.join(" "));
        let default_brackets = matches!(
            node.lbrk,
            None | Some(TokenKind::LeftBrace) | Some(TokenKind::LeftBraceSet)
        );
        if !default_brackets {
            if let Some(c) = node.lbrk.and_then(TokenKind::bracket_char) {
                key.push(' ');
                key.push(c);
            }
            if let Some(c) = node.rbrk.and_then(TokenKind::bracket_char) {
                key.push(c);
            }
        }

        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.records.len();
        self.records.push(Some(Record {
            op: node.op,
            parts,
            lbrk: node.lbrk,
            rbrk: node.rbrk,
        }));
        self.ids.insert(key, id);
        id
    }

    /// Reconstruct a fresh, independent tree for `id`. NUM leaves get their
    /// `number_format` re-derived from the lexeme; shape flags are not part
    /// of the structural key and are not restored.
    pub fn node(&self, id: usize) -> Option<Node> {
        let record = self.records.get(id)?.as_ref()?;
        let mut args = Vec::with_capacity(record.parts.len());
        for part in &record.parts {
            match part {
                Part::Str(s) => args.push(Arg::Str(s.clone())),
                Part::Id(child) => args.push(Arg::Node(self.node(*child)?)),
            }
        }
        let number_format = if record.op == Op::Num {
            match args.first() {
                Some(Arg::Str(s)) => Some(if s.contains('.') {
                    NumberFormat::Decimal
                } else {
                    NumberFormat::Integer
                }),
                _ => None,
            }
        } else {
            None
        };
        Some(Node {
            op: record.op,
            args,
            lbrk: record.lbrk,
            rbrk: record.rbrk,
            number_format,
            separator_count: 0,
            last_separator_index: None,
            flags: NodeFlags::default(),
            location: None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_identical_subtrees_share_ids() {
        let mut pool = Pool::new();
        let a = Node::binary(Op::Add, Node::num("1"), Node::num("2"), true);
        let b = Node::binary(Op::Add, Node::num("1"), Node::num("2"), true);
        let ia = pool.intern(&a);
        let ib = pool.intern(&b);
        assert_eq!(ia, ib);
        // root + two distinct leaves
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_ids_start_at_one() {
        let mut pool = Pool::new();
        assert_eq!(pool.intern(&Node::num("7")), 1);
        assert!(pool.node(0).is_none());
    }

    #[test]
    fn test_round_trip() {
        let mut pool = Pool::new();
        let tree = Node::binary(
            Op::Frac,
            Node::num("1"),
            Node::binary(Op::Add, Node::var("x"), Node::num("2.5"), true),
            false,
        );
        let id = pool.intern(&tree);
        let back = pool.node(id).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_brackets_keep_nodes_apart() {
        let mut pool = Pool::new();
        let paren = Node::unary(Op::Matrix, Node::var("a"))
            .with_brackets(TokenKind::LeftParen, TokenKind::RightParen);
        let bracket = Node::unary(Op::Matrix, Node::var("a"))
            .with_brackets(TokenKind::LeftBracket, TokenKind::RightBracket);
        assert_ne!(pool.intern(&paren), pool.intern(&bracket));

        let mut braced = Node::unary(Op::Paren, Node::var("a"));
        braced.lbrk = Some(TokenKind::LeftBrace);
        braced.rbrk = Some(TokenKind::RightBrace);
        let plain = Node::unary(Op::Paren, Node::var("a"));
        // default brackets do not contribute to the key
        assert_eq!(pool.intern(&braced), pool.intern(&plain));
    }

    #[test]
    fn test_reconstruction_is_independent() {
        let mut pool = Pool::new();
        let id = pool.intern(&Node::num("3"));
        let mut copy = pool.node(id).unwrap();
        copy.args[0] = Arg::Str("4".into());
        assert_eq!(pool.node(id).unwrap().lexeme(), Some("3"));
    }
}
