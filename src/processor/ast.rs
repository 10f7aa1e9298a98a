//! Syntax tree folded out of the derivation stream.
//!
//! Only symbols whose names carry no `_` ("plain" symbols) open a scope. A
//! plain symbol becomes a `Branch` node only if one of its helpers filed
//! children into numbered slots; otherwise its children are spliced into the
//! parent, which keeps chains like `Lines -> Line -> Tail` out of the tree.
//!
//! Helper suffixes:
//!
//! * `X_r`  - flush the tokens buffered since the scope opened as leaves.
//! * `X_sN` - move everything collected so far into slot `N`.

use std::collections::BTreeMap;

use super::parser::Derivation;
use crate::grammar::START;
use crate::model::Token;

/// Index of the `START` branch.
pub const ROOT: usize = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Branch(String),
    Slot(usize),
    Leaf(Token),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ast {
    nodes: Vec<Node>,
    children: Vec<Vec<usize>>,
}

impl Ast {
    fn new() -> Self {
        Self {
            nodes: vec![Node::Branch(START.to_string())],
            children: vec![Vec::new()],
        }
    }

    fn push(&mut self, node: Node, children: Vec<usize>) -> usize {
        self.nodes.push(node);
        self.children.push(children);
        self.nodes.len() - 1
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The `Slot(slot)` child of `index`.
    pub fn child(&self, index: usize, slot: usize) -> Option<usize> {
        self.children(index)
            .iter()
            .copied()
            .find(|&c| self.nodes[c] == Node::Slot(slot))
    }

    /// Every token under `index`, concatenated in pre-order.
    pub fn lexeme(&self, index: usize) -> String {
        let mut out = String::new();
        let mut pending = vec![index];
        while let Some(at) = pending.pop() {
            if let Node::Leaf(token) = &self.nodes[at] {
                out.push_str(&token.lexeme);
            }
            pending.extend(self.children[at].iter().rev());
        }
        out
    }
}

#[derive(Default)]
struct Scope {
    default: Vec<usize>,
    slots: BTreeMap<usize, Vec<usize>>,
}

/// Folds a derivation stream into a tree rooted at [`ROOT`].
pub fn build(derivation: &[Derivation]) -> Ast {
    let mut ast = Ast::new();
    let mut scopes = vec![Scope::default()];
    let mut buffer: Vec<Token> = Vec::new();

    for event in derivation {
        match event {
            Derivation::Enter(name) => {
                if is_plain(name) {
                    scopes.push(Scope::default());
                    buffer.clear();
                }
            }
            Derivation::Token(token) => buffer.push(token.clone()),
            Derivation::Exit(name) if is_plain(name) => {
                buffer.clear();
                if scopes.len() < 2 {
                    continue;
                }
                let Some(scope) = scopes.pop() else { continue };
                let folded = if scope.slots.is_empty() {
                    scope.default
                } else {
                    let slots: Vec<usize> = scope
                        .slots
                        .into_iter()
                        .map(|(n, members)| ast.push(Node::Slot(n), members))
                        .collect();
                    vec![ast.push(Node::Branch(name.clone()), slots)]
                };
                if let Some(parent) = scopes.last_mut() {
                    parent.default.extend(folded);
                }
            }
            Derivation::Exit(name) => {
                let Some(scope) = scopes.last_mut() else { continue };
                if name.ends_with("_r") {
                    for token in buffer.drain(..) {
                        scope.default.push(ast.push(Node::Leaf(token), Vec::new()));
                    }
                } else if let Some(slot) = slot_suffix(name) {
                    let moved = std::mem::take(&mut scope.default);
                    scope.slots.entry(slot).or_default().extend(moved);
                }
            }
        }
    }

    if let Some(seed) = scopes.into_iter().next() {
        ast.children[ROOT] = seed.default;
    }
    ast
}

fn is_plain(name: &str) -> bool {
    !name.contains('_')
}

/// `N` of a `..._sN` helper name.
fn slot_suffix(name: &str) -> Option<usize> {
    let (_, digits) = name.rsplit_once("_s")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
