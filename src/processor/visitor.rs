//! Post-order traversal with per-rule dispatch.
//!
//! A pass implements [`Visitor`]; [`walk`] calls `enter` on the way down,
//! merges the results of a node's children in ascending id order into a fresh
//! accumulator and hands that to `exit`. Leaves go to `token`.

use super::ast::{Ast, Node, ROOT};
use crate::error::Result;
use crate::model::Token;

/// Operand shape of an instruction rule, named after its symbol suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Z,
    R,
    RR,
    RRR,
    RRC,
    RC,
    RO,
    OR,
    C,
    L,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Start,
    Label,
    Register,
    Number,
    Reference,
    Text,
    Instr(Shape),
    Other,
}

impl Rule {
    pub fn from_symbol(name: &str) -> Self {
        match name {
            "START" => Rule::Start,
            "Label" => Rule::Label,
            "Register" => Rule::Register,
            "Number" => Rule::Number,
            "Reference" => Rule::Reference,
            "Text" => Rule::Text,
            "InstrZ" => Rule::Instr(Shape::Z),
            "InstrR" => Rule::Instr(Shape::R),
            "InstrRR" => Rule::Instr(Shape::RR),
            "InstrRRR" => Rule::Instr(Shape::RRR),
            "InstrRRC" => Rule::Instr(Shape::RRC),
            "InstrRC" => Rule::Instr(Shape::RC),
            "InstrRO" => Rule::Instr(Shape::RO),
            "InstrOR" => Rule::Instr(Shape::OR),
            "InstrC" => Rule::Instr(Shape::C),
            "InstrL" => Rule::Instr(Shape::L),
            _ => Rule::Other,
        }
    }
}

/// Token kinds a pass may care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Id,
    Reg,
    Num,
    Str,
    Other,
}

impl Terminal {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "id" => Terminal::Id,
            "reg" => Terminal::Reg,
            "num" => Terminal::Num,
            "str" => Terminal::Str,
            _ => Terminal::Other,
        }
    }
}

/// Partial result of a subtree.
pub trait Accumulate: Default {
    /// Appends the result of the next sibling.
    fn absorb(&mut self, other: Self) -> Result<()>;
}

pub trait Visitor {
    type Data: Accumulate;

    fn enter(&mut self, _ast: &Ast, _index: usize, _rule: Rule) -> Result<()> {
        Ok(())
    }

    fn exit(&mut self, ast: &Ast, index: usize, rule: Rule, data: Self::Data) -> Result<Self::Data>;

    fn token(&mut self, _kind: Terminal, _token: &Token) -> Result<Self::Data> {
        Ok(Self::Data::default())
    }
}

/// Visits the whole tree and returns the root's result.
pub fn walk<V: Visitor>(visitor: &mut V, ast: &Ast) -> Result<V::Data> {
    visit(visitor, ast, ROOT)
}

fn visit<V: Visitor>(visitor: &mut V, ast: &Ast, index: usize) -> Result<V::Data> {
    match ast.node(index) {
        Node::Leaf(token) => visitor.token(Terminal::from_kind(&token.kind), token),
        Node::Slot(_) => merge(visitor, ast, index),
        Node::Branch(name) => {
            let rule = Rule::from_symbol(name);
            visitor.enter(ast, index, rule)?;
            let data = merge(visitor, ast, index)?;
            visitor.exit(ast, index, rule, data)
        }
    }
}

fn merge<V: Visitor>(visitor: &mut V, ast: &Ast, index: usize) -> Result<V::Data> {
    let mut children = ast.children(index).to_vec();
    children.sort_unstable();

    let mut data = V::Data::default();
    for child in children {
        let result = visit(visitor, ast, child)?;
        data.absorb(result)?;
    }
    Ok(data)
}
