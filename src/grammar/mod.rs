//! Static tables driving the front end: the tokenizer automaton, the grammar
//! and the LL(1) parse table derived from it.
//!
//! Tables normally come from a compiled artifact (see [`artifact`]); the Moon
//! assembly language also ships built in (see [`moon`]).

pub mod artifact;
pub mod automaton;
pub mod moon;
pub mod table;

use std::collections::{BTreeMap, HashMap};

pub use artifact::ArtifactError;
pub use automaton::{Automaton, AutomatonNode};
pub use table::ParseTable;

/// Atom index reserved for the empty production.
pub const EPSILON: usize = 0;
/// Name of the grammar start symbol.
pub const START: &str = "START";
/// Name of the end-of-input marker symbol.
pub const END: &str = "$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    Epsilon,
    Terminal(String),
    Symbol(String),
    End,
}

/// Grammar atoms plus the productions of every symbol.
///
/// Atoms are numbered `0` (epsilon), then the terminals in list order, then
/// the symbols in list order. The symbol named `$` is the end marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    atoms: Vec<Atom>,
    terminals: Vec<String>,
    symbols: Vec<String>,
    productions: BTreeMap<usize, Vec<Vec<usize>>>,
    start: usize,
    end: usize,
    by_terminal: HashMap<String, usize>,
}

impl Grammar {
    pub fn new(
        terminals: Vec<String>,
        symbols: Vec<String>,
        productions: BTreeMap<usize, Vec<Vec<usize>>>,
    ) -> Result<Self, ArtifactError> {
        let mut atoms = vec![Atom::Epsilon];
        let mut by_terminal = HashMap::new();
        for name in &terminals {
            by_terminal.insert(name.clone(), atoms.len());
            atoms.push(Atom::Terminal(name.clone()));
        }

        let mut start = None;
        let mut end = None;
        for name in &symbols {
            match name.as_str() {
                END => {
                    end = Some(atoms.len());
                    atoms.push(Atom::End);
                }
                _ => {
                    if name == START {
                        start = Some(atoms.len());
                    }
                    atoms.push(Atom::Symbol(name.clone()));
                }
            }
        }
        let start = start.ok_or(ArtifactError::MissingSymbol(START))?;
        let end = end.ok_or(ArtifactError::MissingSymbol(END))?;

        for (&symbol, rules) in &productions {
            if !matches!(atoms.get(symbol), Some(Atom::Symbol(_))) {
                return Err(ArtifactError::NotASymbol(symbol));
            }
            for &atom in rules.iter().flatten() {
                if atom >= atoms.len() {
                    return Err(ArtifactError::UnknownAtom(atom));
                }
            }
        }

        Ok(Self {
            atoms,
            terminals,
            symbols,
            productions,
            start,
            end,
            by_terminal,
        })
    }

    pub fn atom(&self, index: usize) -> &Atom {
        &self.atoms[index]
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn terminals(&self) -> &[String] {
        &self.terminals
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Productions of `symbol`, empty for symbols without rules.
    pub fn productions(&self, symbol: usize) -> &[Vec<usize>] {
        self.productions.get(&symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every `(symbol, productions)` pair in atom order.
    pub fn rules(&self) -> impl Iterator<Item = (usize, &[Vec<usize>])> {
        self.productions.iter().map(|(&symbol, rules)| (symbol, rules.as_slice()))
    }

    /// Atom index of the terminal a token kind names.
    pub fn terminal_atom(&self, kind: &str) -> Option<usize> {
        self.by_terminal.get(kind).copied()
    }

    pub fn symbol_atom(&self, name: &str) -> Option<usize> {
        self.atoms
            .iter()
            .position(|atom| matches!(atom, Atom::Symbol(s) if s == name))
    }

    pub fn atom_name(&self, index: usize) -> &str {
        match &self.atoms[index] {
            Atom::Epsilon => "ε",
            Atom::Terminal(name) | Atom::Symbol(name) => name,
            Atom::End => END,
        }
    }
}

/// Automaton and grammar as loaded from one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub automaton: Automaton,
    pub grammar: Grammar,
}

impl Tables {
    pub fn decode(bytes: &[u8]) -> Result<Self, ArtifactError> {
        artifact::decode(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>, ArtifactError> {
        artifact::encode(self)
    }

    /// The built-in Moon assembly tables.
    pub fn moon() -> Result<Self, ArtifactError> {
        moon::tables()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_atom_numbering() {
        let mut productions = BTreeMap::new();
        // START -> a
        productions.insert(3, vec![vec![1]]);
        let grammar = Grammar::new(names(&["a", "b"]), names(&["START", "$"]), productions).unwrap();

        assert_eq!(grammar.atom(EPSILON), &Atom::Epsilon);
        assert_eq!(grammar.atom(1), &Atom::Terminal("a".into()));
        assert_eq!(grammar.start(), 3);
        assert_eq!(grammar.end(), 4);
        assert_eq!(grammar.atom(4), &Atom::End);
        assert_eq!(grammar.terminal_atom("b"), Some(2));
        assert_eq!(grammar.atom_name(4), "$");
    }

    #[test]
    fn test_missing_start_or_end() {
        let test_cases = vec![
            (names(&["$"]), ArtifactError::MissingSymbol(START)),
            (names(&["START"]), ArtifactError::MissingSymbol(END)),
        ];
        for (symbols, expected) in test_cases {
            let result = Grammar::new(names(&["a"]), symbols, BTreeMap::new());
            assert_eq!(result.unwrap_err(), expected);
        }
    }

    #[test]
    fn test_rejects_rules_on_terminals() {
        let mut productions = BTreeMap::new();
        productions.insert(1, vec![vec![EPSILON]]);
        let result = Grammar::new(names(&["a"]), names(&["START", "$"]), productions);
        assert_eq!(result.unwrap_err(), ArtifactError::NotASymbol(1));
    }
}
