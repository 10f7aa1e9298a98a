//! Binary artifact holding a compiled automaton and grammar.
//!
//! Layout (little-endian, every count is a `u16`):
//!
//! ```text
//! magic      "SLNG"
//! nodes      count { flags: u8 (bit0 skip, bit1 lazy), terminal: u16 (0xFFFF = none) }
//! edges      count { from: u16, count { to: u16, count { lo: u8, hi: u8 } } }
//! rules      count { symbol: u16, count { ordinal: u16, count { atom: u16 } } }
//! terminals  count { len: u8, utf-8 bytes }
//! symbols    count { len: u8, utf-8 bytes }
//! ```
//!
//! `symbol` and `atom` use the grammar's atom numbering; node terminals index
//! the terminal list.

use std::collections::BTreeMap;

use super::{Automaton, AutomatonNode, Grammar, Tables};

pub const MAGIC: &[u8; 4] = b"SLNG";
pub const NO_TERMINAL: u16 = 0xFFFF;

const FLAG_SKIP: u8 = 0b01;
const FLAG_LAZY: u8 = 0b10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("not a grammar artifact (bad magic)")]
    BadMagic,
    #[error("artifact truncated at byte {0}")]
    Truncated(usize),
    #[error("name at byte {0} is not valid UTF-8")]
    BadName(usize),
    #[error("node {node} refers to unknown terminal {terminal}")]
    UnknownTerminal { node: usize, terminal: usize },
    #[error("edge {from} -> {to} refers to a missing node")]
    UnknownNode { from: usize, to: usize },
    #[error("node {0} has two edges on the same byte")]
    Nondeterministic(usize),
    #[error("rules given for atom {0}, which is not a grammar symbol")]
    NotASymbol(usize),
    #[error("production refers to unknown atom {0}")]
    UnknownAtom(usize),
    #[error("grammar has no `{0}` symbol")]
    MissingSymbol(&'static str),
    #[error("{0} does not fit the artifact's field width")]
    TooLarge(&'static str),
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Result<u8, ArtifactError> {
        let byte = *self.bytes.get(self.at).ok_or(ArtifactError::Truncated(self.at))?;
        self.at += 1;
        Ok(byte)
    }

    fn u16(&mut self) -> Result<u16, ArtifactError> {
        let lo = self.u8()? as u16;
        let hi = self.u8()? as u16;
        Ok(lo | hi << 8)
    }

    fn count(&mut self) -> Result<usize, ArtifactError> {
        self.u16().map(usize::from)
    }

    fn name(&mut self) -> Result<String, ArtifactError> {
        let len = self.u8()? as usize;
        let start = self.at;
        let raw = self
            .bytes
            .get(start..start + len)
            .ok_or(ArtifactError::Truncated(self.bytes.len()))?;
        self.at += len;
        String::from_utf8(raw.to_vec()).map_err(|_| ArtifactError::BadName(start))
    }

    fn names(&mut self) -> Result<Vec<String>, ArtifactError> {
        let count = self.count()?;
        (0..count).map(|_| self.name()).collect()
    }
}

pub fn decode(bytes: &[u8]) -> Result<Tables, ArtifactError> {
    if bytes.get(..4) != Some(&MAGIC[..]) {
        return Err(ArtifactError::BadMagic);
    }
    let mut r = Reader { bytes, at: 4 };

    // ── automaton nodes ──────────────────────────────────────────────
    let mut nodes = Vec::new();
    for _ in 0..r.count()? {
        let flags = r.u8()?;
        let terminal = r.u16()?;
        nodes.push(AutomatonNode {
            terminal: (terminal != NO_TERMINAL).then_some(terminal as usize),
            lazy: flags & FLAG_LAZY != 0,
            skip: flags & FLAG_SKIP != 0,
        });
    }

    // ── automaton edges ──────────────────────────────────────────────
    let mut edges = Vec::new();
    for _ in 0..r.count()? {
        let from = r.count()?;
        for _ in 0..r.count()? {
            let to = r.count()?;
            for _ in 0..r.count()? {
                let lo = r.u8()?;
                let hi = r.u8()?;
                edges.push((from, to, lo, hi));
            }
        }
    }

    // ── grammar rules ────────────────────────────────────────────────
    let mut productions: BTreeMap<usize, Vec<Vec<usize>>> = BTreeMap::new();
    for _ in 0..r.count()? {
        let symbol = r.count()?;
        let mut ordered = BTreeMap::new();
        for _ in 0..r.count()? {
            let ordinal = r.count()?;
            let atoms = (0..r.count()?)
                .map(|_| r.count())
                .collect::<Result<Vec<_>, _>>()?;
            ordered.insert(ordinal, atoms);
        }
        productions.insert(symbol, ordered.into_values().collect());
    }

    let terminals = r.names()?;
    let symbols = r.names()?;

    for (index, node) in nodes.iter().enumerate() {
        if let Some(terminal) = node.terminal {
            if terminal >= terminals.len() {
                return Err(ArtifactError::UnknownTerminal {
                    node: index,
                    terminal,
                });
            }
        }
    }

    let mut automaton = Automaton::new(nodes, terminals.clone());
    for (from, to, lo, hi) in edges {
        if from >= automaton.nodes().len() || to >= automaton.nodes().len() {
            return Err(ArtifactError::UnknownNode { from, to });
        }
        automaton.add_edge(from, to, lo, hi);
    }
    if let Some(node) = automaton.ambiguous_node() {
        return Err(ArtifactError::Nondeterministic(node));
    }

    let grammar = Grammar::new(terminals, symbols, productions)?;
    Ok(Tables { automaton, grammar })
}

struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, value: u8) {
        self.out.push(value);
    }

    fn u16(&mut self, value: usize, what: &'static str) -> Result<(), ArtifactError> {
        let value = u16::try_from(value).map_err(|_| ArtifactError::TooLarge(what))?;
        self.out.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn names(&mut self, names: &[String], what: &'static str) -> Result<(), ArtifactError> {
        self.u16(names.len(), what)?;
        for name in names {
            let len = u8::try_from(name.len()).map_err(|_| ArtifactError::TooLarge(what))?;
            self.u8(len);
            self.out.extend_from_slice(name.as_bytes());
        }
        Ok(())
    }
}

pub fn encode(tables: &Tables) -> Result<Vec<u8>, ArtifactError> {
    let automaton = &tables.automaton;
    let grammar = &tables.grammar;
    let mut w = Writer { out: MAGIC.to_vec() };

    w.u16(automaton.nodes().len(), "node count")?;
    for node in automaton.nodes() {
        let mut flags = 0;
        if node.skip {
            flags |= FLAG_SKIP;
        }
        if node.lazy {
            flags |= FLAG_LAZY;
        }
        w.u8(flags);
        match node.terminal {
            Some(terminal) => w.u16(terminal, "terminal index")?,
            None => w.u16(NO_TERMINAL as usize, "terminal index")?,
        }
    }

    let sources: Vec<usize> = (0..automaton.nodes().len())
        .filter(|&node| !automaton.edges(node).is_empty())
        .collect();
    w.u16(sources.len(), "edge source count")?;
    for from in sources {
        w.u16(from, "node index")?;
        let targets = automaton.edges(from);
        w.u16(targets.len(), "edge target count")?;
        for (to, ranges) in targets {
            w.u16(*to, "node index")?;
            w.u16(ranges.len(), "range count")?;
            for &(lo, hi) in ranges {
                w.u8(lo);
                w.u8(hi);
            }
        }
    }

    let rules: Vec<_> = grammar.rules().collect();
    w.u16(rules.len(), "rule count")?;
    for (symbol, productions) in rules {
        w.u16(symbol, "atom index")?;
        w.u16(productions.len(), "production count")?;
        for (ordinal, production) in productions.iter().enumerate() {
            w.u16(ordinal, "production ordinal")?;
            w.u16(production.len(), "production length")?;
            for &atom in production {
                w.u16(atom, "atom index")?;
            }
        }
    }

    w.names(grammar.terminals(), "terminal names")?;
    w.names(grammar.symbols(), "symbol names")?;
    Ok(w.out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_magic() {
        assert_eq!(decode(b"NOPE\0\0").unwrap_err(), ArtifactError::BadMagic);
        assert_eq!(decode(b"SL").unwrap_err(), ArtifactError::BadMagic);
    }

    #[test]
    fn test_truncation_is_reported() {
        let bytes = encode(&Tables::moon().unwrap()).unwrap();
        let cut = &bytes[..bytes.len() / 2];
        assert!(matches!(decode(cut), Err(ArtifactError::Truncated(_))));
    }

    #[test]
    fn test_builtin_tables_survive_the_artifact() {
        let tables = Tables::moon().unwrap();
        let bytes = encode(&tables).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(decode(&bytes).unwrap(), tables);
    }

    /// One accepting node reached on 'x'; START -> x. `edges` is the raw
    /// edge section.
    fn minimal(edges: &[u8]) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend([2, 0]); // two nodes
        bytes.extend([0, 0xFF, 0xFF]); // start, non-accepting
        bytes.extend([FLAG_LAZY, 0, 0]); // accepts terminal 0
        bytes.extend(edges);
        bytes.extend([1, 0, 2, 0, 1, 0, 0, 0, 1, 0, 1, 0]); // atom 2 (START): [1]
        bytes.extend([1, 0, 1, b'x']); // terminals
        bytes.extend([2, 0, 5, b'S', b'T', b'A', b'R', b'T', 1, b'$']); // symbols
        bytes
    }

    #[test]
    fn test_minimal_artifact() {
        let bytes = minimal(&[1, 0, 0, 0, 1, 0, 1, 0, 1, 0, b'x', b'x']); // 0 -> 1 on 'x'

        let tables = decode(&bytes).unwrap();
        assert_eq!(tables.automaton.next(0, b'x'), Some(1));
        assert!(tables.automaton.nodes()[1].lazy);
        assert_eq!(tables.grammar.start(), 2);
        assert_eq!(tables.grammar.productions(2), &[vec![1]]);
    }

    #[test]
    fn test_rejects_overlapping_edges() {
        // 0 -> 1 on 'x' and 0 -> 0 on 'a'..='z'
        let bytes = minimal(&[1, 0, 0, 0, 2, 0, 1, 0, 1, 0, b'x', b'x', 0, 0, 1, 0, b'a', b'z']);
        assert_eq!(decode(&bytes).unwrap_err(), ArtifactError::Nondeterministic(0));
    }
}
