//! Data shared by every stage: tokens, the symbol table and the program
//! image handed from the assembler to the VM and the writers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the synthetic symbol holding the total memory size.
pub const TOPADDR: &str = "topaddr";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub lexeme: String,
    /// Terminal name from the grammar artifact, e.g. `reg` or `num`.
    pub kind: String,
    /// Byte offset into the source.
    pub offset: usize,
}

impl Token {
    pub fn new(lexeme: impl Into<String>, kind: impl Into<String>, offset: usize) -> Self {
        Self {
            lexeme: lexeme.into(),
            kind: kind.into(),
            offset,
        }
    }
}

/// `name -> absolute address`, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolTable {
    symbols: BTreeMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a definition; a second definition of the same name is fatal.
    pub fn insert(&mut self, name: &str, address: u32) -> Result<()> {
        if self.symbols.contains_key(name) {
            return Err(Error::DuplicateSymbol(name.to_string()));
        }
        self.symbols.insert(name.to_string(), address);
        Ok(())
    }

    /// Moves every entry of `other` in, rejecting any name defined on both sides.
    pub fn absorb(&mut self, other: SymbolTable) -> Result<()> {
        for (name, address) in other.symbols {
            self.insert(&name, address)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.symbols.iter().map(|(name, address)| (name.as_str(), *address))
    }
}

/// Assembler output: everything the VM needs to boot a program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    pub entry: Option<u32>,
    /// Instruction and `dw` words, in emission order.
    pub words: Vec<(u32, u64)>,
    pub bytes: Vec<(u32, u8)>,
    pub symbols: SymbolTable,
    /// First address past every statically placed word and byte.
    pub boundary: u32,
}

impl ProgramImage {
    /// Flattens words (big-endian, `address_size` bytes each) and bytes into
    /// one buffer covering `[0, boundary)`.
    pub fn flatten(&self, address_size: u32) -> Vec<u8> {
        let mut out = vec![0u8; self.boundary as usize];
        for &(address, word) in &self.words {
            for i in 0..address_size {
                let at = (address + i) as usize;
                if at < out.len() {
                    out[at] = (word >> ((address_size - i - 1) * 8)) as u8;
                }
            }
        }
        for &(address, byte) in &self.bytes {
            if let Some(slot) = out.get_mut(address as usize) {
                *slot = byte;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_insert_is_fatal() {
        let mut table = SymbolTable::new();
        table.insert("loop", 8).unwrap();
        assert_eq!(
            table.insert("loop", 12),
            Err(Error::DuplicateSymbol("loop".into()))
        );
        assert_eq!(table.get("loop"), Some(8));
    }

    #[test]
    fn test_absorb_detects_overlap() {
        let mut left = SymbolTable::new();
        left.insert("a", 0).unwrap();
        let mut right = SymbolTable::new();
        right.insert("b", 4).unwrap();
        left.absorb(right).unwrap();
        assert_eq!(left.len(), 2);

        let mut again = SymbolTable::new();
        again.insert("a", 16).unwrap();
        assert_eq!(left.absorb(again), Err(Error::DuplicateSymbol("a".into())));
    }

    #[test]
    fn test_flatten_is_big_endian() {
        let image = ProgramImage {
            entry: Some(0),
            words: vec![(0, 0x0102_0304)],
            bytes: vec![(5, 0xAA)],
            symbols: SymbolTable::new(),
            boundary: 6,
        };
        assert_eq!(image.flatten(4), vec![1, 2, 3, 4, 0, 0xAA]);
    }
}
