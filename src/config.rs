//! Machine configuration.
//!
//! Loaded from an optional JSON file; every field has a default so an empty
//! object (or no file at all) yields the stock 32-bit machine with 4000 bytes
//! of memory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 16;

/// What the VM does when a load or store touches `[0, boundary)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protection {
    /// Record an error event and halt before the access happens.
    #[default]
    Halt,
    /// Record an error event and perform the access anyway.
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Architecture width in bits.
    pub bits: u32,
    /// Memory size in address units (words).
    pub memory_units: u32,
    /// Display names for registers, e.g. `"r14": "frame"`.
    pub registers: BTreeMap<String, String>,
    pub debug: bool,
    pub protection: Protection,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported architecture width {0} (expected a multiple of 8 in 32..=64)")]
    UnsupportedWidth(u32),
    #[error("memory must hold at least one word")]
    EmptyMemory,
    #[error("memory of {0} bytes does not fit the address space")]
    MemoryTooLarge(u64),
    #[error("alias `{alias}` names unknown register `{register}`")]
    UnknownAliasTarget { register: String, alias: String },
}

impl Default for Config {
    fn default() -> Self {
        let registers = [("r12", "self"), ("r13", "return"), ("r14", "frame"), ("r15", "stack")]
            .into_iter()
            .map(|(r, a)| (r.to_string(), a.to_string()))
            .collect();
        Self {
            bits: 32,
            memory_units: 1000,
            registers,
            debug: false,
            protection: Protection::Halt,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bits % 8 != 0 || !(32..=64).contains(&self.bits) {
            return Err(ConfigError::UnsupportedWidth(self.bits));
        }
        if self.memory_units == 0 {
            return Err(ConfigError::EmptyMemory);
        }
        let bytes = self.memory_units as u64 * self.address_size() as u64;
        if bytes > u32::MAX as u64 {
            return Err(ConfigError::MemoryTooLarge(bytes));
        }
        for (register, alias) in &self.registers {
            if parse_register(register).is_none() {
                return Err(ConfigError::UnknownAliasTarget {
                    register: register.clone(),
                    alias: alias.clone(),
                });
            }
        }
        Ok(())
    }

    /// Bytes per word; also the size of one instruction.
    pub fn address_size(&self) -> u32 {
        self.bits / 8
    }

    pub fn half_bits(&self) -> u32 {
        self.bits / 2
    }

    /// Total byte-addressable memory.
    pub fn memory_size(&self) -> u32 {
        self.memory_units * self.address_size()
    }

    /// Value of the synthetic `topaddr` symbol.
    pub fn topaddr(&self) -> u32 {
        self.memory_size()
    }

    /// Display name of register `index`, honouring aliases.
    pub fn register_name(&self, index: usize) -> String {
        let name = format!("r{index}");
        match self.registers.get(&name) {
            Some(alias) => alias.clone(),
            None => name,
        }
    }

    /// Resolves `rN` or a configured alias to a register index.
    pub fn register_index(&self, name: &str) -> Option<u8> {
        if let Some(index) = parse_register(name) {
            return Some(index);
        }
        self.registers
            .iter()
            .find(|(_, alias)| alias.as_str() == name)
            .and_then(|(register, _)| parse_register(register))
    }
}

fn parse_register(name: &str) -> Option<u8> {
    let digits = name.strip_prefix('r')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: usize = digits.parse().ok()?;
    (index < REGISTER_COUNT).then_some(index as u8)
}
