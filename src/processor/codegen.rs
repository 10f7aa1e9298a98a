//! Second assembler pass: resolves operands and packs instruction words.

use super::ast::Ast;
use super::layout::{Cursor, Layout, mnemonic, parse_number, text_codes};
use super::op::{Format, Op};
use super::visitor::{self, Accumulate, Rule, Shape, Terminal, Visitor};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{ProgramImage, SymbolTable, Token};
use crate::warn;

/// Operands collected below an instruction plus everything emitted so far.
#[derive(Debug, Default)]
pub struct Emission {
    pub entry: Option<u32>,
    pub registers: Vec<u8>,
    pub constants: Vec<i64>,
    pub words: Vec<(u32, u64)>,
    pub bytes: Vec<(u32, u8)>,
}

impl Accumulate for Emission {
    fn absorb(&mut self, other: Self) -> Result<()> {
        self.entry = self.entry.or(other.entry);
        self.registers.extend(other.registers);
        self.constants.extend(other.constants);
        self.words.extend(other.words);
        self.bytes.extend(other.bytes);
        Ok(())
    }
}

/// Exactly `N` operands of one kind.
fn take<const N: usize, T: Copy>(values: &[T], mnemonic: &str, kind: &'static str) -> Result<[T; N]> {
    <[T; N]>::try_from(values).map_err(|_| Error::OperandCount {
        mnemonic: mnemonic.to_string(),
        kind,
        expected: N,
        found: values.len(),
    })
}

struct CodegenPass<'a> {
    cursor: Cursor,
    format: Format,
    symbols: &'a SymbolTable,
    config: &'a Config,
}

impl CodegenPass<'_> {
    fn check_fits(&self, address: u32, size: u32) -> Result<()> {
        let end = address as u64 + size as u64;
        if end > self.config.memory_size() as u64 {
            return Err(Error::ImageOverflow {
                boundary: end,
                memory: self.config.memory_size(),
            });
        }
        Ok(())
    }

    fn immediate(&self, mnemonic: &str, k: i64) -> Result<i64> {
        if !self.format.fits_immediate(k) {
            return Err(Error::InvalidOperand {
                mnemonic: mnemonic.to_string(),
                reason: format!("{k} does not fit a {}-bit immediate", self.format.half_bits()),
            });
        }
        Ok(k)
    }

    fn emit(&mut self, shape: Shape, mnemonic: &str, data: &mut Emission) -> Result<()> {
        let address = self.cursor.address()?;
        let op = match Op::from_mnemonic(mnemonic) {
            Some(op) => op,
            None => {
                warn!("codegen", "unknown mnemonic `{mnemonic}` at {address}, encoded as bad");
                Op::Bad
            }
        };
        let regs = std::mem::take(&mut data.registers);
        let consts = std::mem::take(&mut data.constants);
        let f = self.format;

        let word = match shape {
            Shape::Z => {
                take::<0, _>(&regs, mnemonic, "register")?;
                match op {
                    Op::Entry => {
                        data.entry = data.entry.or(Some(address));
                        None
                    }
                    Op::Align => None,
                    _ => Some(f.encode_register(op, 0, 0, 0)),
                }
            }
            Shape::R => {
                let [ri] = take(&regs, mnemonic, "register")?;
                Some(f.encode_register(op, ri, 0, 0))
            }
            Shape::RR => {
                let [ri, rj] = take(&regs, mnemonic, "register")?;
                Some(f.encode_register(op, ri, rj, 0))
            }
            Shape::RRR => {
                let [ri, rj, rk] = take(&regs, mnemonic, "register")?;
                Some(f.encode_register(op, ri, rj, rk))
            }
            Shape::RRC | Shape::RO => {
                let [ri, rj] = take(&regs, mnemonic, "register")?;
                let [k] = take(&consts, mnemonic, "constant")?;
                Some(f.encode_immediate(op, ri, rj, self.immediate(mnemonic, k)?))
            }
            Shape::OR => {
                let [rj, ri] = take(&regs, mnemonic, "register")?;
                let [k] = take(&consts, mnemonic, "constant")?;
                Some(f.encode_immediate(op, ri, rj, self.immediate(mnemonic, k)?))
            }
            Shape::RC => {
                let [ri] = take(&regs, mnemonic, "register")?;
                let [k] = take(&consts, mnemonic, "constant")?;
                Some(f.encode_immediate(op, ri, 0, self.immediate(mnemonic, k)?))
            }
            Shape::C => {
                let [k] = take(&consts, mnemonic, "constant")?;
                match op {
                    Op::Org | Op::Res => None,
                    _ => Some(f.encode_immediate(op, 0, 0, self.immediate(mnemonic, k)?)),
                }
            }
            Shape::L => {
                self.data(op, mnemonic, address, &consts, data)?;
                None
            }
        };

        if let Some(word) = word {
            self.check_fits(address, self.cursor.address_size)?;
            data.words.push((address, word));
        }
        let operands: Vec<Option<i64>> = consts.iter().copied().map(Some).collect();
        self.cursor.advance(op, mnemonic, &operands)
    }

    /// `dw` / `db`: one word or byte per constant, consecutively.
    fn data(&self, op: Op, mnemonic: &str, start: u32, values: &[i64], data: &mut Emission) -> Result<()> {
        let size = match op {
            Op::Dw => self.cursor.address_size,
            Op::Db => 1,
            _ => {
                return Err(Error::InvalidOperand {
                    mnemonic: mnemonic.to_string(),
                    reason: "not a data directive".into(),
                });
            }
        };
        for (i, &value) in values.iter().enumerate() {
            let address = (start as u64 + i as u64 * size as u64) as u32;
            self.check_fits(address, size)?;
            if op == Op::Dw {
                data.words.push((address, value as u64 & self.format.word_mask()));
            } else {
                let byte = u8::try_from(value)
                    .or_else(|_| i8::try_from(value).map(|b| b as u8))
                    .map_err(|_| Error::InvalidOperand {
                        mnemonic: mnemonic.to_string(),
                        reason: format!("{value} does not fit a byte"),
                    })?;
                data.bytes.push((address, byte));
            }
        }
        Ok(())
    }
}

impl Visitor for CodegenPass<'_> {
    type Data = Emission;

    fn exit(&mut self, ast: &Ast, index: usize, rule: Rule, mut data: Emission) -> Result<Emission> {
        match rule {
            Rule::Register => {
                let name = ast.lexeme(index);
                let register = self
                    .config
                    .register_index(&name)
                    .ok_or(Error::InvalidRegister(name))?;
                data.registers.push(register);
            }
            Rule::Reference => {
                let name = ast.lexeme(index);
                let address = self.symbols.get(&name).ok_or(Error::UnresolvedSymbol(name))?;
                data.constants.push(address as i64);
            }
            Rule::Instr(shape) => {
                let mnemonic = mnemonic(ast, index);
                self.emit(shape, &mnemonic, &mut data)?;
            }
            _ => {}
        }
        Ok(data)
    }

    fn token(&mut self, kind: Terminal, token: &Token) -> Result<Emission> {
        let constants = match kind {
            Terminal::Num => vec![parse_number(token)?],
            Terminal::Str => text_codes(token),
            _ => Vec::new(),
        };
        Ok(Emission {
            constants,
            ..Emission::default()
        })
    }
}

pub fn generate(ast: &Ast, config: &Config, layout: &Layout) -> Result<ProgramImage> {
    let memory = config.memory_size();
    if layout.boundary > memory as u64 {
        return Err(Error::ImageOverflow {
            boundary: layout.boundary,
            memory,
        });
    }

    let mut pass = CodegenPass {
        cursor: Cursor::new(config.address_size()),
        format: Format::new(config.bits),
        symbols: &layout.symbols,
        config,
    };
    let emission = visitor::walk(&mut pass, ast)?;

    Ok(ProgramImage {
        entry: emission.entry,
        words: emission.words,
        bytes: emission.bytes,
        symbols: layout.symbols.clone(),
        boundary: pass.cursor.address()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_counts_operands() {
        assert_eq!(take::<2, u8>(&[1, 2], "add", "register").unwrap(), [1, 2]);
        assert_eq!(
            take::<3, u8>(&[1, 2], "add", "register").unwrap_err(),
            Error::OperandCount {
                mnemonic: "add".into(),
                kind: "register",
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_absorb_keeps_first_entry() {
        let mut left = Emission {
            entry: Some(8),
            ..Emission::default()
        };
        let right = Emission {
            entry: Some(16),
            registers: vec![1],
            ..Emission::default()
        };
        left.absorb(right).unwrap();
        assert_eq!(left.entry, Some(8));
        assert_eq!(left.registers, vec![1]);
    }
}
