//! First assembler pass: assigns an address to every label.
//!
//! The [`Cursor`] is shared with code generation so both passes agree on
//! where each instruction lands.

use super::ast::Ast;
use super::op::Op;
use super::visitor::{self, Accumulate, Rule, Terminal, Visitor};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{SymbolTable, TOPADDR, Token};

/// Current placement offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub offset: u64,
    pub address_size: u32,
}

impl Cursor {
    pub fn new(address_size: u32) -> Self {
        Self {
            offset: 0,
            address_size,
        }
    }

    /// The offset as an address, which must fit 32 bits.
    pub fn address(&self) -> Result<u32> {
        u32::try_from(self.offset).map_err(|_| Error::ImageOverflow {
            boundary: self.offset,
            memory: u32::MAX,
        })
    }

    /// Moves past one instruction or directive. `operands` holds its constant
    /// operands in source order, `None` for symbol references.
    pub fn advance(&mut self, op: Op, mnemonic: &str, operands: &[Option<i64>]) -> Result<()> {
        let size = self.address_size as u64;
        let next = match op {
            Op::Entry => Some(self.offset),
            Op::Org => Some(literal(mnemonic, operands)?),
            Op::Res => self.offset.checked_add(literal(mnemonic, operands)?),
            Op::Align => self.offset.div_ceil(size).checked_mul(size),
            Op::Dw => size
                .checked_mul(operands.len() as u64)
                .and_then(|n| self.offset.checked_add(n)),
            Op::Db => self.offset.checked_add(operands.len() as u64),
            _ => self.offset.checked_add(size),
        };
        self.offset = next.ok_or_else(|| invalid(mnemonic, "address arithmetic overflows"))?;
        Ok(())
    }
}

fn invalid(mnemonic: &str, reason: &str) -> Error {
    Error::InvalidOperand {
        mnemonic: mnemonic.to_string(),
        reason: reason.to_string(),
    }
}

/// The single non-negative literal `org` and `res` take.
fn literal(mnemonic: &str, operands: &[Option<i64>]) -> Result<u64> {
    match operands {
        [Some(value)] => u64::try_from(*value).map_err(|_| invalid(mnemonic, "must not be negative")),
        [None] => Err(invalid(mnemonic, "needs a literal, not a symbol")),
        _ => Err(Error::OperandCount {
            mnemonic: mnemonic.to_string(),
            kind: "constant",
            expected: 1,
            found: operands.len(),
        }),
    }
}

/// Mnemonic text of an instruction branch (its slot 0).
pub fn mnemonic(ast: &Ast, index: usize) -> String {
    ast.child(index, 0).map(|slot| ast.lexeme(slot)).unwrap_or_default()
}

/// Decimal literal, optionally negative.
pub fn parse_number(token: &Token) -> Result<i64> {
    token.lexeme.parse().map_err(|_| Error::InvalidOperand {
        mnemonic: token.lexeme.clone(),
        reason: format!("`{}` is not a number in range", token.lexeme),
    })
}

/// Character codes of a quoted string literal, quotes removed.
pub fn text_codes(token: &Token) -> Vec<i64> {
    let lexeme = token.lexeme.as_str();
    let inner = lexeme
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(lexeme);
    inner.chars().map(|c| c as i64).collect()
}

#[derive(Debug, Default)]
pub struct Placement {
    pub symbols: SymbolTable,
    pub operands: Vec<Option<i64>>,
}

impl Accumulate for Placement {
    fn absorb(&mut self, other: Self) -> Result<()> {
        self.symbols.absorb(other.symbols)?;
        self.operands.extend(other.operands);
        Ok(())
    }
}

struct LayoutPass {
    cursor: Cursor,
}

impl Visitor for LayoutPass {
    type Data = Placement;

    fn exit(&mut self, ast: &Ast, index: usize, rule: Rule, mut data: Placement) -> Result<Placement> {
        match rule {
            Rule::Label => {
                let address = self.cursor.address()?;
                data.symbols.insert(&ast.lexeme(index), address)?;
            }
            Rule::Reference => data.operands.push(None),
            Rule::Instr(_) => {
                let mnemonic = mnemonic(ast, index);
                let op = Op::from_mnemonic(&mnemonic).unwrap_or(Op::Bad);
                self.cursor.advance(op, &mnemonic, &data.operands)?;
                data.operands.clear();
            }
            _ => {}
        }
        Ok(data)
    }

    fn token(&mut self, kind: Terminal, token: &Token) -> Result<Placement> {
        let operands = match kind {
            Terminal::Num => vec![Some(parse_number(token)?)],
            Terminal::Str => text_codes(token).into_iter().map(Some).collect(),
            _ => Vec::new(),
        };
        Ok(Placement {
            operands,
            ..Placement::default()
        })
    }
}

/// Result of the layout pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Every label plus `topaddr`.
    pub symbols: SymbolTable,
    /// Offset after the last placed item.
    pub boundary: u64,
}

pub fn layout(ast: &Ast, config: &Config) -> Result<Layout> {
    let mut pass = LayoutPass {
        cursor: Cursor::new(config.address_size()),
    };
    let mut placement = visitor::walk(&mut pass, ast)?;
    placement.symbols.insert(TOPADDR, config.topaddr())?;
    Ok(Layout {
        symbols: placement.symbols,
        boundary: pass.cursor.offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor_at(offset: u64) -> Cursor {
        Cursor {
            offset,
            address_size: 4,
        }
    }

    #[test]
    fn test_cursor_advance() {
        let test_cases = vec![
            (0, Op::Add, vec![], 4),
            (6, Op::Align, vec![], 8),
            (8, Op::Align, vec![], 8),
            (3, Op::Org, vec![Some(100)], 100),
            (100, Op::Org, vec![Some(0)], 0),
            (4, Op::Res, vec![Some(10)], 14),
            (0, Op::Dw, vec![Some(1), None, Some(3)], 12),
            (1, Op::Db, vec![Some(104), Some(105)], 3),
            (12, Op::Entry, vec![], 12),
            (12, Op::Bad, vec![], 16),
        ];
        for (start, op, operands, expected) in test_cases {
            let mut cursor = cursor_at(start);
            cursor.advance(op, op.mnemonic(), &operands).unwrap();
            assert_eq!(cursor.offset, expected, "{op:?}");
        }
    }

    #[test]
    fn test_org_needs_literal() {
        let mut cursor = cursor_at(0);
        let test_cases = vec![
            (Op::Org, vec![None]),
            (Op::Res, vec![Some(-1)]),
            (Op::Res, vec![Some(1), Some(2)]),
        ];
        for (op, operands) in test_cases {
            assert!(cursor.advance(op, op.mnemonic(), &operands).is_err(), "{operands:?}");
        }
        assert!(matches!(
            cursor.advance(Op::Org, "org", &[]),
            Err(Error::OperandCount { expected: 1, found: 0, .. })
        ));
    }

    #[test]
    fn test_align_is_idempotent() {
        for start in 0..20 {
            let mut cursor = cursor_at(start);
            cursor.advance(Op::Align, "align", &[]).unwrap();
            let once = cursor.offset;
            cursor.advance(Op::Align, "align", &[]).unwrap();
            assert_eq!(cursor.offset, once);
            assert_eq!(once % 4, 0);
            assert!(once >= start && once < start + 4);
        }
    }

    #[test]
    fn test_text_codes() {
        let token = Token::new("\"Hi!\"", "str", 0);
        assert_eq!(text_codes(&token), vec![72, 105, 33]);
        assert_eq!(parse_number(&Token::new("-12", "num", 0)).unwrap(), -12);
        assert!(parse_number(&Token::new("99999999999999999999", "num", 0)).is_err());
    }
}
