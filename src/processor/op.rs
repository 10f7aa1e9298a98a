//! Opcodes and the bit-packed instruction format.
//!
//! ```text
//!  register form   | op:6 | ri:4 | rj:4 | rk:4 | 0 ...          |
//!  immediate form  | op:6 | ri:4 | rj:4 | ...  | k: half word   |
//! ```
//!
//! Field positions are measured from the top of the word, so the layout
//! scales with the configured width.

/// Opcodes in encoding order. Everything after `Hlt` is an assembler
/// directive: it never reaches an instruction word and decodes as `Bad`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Bad = 0,
    Lw,
    Lb,
    Sw,
    Sb,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Not,
    Ceq,
    Cne,
    Clt,
    Cle,
    Cgt,
    Cge,
    Addi,
    Subi,
    Muli,
    Divi,
    Modi,
    Andi,
    Ori,
    Ceqi,
    Cnei,
    Clti,
    Clei,
    Cgti,
    Cgei,
    Sl,
    Sr,
    Gtc,
    Ptc,
    Bz,
    Bnz,
    J,
    Jr,
    Jl,
    Jlr,
    Nop,
    Hlt,
    Entry,
    Align,
    Org,
    Dw,
    Db,
    Res,
}

const OPS: [(Op, &str); 50] = [
    (Op::Bad, "bad"),
    (Op::Lw, "lw"),
    (Op::Lb, "lb"),
    (Op::Sw, "sw"),
    (Op::Sb, "sb"),
    (Op::Add, "add"),
    (Op::Sub, "sub"),
    (Op::Mul, "mul"),
    (Op::Div, "div"),
    (Op::Mod, "mod"),
    (Op::And, "and"),
    (Op::Or, "or"),
    (Op::Not, "not"),
    (Op::Ceq, "ceq"),
    (Op::Cne, "cne"),
    (Op::Clt, "clt"),
    (Op::Cle, "cle"),
    (Op::Cgt, "cgt"),
    (Op::Cge, "cge"),
    (Op::Addi, "addi"),
    (Op::Subi, "subi"),
    (Op::Muli, "muli"),
    (Op::Divi, "divi"),
    (Op::Modi, "modi"),
    (Op::Andi, "andi"),
    (Op::Ori, "ori"),
    (Op::Ceqi, "ceqi"),
    (Op::Cnei, "cnei"),
    (Op::Clti, "clti"),
    (Op::Clei, "clei"),
    (Op::Cgti, "cgti"),
    (Op::Cgei, "cgei"),
    (Op::Sl, "sl"),
    (Op::Sr, "sr"),
    (Op::Gtc, "gtc"),
    (Op::Ptc, "ptc"),
    (Op::Bz, "bz"),
    (Op::Bnz, "bnz"),
    (Op::J, "j"),
    (Op::Jr, "jr"),
    (Op::Jl, "jl"),
    (Op::Jlr, "jlr"),
    (Op::Nop, "nop"),
    (Op::Hlt, "hlt"),
    (Op::Entry, "entry"),
    (Op::Align, "align"),
    (Op::Org, "org"),
    (Op::Dw, "dw"),
    (Op::Db, "db"),
    (Op::Res, "res"),
];

impl Op {
    /// Accepts `getc` / `putc` as spellings of `gtc` / `ptc`.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Op> {
        let mnemonic = match mnemonic {
            "getc" => "gtc",
            "putc" => "ptc",
            other => other,
        };
        OPS.iter()
            .find(|(op, name)| *name == mnemonic && *op != Op::Bad)
            .map(|(op, _)| *op)
    }

    pub fn mnemonic(self) -> &'static str {
        OPS[self as usize].1
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Machine opcode for `code`; directives and unassigned codes give `Bad`.
    pub fn decode(code: u8) -> Op {
        match OPS.get(code as usize) {
            Some(&(op, _)) if !op.is_directive() => op,
            _ => Op::Bad,
        }
    }

    pub fn is_directive(self) -> bool {
        self as u8 > Op::Hlt as u8
    }
}

/// Decoded fields of one instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u8,
    pub ri: usize,
    pub rj: usize,
    pub rk: usize,
    /// Raw low half word.
    pub k: u64,
}

impl Instruction {
    pub fn op(&self) -> Op {
        Op::decode(self.opcode)
    }
}

/// Bit layout for one architecture width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    pub bits: u32,
}

impl Format {
    pub fn new(bits: u32) -> Self {
        Self { bits }
    }

    pub fn half_bits(&self) -> u32 {
        self.bits / 2
    }

    pub fn word_mask(&self) -> u64 {
        mask(self.bits)
    }

    pub fn encode_register(&self, op: Op, ri: u8, rj: u8, rk: u8) -> u64 {
        let b = self.bits;
        (op.code() as u64 & 0x3F) << (b - 6)
            | (ri as u64 & 0xF) << (b - 10)
            | (rj as u64 & 0xF) << (b - 14)
            | (rk as u64 & 0xF) << (b - 18)
    }

    pub fn encode_immediate(&self, op: Op, ri: u8, rj: u8, k: i64) -> u64 {
        let b = self.bits;
        (op.code() as u64 & 0x3F) << (b - 6)
            | (ri as u64 & 0xF) << (b - 10)
            | (rj as u64 & 0xF) << (b - 14)
            | (k as u64 & mask(self.half_bits()))
    }

    pub fn decode(&self, word: u64) -> Instruction {
        let b = self.bits;
        Instruction {
            opcode: ((word >> (b - 6)) & 0x3F) as u8,
            ri: ((word >> (b - 10)) & 0xF) as usize,
            rj: ((word >> (b - 14)) & 0xF) as usize,
            rk: ((word >> (b - 18)) & 0xF) as usize,
            k: word & mask(self.half_bits()),
        }
    }

    /// True when `k` fits the immediate field, read signed or unsigned.
    pub fn fits_immediate(&self, k: i64) -> bool {
        let half = self.half_bits();
        let min = -(1i64 << (half - 1));
        let max = (1i64 << half) - 1;
        (min..=max).contains(&k)
    }
}

pub fn mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Reads the low `bits` of `value` as two's complement.
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}
