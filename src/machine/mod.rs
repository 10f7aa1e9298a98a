//! Register machine executing assembled program images.
//!
//! Sixteen registers of the configured width, byte-addressed big-endian
//! memory, absolute jumps. Every register or memory write is recorded in the
//! history before it takes effect. Memory below the image boundary holds the
//! program itself and is protected according to [`Protection`].
pub mod host;
pub mod trace;

use std::collections::BTreeSet;
use std::fmt::{self, Display};

pub use host::{BufferHost, Host, Resume, StdioHost};
pub use trace::Mutation;

use crate::config::{Config, Protection, REGISTER_COUNT};
use crate::error::{Error, Result};
use crate::model::{ProgramImage, SymbolTable};
use crate::processor::op::{Format, Instruction, Op, mask, sign_extend};

/// Why the machine stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    Complete,
    DecodeFault { pc: u32, opcode: u8 },
    ProtectedMemory { pc: u32, address: i64 },
    OutOfBounds { pc: u32, address: i64 },
    DivisionByZero { pc: u32 },
    Aborted,
}

impl Halt {
    pub fn is_fault(&self) -> bool {
        !matches!(self, Halt::Complete | Halt::Aborted)
    }
}

impl Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Halt::Complete => write!(f, "Complete"),
            Halt::DecodeFault { pc, opcode } => write!(f, "invalid opcode {opcode} at {pc}"),
            Halt::ProtectedMemory { pc, address } => {
                write!(f, "access to protected address {address} at {pc}")
            }
            Halt::OutOfBounds { pc, address } => {
                write!(f, "address {address} out of bounds at {pc}")
            }
            Halt::DivisionByZero { pc } => write!(f, "division by zero at {pc}"),
            Halt::Aborted => write!(f, "Aborted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Halted(Halt),
}

/// Outcome of one executed instruction.
enum Flow {
    Next,
    Jump(u32),
    Stop(Halt),
}

pub struct Vm {
    config: Config,
    format: Format,
    pc: u32,
    registers: [i64; REGISTER_COUNT],
    memory: Vec<u8>,
    history: Vec<Mutation>,
    breakpoints: BTreeSet<u32>,
    step_mode: bool,
    state: State,
    boundary: u32,
    symbols: SymbolTable,
}

impl Vm {
    /// Boots `image`: zeroed registers and memory, then the image preloaded
    /// without tracing.
    pub fn new(image: &ProgramImage, config: &Config) -> Result<Self> {
        config.validate()?;
        let memory_size = config.memory_size();
        let overflow = |end: u64| Error::ImageOverflow {
            boundary: end,
            memory: memory_size,
        };
        if image.boundary > memory_size {
            return Err(overflow(image.boundary as u64));
        }

        let mut memory = vec![0u8; memory_size as usize];
        let asz = config.address_size();
        for &(address, word) in &image.words {
            let end = address as u64 + asz as u64;
            if end > memory_size as u64 {
                return Err(overflow(end));
            }
            write_be(&mut memory[address as usize..end as usize], word);
        }
        for &(address, byte) in &image.bytes {
            let slot = memory.get_mut(address as usize).ok_or(overflow(address as u64 + 1))?;
            *slot = byte;
        }

        let mut breakpoints = BTreeSet::new();
        if config.debug {
            for (name, address) in image.symbols.iter() {
                if name.to_ascii_lowercase().starts_with("debug") {
                    breakpoints.insert(address);
                }
            }
        }

        Ok(Self {
            config: config.clone(),
            format: Format::new(config.bits),
            pc: image.entry.unwrap_or(0),
            registers: [0; REGISTER_COUNT],
            memory,
            history: Vec::new(),
            breakpoints,
            step_mode: config.debug,
            state: State::Running,
            boundary: image.boundary,
            symbols: image.symbols.clone(),
        })
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn registers(&self) -> &[i64; REGISTER_COUNT] {
        &self.registers
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn history(&self) -> &[Mutation] {
        &self.history
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn boundary(&self) -> u32 {
        self.boundary
    }

    pub fn breakpoints(&self) -> &BTreeSet<u32> {
        &self.breakpoints
    }

    pub fn step_mode(&self) -> bool {
        self.step_mode
    }

    pub fn set_step_mode(&mut self, on: bool) {
        self.step_mode = on;
    }

    pub fn add_breakpoint(&mut self, address: u32) {
        self.breakpoints.insert(address);
    }

    /// Flips the breakpoint at `address`; true when it is now set.
    pub fn toggle_breakpoint(&mut self, address: u32) -> bool {
        if self.breakpoints.remove(&address) {
            false
        } else {
            self.breakpoints.insert(address)
        }
    }

    /// Signed word at `address`, untraced and unprotected.
    pub fn word_at(&self, address: u32) -> Option<i64> {
        let start = address as usize;
        let bytes = self.memory.get(start..start + self.config.address_size() as usize)?;
        Some(sign_extend(read_be(bytes), self.config.bits))
    }

    // ── Traced mutation ──────────────────────────────────────────────

    /// Writes a register from outside the fetch loop, wrapping to the
    /// machine width. `None` when there is no register `index`.
    pub fn set_register(&mut self, index: usize, value: i64) -> Option<()> {
        if index >= REGISTER_COUNT {
            return None;
        }
        self.write_register(index, value);
        Some(())
    }

    /// Decoded register fields are four bits wide, so `index` is in range.
    fn write_register(&mut self, index: usize, value: i64) {
        let value = self.wrap(value);
        self.history.push(Mutation::Register {
            register: index,
            value,
        });
        self.registers[index] = value;
    }

    fn wrap(&self, value: i64) -> i64 {
        sign_extend(value as u64 & mask(self.config.bits), self.config.bits)
    }

    fn halt(&mut self, reason: Halt) {
        let event = match reason {
            Halt::Complete | Halt::Aborted => Mutation::info(reason.to_string()),
            _ => Mutation::error(reason.to_string()),
        };
        self.history.push(event);
        self.state = State::Halted(reason);
    }

    /// Bounds and protection check for a `width`-byte access at `address`.
    fn access(&mut self, address: i64, width: u32) -> std::result::Result<usize, Halt> {
        let pc = self.pc;
        if address < 0 || address as u64 + width as u64 > self.memory.len() as u64 {
            return Err(Halt::OutOfBounds { pc, address });
        }
        if address < self.boundary as i64 {
            let fault = Halt::ProtectedMemory { pc, address };
            match self.config.protection {
                Protection::Halt => return Err(fault),
                Protection::Warn => self.history.push(Mutation::error(fault.to_string())),
            }
        }
        Ok(address as usize)
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Runs until the machine halts. Breakpoints and step mode hand control
    /// to `host.checkpoint` before the instruction at PC executes.
    pub fn run(&mut self, host: &mut dyn Host) -> Halt {
        host.enter();
        while self.state == State::Running {
            if self.breakpoints.contains(&self.pc) {
                self.history.push(Mutation::info("Hit breakpoint"));
                self.step_mode = true;
            }
            if self.step_mode {
                match host.checkpoint(self) {
                    Resume::Step => {}
                    Resume::Continue => self.step_mode = false,
                    Resume::Abort => {
                        self.halt(Halt::Aborted);
                        break;
                    }
                }
            }
            self.step(host);
        }
        if self.step_mode && self.state != State::Halted(Halt::Aborted) {
            host.checkpoint(self);
        }
        host.exit();

        match self.state {
            State::Halted(reason) => reason,
            State::Running => Halt::Aborted,
        }
    }

    /// Fetches, decodes and executes one instruction.
    pub fn step(&mut self, host: &mut dyn Host) {
        if self.state != State::Running {
            return;
        }
        let asz = self.config.address_size();
        let pc = self.pc;
        let Some(word) = self.fetch(pc) else {
            self.halt(Halt::OutOfBounds {
                pc,
                address: pc as i64,
            });
            return;
        };

        let instruction = self.format.decode(word);
        match self.execute(instruction, host) {
            Flow::Next => self.pc = pc.wrapping_add(asz),
            Flow::Jump(target) => self.pc = target,
            Flow::Stop(reason) => self.halt(reason),
        }
    }

    fn fetch(&self, pc: u32) -> Option<u64> {
        let start = pc as usize;
        let bytes = self.memory.get(start..start + self.config.address_size() as usize)?;
        Some(read_be(bytes))
    }

    fn execute(&mut self, i: Instruction, host: &mut dyn Host) -> Flow {
        let pc = self.pc;
        let half = self.format.half_bits();
        let k = sign_extend(i.k, half);
        let uk = i.k;
        let rj = self.registers[i.rj];
        let rk = self.registers[i.rk];

        match i.op() {
            Op::Lw => return self.load(i.ri, rj.wrapping_add(k), self.config.address_size()),
            Op::Lb => return self.load(i.ri, rj.wrapping_add(k), 1),
            Op::Sw => {
                let value = self.registers[i.ri];
                return self.store(rj.wrapping_add(k), value, self.config.address_size());
            }
            Op::Sb => {
                let value = self.registers[i.ri];
                return self.store(rj.wrapping_add(k), value, 1);
            }

            Op::Add => self.write_register(i.ri, rj.wrapping_add(rk)),
            Op::Sub => self.write_register(i.ri, rj.wrapping_sub(rk)),
            Op::Mul => self.write_register(i.ri, rj.wrapping_mul(rk)),
            Op::Div | Op::Mod | Op::Divi | Op::Modi => {
                let rhs = if matches!(i.op(), Op::Div | Op::Mod) { rk } else { k };
                if rhs == 0 {
                    return Flow::Stop(Halt::DivisionByZero { pc });
                }
                let value = match i.op() {
                    Op::Div | Op::Divi => rj.wrapping_div(rhs),
                    _ => rj.wrapping_rem(rhs),
                };
                self.write_register(i.ri, value);
            }
            Op::And => self.write_register(i.ri, rj & rk),
            Op::Or => self.write_register(i.ri, rj | rk),
            Op::Not => self.write_register(i.ri, !rj),
            Op::Ceq => self.write_register(i.ri, (rj == rk) as i64),
            Op::Cne => self.write_register(i.ri, (rj != rk) as i64),
            Op::Clt => self.write_register(i.ri, (rj < rk) as i64),
            Op::Cle => self.write_register(i.ri, (rj <= rk) as i64),
            Op::Cgt => self.write_register(i.ri, (rj > rk) as i64),
            Op::Cge => self.write_register(i.ri, (rj >= rk) as i64),

            Op::Addi => self.write_register(i.ri, rj.wrapping_add(k)),
            Op::Subi => self.write_register(i.ri, rj.wrapping_sub(k)),
            Op::Muli => self.write_register(i.ri, rj.wrapping_mul(k)),
            Op::Andi => self.write_register(i.ri, rj & k),
            Op::Ori => self.write_register(i.ri, rj | k),
            Op::Ceqi => self.write_register(i.ri, (rj == k) as i64),
            Op::Cnei => self.write_register(i.ri, (rj != k) as i64),
            Op::Clti => self.write_register(i.ri, (rj < k) as i64),
            Op::Clei => self.write_register(i.ri, (rj <= k) as i64),
            Op::Cgti => self.write_register(i.ri, (rj > k) as i64),
            Op::Cgei => self.write_register(i.ri, (rj >= k) as i64),
            Op::Sl => {
                let value = if uk >= self.config.bits as u64 { 0 } else { rj << uk };
                self.write_register(i.ri, value);
            }
            Op::Sr => {
                let pattern = rj as u64 & mask(self.config.bits);
                let value = if uk >= self.config.bits as u64 { 0 } else { pattern >> uk };
                self.write_register(i.ri, value as i64);
            }

            Op::Gtc => {
                let byte = host.getc();
                self.write_register(i.ri, byte as i64);
            }
            Op::Ptc => {
                let byte = self.registers[i.ri] as u8;
                self.history.push(Mutation::output(byte));
                host.putc(byte);
            }

            Op::Bz => {
                if self.registers[i.ri] == 0 {
                    return Flow::Jump(uk as u32);
                }
            }
            Op::Bnz => {
                if self.registers[i.ri] != 0 {
                    return Flow::Jump(uk as u32);
                }
            }
            Op::J => return Flow::Jump(uk as u32),
            Op::Jr => return self.jump_to(self.registers[i.ri]),
            Op::Jl => {
                self.write_register(i.ri, pc as i64 + self.config.address_size() as i64);
                return Flow::Jump(uk as u32);
            }
            Op::Jlr => {
                // the target is read after the link write
                self.write_register(i.ri, pc as i64 + self.config.address_size() as i64);
                return self.jump_to(self.registers[i.rj]);
            }

            Op::Nop => {}
            Op::Hlt => return Flow::Stop(Halt::Complete),
            _ => {
                return Flow::Stop(Halt::DecodeFault {
                    pc,
                    opcode: i.opcode,
                });
            }
        }
        Flow::Next
    }

    fn jump_to(&self, target: i64) -> Flow {
        match u32::try_from(target) {
            Ok(target) => Flow::Jump(target),
            Err(_) => Flow::Stop(Halt::OutOfBounds {
                pc: self.pc,
                address: target,
            }),
        }
    }

    fn load(&mut self, ri: usize, address: i64, width: u32) -> Flow {
        let at = match self.access(address, width) {
            Ok(at) => at,
            Err(reason) => return Flow::Stop(reason),
        };
        let raw = read_be(&self.memory[at..at + width as usize]);
        // bytes load unsigned, words signed
        let value = if width == 1 { raw as i64 } else { sign_extend(raw, width * 8) };
        self.write_register(ri, value);
        Flow::Next
    }

    fn store(&mut self, address: i64, value: i64, width: u32) -> Flow {
        let at = match self.access(address, width) {
            Ok(at) => at,
            Err(reason) => return Flow::Stop(reason),
        };
        let address = at as u32;
        if width == 1 {
            self.history.push(Mutation::Byte {
                address,
                value: value as u8,
            });
        } else {
            self.history.push(Mutation::Word { address, value });
        }
        write_be(&mut self.memory[at..at + width as usize], value as u64);
        Flow::Next
    }
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| acc << 8 | b as u64)
}

fn write_be(bytes: &mut [u8], value: u64) {
    let len = bytes.len();
    for (i, slot) in bytes.iter_mut().enumerate() {
        *slot = (value >> ((len - i - 1) * 8)) as u8;
    }
}
