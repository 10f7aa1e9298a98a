//! The VM's view of the outside world: character I/O and the debug
//! checkpoint.

use std::collections::VecDeque;
use std::io::{self, BufRead, Read, Write};

use super::Vm;

/// What to do after a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Execute one instruction and stop at the next checkpoint.
    Step,
    /// Leave step mode and run until a breakpoint or halt.
    Continue,
    Abort,
}

pub trait Host {
    fn enter(&mut self) {}
    fn exit(&mut self) {}
    fn getc(&mut self) -> u8;
    fn putc(&mut self, byte: u8);

    /// Called before each step while step mode is on, and once more after
    /// the machine halts in step mode. The VM may be inspected or changed.
    fn checkpoint(&mut self, _vm: &mut Vm) -> Resume {
        Resume::Continue
    }
}

/// In-memory host: scripted input and resume decisions, captured output.
#[derive(Debug, Default)]
pub struct BufferHost {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
    /// Answers for successive checkpoints; `Continue` once exhausted.
    pub script: VecDeque<Resume>,
    /// PC at every checkpoint taken.
    pub stops: Vec<u32>,
}

impl BufferHost {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn with_script(mut self, script: &[Resume]) -> Self {
        self.script = script.iter().copied().collect();
        self
    }
}

impl Host for BufferHost {
    fn getc(&mut self) -> u8 {
        self.input.pop_front().unwrap_or(0)
    }

    fn putc(&mut self, byte: u8) {
        self.output.push(byte);
    }

    fn checkpoint(&mut self, vm: &mut Vm) -> Resume {
        self.stops.push(vm.pc());
        self.script.pop_front().unwrap_or(Resume::Continue)
    }
}

/// Terminal host: program I/O on stdin/stdout, debugger prompt on stderr.
///
/// Prompt commands: `s` (or empty) step, `c` continue, `b <where>` toggle a
/// breakpoint (see [`breakpoint_target`]), `q` quit.
#[derive(Debug, Default)]
pub struct StdioHost {
    /// Events already shown at a checkpoint.
    shown: usize,
}

impl StdioHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn show(&mut self, vm: &Vm) {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "pc = {}", vm.pc());
        for (index, value) in vm.registers().iter().enumerate() {
            let _ = write!(err, "{:>8} = {:<11}", vm.config().register_name(index), value);
            if index % 4 == 3 {
                let _ = writeln!(err);
            }
        }
        for event in &vm.history()[self.shown..] {
            let _ = writeln!(err, "  {event}");
        }
        self.shown = vm.history().len();
    }
}

impl Host for StdioHost {
    fn getc(&mut self) -> u8 {
        let mut byte = [0u8; 1];
        match io::stdin().read(&mut byte) {
            Ok(1) => byte[0],
            _ => 0,
        }
    }

    fn putc(&mut self, byte: u8) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(&[byte]);
        let _ = out.flush();
    }

    fn checkpoint(&mut self, vm: &mut Vm) -> Resume {
        self.show(vm);
        loop {
            eprint!("(s/c/b name/q) > ");
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => return Resume::Abort,
                Ok(_) => {}
            }
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (None | Some("s"), _) => return Resume::Step,
                (Some("c"), _) => return Resume::Continue,
                (Some("q"), _) => return Resume::Abort,
                (Some("b"), Some(arg)) => match breakpoint_target(vm, arg) {
                    Some(address) => {
                        let set = vm.toggle_breakpoint(address);
                        eprintln!("breakpoint at {address} {}", if set { "set" } else { "cleared" });
                    }
                    None => eprintln!("no symbol or address `{arg}`"),
                },
                _ => eprintln!("unknown command"),
            }
        }
    }
}

/// Address named by a `b` argument: a symbol, an absolute address, or `+N` /
/// `-N` relative to the PC. Rounded down to a word boundary.
pub fn breakpoint_target(vm: &Vm, arg: &str) -> Option<u32> {
    let pc = i64::from(vm.pc());
    let address = if let Some(offset) = arg.strip_prefix('+') {
        pc + offset.parse::<i64>().ok()?
    } else if let Some(offset) = arg.strip_prefix('-') {
        pc - offset.parse::<i64>().ok()?
    } else if let Ok(absolute) = arg.parse::<i64>() {
        absolute
    } else {
        i64::from(vm.symbols().get(arg)?)
    };
    let address = u32::try_from(address).ok()?;
    Some(address - address % vm.config().address_size())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::{ProgramImage, SymbolTable};

    fn vm_at(entry: u32) -> Vm {
        let mut symbols = SymbolTable::new();
        symbols.insert("loop", 6).unwrap();
        symbols.insert("main", 12).unwrap();
        let image = ProgramImage {
            entry: Some(entry),
            words: Vec::new(),
            bytes: Vec::new(),
            symbols,
            boundary: 0,
        };
        Vm::new(&image, &Config::default()).unwrap()
    }

    #[test]
    fn test_breakpoint_targets() {
        let vm = vm_at(8);
        let test_cases = vec![
            ("main", Some(12)),
            ("loop", Some(4)),
            ("20", Some(20)),
            ("23", Some(20)),
            ("+4", Some(12)),
            ("+6", Some(12)),
            ("-8", Some(0)),
            ("-9", None),
            ("+x", None),
            ("nowhere", None),
        ];
        for (arg, expected) in test_cases {
            assert_eq!(breakpoint_target(&vm, arg), expected, "{arg}");
        }
    }
}
