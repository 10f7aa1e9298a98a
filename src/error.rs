use crate::config::ConfigError;
use crate::grammar::artifact::ArtifactError;

/// Everything that aborts the tokenize → parse → assemble pipeline.
///
/// Runtime faults are not errors: the VM halts with a reason and leaves its
/// state inspectable (see [`crate::machine::Halt`]).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// No automaton path from `offset` reaches an accepting node.
    #[error("no token can be formed at offset {offset} (`{found}`)")]
    Lexical { offset: usize, found: String },

    #[error("syntax error at offset {offset}: expected {expected}, found {found}")]
    Syntax {
        offset: usize,
        expected: String,
        found: String,
    },

    #[error("duplicate symbol `{0}`")]
    DuplicateSymbol(String),

    #[error("unresolved symbol `{0}`")]
    UnresolvedSymbol(String),

    #[error("invalid register `{0}`")]
    InvalidRegister(String),

    #[error("`{mnemonic}`: {reason}")]
    InvalidOperand { mnemonic: String, reason: String },

    #[error("`{mnemonic}` expects {expected} {kind} operand(s), found {found}")]
    OperandCount {
        mnemonic: String,
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("program image ends at {boundary} but memory holds {memory} bytes")]
    ImageOverflow { boundary: u64, memory: u32 },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
