//! Append-only record of everything a run changed or reported.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    Register { register: usize, value: i64 },
    Word { address: u32, value: i64 },
    Byte { address: u32, value: u8 },
    Output { text: String },
    Info { message: String },
    Error { message: String },
}

impl Mutation {
    pub fn info(message: impl Into<String>) -> Self {
        Mutation::Info {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Mutation::Error {
            message: message.into(),
        }
    }

    /// Printable form of a `ptc` byte: ASCII as is, anything else as `\u<n>`.
    pub fn output(byte: u8) -> Self {
        let text = if byte <= 127 {
            (byte as char).to_string()
        } else {
            format!("\\u{byte}")
        };
        Mutation::Output { text }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Mutation::Error { .. })
    }
}

impl Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Register { register, value } => write!(f, "r{register} <- {value}"),
            Mutation::Word { address, value } => write!(f, "word [{address}] <- {value}"),
            Mutation::Byte { address, value } => write!(f, "byte [{address}] <- {value}"),
            Mutation::Output { text } => write!(f, "output {text:?}"),
            Mutation::Info { message } => write!(f, "info: {message}"),
            Mutation::Error { message } => write!(f, "error: {message}"),
        }
    }
}
