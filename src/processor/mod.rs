//! Source text to program image.
//!
//! tokenize → derive → fold into a tree → layout pass → codegen pass.
pub mod ast;
pub mod codegen;
pub mod layout;
pub mod lexer;
pub mod op;
pub mod parser;
pub mod visitor;

use crate::config::Config;
use crate::error::Result;
use crate::grammar::{ParseTable, Tables};
use crate::model::{ProgramImage, Token};
use crate::{debug, info};

use ast::Ast;

pub struct Assembler<'a> {
    tables: &'a Tables,
    table: ParseTable,
    config: &'a Config,
}

impl<'a> Assembler<'a> {
    pub fn new(tables: &'a Tables, config: &'a Config) -> Result<Self> {
        config.validate()?;
        let table = ParseTable::build(&tables.grammar);
        debug!("assembler", "parse table has {} entries", table.len());
        Ok(Self {
            tables,
            table,
            config,
        })
    }

    pub fn tokenize(&self, source: &str) -> Result<Vec<Token>> {
        lexer::tokenize(source, &self.tables.automaton)
    }

    pub fn parse(&self, source: &str) -> Result<Ast> {
        let tokens = self.tokenize(source)?;
        debug!("assembler", "{} tokens", tokens.len());
        let derivation = parser::derive(&self.tables.grammar, &self.table, &tokens)?;
        let ast = ast::build(&derivation);
        debug!("assembler", "{} derivation events folded into {} nodes", derivation.len(), ast.len());
        Ok(ast)
    }

    /// Runs every pass. A missing final newline is supplied.
    /// Assembles library files followed by the main file as one program.
    /// Every source is terminated by a newline before joining.
    pub fn assemble_all<S: AsRef<str>>(&self, sources: &[S]) -> Result<ProgramImage> {
        let joined: String = sources.iter().map(|s| format!("{}\n", s.as_ref())).collect();
        self.assemble(&joined)
    }

    pub fn assemble(&self, source: &str) -> Result<ProgramImage> {
        let ast = if source.ends_with('\n') {
            self.parse(source)?
        } else {
            self.parse(&format!("{source}\n"))?
        };

        let layout = layout::layout(&ast, self.config)?;
        info!(
            "assembler",
            "layout placed {} symbols, boundary at {}",
            layout.symbols.len(),
            layout.boundary
        );

        let image = codegen::generate(&ast, self.config, &layout)?;
        info!(
            "assembler",
            "emitted {} words and {} bytes",
            image.words.len(),
            image.bytes.len()
        );
        Ok(image)
    }
}
