//! Lexer, parser, and code generator for M20 assembly.
//!
//! [`assemble`] runs the full pipeline — lexing, parsing, and code
//! generation — over one source file and produces an [`m20_obj::ObjectFile`].
//! Each stage collects diagnostics rather than aborting on the first error;
//! if lexing or parsing produces any, code generation is skipped and those
//! diagnostics are returned directly (§4.2: "error count > 0 aborts the
//! whole pipeline before code generation").
//!
//! ## Source format
//!
//! A program is a sequence of `.text`/`.data` sections, `global`/`extern`/
//! `entry` declarations, label definitions, and instruction or data
//! statements. See the individual modules for the grammar each stage
//! recognizes: [`lexer`] for tokens, [`parser`] for statement shapes, and
//! [`assembler`] for how statements become bytes and relocations.

mod assembler;
mod diagnostic;
mod item;
mod labels;
mod lexer;
mod mnemonics;
mod number;
mod parser;
mod token;

pub use assembler::{assemble as assemble_items, Assembler};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use item::{AddressingMode, BranchTarget, D2Operand, DataValue, Item, Operand, SectionKind};
pub use labels::{Label, LabelFixup, LinkLabel, Section};
pub use lexer::Lexer;
pub use token::{Token, TokenKind};

use m20_obj::ObjectFile;

/// Runs the full pipeline over `source` and produces an object file.
pub fn assemble(source: &str) -> Result<ObjectFile, Vec<Diagnostic>> {
    assembler::assemble_source(source)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn assemble_reports_lexer_and_parser_diagnostics_before_codegen() {
        let result = assemble("section .text\n@@@\nhalt\n");
        assert!(result.is_err());
    }

    #[test]
    fn assemble_produces_an_object_file_for_a_clean_program() {
        let object = assemble("section .text\nentry main\nmain: mov r0, #5\nhalt\n").unwrap();
        assert_eq!(object.code.len(), 8);
    }
}
