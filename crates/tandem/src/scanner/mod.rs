use thiserror::Error;

pub mod symtab;
pub mod table_scanner;


pub use symtab::{SymbolRecord, SymbolTable};
pub use table_scanner::Lexer;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("line {line}: `{literal}` is not a recognised token")]
    Unrecognized { line: usize, literal: String },
}
