pub mod lr;
pub mod table;


pub use lr::{AnalyseError, AnalyserOptions, Derivation, LrAutomaton, LrStackEntry};
pub use table::{Action, ParseTable, SymbolKind, TableError};
