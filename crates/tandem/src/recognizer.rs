use tandem_fa::SpecError;
use thiserror::Error;

use crate::{
    parser::{AnalyseError, AnalyserOptions, Derivation, LrAutomaton, ParseTable, TableError},
    scanner::{LexError, Lexer},
};

#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error("failed to build lexer")]
    Spec(#[from] SpecError),
    #[error("failed to load parse table")]
    Table(#[from] TableError),
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Analyse(#[from] AnalyseError),
}

/// Lexer and LR automaton run back to back. The whole source is read before
/// parsing starts.
#[derive(Debug, Clone)]
pub struct Recognizer {
    lexer: Lexer,
    automaton: LrAutomaton,
}

impl Recognizer {
    pub fn new(lexer: Lexer, automaton: LrAutomaton) -> Self {
        Self { lexer, automaton }
    }

    pub fn from_sources(
        rule_def: &str,
        table_json: &str,
        options: &AnalyserOptions,
    ) -> Result<Recognizer, RecognizeError> {
        let lexer = Lexer::from_rule_def(rule_def)?;
        let table = ParseTable::from_json_str(table_json)?;
        let automaton = LrAutomaton::new(table, options)?;
        Ok(Recognizer::new(lexer, automaton))
    }

    pub fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    pub fn automaton(&self) -> &LrAutomaton {
        &self.automaton
    }

    pub fn recognize(&self, source: &str) -> Result<Derivation, RecognizeError> {
        let (tokens, symbols) = self.lexer.read(source)?;
        Ok(self.automaton.analyse(&tokens, symbols)?)
    }
}
