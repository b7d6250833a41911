use log::{debug, trace};
use tandem_fa::{AutomatonState, LexicalAutomaton, SpecError, TokenKind};

use super::{
    symtab::{SymbolRecord, SymbolTable},
    LexError,
};

/// Classifies whitespace-delimited words with a compiled [`LexicalAutomaton`].
/// The automaton is only read, so one lexer can serve any number of reads.
#[derive(Debug, Clone)]
pub struct Lexer {
    automaton: LexicalAutomaton,
}

impl Lexer {
    pub fn new(automaton: LexicalAutomaton) -> Self {
        Self { automaton }
    }

    // determinize and compile a rule file at runtime
    pub fn from_rule_def(def_string: &str) -> Result<Lexer, SpecError> {
        LexicalAutomaton::from_rule_def(def_string).map(Lexer::new)
    }

    pub fn automaton(&self) -> &LexicalAutomaton {
        &self.automaton
    }

    // a character with no transition leaves the state where it is, so the
    // word is judged by the longest prefix the automaton could follow
    pub fn walk(&self, word: &str) -> AutomatonState {
        let mut state = self.automaton.initial_state();
        for c in word.chars() {
            let next = self.automaton.next_state(state, c);
            if !self.automaton.is_error(next) {
                state = next;
            }
        }
        state
    }

    pub fn classify(&self, word: &str) -> TokenKind {
        let state = self.walk(word);
        self.automaton
            .token_kind(state)
            .cloned()
            .unwrap_or(TokenKind::Error)
    }

    /// Builds the symbol table for every word of `source` and fails if any
    /// word was not recognised. Nothing from a failed read is returned.
    pub fn read(&self, source: &str) -> Result<(Vec<TokenKind>, SymbolTable), LexError> {
        let mut symbols = SymbolTable::new();

        for (i, line) in source.lines().enumerate() {
            let line_number = i + 1;
            let line: String = line.chars().filter(|c| *c != '\t').collect();

            for word in line.split_whitespace() {
                let token = self.classify(word);
                trace!("line {line_number}: '{word}' -> {token}");
                symbols.push(SymbolRecord {
                    literal: word.to_string(),
                    line: line_number,
                    token,
                });
            }
        }

        if let Some(record) = symbols.first_error() {
            return Err(LexError::Unrecognized {
                line: record.line,
                literal: record.literal.clone(),
            });
        }

        debug!("read {} words", symbols.len());
        let tokens = symbols.tokens().cloned().collect();
        Ok((tokens, symbols))
    }
}
