use log::{debug, trace};
use tandem_fa::TokenKind;
use thiserror::Error;

use crate::scanner::SymbolTable;

use super::table::{
    Action, LrStateIdx, ParseTable, ProductionIdx, SymbolIdx, SymbolKind, TableError,
};

/// How lexer tokens are looked up in the parse table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyserOptions {
    // table symbol every generic identifier maps to
    pub identifier_symbol: String,
    // only used when the table has no symbol of kind EndOfFile
    pub end_symbol: String,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            identifier_symbol: "ID".to_string(),
            end_symbol: "EOF".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LrStackEntry {
    State(LrStateIdx),
    Symbol(SymbolIdx),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalyseError {
    #[error("syntax error on line {line} after `{consumed}`")]
    Syntax { line: usize, consumed: String },
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

/// Result of a successful run: the symbol table handed in, plus every action
/// taken in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    pub symbols: SymbolTable,
    pub steps: Vec<Action>,
}

impl Derivation {
    // productions in the order they fired, i.e. a reversed rightmost derivation
    pub fn reductions(&self) -> impl Iterator<Item = ProductionIdx> + '_ {
        self.steps.iter().filter_map(|step| match step {
            Action::Reduce(production) => Some(*production),
            _ => None,
        })
    }
}

/// Shift/reduce engine over a loaded [`ParseTable`]. Holds no per-run state;
/// every [`LrAutomaton::analyse`] call starts from a fresh stack.
#[derive(Debug, Clone)]
pub struct LrAutomaton {
    table: ParseTable,
    identifier: Option<SymbolIdx>,
    end: SymbolIdx,
}

impl LrAutomaton {
    pub fn new(table: ParseTable, options: &AnalyserOptions) -> Result<LrAutomaton, TableError> {
        let end = table
            .end_of_input()
            .or_else(|| table.symbol_by_name(&options.end_symbol))
            .ok_or_else(|| {
                TableError::Malformed(format!(
                    "no end of input symbol, and no symbol named `{}`",
                    options.end_symbol
                ))
            })?;
        let identifier = table
            .symbol_by_name(&options.identifier_symbol)
            .filter(|idx| *idx != end && is_terminal(&table, *idx));
        if identifier.is_none() {
            debug!(
                "table has no `{}` symbol, identifiers will not parse",
                options.identifier_symbol
            );
        }

        Ok(LrAutomaton {
            table,
            identifier,
            end,
        })
    }

    pub fn table(&self) -> &ParseTable {
        &self.table
    }

    // None for tokens the grammar has no terminal for. a word spelled like the
    // end marker or a nonterminal is not that symbol
    pub fn symbol_for(&self, token: &TokenKind) -> Option<SymbolIdx> {
        match token {
            TokenKind::Keyword(word) => self
                .table
                .symbol_by_name(word)
                .filter(|idx| *idx != self.end && is_terminal(&self.table, *idx)),
            TokenKind::Identifier => self.identifier,
            TokenKind::Error => None,
        }
    }

    /// Runs the token sequence, followed by the end marker, through the table.
    /// `symbols` must be the table the tokens were read into; it is only used
    /// for error context and returned as is.
    pub fn analyse(
        &self,
        tokens: &[TokenKind],
        symbols: SymbolTable,
    ) -> Result<Derivation, AnalyseError> {
        if tokens.len() != symbols.len() {
            return Err(AnalyseError::InvariantViolation(format!(
                "{} tokens but {} symbol records",
                tokens.len(),
                symbols.len()
            )));
        }

        let mut stack = vec![LrStackEntry::State(self.table.initial_state())];
        let mut cursor = 0;
        // nonterminal produced by the last reduce, looked up before the input
        let mut pending: Option<SymbolIdx> = None;
        let mut steps = Vec::new();

        loop {
            let top = top_state(&stack)?;
            let lookahead = match pending {
                Some(nonterminal) => nonterminal,
                None if cursor < tokens.len() => self
                    .symbol_for(&tokens[cursor])
                    .ok_or_else(|| syntax_error(&symbols, cursor))?,
                None => self.end,
            };

            let action = self
                .table
                .action(top, lookahead)
                .map_err(|_| syntax_error(&symbols, cursor))?;
            trace!("state {top}, symbol {lookahead}: {action}");
            steps.push(action);

            match action {
                Action::Shift(next) => {
                    if lookahead == self.end {
                        return Err(AnalyseError::InvariantViolation(
                            "end of input cannot be shifted".to_string(),
                        ));
                    }
                    stack.push(LrStackEntry::Symbol(lookahead));
                    stack.push(LrStackEntry::State(next));
                    cursor += 1;
                }
                Action::Reduce(production) => {
                    let production = self.table.production(production).ok_or_else(|| {
                        let reason = format!("production {production} does not exist");
                        AnalyseError::InvariantViolation(reason)
                    })?;
                    let popped = 2 * production.symbol_count;
                    if popped >= stack.len() {
                        return Err(AnalyseError::InvariantViolation(format!(
                            "reduce pops {popped} entries from a stack of {}",
                            stack.len()
                        )));
                    }
                    stack.truncate(stack.len() - popped);
                    pending = Some(production.head);
                }
                Action::Goto(next) => {
                    let nonterminal = pending.take().ok_or_else(|| {
                        let reason = "goto without a reduced nonterminal".to_string();
                        AnalyseError::InvariantViolation(reason)
                    })?;
                    stack.push(LrStackEntry::Symbol(nonterminal));
                    stack.push(LrStackEntry::State(next));
                }
                Action::Accept => {
                    // only the appended end marker may be accepted
                    if cursor != tokens.len() || pending.is_some() {
                        return Err(AnalyseError::InvariantViolation(format!(
                            "accept on symbol {lookahead} with {} tokens unread",
                            tokens.len() - cursor.min(tokens.len())
                        )));
                    }
                    debug!("accepted {} tokens in {} steps", tokens.len(), steps.len());
                    return Ok(Derivation { symbols, steps });
                }
            }
        }
    }
}

fn is_terminal(table: &ParseTable, symbol: SymbolIdx) -> bool {
    table
        .symbol(symbol)
        .is_some_and(|symbol| symbol.kind == SymbolKind::Terminal)
}

fn top_state(stack: &[LrStackEntry]) -> Result<LrStateIdx, AnalyseError> {
    match stack.last() {
        Some(LrStackEntry::State(state)) => Ok(*state),
        _ => Err(AnalyseError::InvariantViolation(
            "stack does not end in a state".to_string(),
        )),
    }
}

// reported at the token under the cursor, or the last token once the input
// is exhausted
fn syntax_error(symbols: &SymbolTable, cursor: usize) -> AnalyseError {
    let line = symbols
        .get(cursor)
        .or_else(|| symbols.last())
        .map_or(1, |record| record.line);
    let consumed = symbols
        .iter()
        .take(cursor + 1)
        .map(|record| record.literal.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    AnalyseError::Syntax { line, consumed }
}
