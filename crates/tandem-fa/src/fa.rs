use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    determinize::{determinize, DeterminizedSpec},
    rule_def::parse_rule_def,
    rules::{Production, RuleSpec, SpecError, StateId},
};

// row index into a compiled automaton, not a StateId
pub type AutomatonState = usize;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Keyword(String),
    Identifier,
    Error,
}

impl TokenKind {
    pub fn is_error(&self) -> bool {
        matches!(self, TokenKind::Error)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(word) => write!(f, "{word}"),
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Error => write!(f, "error"),
        }
    }
}

// live states = rows, 1 additional error state (last row)
// alphabet symbols = columns
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalAutomaton {
    data: Vec<usize>,
    kinds: Vec<Option<TokenKind>>,
    state_ids: Vec<usize>,
    alphabet: Vec<char>,
    states: usize,
    initial_state: usize,
}

impl LexicalAutomaton {
    /// Rule file text to compiled automaton: load, determinize, prune, compile.
    pub fn from_rule_def(def_string: &str) -> Result<LexicalAutomaton, SpecError> {
        let spec = parse_rule_def(def_string)?;
        Self::compile(&determinize(spec))
    }

    pub fn compile(determinized: &DeterminizedSpec) -> Result<LexicalAutomaton, SpecError> {
        let spec = determinized.spec();
        if let Some(indetermination) = spec.indeterminations().first() {
            return Err(SpecError::InvariantViolation(format!(
                "state <{}> has several transitions on `{}`, determinize before compiling",
                indetermination.parent, indetermination.symbol
            )));
        }

        let mut rows: Vec<Option<AutomatonState>> = vec![None; spec.n_states()];
        let mut state_ids = Vec::new();
        for state in determinized.live_states() {
            rows[state.index()] = Some(state_ids.len());
            state_ids.push(state.index());
        }
        if state_ids.is_empty() {
            return Err(SpecError::NoAcceptingState);
        }

        let states = state_ids.len() + 1;
        let error_state = states - 1;
        let inputs = spec.alphabet().len();
        let mut data = vec![error_state; states * inputs];
        let mut kinds = Vec::with_capacity(states);

        for (row, &state) in state_ids.iter().enumerate() {
            let state = StateId::new(state);
            for production in spec.rule(state).productions() {
                let (symbol, next) = match *production {
                    Production::Transition(symbol, target) => {
                        (symbol, rows[target.index()].unwrap_or(error_state))
                    }
                    // the literal completes the token where it stands
                    Production::Literal(symbol) => (symbol, row),
                    Production::Epsilon => continue,
                };
                let column = spec.alphabet().binary_search(&symbol).map_err(|_| {
                    let reason = format!("`{symbol}` is missing from the alphabet");
                    SpecError::InvariantViolation(reason)
                })?;
                data[row * inputs + column] = next;
            }
            kinds.push(kind_of(spec, state));
        }
        kinds.push(Some(TokenKind::Error));

        debug!(
            "compiled lexical automaton: {} live states of {}, {} symbols",
            state_ids.len(),
            spec.n_states(),
            inputs
        );

        Ok(LexicalAutomaton {
            data,
            kinds,
            state_ids,
            alphabet: spec.alphabet().to_vec(),
            states,
            initial_state: 0,
        })
    }

    pub fn initial_state(&self) -> AutomatonState {
        self.initial_state
    }

    pub fn error_state(&self) -> AutomatonState {
        self.states - 1
    }

    pub fn is_error(&self, state: AutomatonState) -> bool {
        state >= self.error_state()
    }

    /// Symbols outside the alphabet lead to the error state.
    pub fn next_state(&self, state: AutomatonState, symbol: char) -> AutomatonState {
        if self.is_error(state) {
            return self.error_state();
        }
        match self.alphabet.binary_search(&symbol) {
            Ok(column) => self.data[state * self.alphabet.len() + column],
            Err(_) => self.error_state(),
        }
    }

    pub fn token_kind(&self, state: AutomatonState) -> Option<&TokenKind> {
        self.kinds.get(state).and_then(Option::as_ref)
    }

    // live states, error state excluded
    pub fn n_states(&self) -> usize {
        self.state_ids.len()
    }

    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    pub fn state_id(&self, state: AutomatonState) -> Option<StateId> {
        self.state_ids.get(state).copied().map(StateId::new)
    }

    pub fn row_of(&self, state: StateId) -> Option<AutomatonState> {
        self.state_ids.binary_search(&state.index()).ok()
    }

    pub fn contains_state(&self, state: StateId) -> bool {
        self.row_of(state).is_some()
    }

    pub fn save_json(&self, path: &Path) -> Result<(), SpecError> {
        let f = File::create(path)?;
        let mut w = BufWriter::new(f);
        serde_json::to_writer(&mut w, self)?;
        w.flush()?;
        Ok(())
    }

    pub fn load_json_bytes(data: &[u8]) -> Result<LexicalAutomaton, SpecError> {
        let automaton: LexicalAutomaton = serde_json::from_slice(data)?;
        automaton.check_shape()?;
        Ok(automaton)
    }

    fn check_shape(&self) -> Result<(), SpecError> {
        let corrupt = |reason: &str| {
            Err(SpecError::InvariantViolation(format!(
                "corrupt automaton: {reason}"
            )))
        };

        if self.states != self.state_ids.len() + 1 || self.kinds.len() != self.states {
            return corrupt("state count mismatch");
        }
        if self.data.len() != self.states * self.alphabet.len() {
            return corrupt("transition table has the wrong size");
        }
        if self.data.iter().any(|next| *next >= self.states) {
            return corrupt("transition to a state that does not exist");
        }
        if self.initial_state >= self.error_state() {
            return corrupt("initial state out of range");
        }
        if self.alphabet.windows(2).any(|pair| pair[0] >= pair[1]) {
            return corrupt("alphabet is not sorted");
        }
        if self.state_ids.windows(2).any(|pair| pair[0] >= pair[1]) {
            return corrupt("state ids are not ascending");
        }
        if self.kinds[self.error_state()] != Some(TokenKind::Error) {
            return corrupt("error state is not labelled");
        }
        Ok(())
    }
}

fn kind_of(spec: &RuleSpec, state: StateId) -> Option<TokenKind> {
    if !spec.is_terminal(state) {
        return None;
    }
    Some(match spec.keyword(state) {
        Some(word) => TokenKind::Keyword(word.to_string()),
        None => TokenKind::Identifier,
    })
}

impl fmt::Display for LexicalAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const WIDTH: usize = 7;

        write!(f, "{:>10} |", "")?;
        for symbol in &self.alphabet {
            write!(f, "{symbol:>WIDTH$}")?;
        }
        writeln!(f, " | token")?;

        for state in 0..self.states {
            let marker = if state == self.initial_state { "->" } else { "" };
            let label = match self.state_id(state) {
                Some(id) => format!("<{id}>"),
                None => "<ERROR>".to_string(),
            };
            write!(f, "{marker:>2}{label:>8} |")?;

            for column in 0..self.alphabet.len() {
                let next = self.data[state * self.alphabet.len() + column];
                let cell = match self.state_id(next) {
                    Some(id) => format!("<{id}>"),
                    None => "-".to_string(),
                };
                write!(f, "{cell:>WIDTH$}")?;
            }

            match self.token_kind(state) {
                Some(kind) => writeln!(f, " | {kind}")?,
                None => writeln!(f, " |")?,
            }
        }
        Ok(())
    }
}
