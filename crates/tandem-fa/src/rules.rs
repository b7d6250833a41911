use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
};

use bit_set::BitSet;
use tandem_util::make_type_idx;
use thiserror::Error;

make_type_idx!(StateId, Rule);

pub const START_STATE: StateId = StateId::new(0);
pub const EPSILON: &str = "epsi";

// one atomic way out of a state
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Production {
    // consuming the symbol completes the token without leaving the state
    Literal(char),
    Epsilon,
    Transition(char, StateId),
}

impl Production {
    pub fn symbol(&self) -> Option<char> {
        match self {
            Production::Literal(symbol) | Production::Transition(symbol, _) => Some(*symbol),
            Production::Epsilon => None,
        }
    }

    pub fn target(&self) -> Option<StateId> {
        match self {
            Production::Transition(_, target) => Some(*target),
            _ => None,
        }
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Production::Literal(symbol) => write!(f, "{symbol}"),
            Production::Epsilon => write!(f, "{EPSILON}"),
            Production::Transition(symbol, target) => write!(f, "{symbol}<{target}>"),
        }
    }
}

/// The set of productions attached to one state. Duplicates collapse and
/// insertion order is irrelevant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rule {
    productions: BTreeSet<Production>,
}

impl Rule {
    pub fn productions(&self) -> impl Iterator<Item = &Production> + '_ {
        self.productions.iter()
    }

    pub fn with_symbol(&self, symbol: char) -> impl Iterator<Item = &Production> + '_ {
        self.productions
            .iter()
            .filter(move |production| production.symbol() == Some(symbol))
    }

    pub fn len(&self) -> usize {
        self.productions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.productions.is_empty()
    }

    pub(crate) fn insert(&mut self, production: Production) -> bool {
        self.productions.insert(production)
    }

    pub(crate) fn remove_symbol(&mut self, symbol: char) {
        self.productions
            .retain(|production| production.symbol() != Some(symbol));
    }

    pub(crate) fn union_with(&mut self, other: &Rule) {
        self.productions.extend(other.productions.iter().copied());
    }
}

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("malformed rule specification on line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("line {line} refers to state <{name}>, which has no rule")]
    UndefinedState { line: usize, name: String },
    #[error("production refers to state {0}, which was never allocated")]
    DanglingState(StateId),
    #[error("reserved words cannot be empty")]
    EmptyKeyword,
    #[error("rule specification accepts no token")]
    NoAcceptingState,
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
    #[error("failed to access automaton file")]
    Io(#[from] std::io::Error),
    #[error("failed to (de)serialize automaton")]
    Serialization(#[from] serde_json::Error),
}

/// In-memory form of one rule file: an arena of rules indexed by [`StateId`],
/// with state 0 as the start state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSpec {
    pub(crate) rules: Vec<Rule>,
    pub(crate) names: Vec<Option<String>>,
    pub(crate) terminals: BitSet,
    pub(crate) keywords: BTreeMap<StateId, String>,
    pub(crate) alphabet: Vec<char>,
}

impl RuleSpec {
    pub fn start(&self) -> StateId {
        START_STATE
    }

    pub fn n_states(&self) -> usize {
        self.rules.len()
    }

    pub fn rule(&self, state: StateId) -> &Rule {
        &self.rules[state]
    }

    pub fn rules(&self) -> impl Iterator<Item = (StateId, &Rule)> + '_ {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, rule)| (StateId::new(i), rule))
    }

    pub fn name(&self, state: StateId) -> Option<&str> {
        self.names.get(state.index()).and_then(|name| name.as_deref())
    }

    pub fn is_terminal(&self, state: StateId) -> bool {
        self.terminals.contains(state.index())
    }

    pub fn terminals(&self) -> impl Iterator<Item = StateId> + '_ {
        self.terminals.iter().map(StateId::new)
    }

    pub fn keyword(&self, state: StateId) -> Option<&str> {
        self.keywords.get(&state).map(String::as_str)
    }

    pub fn keywords(&self) -> impl Iterator<Item = (StateId, &str)> + '_ {
        self.keywords.iter().map(|(state, word)| (*state, word.as_str()))
    }

    /// Sorted, duplicate free. The epsilon marker is not a member.
    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    /// True when no rule has more than one production for any symbol.
    pub fn is_deterministic(&self) -> bool {
        self.rules.iter().all(|rule| {
            let mut seen = BTreeSet::new();
            rule.productions()
                .filter_map(Production::symbol)
                .all(|symbol| seen.insert(symbol))
        })
    }

    pub(crate) fn rule_mut(&mut self, state: StateId) -> &mut Rule {
        &mut self.rules[state]
    }

    pub(crate) fn push_state(
        &mut self,
        rule: Rule,
        terminal: bool,
        keyword: Option<String>,
    ) -> StateId {
        let id = StateId::from_push(&mut self.rules, rule);
        self.names.push(None);
        if terminal {
            self.terminals.insert(id.index());
        }
        if let Some(word) = keyword {
            self.keywords.insert(id, word);
        }
        id
    }
}

impl fmt::Display for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, rule) in self.rules() {
            write!(f, "<{id}> ::=")?;
            for (i, production) in rule.productions().enumerate() {
                if i > 0 {
                    write!(f, " |")?;
                }
                write!(f, " {production}")?;
            }

            let mut notes = Vec::new();
            if let Some(name) = self.name(id) {
                notes.push(format!("<{name}>"));
            }
            if self.is_terminal(id) {
                notes.push("terminal".to_string());
            }
            if let Some(word) = self.keyword(id) {
                notes.push(format!("keyword {word:?}"));
            }
            if !notes.is_empty() {
                write!(f, "    # {}", notes.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Owns the state counter while a [`RuleSpec`] is assembled. Every id it
/// hands out is dense and final.
#[derive(Debug, Default)]
pub struct RuleSpecBuilder {
    rules: Vec<Rule>,
    names: Vec<Option<String>>,
    by_name: HashMap<String, StateId>,
    terminals: BitSet,
    keywords: BTreeMap<StateId, String>,
}

impl RuleSpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the named state, minting it on first use.
    pub fn state(&mut self, name: &str) -> StateId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.push(Some(name.to_string()));
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<StateId> {
        self.by_name.get(name).copied()
    }

    pub fn new_state(&mut self) -> StateId {
        self.push(None)
    }

    pub fn start(&mut self) -> StateId {
        if self.rules.is_empty() {
            self.new_state()
        } else {
            START_STATE
        }
    }

    // literal and epsilon productions make their owner terminal
    pub fn add_production(
        &mut self,
        state: StateId,
        production: Production,
    ) -> Result<(), SpecError> {
        let rule = self
            .rules
            .get_mut(state.index())
            .ok_or(SpecError::DanglingState(state))?;
        rule.insert(production);
        if matches!(production, Production::Literal(_) | Production::Epsilon) {
            self.terminals.insert(state.index());
        }
        Ok(())
    }

    pub fn mark_terminal(&mut self, state: StateId) {
        self.terminals.insert(state.index());
    }

    /// Expands `word` into a chain of fresh states hanging off the start
    /// state, one per character. Returns the final state of the chain, which
    /// is marked terminal and keyword.
    pub fn add_keyword(&mut self, word: &str) -> Result<StateId, SpecError> {
        if word.is_empty() {
            return Err(SpecError::EmptyKeyword);
        }

        let mut current = self.start();
        for symbol in word.chars() {
            let next = self.new_state();
            self.add_production(current, Production::Transition(symbol, next))?;
            current = next;
        }

        self.mark_terminal(current);
        self.keywords.insert(current, word.to_string());
        Ok(current)
    }

    pub fn build(mut self) -> Result<RuleSpec, SpecError> {
        self.start();

        let mut alphabet = BTreeSet::new();
        for rule in &self.rules {
            for production in rule.productions() {
                if let Some(target) = production.target() {
                    if target.index() >= self.rules.len() {
                        return Err(SpecError::DanglingState(target));
                    }
                }
                if let Some(symbol) = production.symbol() {
                    alphabet.insert(symbol);
                }
            }
        }

        Ok(RuleSpec {
            rules: self.rules,
            names: self.names,
            terminals: self.terminals,
            keywords: self.keywords,
            alphabet: alphabet.into_iter().collect(),
        })
    }

    fn push(&mut self, name: Option<String>) -> StateId {
        let id = StateId::from_push(&mut self.rules, Rule::default());
        self.names.push(name);
        id
    }
}
