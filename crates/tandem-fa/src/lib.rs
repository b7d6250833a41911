pub mod determinize;
pub mod fa;
pub mod rule_def;
pub mod rules;

#[cfg(test)]
mod fa_tests;

pub use determinize::{determinize, prune, DeterminizedSpec, Indetermination};
pub use fa::{AutomatonState, LexicalAutomaton, TokenKind};
pub use rule_def::parse_rule_def;
pub use rules::{Production, Rule, RuleSpec, RuleSpecBuilder, SpecError, StateId, START_STATE};
