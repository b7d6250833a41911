// rule file loader.
//
// two kinds of lines:
//   <name> ::= a<other> | b | epsi     (grammar rule, spaces are ignored)
//   while                              (reserved word)
//
// every name that appears on the left of a grammar rule is resolved to an id
// before any right hand side is read, in order of first appearance, so the
// first rule in the file is the start state. reserved words are expanded
// after all grammar rules.

use std::str::FromStr;

use crate::rules::{Production, RuleSpec, RuleSpecBuilder, SpecError, EPSILON};

const RULE_SEPARATOR: &str = "::=";
const ALTERNATIVE_SEPARATOR: char = '|';

pub fn parse_rule_def(def_string: &str) -> Result<RuleSpec, SpecError> {
    let mut grammar_lines: Vec<(usize, String)> = Vec::new();
    let mut words: Vec<&str> = Vec::new();

    for (i, line) in def_string.lines().enumerate() {
        let line_number = i + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.contains(RULE_SEPARATOR) {
            let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
            grammar_lines.push((line_number, compact));
        } else if trimmed.chars().any(char::is_whitespace) {
            return Err(SpecError::Malformed {
                line: line_number,
                reason: format!("`{trimmed}` is neither a grammar rule nor a single reserved word"),
            });
        } else {
            words.push(trimmed);
        }
    }

    let mut builder = RuleSpecBuilder::new();

    let mut heads = Vec::with_capacity(grammar_lines.len());
    for (line, compact) in &grammar_lines {
        let (head, body) = compact
            .split_once(RULE_SEPARATOR)
            .ok_or_else(|| malformed(*line, "missing `::=`"))?;
        let name = parse_state_name(head)
            .ok_or_else(|| malformed(*line, format!("`{head}` is not a state name")))?;
        let state = builder.state(name);
        heads.push((*line, state, body));
    }

    for (line, state, body) in heads {
        for alternative in body.split(ALTERNATIVE_SEPARATOR) {
            let production = parse_production(&builder, line, alternative)?;
            builder.add_production(state, production)?;
        }
    }

    for word in words {
        builder.add_keyword(word)?;
    }

    builder.build()
}

impl FromStr for RuleSpec {
    type Err = SpecError;

    fn from_str(def_string: &str) -> Result<Self, Self::Err> {
        parse_rule_def(def_string)
    }
}

fn malformed(line: usize, reason: impl Into<String>) -> SpecError {
    SpecError::Malformed {
        line,
        reason: reason.into(),
    }
}

// `<name>` -> `name`
fn parse_state_name(text: &str) -> Option<&str> {
    let name = text.strip_prefix('<')?.strip_suffix('>')?;
    let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then_some(name)
}

fn parse_production(
    builder: &RuleSpecBuilder,
    line: usize,
    alternative: &str,
) -> Result<Production, SpecError> {
    if alternative == EPSILON || alternative == "ε" {
        return Ok(Production::Epsilon);
    }

    let mut chars = alternative.chars();
    let symbol = chars
        .next()
        .ok_or_else(|| malformed(line, "empty alternative"))?;
    if symbol == '<' || symbol == '>' {
        return Err(malformed(line, format!("`{alternative}` has no input symbol")));
    }

    let rest = chars.as_str();
    if rest.is_empty() {
        return Ok(Production::Literal(symbol));
    }

    let name = parse_state_name(rest)
        .ok_or_else(|| malformed(line, format!("`{alternative}` is not a production")))?;
    let target = builder
        .lookup(name)
        .ok_or_else(|| SpecError::UndefinedState {
            line,
            name: name.to_string(),
        })?;
    Ok(Production::Transition(symbol, target))
}
