use crate::determinize::{determinize, prune};
use crate::fa::{AutomatonState, LexicalAutomaton, TokenKind};
use crate::rule_def::parse_rule_def;
use crate::rules::{Production, RuleSpec, SpecError, StateId};

const IDENTIFIERS_AND_IF: &str = "
<S> ::= i<A> | f<A>
<A> ::= i<A> | f<A> | epsi
if
";

fn load(def: &str) -> RuleSpec {
    parse_rule_def(def).expect("failed to parse rule definition")
}

fn compile(def: &str) -> LexicalAutomaton {
    LexicalAutomaton::from_rule_def(def).expect("failed to compile rule definition")
}

fn run(automaton: &LexicalAutomaton, word: &str) -> AutomatonState {
    word.chars().fold(automaton.initial_state(), |state, c| {
        automaton.next_state(state, c)
    })
}

fn run_vectors(automaton: &LexicalAutomaton, tests: &[(&str, Option<TokenKind>)]) {
    for (word, expected) in tests {
        let state = run(automaton, word);
        assert_eq!(
            automaton.token_kind(state),
            expected.as_ref(),
            "'{}' ended in row {} with the wrong token kind",
            word,
            state
        );
    }
}

#[test]
fn test_load_assigns_ids_in_order() {
    let spec = load(IDENTIFIERS_AND_IF);
    println!("{}", spec);

    // S, A, then two chain states for `if`
    assert_eq!(spec.n_states(), 4);
    assert_eq!(spec.name(StateId::new(0)), Some("S"));
    assert_eq!(spec.name(StateId::new(1)), Some("A"));
    assert_eq!(spec.name(StateId::new(2)), None);
    assert_eq!(spec.alphabet(), &['f', 'i']);

    assert!(!spec.is_terminal(StateId::new(0)));
    assert!(spec.is_terminal(StateId::new(1)));
    assert!(!spec.is_terminal(StateId::new(2)));
    assert!(spec.is_terminal(StateId::new(3)));
    assert_eq!(spec.keyword(StateId::new(3)), Some("if"));

    let start = spec.rule(spec.start());
    assert!(start
        .productions()
        .any(|p| *p == Production::Transition('i', StateId::new(2))));
}

#[test]
fn test_indeterminations() {
    let spec = load(IDENTIFIERS_AND_IF);
    assert!(!spec.is_deterministic());

    let found = spec.indeterminations();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].parent, StateId::new(0));
    assert_eq!(found[0].symbol, 'i');
    assert_eq!(
        found[0].targets().collect::<Vec<_>>(),
        vec![StateId::new(1), StateId::new(2)]
    );
    assert!(!found[0].accepting);
}

#[test]
fn test_keyword_survives_merging() {
    let determinized = determinize(load(IDENTIFIERS_AND_IF));
    println!("{}", determinized.spec());

    assert!(determinized.spec().is_deterministic());
    assert_eq!(determinized.passes(), 2);
    assert_eq!(determinized.merged_states(), 2);

    // the original keyword chain is bypassed by the merged states
    assert!(determinized.is_unreachable(StateId::new(2)));
    assert!(determinized.is_unreachable(StateId::new(3)));
    assert_eq!(determinized.spec().keyword(StateId::new(5)), Some("if"));
    assert_eq!(determinized.spec().keyword(StateId::new(4)), None);

    let live: Vec<_> = determinized.live_states().map(StateId::index).collect();
    assert_eq!(live, vec![0, 1, 4, 5]);

    let automaton = LexicalAutomaton::compile(&determinized).expect("failed to compile");
    println!("{}", automaton);
    assert_eq!(automaton.n_states(), 4);

    run_vectors(
        &automaton,
        &[
            ("if", Some(TokenKind::Keyword("if".to_string()))),
            ("i", Some(TokenKind::Identifier)),
            ("f", Some(TokenKind::Identifier)),
            ("ifi", Some(TokenKind::Identifier)),
            ("fif", Some(TokenKind::Identifier)),
            ("", None),
        ],
    );
}

#[test]
fn test_literal_next_to_transition() {
    let determinized = determinize(load("<S> ::= a | a<A>\n<A> ::= b"));
    let spec = determinized.spec();

    assert!(spec.is_deterministic());
    assert_eq!(determinized.passes(), 1);

    // the merged state is terminal because the literal was folded into it
    let merged = StateId::new(2);
    assert!(spec.is_terminal(merged));
    assert!(spec.rule(merged).productions().any(|p| *p == Production::Literal('b')));
    assert!(determinized.is_unreachable(StateId::new(1)));

    let automaton = LexicalAutomaton::compile(&determinized).expect("failed to compile");
    run_vectors(
        &automaton,
        &[
            ("a", Some(TokenKind::Identifier)),
            ("ab", Some(TokenKind::Identifier)),
            ("abbb", Some(TokenKind::Identifier)),
            ("b", Some(TokenKind::Error)),
        ],
    );
}

#[test]
fn test_cyclic_subsets_terminate() {
    let determinized = determinize(load(
        "<S> ::= a<S> | a<T>
         <T> ::= a<S> | a<T> | b",
    ));

    assert!(determinized.spec().is_deterministic());
    assert_eq!(determinized.passes(), 2);
    assert_eq!(determinized.merged_states(), 1);
}

#[test]
fn test_every_live_state_is_reachable() {
    let determinized = determinize(load(IDENTIFIERS_AND_IF));
    let automaton = LexicalAutomaton::compile(&determinized).expect("failed to compile");

    for state in determinized.live_states() {
        assert!(automaton.contains_state(state));
        assert!(!determinized.is_dead(state));
    }
    for row in 0..automaton.n_states() {
        let id = automaton.state_id(row).expect("live row without a state id");
        assert_eq!(automaton.row_of(id), Some(row));
    }
    assert_eq!(automaton.state_id(automaton.error_state()), None);
}

#[test]
fn test_dead_states_are_pruned() {
    let determinized = determinize(load(
        "<S> ::= a<A> | b<B>
         <A> ::= a<A>
         <B> ::= b",
    ));

    assert!(determinized.is_dead(StateId::new(1)));
    assert!(!determinized.is_unreachable(StateId::new(1)));
    assert!(determinized.is_live(StateId::new(0)));
    assert!(determinized.is_live(StateId::new(2)));

    let automaton = LexicalAutomaton::compile(&determinized).expect("failed to compile");
    assert_eq!(automaton.n_states(), 2);
    assert!(!automaton.contains_state(StateId::new(1)));

    let error = automaton.error_state();
    assert_eq!(run(&automaton, "a"), error);
    assert_eq!(run(&automaton, "bb"), 1);
}

#[test]
fn test_unreachable_states_are_pruned() {
    let determinized = determinize(load("<S> ::= a\n<X> ::= b"));

    assert!(determinized.is_unreachable(StateId::new(1)));
    assert!(!determinized.is_dead(StateId::new(1)));

    let automaton = LexicalAutomaton::compile(&determinized).expect("failed to compile");
    assert_eq!(automaton.n_states(), 1);
    assert_eq!(automaton.alphabet(), &['a', 'b']);
    assert!(automaton.is_error(run(&automaton, "b")));
}

#[test]
fn test_error_state_absorbs() {
    let automaton = compile(IDENTIFIERS_AND_IF);
    let error = automaton.error_state();

    assert!(automaton.is_error(run(&automaton, "q")));
    for &c in automaton.alphabet() {
        assert_eq!(automaton.next_state(error, c), error);
    }
    assert_eq!(automaton.token_kind(error), Some(&TokenKind::Error));
}

#[test]
fn test_no_accepting_state() {
    let result = LexicalAutomaton::from_rule_def("<S> ::= a<S>");
    assert!(matches!(result, Err(SpecError::NoAcceptingState)));
}

#[test]
fn test_compile_requires_determinism() {
    let pruned = prune(load(IDENTIFIERS_AND_IF));
    assert_eq!(pruned.passes(), 0);

    let result = LexicalAutomaton::compile(&pruned);
    assert!(matches!(result, Err(SpecError::InvariantViolation(_))));
}

#[test]
fn test_malformed_definitions() {
    let undefined = parse_rule_def("<S> ::= a<T>");
    assert!(matches!(
        undefined,
        Err(SpecError::UndefinedState { line: 1, ref name }) if name == "T"
    ));

    let two_words = parse_rule_def("\n<S> ::= a\nwhile do");
    assert!(matches!(two_words, Err(SpecError::Malformed { line: 3, .. })));

    let empty_alternative = parse_rule_def("<S> ::= a |");
    assert!(matches!(empty_alternative, Err(SpecError::Malformed { line: 1, .. })));

    let bad_head = parse_rule_def("S ::= a");
    assert!(matches!(bad_head, Err(SpecError::Malformed { line: 1, .. })));
}

#[test]
fn test_epsilon_markers() {
    let ascii = load("<S> ::= a<S> | epsi");
    let greek = load("<S> ::= a<S> | ε");

    assert_eq!(ascii, greek);
    assert!(ascii.is_terminal(StateId::new(0)));
    assert_eq!(ascii.alphabet(), &['a']);
}

#[test]
fn test_reserved_words_only() {
    let automaton = compile("+\n*\n(\n)");
    run_vectors(
        &automaton,
        &[
            ("+", Some(TokenKind::Keyword("+".to_string()))),
            (")", Some(TokenKind::Keyword(")".to_string()))),
            ("++", Some(TokenKind::Error)),
            ("", None),
        ],
    );
}

#[test]
fn test_json_round_trip() {
    let automaton = compile(IDENTIFIERS_AND_IF);
    let bytes = serde_json::to_vec(&automaton).expect("failed to serialize");
    let loaded = LexicalAutomaton::load_json_bytes(&bytes).expect("failed to load");
    assert_eq!(automaton, loaded);

    let path = std::env::temp_dir().join(format!("tandem-fa-{}.json", std::process::id()));
    automaton.save_json(&path).expect("failed to save");
    let from_disk = std::fs::read(&path).expect("failed to read back");
    std::fs::remove_file(&path).ok();
    assert_eq!(
        LexicalAutomaton::load_json_bytes(&from_disk).expect("failed to load"),
        automaton
    );
}

#[test]
fn test_corrupt_json_is_rejected() {
    let automaton = compile(IDENTIFIERS_AND_IF);
    let mut value = serde_json::to_value(&automaton).expect("failed to serialize");
    value["states"] = serde_json::json!(99);
    let bytes = serde_json::to_vec(&value).expect("failed to serialize");

    let result = LexicalAutomaton::load_json_bytes(&bytes);
    assert!(matches!(result, Err(SpecError::InvariantViolation(_))));

    let result = LexicalAutomaton::load_json_bytes(b"{}");
    assert!(matches!(result, Err(SpecError::Serialization(_))));
}

#[test]
fn test_colliding_keywords_keep_the_first_declared() {
    // the `x` loop keeps the start state in the subset, so `xif` ends in the
    // same merged state as `if`
    let determinized = determinize(load("<S> ::= x<S> | a\nif\nxif"));
    assert_eq!(determinized.passes(), 3);

    let merged = StateId::new(8);
    assert_eq!(determinized.spec().keyword(merged), Some("if"));
    assert!(determinized.spec().is_terminal(merged));

    let automaton = LexicalAutomaton::compile(&determinized).expect("failed to compile");
    run_vectors(
        &automaton,
        &[
            ("if", Some(TokenKind::Keyword("if".to_string()))),
            ("xif", Some(TokenKind::Keyword("if".to_string()))),
            ("xxa", Some(TokenKind::Identifier)),
            ("xi", None),
        ],
    );
}

#[test]
fn test_repeated_reserved_word() {
    let determinized = determinize(load("if\nif"));
    let automaton = LexicalAutomaton::compile(&determinized).expect("failed to compile");
    run_vectors(
        &automaton,
        &[("if", Some(TokenKind::Keyword("if".to_string()))), ("i", None)],
    );
}
