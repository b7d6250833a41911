use tandem::{
    parser::{AnalyseError, AnalyserOptions},
    scanner::LexError,
    RecognizeError, Recognizer,
};
use tandem_fa::TokenKind;

const EXPRESSION_RULES: &str = include_str!("../../../data/rules/expressions.rules");
const EXPRESSION_TABLE: &str = include_str!("../../../data/tables/expressions.json");

fn recognizer() -> Recognizer {
    Recognizer::from_sources(EXPRESSION_RULES, EXPRESSION_TABLE, &AnalyserOptions::default())
        .expect("failed to build recognizer")
}

#[test]
fn test_recognize_multiline_expression() {
    let derivation = recognizer()
        .recognize("abc +\n\tx1 * y0\n+ z")
        .expect("failed to recognize");
    println!("{}", derivation.symbols);

    let literals: Vec<&str> = derivation
        .symbols
        .iter()
        .map(|record| record.literal.as_str())
        .collect();
    assert_eq!(literals, vec!["abc", "+", "x1", "*", "y0", "+", "z"]);
    assert_eq!(
        derivation.symbols.get(6).map(|record| record.line),
        Some(3)
    );
    assert_eq!(
        derivation.symbols.get(1).map(|record| &record.token),
        Some(&TokenKind::Keyword("+".to_string()))
    );
}

#[test]
fn test_lexical_error_stops_before_parsing() {
    let result = recognizer().recognize("x + q");
    assert!(matches!(
        result,
        Err(RecognizeError::Lex(LexError::Unrecognized { line: 1, ref literal })) if literal == "q"
    ));
}

#[test]
fn test_syntax_error() {
    let result = recognizer().recognize("x\ny");
    assert!(matches!(
        result,
        Err(RecognizeError::Analyse(AnalyseError::Syntax { line: 2, ref consumed }))
            if consumed == "x y"
    ));
}

#[test]
fn test_bad_sources() {
    let result = Recognizer::from_sources(
        "<S> ::= a<T>",
        EXPRESSION_TABLE,
        &AnalyserOptions::default(),
    );
    assert!(matches!(result, Err(RecognizeError::Spec(_))));

    let result = Recognizer::from_sources(EXPRESSION_RULES, "{", &AnalyserOptions::default());
    assert!(matches!(result, Err(RecognizeError::Table(_))));
}
