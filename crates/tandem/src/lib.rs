pub mod parser;
pub mod scanner;

mod recognizer;

pub use recognizer::{RecognizeError, Recognizer};
