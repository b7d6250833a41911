use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use tandem::{
    parser::{AnalyserOptions, LrAutomaton, ParseTable},
    scanner::Lexer,
    Recognizer,
};
use tandem_fa::{determinize, parse_rule_def, LexicalAutomaton};

#[derive(Parser, Debug)]
#[command(version, about = "Table driven lexer and LR recognizer", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Determinizes a rule file and prints the compiled automaton
    Automaton {
        /// Rule file
        #[arg(short, long)]
        rules: PathBuf,
        /// Saves the compiled automaton as json
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Prints the symbol table for a source file
    Lex {
        /// Rule file, or an automaton saved by `automaton --output`
        #[arg(short, long)]
        rules: PathBuf,
        /// Source file, stdin if omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Lexes and parses a source file
    Parse {
        /// Rule file, or an automaton saved by `automaton --output`
        #[arg(short, long)]
        rules: PathBuf,
        /// Parse table (json)
        #[arg(short, long)]
        table: PathBuf,
        /// Source file, stdin if omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Table symbol that identifiers map to
        #[arg(long, default_value = "ID")]
        identifier_symbol: String,
        /// End marker, if the table does not declare one
        #[arg(long, default_value = "EOF")]
        end_symbol: String,
        /// Prints every shift, reduce and goto
        #[arg(long)]
        trace: bool,
    },
}

fn load_lexer(path: &Path) -> Result<Lexer> {
    let bytes = fs::read(path).with_context(|| format!("can't read {:?}", path))?;
    let built = if path.extension().is_some_and(|ext| ext == "json") {
        LexicalAutomaton::load_json_bytes(&bytes)
    } else {
        let text = String::from_utf8(bytes).with_context(|| format!("{:?} is not utf-8", path))?;
        LexicalAutomaton::from_rule_def(&text)
    };
    let automaton = built.with_context(|| format!("can't build automaton from {:?}", path))?;
    Ok(Lexer::new(automaton))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path).with_context(|| format!("can't read {:?}", path)),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("can't read stdin")?;
            Ok(text)
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Automaton { rules, output } => {
            let text =
                fs::read_to_string(&rules).with_context(|| format!("can't read {:?}", rules))?;
            let spec = parse_rule_def(&text).with_context(|| format!("can't load {:?}", rules))?;
            let determinized = determinize(spec);
            println!("{}", determinized.spec());

            let automaton = LexicalAutomaton::compile(&determinized)?;
            println!("{}", automaton);

            if let Some(path) = output {
                automaton
                    .save_json(&path)
                    .with_context(|| format!("can't write {:?}", path))?;
                info!("saved automaton to {:?}", path);
            }
        }
        Commands::Lex { rules, input } => {
            let lexer = load_lexer(&rules)?;
            let source = read_input(input.as_deref())?;
            let (_, symbols) = lexer.read(&source)?;
            print!("{}", symbols);
        }
        Commands::Parse {
            rules,
            table,
            input,
            identifier_symbol,
            end_symbol,
            trace,
        } => {
            let lexer = load_lexer(&rules)?;
            let parse_table =
                ParseTable::load(&table).with_context(|| format!("can't load {:?}", table))?;
            let options = AnalyserOptions {
                identifier_symbol,
                end_symbol,
            };
            let automaton = LrAutomaton::new(parse_table, &options)?;
            let recognizer = Recognizer::new(lexer, automaton);

            let source = read_input(input.as_deref())?;
            let derivation = recognizer.recognize(&source)?;

            if trace {
                for step in &derivation.steps {
                    println!("{}", step);
                }
            }
            println!("accepted {} tokens", derivation.symbols.len());
        }
    }

    Ok(())
}
