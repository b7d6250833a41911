// parse table loader.
//
// tables are generated elsewhere and read from json:
//   { "Symbols":     [ { "Index", "Name", "Type" } ],
//     "Productions": [ { "Index", "NonTerminalIndex", "SymbolCount" } ],
//     "States":      [ { "Index", "Actions": [ { "SymbolIndex", "Action", "Value" } ] } ] }

use std::{collections::HashMap, fmt, fs, path::Path};

use log::debug;
use serde::Deserialize;
use tandem_util::make_type_idx;
use thiserror::Error;

make_type_idx!(SymbolIdx, Symbol);
make_type_idx!(ProductionIdx, Production);
make_type_idx!(LrStateIdx, LrState);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Nonterminal,
    Terminal,
    Noise,
    EndOfFile,
    Error,
}

impl SymbolKind {
    fn from_code(code: u8) -> Option<SymbolKind> {
        match code {
            0 => Some(SymbolKind::Nonterminal),
            1 => Some(SymbolKind::Terminal),
            2 => Some(SymbolKind::Noise),
            3 => Some(SymbolKind::EndOfFile),
            7 => Some(SymbolKind::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Production {
    pub head: SymbolIdx,
    pub symbol_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Shift(LrStateIdx),
    Reduce(ProductionIdx),
    Goto(LrStateIdx),
    Accept,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Shift(state) => write!(f, "shift {state}"),
            Action::Reduce(production) => write!(f, "reduce {production}"),
            Action::Goto(state) => write!(f, "goto {state}"),
            Action::Accept => write!(f, "accept"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LrState {
    actions: HashMap<SymbolIdx, Action>,
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("no action for symbol {symbol} in state {state}")]
    NoAction { state: LrStateIdx, symbol: SymbolIdx },
    #[error("malformed parse table: {0}")]
    Malformed(String),
    #[error("failed to read parse table")]
    Io(#[from] std::io::Error),
    #[error("failed to deserialize parse table")]
    Serialization(#[from] serde_json::Error),
}

// on-disk records, named the way the table generator writes them
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TableDoc {
    symbols: Vec<SymbolDoc>,
    productions: Vec<ProductionDoc>,
    states: Vec<StateDoc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SymbolDoc {
    index: u32,
    name: String,
    #[serde(rename = "Type")]
    kind: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProductionDoc {
    index: u32,
    non_terminal_index: u32,
    symbol_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateDoc {
    index: u32,
    actions: Vec<ActionDoc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ActionDoc {
    symbol_index: u32,
    action: u8,
    value: u32,
}

/// Symbols, productions and per-state actions of one LR grammar. Immutable
/// once loaded; state 0 is the initial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTable {
    symbols: Vec<Symbol>,
    symbols_by_name: HashMap<String, SymbolIdx>,
    productions: Vec<Production>,
    states: Vec<LrState>,
}

impl ParseTable {
    pub fn load(path: &Path) -> Result<ParseTable, TableError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<ParseTable, TableError> {
        let doc: TableDoc = serde_json::from_str(text)?;
        Self::from_doc(doc)
    }

    fn from_doc(doc: TableDoc) -> Result<ParseTable, TableError> {
        let mut symbols = Vec::with_capacity(doc.symbols.len());
        let mut symbols_by_name = HashMap::new();
        for (i, record) in doc.symbols.into_iter().enumerate() {
            check_dense("symbol", i, record.index)?;
            let kind = SymbolKind::from_code(record.kind).ok_or_else(|| {
                malformed(format!("symbol `{}` has unknown type {}", record.name, record.kind))
            })?;
            if symbols_by_name.insert(record.name.clone(), SymbolIdx::new(i)).is_some() {
                return Err(malformed(format!("symbol `{}` is defined twice", record.name)));
            }
            SymbolIdx::from_push(
                &mut symbols,
                Symbol {
                    name: record.name,
                    kind,
                },
            );
        }

        let symbol = |index: u32| -> Result<SymbolIdx, TableError> {
            let idx = SymbolIdx::new(index as usize);
            if idx.index() < symbols.len() {
                Ok(idx)
            } else {
                Err(malformed(format!("symbol {index} does not exist")))
            }
        };

        let mut productions = Vec::with_capacity(doc.productions.len());
        for (i, record) in doc.productions.iter().enumerate() {
            check_dense("production", i, record.index)?;
            let head = symbol(record.non_terminal_index)?;
            if symbols[head].kind != SymbolKind::Nonterminal {
                return Err(malformed(format!(
                    "production {i} reduces to `{}`, which is not a nonterminal",
                    symbols[head].name
                )));
            }
            ProductionIdx::from_push(
                &mut productions,
                Production {
                    head,
                    symbol_count: record.symbol_count as usize,
                },
            );
        }

        let n_states = doc.states.len();
        let mut states = Vec::with_capacity(n_states);
        for (i, record) in doc.states.iter().enumerate() {
            check_dense("state", i, record.index)?;
            let mut state = LrState::default();
            for entry in &record.actions {
                let on = symbol(entry.symbol_index)?;
                let action = decode_action(entry, n_states, productions.len())?;

                let on_nonterminal = symbols[on].kind == SymbolKind::Nonterminal;
                let is_goto = matches!(action, Action::Goto(_));
                if on_nonterminal != is_goto {
                    return Err(malformed(format!(
                        "state {i}: `{action}` on `{}` mixes up terminals and nonterminals",
                        symbols[on].name
                    )));
                }
                if state.actions.insert(on, action).is_some() {
                    return Err(malformed(format!(
                        "state {i} has more than one action on `{}`",
                        symbols[on].name
                    )));
                }
            }
            LrStateIdx::from_push(&mut states, state);
        }

        if states.is_empty() {
            return Err(malformed("table has no states".to_string()));
        }

        debug!(
            "loaded parse table: {} symbols, {} productions, {} states",
            symbols.len(),
            productions.len(),
            states.len()
        );

        Ok(ParseTable {
            symbols,
            symbols_by_name,
            productions,
            states,
        })
    }

    pub fn initial_state(&self) -> LrStateIdx {
        LrStateIdx::new(0)
    }

    /// Absence of an action is how syntax errors show up.
    pub fn action(&self, state: LrStateIdx, symbol: SymbolIdx) -> Result<Action, TableError> {
        self.states
            .get(state.index())
            .and_then(|s| s.actions.get(&symbol))
            .copied()
            .ok_or(TableError::NoAction { state, symbol })
    }

    pub fn symbol(&self, symbol: SymbolIdx) -> Option<&Symbol> {
        self.symbols.get(symbol.index())
    }

    pub fn symbol_by_name(&self, name: &str) -> Option<SymbolIdx> {
        self.symbols_by_name.get(name).copied()
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolIdx, &Symbol)> + '_ {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| (SymbolIdx::new(i), symbol))
    }

    pub fn end_of_input(&self) -> Option<SymbolIdx> {
        self.symbols()
            .find(|(_, symbol)| symbol.kind == SymbolKind::EndOfFile)
            .map(|(idx, _)| idx)
    }

    pub fn production(&self, production: ProductionIdx) -> Option<&Production> {
        self.productions.get(production.index())
    }

    pub fn n_symbols(&self) -> usize {
        self.symbols.len()
    }

    pub fn n_productions(&self) -> usize {
        self.productions.len()
    }

    pub fn n_states(&self) -> usize {
        self.states.len()
    }
}

fn malformed(reason: String) -> TableError {
    TableError::Malformed(reason)
}

fn check_dense(what: &str, position: usize, index: u32) -> Result<(), TableError> {
    if index as usize != position {
        return Err(malformed(format!(
            "{what} records must be numbered densely from 0, found {index} at position {position}"
        )));
    }
    Ok(())
}

fn decode_action(
    entry: &ActionDoc,
    n_states: usize,
    n_productions: usize,
) -> Result<Action, TableError> {
    let value = entry.value as usize;
    let state = || {
        if value < n_states {
            Ok(LrStateIdx::new(value))
        } else {
            Err(malformed(format!("action targets state {value}, which does not exist")))
        }
    };

    match entry.action {
        1 => Ok(Action::Shift(state()?)),
        2 if value < n_productions => Ok(Action::Reduce(ProductionIdx::new(value))),
        2 => Err(malformed(format!("reduce by production {value}, which does not exist"))),
        3 => Ok(Action::Goto(state()?)),
        4 => Ok(Action::Accept),
        code => Err(malformed(format!("unknown action code {code}"))),
    }
}
