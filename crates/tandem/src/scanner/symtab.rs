use std::fmt;

use tandem_fa::TokenKind;

/// One word read from the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    pub literal: String,
    // 1-based
    pub line: usize,
    pub token: TokenKind,
}

// append-only, in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    records: Vec<SymbolRecord>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: SymbolRecord) {
        self.records.push(record);
    }

    pub fn get(&self, index: usize) -> Option<&SymbolRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolRecord> + '_ {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&SymbolRecord> {
        self.records.last()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenKind> + '_ {
        self.records.iter().map(|record| &record.token)
    }

    // first record that no accepting path matched
    pub fn first_error(&self) -> Option<&SymbolRecord> {
        self.records.iter().find(|record| record.token.is_error())
    }
}

impl<'a> IntoIterator for &'a SymbolTable {
    type Item = &'a SymbolRecord;
    type IntoIter = std::slice::Iter<'a, SymbolRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>6}  {:<20} {}", "line", "literal", "token")?;
        for record in &self.records {
            writeln!(
                f,
                "{:>6}  {:<20} {}",
                record.line, record.literal, record.token
            )?;
        }
        Ok(())
    }
}
