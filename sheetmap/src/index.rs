//! Header row -> column position lookup

use std::collections::HashMap;

/// Column positions resolved from a table's header row
///
/// Built once per table and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
    /// Surviving names ordered by position
    order: Vec<(String, usize)>,
    duplicates: Vec<String>,
}

impl ColumnIndex {
    /// Build the index from header cells
    ///
    /// Names are trimmed and stripped of leading/trailing `*` required markers.
    /// Blank header cells are skipped. When a name repeats, the later column wins.
    pub fn build<S: AsRef<str>>(header: &[S]) -> Self {
        let mut positions = HashMap::new();
        let mut duplicates = Vec::new();

        for (col, cell) in header.iter().enumerate() {
            let name = clean_header(cell.as_ref());
            if name.is_empty() {
                continue;
            }
            if positions.insert(name.to_string(), col).is_some() {
                log::warn!("Duplicate header '{}' at column {}, earlier column ignored", name, col + 1);
                if !duplicates.iter().any(|d| d == name) {
                    duplicates.push(name.to_string());
                }
            }
        }

        let mut order: Vec<(String, usize)> =
            positions.iter().map(|(name, col)| (name.clone(), *col)).collect();
        order.sort_by_key(|(_, col)| *col);

        ColumnIndex {
            positions,
            order,
            duplicates,
        }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Names from `required` that are absent from the header, in the given order
    pub fn missing<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        required
            .into_iter()
            .filter(|name| !self.contains(name))
            .map(str::to_string)
            .collect()
    }

    /// Header names that appeared more than once
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// (name, position) pairs in left-to-right order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.order.iter().map(|(name, col)| (name.as_str(), *col))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn clean_header(cell: &str) -> &str {
    cell.trim().trim_matches('*')
}
