use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::record::Record;

/// Accepted values per filter key. A key without values does not filter.
#[derive(Debug, Clone)]
pub struct FilterSet<F> {
    selected: HashMap<F, BTreeSet<String>>,
}

impl<F> Default for FilterSet<F> {
    fn default() -> Self {
        FilterSet {
            selected: HashMap::new(),
        }
    }
}

impl<F: Copy + Eq + std::hash::Hash> FilterSet<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the accepted values of `key`; an empty selection clears it.
    pub fn set<I, S>(&mut self, key: F, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.selected.remove(&key);
        } else {
            self.selected.insert(key, values);
        }
    }

    pub fn with<I, S>(mut self, key: F, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(key, values);
        self
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn selected(&self, key: F) -> Option<&BTreeSet<String>> {
        self.selected.get(&key)
    }

    pub fn is_active(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn accepts<R: Record<Field = F>>(&self, row: &R) -> bool {
        self.selected
            .iter()
            .all(|(&key, values)| values.contains(row.value(key).unwrap_or("")))
    }
}

/// Positions of the rows passing every active filter, in input order.
pub fn matching_indices<R: Record>(rows: &[R], filters: &FilterSet<R::Field>) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| filters.accepts(*row))
        .map(|(idx, _)| idx)
        .collect()
}

/// Returns the rows passing every active filter, in input order.
pub fn filter<R: Record>(rows: &[R], filters: &FilterSet<R::Field>) -> Vec<R> {
    rows.iter()
        .filter(|row| filters.accepts(*row))
        .cloned()
        .collect()
}

fn distinct_values<R: Record>(rows: &[R], key: R::Field) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|row| row.value(key).unwrap_or(""))
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}

/// Selectable values per filter key, in order of first appearance.
///
/// Always pass the unfiltered collection so option lists do not shrink while
/// other filters are applied. Each key is computed in its own rayon task.
pub fn options<R: Record>(rows: &[R], keys: &[R::Field]) -> Vec<(R::Field, Vec<String>)> {
    keys.par_iter()
        .map(|&key| (key, distinct_values(rows, key)))
        .collect()
}
