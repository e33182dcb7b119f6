use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;

use crate::record::{FieldKind, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortConfig<F> {
    pub field: F,
    pub direction: Direction,
}

impl<F: Copy + Eq> SortConfig<F> {
    pub fn new(field: F) -> Self {
        SortConfig {
            field,
            direction: Direction::Asc,
        }
    }

    /// Selecting the active field flips the direction, any other field starts ascending.
    pub fn toggle(self, field: F) -> Self {
        if self.field == field {
            SortConfig {
                field,
                direction: self.direction.flipped(),
            }
        } else {
            SortConfig::new(field)
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Epoch(i64),
    Text(String),
}

/// Milliseconds since the unix epoch, 0 for anything that does not parse.
/// Values without an offset are read as UTC.
pub fn parse_epoch_millis(raw: &str) -> i64 {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.timestamp_millis();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.and_utc().timestamp_millis();
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

fn sort_key<R: Record>(row: &R, field: R::Field) -> SortKey {
    let raw = row.value(field).unwrap_or("");
    match R::kind(field) {
        FieldKind::DateTime => SortKey::Epoch(parse_epoch_millis(raw)),
        _ => SortKey::Text(raw.to_lowercase()),
    }
}

/// Orders `indices` (positions into `rows`) by the configured field.
///
/// Equal keys fall back to the row id, so the result is deterministic and a
/// descending sort is exactly the reverse of an ascending one.
pub fn order<R: Record>(rows: &[R], indices: &[usize], config: &SortConfig<R::Field>) -> Vec<usize> {
    // Keys are computed once per row instead of once per comparison
    let mut indexed_rows: Vec<(usize, SortKey)> = indices
        .iter()
        .map(|&idx| (idx, sort_key(&rows[idx], config.field)))
        .collect();

    indexed_rows.sort_by(|(a_idx, a), (b_idx, b)| {
        let ordering = a
            .cmp(b)
            .then_with(|| rows[*a_idx].id().cmp(rows[*b_idx].id()));
        config.direction.apply(ordering)
    });

    indexed_rows.into_iter().map(|(idx, _)| idx).collect()
}

/// Returns a sorted copy of `rows`.
pub fn sort<R: Record>(rows: &[R], config: &SortConfig<R::Field>) -> Vec<R> {
    let all: Vec<usize> = (0..rows.len()).collect();
    order(rows, &all, config)
        .into_iter()
        .map(|idx| rows[idx].clone())
        .collect()
}
