//! Per-stage crawl aggregate

use crate::state::UnitStatus;
use crate::taxonomy::UnitKey;
use crate::{EnrichedRecord, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Progress of one unit: how many steps are done and what they produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitProgress<T> {
    pub cursor: usize,
    pub items: Vec<T>,
}

impl<T> Default for UnitProgress<T> {
    fn default() -> Self {
        Self {
            cursor: 0,
            items: Vec::new(),
        }
    }
}

/// Everything a stage has achieved so far
///
/// Within a unit the aggregate is append-only: items are never removed and a completed
/// unit stays completed. The only way back is [`reset_unit`](Self::reset_unit), which
/// drops a unit as a whole once the input it was crawled from is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct CrawlState<T> {
    #[serde(with = "unit_entries")]
    units: BTreeMap<UnitKey, UnitProgress<T>>,
    completed: BTreeSet<UnitKey>,
}

/// Listing stage: one step per result page
pub type ListingState = CrawlState<Record>;

/// Detail stage: one step per enriched record
pub type DetailState = CrawlState<EnrichedRecord>;

impl<T> Default for CrawlState<T> {
    fn default() -> Self {
        Self {
            units: BTreeMap::new(),
            completed: BTreeSet::new(),
        }
    }
}

impl<T> CrawlState<T> {
    pub fn status(&self, unit: &UnitKey) -> UnitStatus {
        if self.completed.contains(unit) {
            return UnitStatus::Complete;
        }
        match self.units.get(unit) {
            Some(progress) if progress.cursor > 0 => UnitStatus::InProgress(progress.cursor),
            _ => UnitStatus::NotStarted,
        }
    }

    pub fn is_complete(&self, unit: &UnitKey) -> bool {
        self.completed.contains(unit)
    }

    /// Number of steps recorded for a unit
    pub fn cursor(&self, unit: &UnitKey) -> usize {
        self.units.get(unit).map(|p| p.cursor).unwrap_or(0)
    }

    /// Items accumulated for a unit so far
    pub fn items(&self, unit: &UnitKey) -> &[T] {
        self.units
            .get(unit)
            .map(|p| p.items.as_slice())
            .unwrap_or(&[])
    }

    /// Records one finished step: appends its items and advances the cursor
    pub fn append_step(&mut self, unit: &UnitKey, items: impl IntoIterator<Item = T>) {
        let progress = self.units.entry(unit.clone()).or_default();
        progress.items.extend(items);
        progress.cursor += 1;
    }

    /// Marks a unit finished
    pub fn mark_complete(&mut self, unit: &UnitKey) {
        self.units.entry(unit.clone()).or_default();
        self.completed.insert(unit.clone());
    }

    /// Discards everything recorded for a unit, returning it to `NotStarted`
    pub fn reset_unit(&mut self, unit: &UnitKey) {
        self.units.remove(unit);
        self.completed.remove(unit);
    }

    /// Units with any recorded progress or completion
    pub fn units(&self) -> impl Iterator<Item = &UnitKey> + '_ {
        self.units.keys()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn total_items(&self) -> usize {
        self.units.values().map(|p| p.items.len()).sum()
    }

    /// Consumes the state into the unit → items mapping handed to the next stage
    pub fn into_output(self) -> BTreeMap<UnitKey, Vec<T>> {
        self.units
            .into_iter()
            .map(|(unit, progress)| (unit, progress.items))
            .collect()
    }

    /// Like [`into_output`](Self::into_output), restricted to completed units
    pub fn into_completed_output(self) -> BTreeMap<UnitKey, Vec<T>> {
        let Self { units, completed } = self;
        units
            .into_iter()
            .filter(|(unit, _)| completed.contains(unit))
            .map(|(unit, progress)| (unit, progress.items))
            .collect()
    }
}

/// Serializes the unit map as a list of entries, since JSON object keys must be
/// strings
mod unit_entries {
    use super::UnitProgress;
    use crate::taxonomy::UnitKey;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct EntryRef<'a, T> {
        unit: &'a UnitKey,
        cursor: usize,
        items: &'a [T],
    }

    #[derive(Deserialize)]
    struct Entry<T> {
        unit: UnitKey,
        cursor: usize,
        items: Vec<T>,
    }

    pub fn serialize<S, T>(
        units: &BTreeMap<UnitKey, UnitProgress<T>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(units.iter().map(|(unit, progress)| EntryRef {
            unit,
            cursor: progress.cursor,
            items: &progress.items,
        }))
    }

    pub fn deserialize<'de, D, T>(
        deserializer: D,
    ) -> Result<BTreeMap<UnitKey, UnitProgress<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        let entries = Vec::<Entry<T>>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                (
                    entry.unit,
                    UnitProgress {
                        cursor: entry.cursor,
                        items: entry.items,
                    },
                )
            })
            .collect())
    }
}
