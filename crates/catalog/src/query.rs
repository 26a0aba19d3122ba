use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use foundation::RecordId;
use serde::{Deserialize, Serialize};

use crate::record::{Category, ClimateImpact, Record, RecordSet};

/// The user's current restriction. An empty set leaves its dimension
/// unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub categories: BTreeSet<Category>,
    #[serde(default)]
    pub climate_impacts: BTreeSet<ClimateImpact>,
}

impl FilterState {
    pub fn is_unrestricted(&self) -> bool {
        self.categories.is_empty() && self.climate_impacts.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.category_allows(record) && self.impact_allows(record)
    }

    fn category_allows(&self, record: &Record) -> bool {
        self.categories.is_empty() || self.categories.contains(&record.category)
    }

    // A record without an impact never passes a non-empty impact filter.
    fn impact_allows(&self, record: &Record) -> bool {
        if self.climate_impacts.is_empty() {
            return true;
        }
        record
            .climate_impact
            .is_some_and(|impact| self.climate_impacts.contains(&impact))
    }

    /// Applies `delta`. Returns `true` if the state changed.
    pub fn apply(&mut self, delta: FilterDelta) -> bool {
        let before = self.clone();
        match delta {
            FilterDelta::SetCategories(set) => self.categories = set,
            FilterDelta::SetClimateImpacts(set) => self.climate_impacts = set,
            FilterDelta::ToggleCategory(c) => {
                if !self.categories.remove(&c) {
                    self.categories.insert(c);
                }
            }
            FilterDelta::ToggleClimateImpact(i) => {
                if !self.climate_impacts.remove(&i) {
                    self.climate_impacts.insert(i);
                }
            }
            FilterDelta::Clear => {
                self.categories.clear();
                self.climate_impacts.clear();
            }
        }
        *self != before
    }
}

/// A user filter action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDelta {
    SetCategories(BTreeSet<Category>),
    SetClimateImpacts(BTreeSet<ClimateImpact>),
    ToggleCategory(Category),
    ToggleClimateImpact(ClimateImpact),
    Clear,
}

/// How many records each option would show if it were the only selection on
/// its dimension, with the other dimension's filter still applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetCounts {
    pub categories: BTreeMap<Category, usize>,
    pub climate_impacts: BTreeMap<ClimateImpact, usize>,
}

#[derive(Debug)]
struct Memo {
    key: FilterState,
    generation: u64,
    ids: Arc<[RecordId]>,
}

/// Holds the filter selection and derives the visible subset.
///
/// Ordering contract:
/// - Visible ids are ascending, so identical inputs give identical output.
#[derive(Debug, Default)]
pub struct FilterEngine {
    state: FilterState,
    memo: Option<Memo>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn set_categories(&mut self, categories: BTreeSet<Category>) -> bool {
        self.apply(FilterDelta::SetCategories(categories))
    }

    pub fn set_climate_impacts(&mut self, impacts: BTreeSet<ClimateImpact>) -> bool {
        self.apply(FilterDelta::SetClimateImpacts(impacts))
    }

    pub fn apply(&mut self, delta: FilterDelta) -> bool {
        self.state.apply(delta)
    }

    /// Pure: recomputes from scratch on every call.
    pub fn visible(&self, records: &RecordSet) -> Vec<RecordId> {
        visible_ids(&self.state, records)
    }

    /// Memoized on (filter state, record set generation).
    pub fn refresh(&mut self, records: &RecordSet) -> Arc<[RecordId]> {
        if let Some(memo) = &self.memo
            && memo.generation == records.generation()
            && memo.key == self.state
        {
            return Arc::clone(&memo.ids);
        }

        let ids: Arc<[RecordId]> = visible_ids(&self.state, records).into();
        self.memo = Some(Memo {
            key: self.state.clone(),
            generation: records.generation(),
            ids: Arc::clone(&ids),
        });
        ids
    }

    pub fn facet_counts(&self, records: &RecordSet) -> FacetCounts {
        let mut out = FacetCounts {
            categories: Category::ALL.iter().map(|c| (*c, 0)).collect(),
            climate_impacts: ClimateImpact::ALL.iter().map(|i| (*i, 0)).collect(),
        };
        for record in records.iter() {
            if self.state.impact_allows(record) {
                *out.categories.entry(record.category).or_default() += 1;
            }
            if let Some(impact) = record.climate_impact
                && self.state.category_allows(record)
            {
                *out.climate_impacts.entry(impact).or_default() += 1;
            }
        }
        out
    }
}

fn visible_ids(state: &FilterState, records: &RecordSet) -> Vec<RecordId> {
    // RecordSet iterates in ascending id order already.
    records
        .iter()
        .filter(|r| state.matches(r))
        .map(|r| r.id)
        .collect()
}
