use crate::models::{Category, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;
use tracing::debug;

pub const MIN_DURATION_DAYS: u32 = 1;
pub const MAX_DURATION_DAYS: u32 = 7;
pub const DEFAULT_DURATION_DAYS: u32 = 2;
pub const DEFAULT_BUDGET: f64 = 10_000.0;
/// Top of the budget slider; the slider reads "50,000+"
pub const BUDGET_CEILING: f64 = 50_000.0;

/// Category selector: a single category or everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn accepts(&self, category: &Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(selected) => selected == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Rating,
    Cost,
    Duration,
}

impl SortKey {
    pub fn column(self) -> &'static str {
        match self {
            SortKey::Rating => "rating",
            SortKey::Cost => "cost",
            SortKey::Duration => "duration",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[default]
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    pub fn suffix(self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// Sort key plus direction, parsed from the "rating-desc" style option ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.key.column(), self.direction.suffix())
    }
}

impl FromStr for SortSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError {
            kind: "sort option",
            value: s.to_string(),
        };
        let (key, direction) = s.split_once('-').ok_or_else(err)?;
        let key = match key {
            "rating" => SortKey::Rating,
            "cost" => SortKey::Cost,
            "duration" => SortKey::Duration,
            _ => return Err(err()),
        };
        let direction = match direction {
            "asc" => SortDirection::Ascending,
            "desc" => SortDirection::Descending,
            _ => return Err(err()),
        };
        Ok(SortSpec { key, direction })
    }
}

/// The user's current query. Duration and budget are upper bounds only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub max_duration: u32,
    pub max_budget: f64,
    pub category: CategoryFilter,
    pub search: String,
    pub sort: SortSpec,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            max_duration: DEFAULT_DURATION_DAYS,
            max_budget: DEFAULT_BUDGET,
            category: CategoryFilter::All,
            search: String::new(),
            sort: SortSpec::default(),
        }
    }
}

impl FilterCriteria {
    /// The widest criteria the controls allow ("reset filters")
    pub fn relaxed() -> Self {
        Self {
            max_duration: MAX_DURATION_DAYS,
            max_budget: BUDGET_CEILING,
            ..Self::default()
        }
    }

    pub fn with_max_duration(self, days: u32) -> Self {
        Self {
            max_duration: days.clamp(MIN_DURATION_DAYS, MAX_DURATION_DAYS),
            ..self
        }
    }

    pub fn with_max_budget(self, budget: f64) -> Self {
        Self {
            max_budget: budget.max(0.0),
            ..self
        }
    }

    pub fn with_category(self, category: CategoryFilter) -> Self {
        Self { category, ..self }
    }

    pub fn with_search(self, search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            ..self
        }
    }

    pub fn with_sort(self, sort: SortSpec) -> Self {
        Self { sort, ..self }
    }

    /// Trimmed search text, `None` when blank
    pub fn search_text(&self) -> Option<&str> {
        let trimmed = self.search.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Holds the current criteria and notifies listeners on every replacement
pub struct FilterState {
    tx: watch::Sender<FilterCriteria>,
}

impl FilterState {
    pub fn new(initial: FilterCriteria) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> FilterCriteria {
        self.tx.borrow().clone()
    }

    /// Replace the whole criteria object
    pub fn set_criteria(&self, criteria: FilterCriteria) {
        debug!(?criteria, "Filter criteria replaced");
        self.tx.send_replace(criteria);
    }

    pub fn subscribe(&self) -> watch::Receiver<FilterCriteria> {
        self.tx.subscribe()
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(FilterCriteria::default())
    }
}
