use crate::filter::{CategoryFilter, FilterCriteria, SortSpec};
use crate::models::{Category, Listing};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Predicate set and ordering for a listing query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingQuery {
    /// Exact category; `None` matches every category
    pub category: Option<Category>,
    /// Inclusive upper bound on duration (days)
    pub max_duration: Option<u32>,
    /// Inclusive upper bound on cost
    pub max_cost: Option<f64>,
    /// Case-insensitive substring over title, description and location
    pub search: Option<String>,
    pub sort: Option<SortSpec>,
}

impl ListingQuery {
    /// Query matching the whole catalogue
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(category) = &self.category {
            if &listing.category != category {
                return false;
            }
        }
        if let Some(max) = self.max_duration {
            if listing.duration > max {
                return false;
            }
        }
        if let Some(max) = self.max_cost {
            if listing.cost > max {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = listing.title.to_lowercase().contains(&needle)
                || listing.description.to_lowercase().contains(&needle)
                || listing.location_name().to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }

    /// Orders by the query's sort key, newest first when there is none
    pub fn compare(&self, a: &Listing, b: &Listing) -> Ordering {
        match self.sort {
            Some(spec) => crate::rank::compare_by_key(a, b, spec),
            None => b.created_at.cmp(&a.created_at),
        }
    }

    /// PostgREST query-string pairs for this query
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];

        if let Some(category) = &self.category {
            pairs.push(("type".into(), format!("eq.{category}")));
        }
        if let Some(max) = self.max_duration {
            pairs.push(("duration".into(), format!("lte.{max}")));
        }
        if let Some(max) = self.max_cost {
            pairs.push(("cost".into(), format!("lte.{max}")));
        }
        if let Some(search) = &self.search {
            let pattern = sanitize_pattern(&search.to_lowercase());
            pairs.push((
                "or".into(),
                format!(
                    "(title.ilike.*{pattern}*,description.ilike.*{pattern}*,location_name.ilike.*{pattern}*)"
                ),
            ));
        }
        match self.sort {
            Some(spec) => pairs.push((
                "order".into(),
                format!("{}.{}", spec.key.column(), spec.direction.suffix()),
            )),
            None => pairs.push(("order".into(), "created_at.desc".into())),
        }

        pairs
    }
}

// Reserved characters inside a PostgREST `or=(...)` group
fn sanitize_pattern(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            ',' | '(' | ')' | '*' => ' ',
            other => other,
        })
        .collect()
}

impl From<&FilterCriteria> for ListingQuery {
    fn from(criteria: &FilterCriteria) -> Self {
        Self {
            category: match &criteria.category {
                CategoryFilter::All => None,
                CategoryFilter::Only(category) => Some(category.clone()),
            },
            max_duration: Some(criteria.max_duration),
            max_cost: Some(criteria.max_budget),
            search: criteria.search_text().map(str::to_string),
            sort: Some(criteria.sort),
        }
    }
}

/// Change delivered over a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum ListingEvent {
    Inserted(Listing),
}

/// Live feed of listing events. Events queue without limit until received;
/// dropping it or calling `unsubscribe` stops delivery.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ListingEvent>,
    worker: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<ListingEvent>) -> Self {
        Self {
            events,
            worker: None,
        }
    }

    /// Subscription fed by a background task that is aborted on unsubscribe
    pub fn with_worker(events: mpsc::UnboundedReceiver<ListingEvent>, worker: JoinHandle<()>) -> Self {
        Self {
            events,
            worker: Some(worker),
        }
    }

    pub async fn recv(&mut self) -> Option<ListingEvent> {
        self.events.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.events.close();
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}
