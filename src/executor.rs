use crate::filter::FilterCriteria;
use crate::gateway::{AdventureGateway, ListingQuery};
use crate::models::Listing;
use crate::rank::rank;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Identifiers the current user has saved or completed
#[derive(Debug, Clone, Default)]
pub struct UserMarks {
    pub saved: HashSet<String>,
    pub completed: HashSet<String>,
}

impl UserMarks {
    pub fn annotate(&self, listing: &mut Listing) {
        listing.saved_by_user = self.saved.contains(&listing.id);
        listing.completed_by_user = self.completed.contains(&listing.id);
    }
}

/// Ranked result of one query
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub listings: Vec<Listing>,
    /// True when the backend failed and the sample catalogue was used
    pub degraded: bool,
}

/// Runs filter criteria against the backend, falling back to a local source on failure
pub struct QueryExecutor {
    primary: Arc<dyn AdventureGateway>,
    fallback: Arc<dyn AdventureGateway>,
}

impl QueryExecutor {
    pub fn new(primary: Arc<dyn AdventureGateway>, fallback: Arc<dyn AdventureGateway>) -> Self {
        Self { primary, fallback }
    }

    /// Never fails: backend errors produce a degraded result from the fallback source.
    pub async fn execute(&self, criteria: &FilterCriteria, marks: &UserMarks) -> QueryOutcome {
        let query = ListingQuery::from(criteria);

        let (mut listings, degraded) = match self.primary.query_listings(&query).await {
            Ok(listings) => (listings, false),
            Err(e) => {
                warn!(
                    "Query against {} failed, using {} data: {:#}",
                    self.primary.source_name(),
                    self.fallback.source_name(),
                    e
                );
                let listings = self
                    .fallback
                    .query_listings(&query)
                    .await
                    .unwrap_or_else(|e| {
                        warn!("Fallback query failed as well: {:#}", e);
                        Vec::new()
                    })
                    .into_iter()
                    .filter(|listing| query.matches(listing))
                    .collect();
                (listings, true)
            }
        };

        for listing in listings.iter_mut() {
            marks.annotate(listing);
        }
        rank(&mut listings, criteria);

        info!(
            "Found {} adventures{}",
            listings.len(),
            if degraded { " (sample data)" } else { "" }
        );
        QueryOutcome { listings, degraded }
    }
}
