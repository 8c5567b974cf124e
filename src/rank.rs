//! Ordering of listings for display.
//!
//! Relevance (when a search produced scores) comes first, then the selected
//! sort key in the selected direction. The sort is stable, so re-ranking an
//! already ranked list leaves it unchanged.

use crate::filter::{FilterCriteria, SortDirection, SortKey, SortSpec};
use crate::models::Listing;
use std::cmp::Ordering;

/// Sort `listings` in place for the given criteria
pub fn rank(listings: &mut [Listing], criteria: &FilterCriteria) {
    // Comparing scored and unscored items pairwise is not transitive, so the
    // relevance tier only applies when every listing carries a score.
    let by_relevance =
        criteria.search_text().is_some() && listings.iter().all(|l| l.relevance.is_some());

    listings.sort_by(|a, b| {
        let relevance = if by_relevance {
            compare_relevance(a, b)
        } else {
            Ordering::Equal
        };
        relevance.then_with(|| compare_by_key(a, b, criteria.sort))
    });
}

/// Higher relevance first
fn compare_relevance(a: &Listing, b: &Listing) -> Ordering {
    match (a.relevance, b.relevance) {
        (Some(ra), Some(rb)) => rb.total_cmp(&ra),
        _ => Ordering::Equal,
    }
}

pub fn compare_by_key(a: &Listing, b: &Listing, spec: SortSpec) -> Ordering {
    let ordering = sort_value(a, spec.key).total_cmp(&sort_value(b, spec.key));
    match spec.direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

fn sort_value(listing: &Listing, key: SortKey) -> f64 {
    match key {
        SortKey::Rating => listing.rating,
        SortKey::Cost => listing.cost,
        SortKey::Duration => f64::from(listing.duration),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fallback;

    fn ids(listings: &[Listing]) -> Vec<&str> {
        listings.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn default_criteria_put_top_rated_first() {
        let mut listings = fallback::catalog();
        rank(&mut listings, &FilterCriteria::default());

        assert_eq!(listings[0].id, "mock-1");
        assert!(listings.windows(2).all(|w| w[0].rating >= w[1].rating));
    }

    #[test]
    fn cost_ascending_is_monotonic() {
        let criteria = FilterCriteria::default().with_sort("cost-asc".parse().unwrap());
        let mut listings = fallback::catalog();
        rank(&mut listings, &criteria);

        assert!(listings.windows(2).all(|w| w[0].cost <= w[1].cost));
    }

    #[test]
    fn ranking_twice_changes_nothing() {
        let criteria = FilterCriteria::default().with_sort("duration-desc".parse().unwrap());
        let mut listings = fallback::catalog();
        rank(&mut listings, &criteria);
        let first = ids(&listings).join(",");

        rank(&mut listings, &criteria);
        assert_eq!(ids(&listings).join(","), first);
    }

    #[test]
    fn ties_keep_their_input_order() {
        // Three of the samples last one day
        let criteria = FilterCriteria::default().with_sort("duration-asc".parse().unwrap());
        let mut listings = fallback::catalog();
        rank(&mut listings, &criteria);

        assert_eq!(ids(&listings)[..3], ["mock-3", "mock-4", "mock-5"]);
    }

    #[test]
    fn relevance_wins_while_searching() {
        let mut listings = fallback::catalog();
        for (listing, score) in listings.iter_mut().zip([0.1, 0.9, 0.5, 0.2, 0.3]) {
            listing.relevance = Some(score);
        }
        let criteria = FilterCriteria::default().with_search("tour");
        rank(&mut listings, &criteria);

        assert_eq!(ids(&listings)[..2], ["mock-2", "mock-3"]);
    }

    #[test]
    fn relevance_ignored_without_search_or_full_scores() {
        let mut listings = fallback::catalog();
        listings[2].relevance = Some(10.0);

        rank(&mut listings, &FilterCriteria::default().with_search("tour"));
        assert_eq!(listings[0].id, "mock-1");

        for listing in listings.iter_mut() {
            listing.relevance = Some(1.0);
        }
        listings[3].relevance = Some(9.0);
        rank(&mut listings, &FilterCriteria::default());
        assert_eq!(listings[0].id, "mock-1");
    }
}
