//! The browsing session: identity, criteria, the listing collection and the
//! user's saved/completed flags, owned in one place.
//!
//! All changes go through `Session` methods. Subscription events are
//! delivered as values and merged here, never applied by the feed itself.

use crate::executor::{QueryExecutor, UserMarks};
use crate::export::{self, HISTORY_FILE_NAME};
use crate::filter::{FilterCriteria, FilterState};
use crate::gateway::{AdventureGateway, ListingEvent, Subscription};
use crate::models::{Listing, UserListing};
use crate::notify::{Notice, Notifier};
use crate::optimistic::{OptimisticFlags, ToggleOutcome};
use crate::rank::rank;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use thiserror::Error;
use tracing::{debug, info};

/// Why a user action was refused
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Sign in required")]
    SignInRequired,

    #[error("No completed adventures to export")]
    NothingToExport,

    #[error("Administrator access required")]
    NotAdmin,

    #[error("Failed to write export: {0}")]
    Export(#[from] std::io::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy)]
enum Mark {
    Saved,
    Completed,
}

pub struct Session {
    gateway: Arc<dyn AdventureGateway>,
    executor: QueryExecutor,
    filters: FilterState,
    user: RwLock<Option<String>>,
    listings: Mutex<Vec<Listing>>,
    saved: OptimisticFlags,
    completed: OptimisticFlags,
    degraded: AtomicBool,
    notifier: Notifier,
}

impl Session {
    /// `gateway` is the backend; `fallback` serves queries while it is unreachable
    pub fn new(
        gateway: Arc<dyn AdventureGateway>,
        fallback: Arc<dyn AdventureGateway>,
        notifier: Notifier,
    ) -> Self {
        Self {
            executor: QueryExecutor::new(gateway.clone(), fallback),
            gateway,
            filters: FilterState::default(),
            user: RwLock::new(None),
            listings: Mutex::new(Vec::new()),
            saved: OptimisticFlags::new(),
            completed: OptimisticFlags::new(),
            degraded: AtomicBool::new(false),
            notifier,
        }
    }

    fn collection(&self) -> MutexGuard<'_, Vec<Listing>> {
        self.listings.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn user(&self) -> Option<String> {
        self.user
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Act as `user_id` from now on. Flags start empty until `load_marks`.
    pub fn sign_in(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        info!("Signed in as {}", user_id);
        *self.user.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(user_id);
        self.saved.clear();
        self.completed.clear();
    }

    pub fn sign_out(&self) {
        info!("Signed out");
        *self.user.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        self.saved.clear();
        self.completed.clear();
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.filters.current()
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn marks(&self) -> UserMarks {
        UserMarks {
            saved: self.saved.ids(),
            completed: self.completed.ids(),
        }
    }

    /// Current collection, annotated with the live flag values
    pub fn listings(&self) -> Vec<Listing> {
        let marks = self.marks();
        let mut listings = self.collection().clone();
        for listing in listings.iter_mut() {
            marks.annotate(listing);
        }
        listings
    }

    /// Replace the criteria and re-query
    pub async fn set_criteria(&self, criteria: FilterCriteria) -> Vec<Listing> {
        self.filters.set_criteria(criteria);
        self.refresh().await
    }

    /// Re-query with only the search text changed
    pub async fn apply_search(&self, text: impl Into<String>) -> Vec<Listing> {
        let criteria = self.criteria().with_search(text);
        self.set_criteria(criteria).await
    }

    /// Run the current criteria and replace the collection with the result
    pub async fn refresh(&self) -> Vec<Listing> {
        let criteria = self.criteria();
        let outcome = self.executor.execute(&criteria, &self.marks()).await;

        let was_degraded = self.degraded.swap(outcome.degraded, Ordering::SeqCst);
        if outcome.degraded && !was_degraded {
            self.notifier.notify(
                Notice::info("Using offline mode").with_description(
                    "Couldn't connect to database. Showing sample adventures instead.",
                ),
            );
        }

        *self.collection() = outcome.listings;
        self.listings()
    }

    /// Seed the saved/completed flags from the user's relationship records
    pub async fn load_marks(&self) -> Result<UserMarks, ActionError> {
        let user_id = self.user().ok_or(ActionError::SignInRequired)?;

        let records = match self.gateway.relationships(&user_id).await {
            Ok(records) => records,
            Err(e) => {
                self.notifier
                    .notify(Notice::error("Failed to load your adventures"));
                return Err(e.into());
            }
        };

        self.saved.reset(
            records
                .iter()
                .filter(|r| r.saved)
                .map(|r| r.listing_id.clone()),
        );
        self.completed.reset(
            records
                .iter()
                .filter(|r| r.completed)
                .map(|r| r.listing_id.clone()),
        );

        let marks = self.marks();
        debug!(
            "Loaded {} saved and {} completed adventures",
            marks.saved.len(),
            marks.completed.len()
        );
        Ok(marks)
    }

    /// The signed-in user's saved listings, for the profile view
    pub async fn saved_adventures(&self) -> Result<Vec<UserListing>, ActionError> {
        let user_id = self.user().ok_or(ActionError::SignInRequired)?;
        self.profile_result(self.gateway.saved_listings(&user_id).await)
    }

    /// The signed-in user's completed listings, newest completion first
    pub async fn completed_adventures(&self) -> Result<Vec<UserListing>, ActionError> {
        let user_id = self.user().ok_or(ActionError::SignInRequired)?;
        self.profile_result(self.gateway.completed_listings(&user_id).await)
    }

    fn profile_result(
        &self,
        result: anyhow::Result<Vec<UserListing>>,
    ) -> Result<Vec<UserListing>, ActionError> {
        result.map_err(|e| {
            self.notifier
                .notify(Notice::error("Failed to load your adventures"));
            e.into()
        })
    }

    /// Unsave from the profile view. Unlike a toggle the target is always false.
    pub async fn remove_saved(&self, listing_id: &str) -> Result<(), ActionError> {
        let user_id = self.user().ok_or(ActionError::SignInRequired)?;

        if let Err(e) = self.gateway.set_saved(&user_id, listing_id, false).await {
            self.notifier.notify(Notice::error("Failed to remove adventure"));
            return Err(e.into());
        }

        self.saved.set_confirmed(listing_id, false);
        self.notifier
            .notify(Notice::success("Adventure removed from favorites"));
        Ok(())
    }

    pub async fn toggle_saved(&self, listing_id: &str) -> Result<ToggleOutcome, ActionError> {
        self.toggle(Mark::Saved, listing_id).await
    }

    pub async fn toggle_completed(&self, listing_id: &str) -> Result<ToggleOutcome, ActionError> {
        self.toggle(Mark::Completed, listing_id).await
    }

    async fn toggle(&self, mark: Mark, listing_id: &str) -> Result<ToggleOutcome, ActionError> {
        let Some(user_id) = self.user() else {
            let description = match mark {
                Mark::Saved => "Sign in to save this adventure to your favorites",
                Mark::Completed => "Sign in to mark this adventure as completed",
            };
            self.notifier
                .notify(Notice::info("Please sign in").with_description(description));
            return Err(ActionError::SignInRequired);
        };

        let gateway = &self.gateway;
        let user_id = user_id.as_str();
        let outcome = match mark {
            Mark::Saved => {
                self.saved
                    .toggle(
                        listing_id,
                        || gateway.set_saved(user_id, listing_id, true),
                        || gateway.set_saved(user_id, listing_id, false),
                    )
                    .await
            }
            Mark::Completed => {
                self.completed
                    .toggle(
                        listing_id,
                        || gateway.set_completed(user_id, listing_id, true),
                        || gateway.set_completed(user_id, listing_id, false),
                    )
                    .await
            }
        };

        self.notify_toggle(mark, listing_id, &outcome);
        Ok(outcome)
    }

    fn notify_toggle(&self, mark: Mark, listing_id: &str, outcome: &ToggleOutcome) {
        let title = self
            .collection()
            .iter()
            .find(|l| l.id == listing_id)
            .map(|l| l.title.clone())
            .unwrap_or_else(|| listing_id.to_string());

        let notice = match (mark, outcome) {
            (Mark::Saved, ToggleOutcome::Confirmed(true)) => Notice::success("Added to favorites")
                .with_description("Adventure added to your favorites"),
            (Mark::Saved, ToggleOutcome::Confirmed(false)) => {
                Notice::success("Removed from favorites")
                    .with_description("Adventure removed from your favorites")
            }
            (Mark::Completed, ToggleOutcome::Confirmed(true)) => {
                Notice::success("Adventure Completed!")
                    .with_description(format!("You've marked \"{title}\" as completed."))
            }
            (Mark::Completed, ToggleOutcome::Confirmed(false)) => {
                Notice::success("Adventure unmarked")
                    .with_description(format!("You've unmarked \"{title}\" as completed."))
            }
            (_, outcome) if !outcome.failed() => return,
            (Mark::Saved, _) => Notice::error("Failed to update favorites"),
            (Mark::Completed, _) => Notice::error("Failed to update completion status"),
        };
        self.notifier.notify(notice);
    }

    /// Merge one feed event. Returns false for listings already present.
    pub fn apply_event(&self, event: ListingEvent) -> bool {
        let ListingEvent::Inserted(mut listing) = event;

        {
            let mut listings = self.collection();
            if listings.iter().any(|l| l.id == listing.id) {
                debug!("Ignoring duplicate adventure {}", listing.id);
                return false;
            }

            listing.saved_by_user = false;
            listing.completed_by_user = false;
            listings.push(listing.clone());
            rank(&mut listings, &self.filters.current());
        }

        self.notifier.notify(
            Notice::success("New adventure added!")
                .with_description(format!("\"{}\" is now available to explore.", listing.title)),
        );
        true
    }

    /// Apply events until the subscription ends
    pub async fn follow(&self, mut subscription: Subscription) {
        while let Some(event) = subscription.recv().await {
            self.apply_event(event);
        }
        debug!("Adventure feed ended");
    }

    /// Write the completed listings of the current collection to
    /// `adventure-history.csv` in `dir`
    pub fn export_history(&self, dir: &Path) -> Result<PathBuf, ActionError> {
        let completed = self.completed.ids();
        let listings = self.collection().clone();
        let csv = export::history_csv(listings.iter().filter(|l| completed.contains(&l.id)));

        let Some(csv) = csv else {
            self.notifier.notify(
                Notice::info("No completed adventures")
                    .with_description("Complete some adventures to export your history."),
            );
            return Err(ActionError::NothingToExport);
        };

        let path = dir.join(HISTORY_FILE_NAME);
        std::fs::write(&path, csv)?;

        info!("💾 Exported adventure history to {}", path.display());
        self.notifier.notify(
            Notice::success("History Exported")
                .with_description("Your adventure history has been downloaded as a CSV file."),
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::FlakyGateway;
    use crate::gateway::{fallback, MemoryGateway};
    use crate::models::{Category, NewListing};
    use crate::notify::{self, NoticeLevel};
    use std::sync::atomic::Ordering as AtomicOrdering;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn session_with(gateway: Arc<FlakyGateway>) -> (Session, UnboundedReceiver<Notice>) {
        let (notifier, rx) = notify::channel();
        let session = Session::new(gateway, Arc::new(fallback::gateway()), notifier);
        (session, rx)
    }

    fn online() -> Arc<FlakyGateway> {
        Arc::new(FlakyGateway::new(fallback::gateway()))
    }

    fn drain(rx: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    fn new_listing(title: &str) -> NewListing {
        NewListing {
            title: title.to_string(),
            description: "Sunrise flight over the valley".to_string(),
            image_url: String::new(),
            duration: 1,
            cost: 9_000.0,
            category: Category::Outdoors,
            rating: 4.9,
            location: Some("Cappadocia".into()),
            lat: None,
            lng: None,
        }
    }

    #[tokio::test]
    async fn saving_succeeds_end_to_end() {
        let gateway = online();
        let (session, mut rx) = session_with(gateway.clone());
        session.sign_in("u1");
        session.refresh().await;

        let outcome = session.toggle_saved("mock-2").await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Confirmed(true));
        let listing = session
            .listings()
            .into_iter()
            .find(|l| l.id == "mock-2")
            .unwrap();
        assert!(listing.saved_by_user);
        let records = gateway.inner.relationships("u1").await.unwrap();
        assert!(records[0].saved);
        assert_eq!(drain(&mut rx)[0].title, "Added to favorites");
    }

    #[tokio::test]
    async fn failed_save_reverts_and_reports_once() {
        let gateway = online();
        gateway.fail_writes(true);
        let (session, mut rx) = session_with(gateway);
        session.sign_in("u1");
        session.refresh().await;
        drain(&mut rx);

        let outcome = session.toggle_saved("mock-2").await.unwrap();

        assert!(matches!(outcome, ToggleOutcome::Reverted { restored: false, .. }));
        assert!(!session.marks().saved.contains("mock-2"));
        let errors: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, "Failed to update favorites");
    }

    #[tokio::test]
    async fn profile_lists_saved_and_completed_adventures() {
        let gateway = online();
        let (session, _rx) = session_with(gateway.clone());
        session.sign_in("u1");
        session.toggle_saved("mock-3").await.unwrap();
        session.toggle_completed("mock-4").await.unwrap();

        let saved = session.saved_adventures().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].listing.title, "Delhi Food Tour");

        let completed = session.completed_adventures().await.unwrap();
        assert_eq!(completed[0].listing.id, "mock-4");
        assert!(completed[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn profile_load_failure_is_reported() {
        let (session, mut rx) = session_with(Arc::new(FlakyGateway::offline()));
        session.sign_in("u1");

        assert!(session.completed_adventures().await.is_err());
        assert_eq!(drain(&mut rx)[0].title, "Failed to load your adventures");
    }

    #[tokio::test]
    async fn removing_a_saved_adventure_clears_the_flag() {
        let gateway = online();
        let (session, mut rx) = session_with(gateway.clone());
        session.sign_in("u1");
        session.toggle_saved("mock-1").await.unwrap();
        drain(&mut rx);

        session.remove_saved("mock-1").await.unwrap();

        assert!(!session.marks().saved.contains("mock-1"));
        assert!(session.saved_adventures().await.unwrap().is_empty());
        assert_eq!(drain(&mut rx)[0].title, "Adventure removed from favorites");
    }

    #[tokio::test]
    async fn failed_removal_keeps_the_adventure_saved() {
        let gateway = online();
        let (session, mut rx) = session_with(gateway.clone());
        session.sign_in("u1");
        session.toggle_saved("mock-1").await.unwrap();
        gateway.fail_writes(true);
        drain(&mut rx);

        assert!(session.remove_saved("mock-1").await.is_err());

        assert!(session.marks().saved.contains("mock-1"));
        assert_eq!(drain(&mut rx)[0].title, "Failed to remove adventure");
    }

    #[tokio::test]
    async fn signing_out_forgets_identity_and_flags() {
        let (session, _rx) = session_with(online());
        session.sign_in("u1");
        session.toggle_saved("mock-1").await.unwrap();

        session.sign_out();

        assert_eq!(session.user(), None);
        assert!(session.marks().saved.is_empty());
        assert!(matches!(
            session.saved_adventures().await,
            Err(ActionError::SignInRequired)
        ));
    }

    #[tokio::test]
    async fn anonymous_toggles_never_reach_the_backend() {
        let gateway = online();
        let (session, mut rx) = session_with(gateway.clone());

        let result = session.toggle_completed("mock-1").await;

        assert!(matches!(result, Err(ActionError::SignInRequired)));
        assert_eq!(gateway.write_calls.load(AtomicOrdering::SeqCst), 0);
        assert!(session.marks().completed.is_empty());
        assert_eq!(drain(&mut rx)[0].title, "Please sign in");
    }

    #[tokio::test]
    async fn offline_backend_switches_to_samples_with_notice() {
        let (session, mut rx) = session_with(Arc::new(FlakyGateway::offline()));

        let listings = session.set_criteria(FilterCriteria::relaxed()).await;

        assert!(session.is_degraded());
        assert_eq!(listings.len(), fallback::catalog().len());
        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Info);

        // Staying offline does not repeat the notice
        session.refresh().await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn search_narrows_the_collection() {
        let (session, _rx) = session_with(online());
        session.set_criteria(FilterCriteria::relaxed()).await;

        let listings = session.apply_search("delhi").await;

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id, "mock-3");
        assert_eq!(session.criteria().search, "delhi");
    }

    #[tokio::test]
    async fn duplicate_events_leave_collection_unchanged() {
        let (session, mut rx) = session_with(online());
        session.set_criteria(FilterCriteria::relaxed()).await;
        let before = session.listings().len();

        let existing = session.listings()[0].clone();
        assert!(!session.apply_event(ListingEvent::Inserted(existing)));
        assert_eq!(session.listings().len(), before);

        let fresh = new_listing("Balloon Ride").into_listing("new-1".into(), chrono::Utc::now());
        assert!(session.apply_event(ListingEvent::Inserted(fresh)));
        let listings = session.listings();
        assert_eq!(listings.len(), before + 1);
        // Rated 4.9, so it ranks first under the default rating sort
        assert_eq!(listings[0].id, "new-1");
        assert!(drain(&mut rx)
            .iter()
            .any(|n| n.title == "New adventure added!"));
    }

    #[tokio::test]
    async fn follow_merges_feed_until_it_closes() {
        let (session, _rx) = session_with(online());
        session.set_criteria(FilterCriteria::relaxed()).await;
        let before = session.listings().len();

        let feed = MemoryGateway::new();
        let subscription = feed.subscribe().await.unwrap();
        feed.insert_listing(new_listing("Balloon Ride")).await.unwrap();
        feed.insert_listing(new_listing("Cave Dive")).await.unwrap();
        // Dropping the store drops its senders, ending the feed after the buffered events
        drop(feed);

        session.follow(subscription).await;
        assert_eq!(session.listings().len(), before + 2);
    }

    #[tokio::test]
    async fn load_marks_seeds_flags_from_backend() {
        let gateway = online();
        gateway.inner.set_saved("u1", "mock-1", true).await.unwrap();
        gateway.inner.set_completed("u1", "mock-3", true).await.unwrap();
        let (session, _rx) = session_with(gateway);
        session.sign_in("u1");

        let marks = session.load_marks().await.unwrap();
        session.set_criteria(FilterCriteria::relaxed()).await;

        assert!(marks.saved.contains("mock-1"));
        let completed: Vec<_> = session
            .listings()
            .into_iter()
            .filter(|l| l.completed_by_user)
            .map(|l| l.id)
            .collect();
        assert_eq!(completed, ["mock-3"]);
    }

    #[tokio::test]
    async fn export_without_completions_writes_nothing() {
        let dir = std::env::temp_dir().join("adventure-scout-empty-export");
        std::fs::create_dir_all(&dir).unwrap();
        let _ = std::fs::remove_file(dir.join(HISTORY_FILE_NAME));

        let (session, mut rx) = session_with(online());
        session.sign_in("u1");
        session.refresh().await;

        let result = session.export_history(&dir);

        assert!(matches!(result, Err(ActionError::NothingToExport)));
        assert!(!dir.join(HISTORY_FILE_NAME).exists());
        let notices = drain(&mut rx);
        assert_eq!(notices.last().unwrap().title, "No completed adventures");
    }

    #[tokio::test]
    async fn export_writes_completed_history() {
        let dir = std::env::temp_dir().join("adventure-scout-export");
        std::fs::create_dir_all(&dir).unwrap();

        let (session, _rx) = session_with(online());
        session.sign_in("u1");
        session.set_criteria(FilterCriteria::relaxed()).await;
        session.toggle_completed("mock-3").await.unwrap();

        let path = session.export_history(&dir).unwrap();
        let csv = std::fs::read_to_string(&path).unwrap();

        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("\"Delhi Food Tour\",\"food\",1,2500,4.7"));
    }
}
