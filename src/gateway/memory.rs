use crate::gateway::traits::AdventureGateway;
use crate::gateway::types::{ListingEvent, ListingQuery, Subscription};
use crate::models::{Listing, ListingUpdate, NewListing, User, UserAdventure, UserListing};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Default)]
struct Tables {
    listings: Vec<Listing>,
    relationships: HashMap<(String, String), UserAdventure>,
    users: Vec<User>,
    subscribers: Vec<mpsc::UnboundedSender<ListingEvent>>,
}

/// In-process gateway. Seeded with the sample catalogue it serves offline mode.
#[derive(Default)]
pub struct MemoryGateway {
    tables: Mutex<Tables>,
    next_id: AtomicU64,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listings(listings: Vec<Listing>) -> Self {
        let gateway = Self::new();
        gateway.lock().listings = listings;
        gateway
    }

    pub fn with_users(self, users: Vec<User>) -> Self {
        self.lock().users = users;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Tables stay consistent after a panic in another holder
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn upsert_relationship(
        &self,
        user_id: &str,
        listing_id: &str,
        update: impl FnOnce(&mut UserAdventure),
    ) {
        let mut tables = self.lock();
        let record = tables
            .relationships
            .entry((user_id.to_string(), listing_id.to_string()))
            .or_insert_with(|| UserAdventure::new(user_id, listing_id));
        update(record);
    }

    /// Join the user's matching records with their listings, in catalogue order
    fn joined(&self, user_id: &str, keep: impl Fn(&UserAdventure) -> bool) -> Vec<UserListing> {
        let tables = self.lock();
        tables
            .listings
            .iter()
            .filter_map(|listing| {
                let record = tables
                    .relationships
                    .get(&(user_id.to_string(), listing.id.clone()))
                    .filter(|record| keep(record))?;
                Some(UserListing {
                    listing: listing.clone(),
                    completed_at: record.completed_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl AdventureGateway for MemoryGateway {
    async fn query_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>> {
        let tables = self.lock();
        let mut matches: Vec<Listing> = tables
            .listings
            .iter()
            .filter(|listing| query.matches(listing))
            .cloned()
            .collect();
        matches.sort_by(|a, b| query.compare(a, b));

        debug!("Memory query matched {} listings", matches.len());
        Ok(matches)
    }

    async fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        Ok(self.lock().listings.iter().find(|l| l.id == id).cloned())
    }

    async fn insert_listing(&self, listing: NewListing) -> Result<Listing> {
        let id = format!("local-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let listing = listing.into_listing(id, Utc::now());

        let mut tables = self.lock();
        tables.listings.push(listing.clone());
        let event = ListingEvent::Inserted(listing.clone());
        // Closed feeds fail the send and are pruned
        tables
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());

        Ok(listing)
    }

    async fn update_listing(&self, id: &str, update: ListingUpdate) -> Result<Listing> {
        let mut tables = self.lock();
        let listing = tables
            .listings
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| anyhow!("Listing {} not found", id))?;
        update.apply_to(listing);
        Ok(listing.clone())
    }

    async fn delete_listing(&self, id: &str) -> Result<()> {
        let mut tables = self.lock();
        let before = tables.listings.len();
        tables.listings.retain(|l| l.id != id);
        if tables.listings.len() == before {
            anyhow::bail!("Listing {} not found", id);
        }
        tables.relationships.retain(|(_, listing_id), _| listing_id != id);
        Ok(())
    }

    async fn relationships(&self, user_id: &str) -> Result<Vec<UserAdventure>> {
        Ok(self
            .lock()
            .relationships
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn set_saved(&self, user_id: &str, listing_id: &str, saved: bool) -> Result<()> {
        self.upsert_relationship(user_id, listing_id, |record| record.saved = saved);
        Ok(())
    }

    async fn set_completed(&self, user_id: &str, listing_id: &str, completed: bool) -> Result<()> {
        let now = Utc::now();
        self.upsert_relationship(user_id, listing_id, |record| {
            record.set_completed(completed, now)
        });
        Ok(())
    }

    async fn saved_listings(&self, user_id: &str) -> Result<Vec<UserListing>> {
        Ok(self.joined(user_id, |record| record.saved))
    }

    async fn completed_listings(&self, user_id: &str) -> Result<Vec<UserListing>> {
        let mut listings = self.joined(user_id, |record| record.completed);
        listings.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(listings)
    }

    async fn delete_relationships(&self, user_id: &str) -> Result<()> {
        self.lock()
            .relationships
            .retain(|(owner, _), _| owner != user_id);
        Ok(())
    }

    async fn completed_count(&self) -> Result<usize> {
        Ok(self
            .lock()
            .relationships
            .values()
            .filter(|r| r.completed)
            .count())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users = self.lock().users.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let mut tables = self.lock();
        let before = tables.users.len();
        tables.users.retain(|u| u.id != user_id);
        if tables.users.len() == before {
            anyhow::bail!("User {} not found", user_id);
        }
        Ok(())
    }

    async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<User> {
        let mut tables = self.lock();
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| anyhow!("User {} not found", user_id))?;
        user.is_admin = is_admin;
        Ok(user.clone())
    }

    async fn subscribe(&self) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        Ok(Subscription::new(rx))
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}
