use crate::gateway::memory::MemoryGateway;
use crate::gateway::traits::AdventureGateway;
use crate::gateway::types::{ListingQuery, Subscription};
use crate::models::{Listing, ListingUpdate, NewListing, User, UserAdventure, UserListing};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Memory gateway whose queries and relationship writes can be made to fail
#[derive(Default)]
pub struct FlakyGateway {
    pub inner: MemoryGateway,
    pub queries_fail: AtomicBool,
    pub writes_fail: AtomicBool,
    pub write_calls: AtomicUsize,
}

impl FlakyGateway {
    pub fn new(inner: MemoryGateway) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Every query and write fails
    pub fn offline() -> Self {
        let gateway = Self::default();
        gateway.queries_fail.store(true, Ordering::SeqCst);
        gateway.writes_fail.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn fail_writes(&self, fail: bool) {
        self.writes_fail.store(fail, Ordering::SeqCst);
    }

    fn check_query(&self) -> Result<()> {
        if self.queries_fail.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.writes_fail.load(Ordering::SeqCst) {
            anyhow::bail!("write rejected");
        }
        Ok(())
    }
}

#[async_trait]
impl AdventureGateway for FlakyGateway {
    async fn query_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>> {
        self.check_query()?;
        self.inner.query_listings(query).await
    }

    async fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        self.check_query()?;
        self.inner.get_listing(id).await
    }

    async fn insert_listing(&self, listing: NewListing) -> Result<Listing> {
        self.check_write()?;
        self.inner.insert_listing(listing).await
    }

    async fn update_listing(&self, id: &str, update: ListingUpdate) -> Result<Listing> {
        self.check_write()?;
        self.inner.update_listing(id, update).await
    }

    async fn delete_listing(&self, id: &str) -> Result<()> {
        self.check_write()?;
        self.inner.delete_listing(id).await
    }

    async fn relationships(&self, user_id: &str) -> Result<Vec<UserAdventure>> {
        self.check_query()?;
        self.inner.relationships(user_id).await
    }

    async fn set_saved(&self, user_id: &str, listing_id: &str, saved: bool) -> Result<()> {
        self.check_write()?;
        self.inner.set_saved(user_id, listing_id, saved).await
    }

    async fn set_completed(&self, user_id: &str, listing_id: &str, completed: bool) -> Result<()> {
        self.check_write()?;
        self.inner.set_completed(user_id, listing_id, completed).await
    }

    async fn saved_listings(&self, user_id: &str) -> Result<Vec<UserListing>> {
        self.check_query()?;
        self.inner.saved_listings(user_id).await
    }

    async fn completed_listings(&self, user_id: &str) -> Result<Vec<UserListing>> {
        self.check_query()?;
        self.inner.completed_listings(user_id).await
    }

    async fn delete_relationships(&self, user_id: &str) -> Result<()> {
        self.check_write()?;
        self.inner.delete_relationships(user_id).await
    }

    async fn completed_count(&self) -> Result<usize> {
        self.check_query()?;
        self.inner.completed_count().await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.check_query()?;
        self.inner.list_users().await
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.check_write()?;
        self.inner.delete_user(user_id).await
    }

    async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<User> {
        self.check_write()?;
        self.inner.set_admin(user_id, is_admin).await
    }

    async fn subscribe(&self) -> Result<Subscription> {
        self.inner.subscribe().await
    }

    fn source_name(&self) -> &'static str {
        "flaky"
    }
}
