use crate::gateway::types::{ListingQuery, Subscription};
use crate::models::{Listing, ListingUpdate, NewListing, User, UserAdventure, UserListing};
use anyhow::Result;
use async_trait::async_trait;

/// Common trait for every adventure data source.
/// The remote backend and the in-memory fallback both sit behind it.
#[async_trait]
pub trait AdventureGateway: Send + Sync {
    /// Listings matching the query, in its sort order
    async fn query_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>>;

    async fn get_listing(&self, id: &str) -> Result<Option<Listing>>;

    async fn insert_listing(&self, listing: NewListing) -> Result<Listing>;

    async fn update_listing(&self, id: &str, update: ListingUpdate) -> Result<Listing>;

    async fn delete_listing(&self, id: &str) -> Result<()>;

    /// All relationship records of one user
    async fn relationships(&self, user_id: &str) -> Result<Vec<UserAdventure>>;

    /// Upsert the saved flag of the (user, listing) record
    async fn set_saved(&self, user_id: &str, listing_id: &str, saved: bool) -> Result<()>;

    /// Upsert the completed flag; the completion timestamp follows the flag
    async fn set_completed(&self, user_id: &str, listing_id: &str, completed: bool) -> Result<()>;

    /// Listings the user saved, joined with their records
    async fn saved_listings(&self, user_id: &str) -> Result<Vec<UserListing>>;

    /// Listings the user completed, most recent completion first
    async fn completed_listings(&self, user_id: &str) -> Result<Vec<UserListing>>;

    /// Remove every relationship record of a user
    async fn delete_relationships(&self, user_id: &str) -> Result<()>;

    /// Number of relationship records flagged completed, across all users
    async fn completed_count(&self) -> Result<usize>;

    /// All users, newest first
    async fn list_users(&self) -> Result<Vec<User>>;

    async fn delete_user(&self, user_id: &str) -> Result<()>;

    /// Grant or revoke administrator access; returns the updated user
    async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<User>;

    /// Feed of listings created after the call
    async fn subscribe(&self) -> Result<Subscription>;

    /// Get the name of the data source
    fn source_name(&self) -> &'static str;
}
