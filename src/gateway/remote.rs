use crate::config::Config;
use crate::gateway::traits::AdventureGateway;
use crate::gateway::types::{ListingEvent, ListingQuery, Subscription};
use crate::models::{Listing, ListingUpdate, NewListing, User, UserAdventure, UserListing};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const ADVENTURES: &str = "adventures";
const USER_ADVENTURES: &str = "user_adventures";
const USERS: &str = "users";

/// Relationship row with its listing embedded; the listing is null once deleted
#[derive(Deserialize)]
struct JoinedRow {
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    adventures: Option<Listing>,
}

/// REST gateway for the hosted backend (PostgREST dialect)
#[derive(Clone)]
pub struct RemoteGateway {
    client: Client,
    base_url: String,
    poll_interval: Duration,
}

impl RemoteGateway {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&config.api_key).context("Invalid API key header")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .context("Invalid authorization header")?,
        );

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", config.api_url.trim_end_matches('/')),
            poll_interval: config.poll_interval,
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    async fn send(request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {what}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Backend returned status {} while trying to {}", status, what);
            anyhow::bail!("Failed to {what}: {status} {body}");
        }

        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        Self::send(request, what)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to decode response to {what}"))
    }

    async fn upsert_relationship<T: Serialize + Sync>(&self, row: &T, what: &str) -> Result<()> {
        let request = self
            .client
            .post(self.table(USER_ADVENTURES))
            .query(&[("on_conflict", "user_id,adventure_id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&[row]);
        Self::send(request, what).await?;
        Ok(())
    }

    async fn joined_listings(
        &self,
        user_id: &str,
        flag: &str,
        what: &str,
    ) -> Result<Vec<UserListing>> {
        let request = self.client.get(self.table(USER_ADVENTURES)).query(&[
            ("select", "adventure_id,completed_at,adventures(*)".to_string()),
            ("user_id", format!("eq.{user_id}")),
            (flag, "eq.true".to_string()),
        ]);
        let rows: Vec<JoinedRow> = self.fetch(request, what).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(UserListing {
                    listing: row.adventures?,
                    completed_at: row.completed_at,
                })
            })
            .collect())
    }

    async fn listings_created_after(&self, after: DateTime<Utc>) -> Result<Vec<Listing>> {
        let request = self.client.get(self.table(ADVENTURES)).query(&[
            ("select", "*".to_string()),
            ("created_at", format!("gt.{}", after.to_rfc3339())),
            ("order", "created_at.asc".to_string()),
        ]);
        self.fetch(request, "poll new adventures").await
    }
}

#[async_trait]
impl AdventureGateway for RemoteGateway {
    async fn query_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>> {
        let request = self
            .client
            .get(self.table(ADVENTURES))
            .query(&query.to_query_pairs());

        debug!("Querying adventures: {:?}", query);
        let listings: Vec<Listing> = self.fetch(request, "fetch adventures").await?;
        debug!("Backend returned {} adventures", listings.len());
        Ok(listings)
    }

    async fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        let request = self
            .client
            .get(self.table(ADVENTURES))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]);
        let mut rows: Vec<Listing> = self.fetch(request, "fetch adventure").await?;
        Ok(rows.pop())
    }

    async fn insert_listing(&self, listing: NewListing) -> Result<Listing> {
        let request = self
            .client
            .post(self.table(ADVENTURES))
            .header("Prefer", "return=representation")
            .json(&[listing]);
        let mut rows: Vec<Listing> = self.fetch(request, "create adventure").await?;
        let created = rows.pop().context("Backend returned no created adventure")?;

        info!("Created adventure {} ({})", created.title, created.id);
        Ok(created)
    }

    async fn update_listing(&self, id: &str, update: ListingUpdate) -> Result<Listing> {
        let request = self
            .client
            .patch(self.table(ADVENTURES))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&update);
        let mut rows: Vec<Listing> = self.fetch(request, "update adventure").await?;
        rows.pop()
            .with_context(|| format!("Adventure {id} not found"))
    }

    async fn delete_listing(&self, id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.table(ADVENTURES))
            .query(&[("id", format!("eq.{id}"))]);
        Self::send(request, "delete adventure").await?;
        Ok(())
    }

    async fn relationships(&self, user_id: &str) -> Result<Vec<UserAdventure>> {
        let request = self.client.get(self.table(USER_ADVENTURES)).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{user_id}")),
        ]);
        self.fetch(request, "fetch user adventures").await
    }

    async fn set_saved(&self, user_id: &str, listing_id: &str, saved: bool) -> Result<()> {
        let row = json!({
            "user_id": user_id,
            "adventure_id": listing_id,
            "is_saved": saved,
        });
        self.upsert_relationship(&row, "update saved adventure").await
    }

    async fn set_completed(&self, user_id: &str, listing_id: &str, completed: bool) -> Result<()> {
        let row = json!({
            "user_id": user_id,
            "adventure_id": listing_id,
            "is_completed": completed,
            "completed_at": completed.then(Utc::now),
        });
        self.upsert_relationship(&row, "update completed adventure").await
    }

    async fn saved_listings(&self, user_id: &str) -> Result<Vec<UserListing>> {
        self.joined_listings(user_id, "is_saved", "fetch saved adventures").await
    }

    async fn completed_listings(&self, user_id: &str) -> Result<Vec<UserListing>> {
        let mut listings = self
            .joined_listings(user_id, "is_completed", "fetch completed adventures")
            .await?;
        listings.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(listings)
    }

    async fn delete_relationships(&self, user_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.table(USER_ADVENTURES))
            .query(&[("user_id", format!("eq.{user_id}"))]);
        Self::send(request, "delete user adventures").await?;
        Ok(())
    }

    async fn completed_count(&self) -> Result<usize> {
        let request = self.client.get(self.table(USER_ADVENTURES)).query(&[
            ("select", "adventure_id"),
            ("is_completed", "eq.true"),
        ]);
        let rows: Vec<serde_json::Value> =
            self.fetch(request, "count completed adventures").await?;
        Ok(rows.len())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let request = self
            .client
            .get(self.table(USERS))
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.fetch(request, "fetch users").await
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.table(USERS))
            .query(&[("id", format!("eq.{user_id}"))]);
        Self::send(request, "delete user").await?;
        Ok(())
    }

    async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<User> {
        let request = self
            .client
            .patch(self.table(USERS))
            .query(&[("id", format!("eq.{user_id}"))])
            .header("Prefer", "return=representation")
            .json(&json!({ "isAdmin": is_admin }));
        let mut rows: Vec<User> = self.fetch(request, "update user").await?;
        rows.pop().with_context(|| format!("User {user_id} not found"))
    }

    async fn subscribe(&self) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let gateway = self.clone();

        // Polls for rows newer than the last one seen
        let worker = tokio::spawn(async move {
            let mut since = Utc::now();
            let mut ticker = tokio::time::interval(gateway.poll_interval);

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                let fresh = match gateway.listings_created_after(since).await {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        warn!("Adventure feed poll failed: {:#}", e);
                        continue;
                    }
                };

                for listing in fresh {
                    if let Some(created_at) = listing.created_at {
                        since = since.max(created_at);
                    }
                    if tx.send(ListingEvent::Inserted(listing)).is_err() {
                        debug!("Adventure feed closed");
                        return;
                    }
                }
            }
        });

        info!(
            "Subscribed to new adventures (polling every {:?})",
            self.poll_interval
        );
        Ok(Subscription::with_worker(rx, worker))
    }

    fn source_name(&self) -> &'static str {
        "remote"
    }
}
