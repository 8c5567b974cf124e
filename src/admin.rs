use crate::export;
use crate::gateway::{AdventureGateway, ListingQuery};
use crate::models::{Category, Listing, ListingUpdate, NewListing, User};
use crate::notify::{Notice, Notifier};
use crate::session::ActionError;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Catalogue summary for the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdventureStats {
    pub total: usize,
    /// 0 for an empty catalogue
    pub average_rating: f64,
    pub by_category: BTreeMap<String, usize>,
}

impl AdventureStats {
    pub fn from_listings(listings: &[Listing]) -> Self {
        let total = listings.len();
        let rating_sum: f64 = listings.iter().map(|l| l.rating).sum();

        let mut by_category = BTreeMap::new();
        for listing in listings {
            *by_category
                .entry(listing.category.to_string())
                .or_insert(0) += 1;
        }

        Self {
            total,
            average_rating: rating_sum / total.max(1) as f64,
            by_category,
        }
    }
}

/// User and content management, available to administrators only
pub struct AdminConsole {
    gateway: Arc<dyn AdventureGateway>,
    notifier: Option<Notifier>,
}

impl AdminConsole {
    /// Refuses anyone without the admin flag
    pub fn for_user(gateway: Arc<dyn AdventureGateway>, user: &User) -> Result<Self, ActionError> {
        if !user.is_admin {
            return Err(ActionError::NotAdmin);
        }
        info!("Admin console opened by {}", user.email);
        Ok(Self {
            gateway,
            notifier: None,
        })
    }

    /// Report role changes as notices as well as logs
    pub fn with_notifier(self, notifier: Notifier) -> Self {
        Self {
            notifier: Some(notifier),
            ..self
        }
    }

    fn notify(&self, notice: Notice) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(notice);
        }
    }

    pub async fn users(&self) -> Result<Vec<User>> {
        self.gateway.list_users().await.context("Failed to load users")
    }

    /// Relationship records go first so no orphaned rows remain
    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.gateway
            .delete_relationships(user_id)
            .await
            .with_context(|| format!("Failed to delete adventures of user {user_id}"))?;
        self.gateway
            .delete_user(user_id)
            .await
            .with_context(|| format!("Failed to delete user {user_id}"))?;

        info!("Deleted user {}", user_id);
        Ok(())
    }

    /// Promote to or demote from administrator
    pub async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<User> {
        match self.gateway.set_admin(user_id, is_admin).await {
            Ok(user) => {
                let change = if is_admin {
                    "promoted to admin"
                } else {
                    "demoted from admin"
                };
                info!("User {} {}", user_id, change);
                self.notify(Notice::success(format!("User {change}")));
                Ok(user)
            }
            Err(e) => {
                warn!("Failed to update user {}: {:#}", user_id, e);
                self.notify(
                    Notice::error("Failed to update user").with_description(e.to_string()),
                );
                Err(e.context(format!("Failed to update user {user_id}")))
            }
        }
    }

    pub async fn analytics(&self) -> Result<AdventureStats> {
        let listings = self.catalog().await?;
        Ok(AdventureStats::from_listings(&listings))
    }

    pub async fn completed_count(&self) -> Result<usize> {
        self.gateway
            .completed_count()
            .await
            .context("Failed to count completed adventures")
    }

    /// Distinct categories in use, sorted
    pub async fn categories(&self) -> Result<Vec<Category>> {
        let listings = self.catalog().await?;
        let categories: BTreeSet<Category> = listings.into_iter().map(|l| l.category).collect();
        Ok(categories.into_iter().collect())
    }

    pub async fn create_listing(&self, listing: NewListing) -> Result<Listing> {
        self.gateway.insert_listing(listing).await
    }

    pub async fn update_listing(&self, id: &str, update: ListingUpdate) -> Result<Listing> {
        self.gateway.update_listing(id, update).await
    }

    pub async fn delete_listing(&self, id: &str) -> Result<()> {
        self.gateway.delete_listing(id).await
    }

    /// Whole catalogue as CSV
    pub async fn catalog_csv(&self) -> Result<String> {
        let listings = self.catalog().await?;
        Ok(export::catalog_csv(&listings))
    }

    async fn catalog(&self) -> Result<Vec<Listing>> {
        self.gateway
            .query_listings(&ListingQuery::all())
            .await
            .context("Failed to load adventures")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::FlakyGateway;
    use crate::gateway::{fallback, MemoryGateway};
    use crate::notify::{self, NoticeLevel};

    fn user(id: &str, is_admin: bool) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            name: None,
            avatar_url: None,
            created_at: None,
            is_admin,
        }
    }

    fn console(gateway: Arc<dyn AdventureGateway>) -> AdminConsole {
        AdminConsole::for_user(gateway, &user("admin-1", true)).unwrap()
    }

    #[test]
    fn regular_users_are_refused() {
        let result = AdminConsole::for_user(Arc::new(MemoryGateway::new()), &user("user-1", false));
        assert!(matches!(result, Err(ActionError::NotAdmin)));
    }

    #[tokio::test]
    async fn deleting_a_user_removes_their_adventures() {
        let gateway = Arc::new(
            fallback::gateway().with_users(vec![user("user-1", false), user("admin-1", true)]),
        );
        gateway.set_saved("user-1", "mock-1", true).await.unwrap();
        gateway.set_completed("user-1", "mock-2", true).await.unwrap();
        gateway.set_saved("admin-1", "mock-1", true).await.unwrap();

        let admin = console(gateway.clone());
        admin.delete_user("user-1").await.unwrap();

        assert!(gateway.relationships("user-1").await.unwrap().is_empty());
        assert_eq!(gateway.relationships("admin-1").await.unwrap().len(), 1);
        let remaining: Vec<_> = admin.users().await.unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(remaining, ["admin-1"]);
    }

    #[tokio::test]
    async fn failed_relationship_cleanup_keeps_the_user() {
        let gateway = Arc::new(FlakyGateway::new(
            MemoryGateway::new().with_users(vec![user("user-1", false)]),
        ));
        gateway.fail_writes(true);

        let admin = console(gateway.clone());
        assert!(admin.delete_user("user-1").await.is_err());
        assert_eq!(gateway.inner.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn promotion_and_demotion_are_reported() {
        let gateway = Arc::new(MemoryGateway::new().with_users(vec![user("user-1", false)]));
        let (notifier, mut notices) = notify::channel();
        let admin = console(gateway.clone()).with_notifier(notifier);

        assert!(admin.set_admin("user-1", true).await.unwrap().is_admin);
        assert_eq!(notices.try_recv().unwrap().title, "User promoted to admin");

        assert!(!admin.set_admin("user-1", false).await.unwrap().is_admin);
        assert_eq!(notices.try_recv().unwrap().title, "User demoted from admin");
        assert!(!gateway.list_users().await.unwrap()[0].is_admin);
    }

    #[tokio::test]
    async fn failed_role_change_is_reported() {
        let gateway = Arc::new(FlakyGateway::new(
            MemoryGateway::new().with_users(vec![user("user-1", false)]),
        ));
        gateway.fail_writes(true);
        let (notifier, mut notices) = notify::channel();
        let admin = console(gateway.clone()).with_notifier(notifier);

        assert!(admin.set_admin("user-1", true).await.is_err());
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.title, "Failed to update user");
        assert!(!gateway.inner.list_users().await.unwrap()[0].is_admin);
    }

    #[tokio::test]
    async fn analytics_summarise_the_catalogue() {
        let admin = console(Arc::new(fallback::gateway()));
        let stats = admin.analytics().await.unwrap();

        assert_eq!(stats.total, 5);
        assert!((stats.average_rating - 4.58).abs() < 1e-9);
        assert_eq!(stats.by_category.get("outdoors"), Some(&2));
        assert_eq!(stats.by_category.get("food"), Some(&1));

        let categories = admin.categories().await.unwrap();
        assert_eq!(categories.len(), 4);
    }

    #[test]
    fn empty_catalogue_has_zero_average() {
        let stats = AdventureStats::from_listings(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_rating, 0.0);
    }

    #[tokio::test]
    async fn content_management_round_trip() {
        let gateway = Arc::new(MemoryGateway::new());
        let admin = console(gateway.clone());

        let created = admin
            .create_listing(NewListing {
                title: "Old Town Ghost Walk".into(),
                description: "Stories after dark".into(),
                image_url: String::new(),
                duration: 1,
                cost: 700.0,
                category: Category::Entertainment,
                rating: 4.1,
                location: Some("Kolkata".into()),
                lat: None,
                lng: None,
            })
            .await
            .unwrap();
        let updated = admin
            .update_listing(
                &created.id,
                ListingUpdate {
                    rating: Some(4.4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.rating, 4.4);
        assert_eq!(admin.completed_count().await.unwrap(), 0);

        admin.delete_listing(&created.id).await.unwrap();
        assert_eq!(admin.catalog_csv().await.unwrap(), export::EMPTY_CATALOG_PLACEHOLDER);
    }
}
