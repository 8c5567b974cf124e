use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of adventure. The set is open: unknown values round-trip as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Outdoors,
    Cultural,
    Food,
    Entertainment,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Outdoors => "outdoors",
            Category::Cultural => "cultural",
            Category::Food => "food",
            Category::Entertainment => "entertainment",
            Category::Other(name) => name,
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.as_str() {
            "outdoors" => Category::Outdoors,
            "cultural" => Category::Cultural,
            "food" => Category::Food,
            "entertainment" => Category::Entertainment,
            _ => Category::Other(value),
        }
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core adventure listing, as stored in the `adventures` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "imageUrl", default)]
    pub image_url: String,
    /// Length in days
    pub duration: u32,
    pub cost: f64,
    #[serde(rename = "type")]
    pub category: Category,
    pub rating: f64,
    #[serde(rename = "location_name", default)]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Only present when a search query produced it
    #[serde(rename = "relevanceScore", default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
    #[serde(default)]
    pub saved_by_user: bool,
    #[serde(default)]
    pub completed_by_user: bool,
}

impl Listing {
    pub fn location_name(&self) -> &str {
        self.location.as_deref().unwrap_or("")
    }
}

/// Insert payload for a new listing; the backend assigns id and timestamps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub duration: u32,
    pub cost: f64,
    #[serde(rename = "type")]
    pub category: Category,
    pub rating: f64,
    #[serde(rename = "location_name")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl NewListing {
    pub fn into_listing(self, id: String, created_at: DateTime<Utc>) -> Listing {
        Listing {
            id,
            title: self.title,
            description: self.description,
            image_url: self.image_url,
            duration: self.duration,
            cost: self.cost,
            category: self.category,
            rating: self.rating,
            location: self.location,
            lat: self.lat,
            lng: self.lng,
            created_at: Some(created_at),
            relevance: None,
            saved_by_user: false,
            completed_by_user: false,
        }
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(rename = "location_name", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ListingUpdate {
    pub fn apply_to(self, listing: &mut Listing) {
        if let Some(title) = self.title {
            listing.title = title;
        }
        if let Some(description) = self.description {
            listing.description = description;
        }
        if let Some(image_url) = self.image_url {
            listing.image_url = image_url;
        }
        if let Some(duration) = self.duration {
            listing.duration = duration;
        }
        if let Some(cost) = self.cost {
            listing.cost = cost;
        }
        if let Some(category) = self.category {
            listing.category = category;
        }
        if let Some(rating) = self.rating {
            listing.rating = rating;
        }
        if let Some(location) = self.location {
            listing.location = Some(location);
        }
    }
}

/// Per-user annotation on a listing, one row per (user, listing) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAdventure {
    pub user_id: String,
    #[serde(rename = "adventure_id")]
    pub listing_id: String,
    #[serde(rename = "is_saved", default)]
    pub saved: bool,
    #[serde(rename = "is_completed", default)]
    pub completed: bool,
    /// Set iff `completed`
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl UserAdventure {
    pub fn new(user_id: &str, listing_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            listing_id: listing_id.to_string(),
            saved: false,
            completed: false,
            completed_at: None,
        }
    }

    pub fn set_completed(&mut self, completed: bool, at: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = completed.then_some(at);
    }
}

/// A listing from a user's saved or completed collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserListing {
    #[serde(rename = "adventures")]
    pub listing: Listing,
    /// Only set for completed listings
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Account row from the `users` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
}

/// Parse error for the string forms of the filter enums
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseError {
                kind: "category",
                value: s.to_string(),
            });
        }
        Ok(Category::from(trimmed.to_lowercase()))
    }
}
