//! Adventure discovery: browse, filter, save and complete curated adventure
//! listings served by a hosted backend, with a built-in sample catalogue when
//! the backend cannot be reached.

pub mod admin;
pub mod config;
pub mod debounce;
pub mod executor;
pub mod export;
pub mod filter;
pub mod gateway;
pub mod models;
pub mod notify;
pub mod optimistic;
pub mod rank;
pub mod session;

pub use admin::{AdminConsole, AdventureStats};
pub use config::Config;
pub use executor::{QueryExecutor, QueryOutcome, UserMarks};
pub use filter::{CategoryFilter, FilterCriteria, FilterState, SortDirection, SortKey, SortSpec};
pub use gateway::{AdventureGateway, ListingEvent, ListingQuery, MemoryGateway, RemoteGateway};
pub use models::{Category, Listing, User, UserAdventure, UserListing};
pub use notify::{Notice, NoticeLevel, Notifier};
pub use optimistic::{OptimisticFlags, ToggleOutcome};
pub use session::{ActionError, Session};
