pub mod fallback;
pub mod memory;
pub mod remote;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryGateway;
pub use remote::RemoteGateway;
pub use traits::AdventureGateway;
pub use types::{ListingEvent, ListingQuery, Subscription};
