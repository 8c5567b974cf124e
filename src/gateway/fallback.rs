use crate::gateway::memory::MemoryGateway;
use crate::models::{Category, Listing};
use tracing::info;

/// Gateway over the built-in sample catalogue, used when the backend is unreachable
pub fn gateway() -> MemoryGateway {
    MemoryGateway::with_listings(catalog())
}

/// Fixed sample adventures shown in offline mode
pub fn catalog() -> Vec<Listing> {
    info!("📋 Loading built-in sample adventures");

    vec![
        sample(
            "mock-1",
            "Himalayan Trek Adventure",
            "Experience the breathtaking beauty of the Himalayan mountains on this guided trek through scenic valleys and mountain passes.",
            "https://images.unsplash.com/photo-1464822759023-fed622ff2c3b?auto=format&fit=crop&w=500&q=80",
            3,
            15_000.0,
            Category::Outdoors,
            4.8,
            "Himachal Pradesh",
        ),
        sample(
            "mock-2",
            "Goa Beach Relaxation",
            "Unwind on the pristine beaches of Goa with this perfect weekend getaway. Includes seaside accommodation and sunset cruise.",
            "https://images.unsplash.com/photo-1507525428034-b723cf961d3e?auto=format&fit=crop&w=500&q=80",
            2,
            8_000.0,
            Category::Outdoors,
            4.5,
            "Goa",
        ),
        sample(
            "mock-3",
            "Delhi Food Tour",
            "Taste your way through Delhi's vibrant culinary scene with expert food guides. Visit hidden gems and famous eateries.",
            "https://images.unsplash.com/photo-1504674900247-0877df9cc836?auto=format&fit=crop&w=500&q=80",
            1,
            2_500.0,
            Category::Food,
            4.7,
            "Delhi",
        ),
        sample(
            "mock-4",
            "Jaipur Heritage Walk",
            "Wander the pink city's forts and bazaars with a local historian, ending with a rooftop view of Hawa Mahal.",
            "https://images.unsplash.com/photo-1477587458883-47145ed94245?auto=format&fit=crop&w=500&q=80",
            1,
            1_800.0,
            Category::Cultural,
            4.6,
            "Jaipur",
        ),
        sample(
            "mock-5",
            "Mumbai Comedy Night",
            "An evening of live stand-up at one of the city's best-loved clubs, with dinner included.",
            "https://images.unsplash.com/photo-1527224857830-43a7acc85260?auto=format&fit=crop&w=500&q=80",
            1,
            3_000.0,
            Category::Entertainment,
            4.3,
            "Mumbai",
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn sample(
    id: &str,
    title: &str,
    description: &str,
    image_url: &str,
    duration: u32,
    cost: f64,
    category: Category,
    rating: f64,
    location: &str,
) -> Listing {
    Listing {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        image_url: image_url.to_string(),
        duration,
        cost,
        category,
        rating,
        location: Some(location.to_string()),
        lat: None,
        lng: None,
        created_at: None,
        relevance: None,
        saved_by_user: false,
        completed_by_user: false,
    }
}
