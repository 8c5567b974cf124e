use adventure_scout::debounce::Debouncer;
use adventure_scout::gateway::fallback;
use adventure_scout::{notify, ActionError, AdventureGateway, Config, RemoteGateway, Session};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🧭 Adventure Scout");
    info!("=================");

    let config = Config::load()?;
    if !config.has_backend() {
        warn!("ADVENTURE_API_URL not set, expect offline mode");
    }

    let remote: Arc<dyn AdventureGateway> = Arc::new(RemoteGateway::new(&config)?);
    let (notifier, mut notices) = notify::channel();
    let session = Session::new(remote.clone(), Arc::new(fallback::gateway()), notifier);

    if let Some(user_id) = &config.user_id {
        session.sign_in(user_id.clone());
        if let Err(e) = session.load_marks().await {
            warn!("Continuing without saved adventures: {}", e);
        }
    }

    // Search text arrives through the debouncer, as keystrokes would
    let mut listings = session.refresh().await;
    if let Some(search) = config.search.clone() {
        let (mut debouncer, mut settled) = Debouncer::new(config.search_debounce);
        debouncer.push(search);
        if let Some(search) = settled.recv().await {
            listings = session.apply_search(search).await;
        }
    }

    info!(
        "\n✅ Found {} adventures{}\n",
        listings.len(),
        if session.is_degraded() { " (sample data)" } else { "" }
    );

    for (i, listing) in listings.iter().enumerate() {
        println!("{}. {} (₹{})", i + 1, listing.title, listing.cost);
        println!(
            "   {} · {} {} · ★ {:.1}",
            listing.category,
            listing.duration,
            if listing.duration == 1 { "day" } else { "days" },
            listing.rating
        );
        if let Some(location) = &listing.location {
            println!("   Location: {}", location);
        }
        println!("   ID: {}", listing.id);
        if listing.saved_by_user || listing.completed_by_user {
            println!(
                "   {}{}",
                if listing.saved_by_user { "♥ saved " } else { "" },
                if listing.completed_by_user { "✔ completed" } else { "" }
            );
        }
        println!();
    }

    // Save snapshot of the results
    let json = serde_json::to_string_pretty(&listings)?;
    tokio::fs::write("adventures.json", json).await?;
    info!("💾 Saved {} adventures to adventures.json", listings.len());

    if session.user().is_some() {
        if let Ok(completed) = session.completed_adventures().await {
            for entry in &completed {
                let when = entry
                    .completed_at
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                println!("✔ {} {}", entry.listing.title, when);
            }
        }

        match session.export_history(&config.export_dir) {
            Ok(path) => info!("History written to {}", path.display()),
            Err(ActionError::NothingToExport) => {}
            Err(e) => warn!("Export failed: {}", e),
        }
    }

    // Listen for adventures published while we were browsing
    if let Some(wait) = config.follow_for {
        match remote.subscribe().await {
            Ok(subscription) => {
                if tokio::time::timeout(wait, session.follow(subscription)).await.is_err() {
                    info!("Stopped listening for new adventures after {:?}", wait);
                }
            }
            Err(e) => warn!("Could not subscribe to new adventures: {:#}", e),
        }
    }

    while let Ok(notice) = notices.try_recv() {
        println!("[{:?}] {}", notice.level, notice.title);
    }

    Ok(())
}
