// Gazetteer client entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, the terminal holds the country list)
// 2. Load config
// 3. Fetch the country catalog and print it as a numbered list
// 4. Create the settlement channel and the coordinator
// 5. Spawn the stdin reader task
// 6. Run the event loop until the user quits

use gazetteer::catalog::{CatalogItem, ListSource};
use gazetteer::config;
use gazetteer::enrich::client::ProxyClient;
use gazetteer::enrich::coordinator::Coordinator;
use gazetteer::protocol::EnrichStatus;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not the terminal)
    init_tracing()?;
    info!("Gazetteer client starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: endpoint={}, routing={}",
        config.catalog.endpoint, config.proxy.routing
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    // 3. Fetch the country catalog
    let list_source = ListSource::new(http.clone(), &config.catalog.endpoint);
    let items = list_source
        .fetch_list()
        .await
        .context("failed to fetch country list")?;
    info!("Fetched {} countries", items.len());

    if items.is_empty() {
        println!("The country list is empty; nothing to select.");
        return Ok(());
    }

    print_catalog(&items);

    // 4. Settlement channel and coordinator
    let (tx, mut rx) = mpsc::channel(64);
    let proxy = Arc::new(ProxyClient::new(http, config.route_mode()));
    let mut coordinator = Coordinator::new(proxy, tx);

    // 5. Stdin reader task
    let (line_tx, mut line_rx) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    println!();
    println!("Enter a number to select a country, an empty line to clear, or q to quit.");

    // 6. Event loop
    loop {
        tokio::select! {
            line = line_rx.recv() => {
                let Some(line) = line else { break };
                let input = line.trim();

                if input.eq_ignore_ascii_case("q") {
                    break;
                }
                if input.is_empty() {
                    coordinator.on_selection_changed("");
                    println!("Selection cleared.");
                    continue;
                }
                match input.parse::<usize>() {
                    Ok(n) if n >= 1 && n <= items.len() => {
                        let label = &items[n - 1].label;
                        coordinator.on_selection_changed(label);
                        println!("{label} selected, fetching description...");
                    }
                    _ => {
                        println!(
                            "Enter a number between 1 and {}, an empty line, or q.",
                            items.len()
                        );
                    }
                }
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                coordinator.handle_event(event);
                let result = coordinator.current_result();
                match result.status {
                    EnrichStatus::Resolved => {
                        println!("{} info from AI : {}", result.key, result.text);
                    }
                    EnrichStatus::Failed => {
                        println!("Could not fetch a description for {}.", result.key);
                    }
                    // Stale settlements leave state untouched; nothing to show.
                    EnrichStatus::Idle | EnrichStatus::Pending => {}
                }
            }
        }
    }

    info!("Gazetteer client shut down cleanly");
    Ok(())
}

fn print_catalog(items: &[CatalogItem]) {
    println!("Countries:");
    for (i, item) in items.iter().enumerate() {
        println!("{:>4}. {}", i + 1, item.label);
    }
}

/// Initialize tracing to log to a file (not the terminal, which is used for
/// the interactive list).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("gazetteer.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gazetteer=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
