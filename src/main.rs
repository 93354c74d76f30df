use anyhow::Result;
use cachewarden::cli::{Cli, Commands, QueueAction};
use cachewarden::core::Request;
use cachewarden::{utils, FetchOutcome, HostMessage, Settings};
use cachewarden::{init_with, shutdown, CoreEvent};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    init_with(settings).await?;

    let result = match cli.command {
        Commands::Install { skip_waiting } => handle_install(skip_waiting).await,
        Commands::Activate => handle_activate().await,
        Commands::Fetch { url, navigate } => handle_fetch(url, navigate).await,
        Commands::Queue { action } => handle_queue(action).await,
        Commands::Sync { tag } => handle_sync(tag).await,
        Commands::Push { payload } => handle_push(payload).await,
        Commands::Version => handle_version().await,
    };

    // Shutdown gracefully
    shutdown().await?;

    result
}

async fn handle_install(skip_waiting: bool) -> Result<()> {
    let worker = cachewarden::worker()?;
    if skip_waiting {
        worker.message(HostMessage::SkipWaiting).await?;
    }

    utils::print_info("Precaching app shell...");
    let report = worker.install().await?;

    for path in &report.cached {
        utils::print_success(&format!("  cached {}", path));
    }
    for path in &report.failed {
        utils::print_warning(&format!("  failed {}", path));
    }

    if report.skip_waiting {
        utils::print_success("Installed and activated without waiting");
    } else {
        utils::print_info("Installed and waiting for activation");
    }
    Ok(())
}

async fn handle_activate() -> Result<()> {
    let removed = cachewarden::worker()?.activate().await?;
    if removed.is_empty() {
        utils::print_info("No old caches to remove");
    }
    for name in removed {
        utils::print_success(&format!("Deleted {}", name));
    }
    Ok(())
}

async fn handle_fetch(url: String, navigate: bool) -> Result<()> {
    let worker = cachewarden::worker()?;
    let url: reqwest::Url = url.parse()?;
    let request = if navigate {
        Request::navigate(url)
    } else {
        Request::get(url)
    };

    match worker.fetch(request).await? {
        FetchOutcome::Handled(response) => {
            println!("Status: {}", utils::format_status(response.status));
            for (name, value) in &response.headers {
                println!("  {}: {}", name, value);
            }
            println!("\n{}", response.text());
        }
        FetchOutcome::Passthrough => {
            utils::print_info("Request is not intercepted; it goes straight to the network");
        }
    }
    Ok(())
}

async fn handle_queue(action: QueueAction) -> Result<()> {
    let worker = cachewarden::worker()?;
    match action {
        QueueAction::List => {
            if let Some(CoreEvent::QueuedMessages(queued)) = worker.message(HostMessage::GetQueuedMessages).await? {
                utils::print_header(&format!("Queued writes ({})", queued.len()));
                for write in &queued {
                    utils::print_queued_write(write);
                }
            }
        }
        QueueAction::Clear => {
            worker.message(HostMessage::ClearQueue).await?;
            utils::print_success("Queue cleared");
        }
    }
    Ok(())
}

async fn handle_sync(tag: Option<String>) -> Result<()> {
    let tag = match tag {
        Some(tag) => tag,
        None => cachewarden::settings()?.sync.message_tag.clone(),
    };

    let report = cachewarden::worker()?.sync(tag).await?;
    utils::print_success(&format!(
        "Sync '{}': {} replayed, {} still pending, {} listings trimmed",
        report.tag, report.replayed, report.pending, report.trimmed
    ));
    Ok(())
}

async fn handle_push(payload: String) -> Result<()> {
    let notification = cachewarden::worker()?.push(payload.into_bytes()).await?;
    utils::print_header(&notification.title);
    println!("{}", notification.body);
    println!("{}", serde_json::to_string_pretty(&notification)?);
    Ok(())
}

async fn handle_version() -> Result<()> {
    let worker = cachewarden::worker()?;
    if let Some(CoreEvent::CacheVersion { version }) = worker.message(HostMessage::CacheVersionCheck).await? {
        utils::print_header(&format!("Cache version {}", version));
    }
    for name in cachewarden::settings()?.current_cache_names() {
        println!("  {}", name);
    }
    Ok(())
}
