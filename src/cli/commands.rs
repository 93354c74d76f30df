use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cachewarden")]
#[command(author, version, about = "Offline cache and sync engine for the marketplace app", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Precache the app shell for the configured cache version
    Install {
        /// Activate immediately after installing
        #[arg(long)]
        skip_waiting: bool,
    },

    /// Delete caches from older versions
    Activate,

    /// Run a request through the fetch handler
    Fetch {
        url: String,

        /// Treat the request as a page navigation
        #[arg(short, long)]
        navigate: bool,
    },

    /// Inspect or clear the outbound write queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Trigger a background sync
    Sync {
        /// Sync tag (default: the message sync tag)
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Deliver a push payload and show the resulting notification
    Push { payload: String },

    /// Print the active cache version and partition names
    Version,
}

#[derive(Subcommand)]
pub enum QueueAction {
    /// List queued writes
    List,

    /// Delete every queued write
    Clear,
}
