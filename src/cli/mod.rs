mod commands;

pub use commands::{Cli, Commands, QueueAction};
