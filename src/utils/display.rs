use crate::store::QueuedWrite;
use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.len()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_warning(text: &str) {
    println!("{}", text.yellow());
}

/// Status line colored by class: 2xx green, 202 yellow, 5xx red.
pub fn format_status(status: u16) -> ColoredString {
    let label = status.to_string();
    match status {
        202 => label.yellow().bold(),
        200..=299 => label.green().bold(),
        500..=599 => label.red().bold(),
        _ => label.normal(),
    }
}

pub fn print_queued_write(write: &QueuedWrite) {
    println!(
        "  {} {} {} {}",
        format!("#{}", write.id).bright_black(),
        write.method.bold(),
        write.url,
        format!("[{}]", write.sync_status.as_str()).yellow()
    );
}
