// file: src/utils/logging.rs
// description: Tracing subscriber initialization and colored status lines for the cli

use colored::*;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// `RUST_LOG` wins over the verbosity flag when it is set.
pub fn init_logger(colored_output: bool, verbose: bool) {
    let level = if verbose { "ragforsql=debug,info" } else { "ragforsql=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .with_writer(std::io::stderr)
        .compact()
        .with_ansi(colored_output);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

pub fn format_success(msg: &str) -> String {
    format!("{} {}", "✓".green().bold(), msg.green())
}

pub fn format_error(msg: &str) -> String {
    format!("{} {}", "✗".red().bold(), msg.red())
}

pub fn format_warning(msg: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), msg.yellow())
}

pub fn format_info(msg: &str) -> String {
    format!("{} {}", "ℹ".blue().bold(), msg)
}

pub fn format_step(step: usize, total: usize, msg: &str) -> String {
    format!("{} {}", format!("[{}/{}]", step, total).cyan().bold(), msg)
}

pub fn format_heading(msg: &str) -> String {
    msg.bold().underline().to_string()
}
