//! Output formatting for CLI

use colored::Colorize;
use testframe_runner::{render_summary, RunSummary};

/// Print the end-of-run summary
pub fn print_summary(summary: &RunSummary) {
    println!();
    print!("{}", render_summary(&summary.outcomes, Some(&summary.reports_dir)));
    println!();
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("⚠️  {}", message.yellow());
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
