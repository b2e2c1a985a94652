use anyhow::Result;
use stub_core::StubError;

use crate::config::IndexerConfig;
use crate::project::ProjectIndexer;

/// Open the project index described by `config`
pub fn open_project(config: &IndexerConfig) -> Result<ProjectIndexer> {
    ProjectIndexer::open(config.clone())
}

/// Human readable byte size
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Print per-unit failures, at most `limit` of them
pub fn print_failures(failures: &[(stub_core::UnitId, StubError)], limit: usize) {
    for (unit, error) in failures.iter().take(limit) {
        println!("  {} - {}", unit, error);
    }
    if failures.len() > limit {
        println!("  ... and {} more", failures.len() - limit);
    }
}

/// Print error message with emoji
pub fn print_error(message: &str) {
    println!("❌ {}", message);
}

/// Print success message with emoji
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print info message with emoji
pub fn print_info(message: &str, emoji: &str) {
    println!("{} {}", emoji, message);
}

/// Print warning message with emoji
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}
