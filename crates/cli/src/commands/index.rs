use super::utils::*;
use crate::config::IndexerConfig;
use anyhow::Result;

pub fn handle_index(config: &IndexerConfig, force: bool) -> Result<()> {
    if force {
        print_info("Force reindexing project...", "🔄");
    } else {
        print_info("Indexing project...", "📇");
    }

    let project = open_project(config)?;
    let result = project.index(force)?;

    if result.full_rebuild && !force {
        print_info("Stub format changed or no cache found, rebuilt from scratch", "🧱");
    }
    print_success(&format!(
        "Indexed {} file(s), {} stubs, {} index entries in {:.2}s (+{} ~{} -{} ={} files)",
        result.indexed(),
        result.stubs,
        result.entries,
        result.duration.as_secs_f64(),
        result.added,
        result.modified,
        result.removed,
        result.unchanged
    ));

    if !result.failures.is_empty() {
        print_warning(&format!("{} file(s) produced no stubs:", result.failures.len()));
        print_failures(&result.failures, 10);
    }

    Ok(())
}
