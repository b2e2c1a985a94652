use super::utils::*;
use crate::config::IndexerConfig;
use anyhow::Result;

pub fn handle_stats(config: &IndexerConfig) -> Result<()> {
    let project = open_project(config)?;
    let stats = project.stats()?;

    print_info("Stub cache statistics:", "📊");
    println!("  Database: {}", project.cache().db_path().display());
    println!("  Units: {}", stats.units);
    println!("  Stubs: {}", stats.stubs);
    println!("  Stored size: {}", format_bytes(stats.bytes));
    println!("  Registry version: {:016x}", stats.registry_version);

    match stats.stored_version {
        Some(stored) if stored != stats.registry_version => {
            print_warning(&format!(
                "Cache was written with version {:016x}; run `index` to rebuild",
                stored
            ));
        }
        None => print_warning("No index yet; run `index` first"),
        Some(_) => {}
    }
    if stats.stale > 0 {
        print_warning(&format!("{} unit(s) have unreadable stubs", stats.stale));
    }
    Ok(())
}
