use super::utils::*;
use crate::config::IndexerConfig;
use anyhow::Result;
use stub_java::{index_by_name, ALL_INDEXES};

pub fn handle_query(config: &IndexerConfig, index: &str, key: &str) -> Result<()> {
    if index_by_name(index).is_none() {
        print_error(&format!("Unknown index: {}", index));
        let names: Vec<&str> = ALL_INDEXES.iter().map(|i| i.name()).collect();
        println!("  Available indexes: {}", names.join(", "));
        anyhow::bail!("Unknown index: {}", index);
    }

    let project = open_project(config)?;
    let hits = project.query(index, key)?;

    if hits.is_empty() {
        print_warning(&format!("No entries for '{}' in {}", key, index));
        return Ok(());
    }

    print_info(&format!("{} entr(ies) for '{}' in {}:", hits.len(), key, index), "🔍");
    for hit in hits {
        println!("  {}{}", hit.unit, hit.location);
    }
    Ok(())
}
