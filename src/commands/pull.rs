use std::path::PathBuf;

use crate::config::select_sources;
use crate::services::{self, FlowStore};
use crate::utils::get_data_dir;

pub fn run(source_keys: Vec<String>, data_dir: Option<PathBuf>) {
    let sources = match select_sources(&source_keys) {
        Ok(sources) => sources,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let data_dir = data_dir.unwrap_or_else(get_data_dir);
    let store = FlowStore::new(&data_dir);
    println!("📥 Pulling {} source(s) into {}", sources.len(), data_dir.display());

    let report = match services::run(&sources, &store) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("❌ Pipeline setup failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("\nSummary");
    println!("─────────────────────");
    for (key, result) in &report.results {
        match result {
            Ok(r) => println!(
                "  {}: ✅ {} parsed, +{} new, ~{} updated ({} total)",
                key.to_uppercase(),
                r.records_parsed,
                r.stats.added,
                r.stats.updated,
                r.total_records
            ),
            Err(e) => println!("  {}: ❌ {}", key.to_uppercase(), e),
        }
    }

    if !report.all_ok() {
        std::process::exit(1);
    }
}
