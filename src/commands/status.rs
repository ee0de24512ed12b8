use std::path::PathBuf;

use crate::config::builtin_sources;
use crate::services::FlowStore;
use crate::utils::get_data_dir;

pub fn run(data_dir: Option<PathBuf>) {
    let data_dir = data_dir.unwrap_or_else(get_data_dir);
    let store = FlowStore::new(&data_dir);
    println!("📊 Series in {}", data_dir.display());

    for source in builtin_sources() {
        let path = store.series_path(&source);
        if !path.exists() {
            println!("  {}: (no data yet)", source.key.to_uppercase());
            continue;
        }
        match store.load_or_init(&source) {
            Ok(series) => {
                let latest = series
                    .latest()
                    .map(|r| format!("{} (total {}M)", r.date, r.total))
                    .unwrap_or_else(|| "empty".to_string());
                let updated = series
                    .metadata
                    .last_updated
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "  {}: {} records, latest {}, updated {}",
                    source.key.to_uppercase(),
                    series.record_count(),
                    latest,
                    updated
                );
            }
            Err(e) => println!("  {}: ⚠️  unreadable ({})", source.key.to_uppercase(), e),
        }
    }
}
