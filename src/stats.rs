//! Store statistics (`localmind stats`).
//!
//! A quick summary of what's indexed, without loading the embedding model.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::store;

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = store::open(config)
        .await
        .with_context(|| format!("Failed to open vector store at {}", config.db.url))?;
    let info = store::with_store(store, |s| async move { s.info().await }).await?;

    println!("LocalMind — Store Stats");
    println!("=======================");
    println!();
    println!("  Database:    {}", config.db.url);
    if let Some(size) = sqlite_file_size(&config.db.url) {
        println!("  Size:        {}", format_bytes(size));
    }
    println!("  Backend:     {}", info.backend);
    println!("  Model:       {}", info.model.as_deref().unwrap_or("(not set)"));
    println!(
        "  Dimensions:  {}",
        info.dims
            .map(|d| d.to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!();
    println!("  Documents:   {}", info.documents);
    println!("  Chunks:      {}", info.chunks);
    Ok(())
}

fn sqlite_file_size(url: &str) -> Option<u64> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    std::fs::metadata(path).ok().map(|m| m.len())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
