use anyhow::{Context, Result};
use std::sync::Arc;
use threadline_core::constants::PENDING_TRANSFER_KEY;
use threadline_core::models::NavigationItem;
use threadline_core::store::{FileStore, HistoryStorage, KeyValueStore, MemoryStore};
use threadline_core::tracing_setup::init_tracing;
use threadline_core::CoreConfig;

fn main() -> Result<()> {
    init_tracing();

    let config = CoreConfig::from_env();
    eprintln!("=== Navigation History Debugger ===");
    eprintln!("data dir: {}\n", config.data_dir.display());

    let primary = Arc::new(FileStore::new(config.primary_store_path()));
    let storage = HistoryStorage::new(primary, Arc::new(MemoryStore::new()), config.max_history);
    eprintln!("backend: {:?}", storage.backend());
    eprintln!("unsorted closed: {}", storage.sentinel_closed());

    let history = storage.read();
    eprintln!("\n{} tracked items:", history.len());
    for (index, item) in history.iter().enumerate() {
        print_item(index, item);
    }

    // Peek at the pending slot without claiming it
    let session = FileStore::new(config.session_store_path());
    let pending = session
        .get(PENDING_TRANSFER_KEY)
        .context("Failed to read session store")?;
    match pending {
        Some(raw) => eprintln!("\npending transfer: {}", raw),
        None => eprintln!("\npending transfer: <empty>"),
    }

    Ok(())
}

fn print_item(index: usize, item: &NavigationItem) {
    let marker = if item.is_unsorted() { " (unsorted)" } else { "" };
    eprintln!(
        "  {:>2}. {:<24} {:<32} count={:<4} first={} last={}{}",
        index + 1,
        item.id,
        item.title,
        item.count,
        item.first_accessed,
        item.last_accessed,
        marker
    );
}
