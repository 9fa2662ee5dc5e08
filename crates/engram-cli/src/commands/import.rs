//! `engram import` — bulk document import from a JSON file.

use std::time::Duration;

use engram_config::EngramConfig;
use engram_core::Document;
use engram_store::BulkImporter;

use crate::cli::ImportArgs;
use crate::context::EngineContext;

pub fn handle(
    ctx: &EngineContext,
    config: &EngramConfig,
    args: &ImportArgs,
    json: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.file)?;
    let docs: Vec<Document> = serde_json::from_str(&raw)?;

    let importer = BulkImporter::new(
        &ctx.store,
        Duration::from_secs(config.store.bulk_cooldown_secs),
    );
    let outcome = importer.import(&docs)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!(
            "imported {} / {} (skipped {} duplicates, {} failed)",
            outcome.imported,
            docs.len(),
            outcome.skipped_duplicates,
            outcome.failed
        );
        for error in &outcome.errors {
            eprintln!("  {}: {}", error.doc_id, error.error);
        }
    }
    Ok(())
}
