//! `engram rebuild` — stale-vector reporting and purge.
//!
//! The full granular rebuild (re-formatting source content) lives in the
//! ingest layer next to the relational store; this command reports the
//! stale set and can purge it so the next ingest pass re-embeds.

use serde_json::json;

use crate::cli::RebuildArgs;
use crate::context::EngineContext;

pub fn handle(ctx: &EngineContext, args: &RebuildArgs, json_out: bool) -> anyhow::Result<()> {
    let (needs, reason) = ctx.store.needs_rebuild()?;
    let stale = ctx.store.get_stale_vectors()?;

    let purged = if args.purge_stale && !stale.is_empty() {
        let doc_ids: Vec<String> = stale.iter().map(|s| s.doc_id.clone()).collect();
        ctx.store.delete_vectors_by_doc_ids(&doc_ids)?
    } else {
        0
    };

    if json_out {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "needs_rebuild": needs,
                "reason": reason,
                "stale": stale,
                "purged": purged,
            }))?
        );
        return Ok(());
    }

    match (needs, &reason) {
        (false, _) => println!("index is clean ({} vectors current)", ctx.store.count()?),
        (true, Some(reason)) => println!("rebuild needed: {reason}"),
        (true, None) => println!("rebuild needed"),
    }
    for vector in &stale {
        println!("  stale: {:<40} ({})", vector.doc_id, vector.doc_type);
    }
    if purged > 0 {
        println!("purged {purged} stale vectors; re-ingest to re-embed");
    }
    Ok(())
}
