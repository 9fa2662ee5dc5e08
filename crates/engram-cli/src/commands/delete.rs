//! `engram delete` — remove vectors by doc id or source observation.

use serde_json::json;

use crate::cli::DeleteArgs;
use crate::context::EngineContext;

pub fn handle(ctx: &EngineContext, args: &DeleteArgs, json_out: bool) -> anyhow::Result<()> {
    let removed = if let Some(observation) = args.observation {
        ctx.store.delete_by_observation_id(observation)?
    } else if args.doc_ids.is_empty() {
        anyhow::bail!("pass --observation <id> or at least one --doc-id");
    } else {
        ctx.store.delete_documents(&args.doc_ids)?
    };

    if json_out {
        println!("{}", serde_json::to_string_pretty(&json!({ "removed": removed }))?);
    } else {
        println!("removed {removed} vectors");
    }
    Ok(())
}
