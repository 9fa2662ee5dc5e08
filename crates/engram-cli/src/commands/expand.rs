//! `engram expand` — show a query's expansion fan-out.

use engram_search::classify_intent;

use crate::cli::ExpandArgs;
use crate::context::EngineContext;

pub fn handle(ctx: &EngineContext, args: &ExpandArgs, json: bool) -> anyhow::Result<()> {
    let intent = classify_intent(&args.query);
    let expansions = ctx.expander.expand(&args.query);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "query": args.query,
                "intent": intent,
                "expansions": expansions,
            }))?
        );
        return Ok(());
    }

    println!("intent: {intent:?}");
    for expansion in &expansions {
        println!(
            "  {:.2}  {:<50} ({})",
            expansion.weight, expansion.text, expansion.source
        );
    }
    Ok(())
}
