//! `engram search` — hybrid semantic search.

use std::str::FromStr;

use engram_core::DocType;
use engram_store::QueryFilter;

use crate::cli::SearchArgs;
use crate::context::EngineContext;

pub fn handle(ctx: &EngineContext, args: &SearchArgs, json: bool) -> anyhow::Result<()> {
    let filter = QueryFilter {
        doc_type: match &args.doc_type {
            Some(raw) => Some(
                DocType::from_str(raw).map_err(|e| anyhow::anyhow!("--doc-type: {e}"))?,
            ),
            None => None,
        },
        project: args.project.clone(),
    };

    if args.multi_field {
        let results = ctx.store.query_multi_field(&args.query, args.limit, &filter)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            for (i, result) in results.iter().enumerate() {
                println!(
                    "{:>2}. {:<40} similarity={:.4}",
                    i + 1,
                    result.id,
                    result.similarity
                );
            }
        }
        return Ok(());
    }

    let hits = if args.no_expand {
        let results = ctx.store.query(&args.query, args.limit, &filter)?;
        results
            .into_iter()
            .map(|result| engram_search::RetrievalHit {
                score: result.similarity,
                matched_variant: "original".to_string(),
                result,
            })
            .collect()
    } else {
        ctx.retriever.search(&args.query, args.limit, &filter)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else if hits.is_empty() {
        println!("no results");
    } else {
        for (i, hit) in hits.iter().enumerate() {
            println!(
                "{:>2}. {:<40} score={:.4} via {}",
                i + 1,
                hit.result.id,
                hit.score,
                hit.matched_variant
            );
        }
    }
    Ok(())
}
