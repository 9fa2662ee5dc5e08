//! `engram health` — store health report.

use crate::context::EngineContext;

pub fn handle(ctx: &EngineContext, json: bool) -> anyhow::Result<()> {
    let health = ctx.store.get_health_stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&health)?);
        return Ok(());
    }

    println!("total vectors:   {}", health.total);
    println!("stale vectors:   {}", health.stale);
    println!("current model:   {}", health.current_model);
    if health.needs_rebuild {
        println!(
            "needs rebuild:   yes ({})",
            health.rebuild_reason.as_deref().unwrap_or("unknown")
        );
    } else {
        println!("needs rebuild:   no");
    }
    for (doc_type, count) in &health.coverage_by_type {
        println!("  {doc_type:<18} {count}");
    }
    println!(
        "embedding cache: {:.0}% hit rate over {} lookups ({} entries)",
        health.embedding_cache.hit_rate * 100.0,
        health.embedding_cache.hits + health.embedding_cache.misses,
        health.embedding_cache.size
    );
    println!(
        "result cache:    {:.0}% hit rate over {} lookups ({} entries)",
        health.result_cache.hit_rate * 100.0,
        health.result_cache.hits + health.result_cache.misses,
        health.result_cache.size
    );
    Ok(())
}
