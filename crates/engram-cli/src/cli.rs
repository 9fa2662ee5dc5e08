//! Command-line interface definition.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "engram", version, about = "Local semantic memory engine")]
pub struct Cli {
    /// Suppress all log output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    pub json: bool,

    /// Embedding model version override (e.g. `hash-v1` for offline use).
    #[arg(long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Hybrid semantic search over stored vectors.
    Search(SearchArgs),
    /// Show how a query expands before searching.
    Expand(ExpandArgs),
    /// Store health: row counts, staleness, cache hit rates.
    Health,
    /// Report stale vectors; optionally purge them for re-ingest.
    Rebuild(RebuildArgs),
    /// Check text for secrets and print the redacted form.
    Redact(RedactArgs),
    /// Bulk-import documents from a JSON file.
    Import(ImportArgs),
    /// Delete vectors by doc id or by source observation.
    Delete(DeleteArgs),
}

#[derive(Debug, clap::Args)]
pub struct SearchArgs {
    /// Query text.
    pub query: String,

    /// Restrict to a project (global rows still match).
    #[arg(long)]
    pub project: Option<String>,

    /// Restrict to a doc type (observation, session_summary, user_prompt,
    /// pattern).
    #[arg(long)]
    pub doc_type: Option<String>,

    /// Maximum results.
    #[arg(long, default_value_t = 10)]
    pub limit: i64,

    /// Collapse to the best row per source entity.
    #[arg(long)]
    pub multi_field: bool,

    /// Disable query expansion (search the raw query only).
    #[arg(long)]
    pub no_expand: bool,
}

#[derive(Debug, clap::Args)]
pub struct ExpandArgs {
    /// Query text to expand.
    pub query: String,
}

#[derive(Debug, clap::Args)]
pub struct DeleteArgs {
    /// Observation id; removes every `obs_{id}_*` row.
    #[arg(long, conflicts_with = "doc_ids")]
    pub observation: Option<i64>,

    /// Exact doc ids to delete.
    #[arg(long = "doc-id")]
    pub doc_ids: Vec<String>,
}

#[derive(Debug, clap::Args)]
pub struct RebuildArgs {
    /// Delete stale vectors so the ingest layer re-embeds them.
    #[arg(long)]
    pub purge_stale: bool,
}

#[derive(Debug, clap::Args)]
pub struct RedactArgs {
    /// Text to check; reads stdin when omitted.
    pub text: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct ImportArgs {
    /// JSON file holding an array of documents
    /// (`{doc_id, content, metadata}`).
    pub file: std::path::PathBuf,
}
