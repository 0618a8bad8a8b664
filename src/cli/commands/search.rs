//! Search command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, limit: Option<usize>, settings: Settings) -> Result<()> {
    let top_k = limit.unwrap_or(settings.search.default_top_k);
    let orchestrator = Orchestrator::new(settings)?;

    if !orchestrator.keyword_index().is_indexed() {
        Output::warning("Keyword index not built; results come from semantic search only.");
    }

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.search(query, top_k).await;
    spinner.finish_and_clear();

    match results {
        Ok(clips) if clips.is_empty() => {
            Output::warning("No results found matching your query.");
        }
        Ok(clips) => {
            Output::success(&format!("Found {} clips", clips.len()));
            for (i, clip) in clips.iter().enumerate() {
                Output::clip(i + 1, clip);
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
