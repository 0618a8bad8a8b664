//! Rebuild command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::keyword::SaveOutcome;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the rebuild command.
pub async fn run_rebuild(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Rebuilding keyword index...");
    let result = orchestrator.rebuild_keyword_index().await;
    spinner.finish_and_clear();

    match result? {
        Some(SaveOutcome::Saved { path }) => Output::success(&format!(
            "Keyword index rebuilt with {} fragments ({})",
            orchestrator.keyword_index().len(),
            path.display()
        )),
        Some(SaveOutcome::Failed(reason)) => {
            Output::warning(&format!("Keyword index rebuilt but not saved: {}", reason))
        }
        None => Output::info("Nothing indexed yet. Use 'lectern index <file>' to add videos."),
    }

    Ok(())
}
