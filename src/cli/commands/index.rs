//! Index command implementation.

use crate::chunking::VideoTranscript;
use crate::cli::Output;
use crate::config::Settings;
use crate::keyword::SaveOutcome;
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};

/// Run the index command.
pub async fn run_index(file: &str, settings: Settings) -> Result<()> {
    let path = Settings::expand_path(file);
    let videos = VideoTranscript::load_file(&path)
        .with_context(|| format!("Failed to read videos from {}", path.display()))?;

    if videos.is_empty() {
        Output::warning(&format!("No videos found in {}", path.display()));
        return Ok(());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner(&format!("Indexing {} videos...", videos.len()));
    let result = orchestrator.index_videos(&videos).await;
    spinner.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            Output::error(&format!("Indexing failed: {}", e));
            return Err(e.into());
        }
    };

    Output::success(&format!(
        "Indexed {} fragments from {} videos",
        report.fragments_indexed, report.videos_indexed
    ));

    if !report.videos_skipped.is_empty() {
        Output::warning(&format!(
            "Skipped {} videos without transcript text:",
            report.videos_skipped.len()
        ));
        for video_id in &report.videos_skipped {
            Output::list_item(video_id);
        }
    }

    if let Some(SaveOutcome::Failed(reason)) = &report.keyword_index {
        Output::warning(&format!(
            "Keyword index is usable but was not saved: {}",
            reason
        ));
    }

    Ok(())
}
