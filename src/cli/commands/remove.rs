//! Remove command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the remove command.
pub async fn run_remove(video_id: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.remove_video(video_id).await? {
        0 => Output::warning(&format!("Video not found: {}", video_id)),
        removed => Output::success(&format!(
            "Removed {} fragments of video {}",
            removed, video_id
        )),
    }

    Ok(())
}
