//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.list_videos().await {
        Ok(videos) => {
            if videos.is_empty() {
                Output::info("No videos indexed yet. Use 'lectern index <file>' to add content.");
            } else {
                Output::header(&format!("Indexed Videos ({})", videos.len()));
                println!();

                for video in &videos {
                    Output::video_info(
                        &video.title,
                        &video.video_id,
                        video.fragment_count,
                        video.duration_seconds,
                    );
                }

                let total_fragments: u32 = videos.iter().map(|v| v.fragment_count).sum();
                println!();
                Output::kv("Total videos", &videos.len().to_string());
                Output::kv("Total fragments", &total_fragments.to_string());
                Output::kv(
                    "Keyword index",
                    &format!("{} fragments", orchestrator.keyword_index().len()),
                );
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list videos: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
