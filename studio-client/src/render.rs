//! Plain-text output for the `studio` CLI.

use crate::models::VideoRecord;

pub const EMPTY_LIBRARY: &str = "No videos found. Create your first video!";

/// One line per video, or the empty-library message.
pub fn render_videos(videos: &[VideoRecord]) -> String {
    if videos.is_empty() {
        return format!("{EMPTY_LIBRARY}\n");
    }
    videos.iter().map(render_video).collect()
}

/// `id`, `title`, `createdAt` and `url`, tab separated.
pub fn render_video(video: &VideoRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\n",
        video.id, video.title, video.created_at, video.url
    )
}
