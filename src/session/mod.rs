/*!
 * Per-video session state.
 *
 * A session is created when a video is loaded and dropped on navigation. It
 * owns the merged subtitle list and the translation cache of that video, and
 * names the durable snapshot through a stable video identifier.
 */

pub mod context;
pub mod video_id;

// Re-export main types
pub use context::{SessionContext, TranslatedSubtitle};
pub use video_id::{derive_video_id, is_youtube_id};
