pub mod likes;
pub mod queries;
pub mod reports;
pub mod trends;

pub use likes::{LikeTarget, Toggled};
pub use queries::{CommentView, PostDetail, PostView};
pub use reports::ReportOutcome;

/// Longest accepted post body, in characters.
pub const BODY_MAX_CHARS: usize = 2000;
