use serde::{Deserialize, Serialize};

/// State of a (user, post) pair after a toggle, and the post's new count.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub likes: u64,
}
