use crate::model::{Id, user::User};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const POST_TITLE_MAX_LEN: usize = 200;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

text_field!(PostTitle, field = "title", max_chars = Some(POST_TITLE_MAX_LEN));
text_field!(PostContent, field = "content", max_chars = None);

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: PostTitle,
    pub content: PostContent,
    pub author: User,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Always equal to the number of likes stored for this post.
    pub likes: u64,
}

/// A post as seen by one viewer.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostView {
    pub post: Post,
    /// Whether the viewer likes the post. Always false for anonymous viewers.
    pub liked: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreatePost {
    pub title: PostTitle,
    pub content: PostContent,
}
