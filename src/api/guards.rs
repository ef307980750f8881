//! Ownership guards
//!
//! Handlers ask a guard before touching a post or a comment and act on the
//! returned `Access`. Posts and comments differ: a stranger
//! editing a post is sent back to the post, while someone else's comment
//! simply does not exist for them.

use crate::api::middleware::PageError;
use crate::api::urls;
use crate::models::{Comment, Post, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allowed,
    DeniedRedirect(String),
    DeniedNotFound,
}

impl Access {
    /// Turn a denial into the handler's error
    pub fn check(self) -> Result<(), PageError> {
        match self {
            Access::Allowed => Ok(()),
            Access::DeniedRedirect(url) => Err(PageError::Redirect(url)),
            Access::DeniedNotFound => Err(PageError::NotFound),
        }
    }
}

/// Only the author may edit or delete a post; anyone else, anonymous
/// included, goes back to the post's page
pub fn post_owner(post: &Post, requester: Option<&User>) -> Access {
    match requester {
        Some(user) if user.id == post.author_id => Access::Allowed,
        _ => Access::DeniedRedirect(urls::post_detail(post.id)),
    }
}

/// Only the author may edit or delete a comment
pub fn comment_owner(comment: &Comment, requester: &User) -> Access {
    if comment.author_id == requester.id {
        Access::Allowed
    } else {
        Access::DeniedNotFound
    }
}
