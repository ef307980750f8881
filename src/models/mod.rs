//! Data models
//!
//! Plain structs for the database entities (User, Session, Category,
//! Location, Post, Comment), the joined listing rows, and the input types
//! the services accept.

mod category;
mod comment;
mod location;
mod post;
mod session;
mod user;

pub use category::{Category, CreateCategoryInput, UpdateCategoryInput};
pub use comment::{Comment, CommentWithAuthor};
pub use location::{CreateLocationInput, Location, UpdateLocationInput};
pub use post::{
    is_publicly_visible, AdminPostPatch, AuthorRef, CategoryRef, CreatePostInput, ImageChange,
    ListParams, LocationRef, PagedResult, Post, PostFilter, PostWithMeta, UpdatePostInput,
    POSTS_PER_PAGE,
};
pub use session::Session;
pub use user::{CreateUserInput, UpdateProfileInput, User};
