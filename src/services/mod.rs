//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They own
//! the rules the handlers must not re-implement:
//! - Post visibility and per-author ownership
//! - Pagination of the post listings
//! - Comment ownership and the comment notification email
//! - Registration, login sessions and profile edits

pub mod category;
pub mod comment;
pub mod email;
pub mod location;
pub mod password;
pub mod post;
pub mod user;

pub use category::{CategoryService, CategoryServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use email::{transport_from_config, MailTransport, NotificationService};
pub use location::{LocationService, LocationServiceError};
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError};
pub use user::{validate_username, UserService, UserServiceError};
