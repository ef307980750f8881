//! Post model
//!
//! Besides the stored `Post` entity this module holds the listing types:
//! - `PostWithMeta`: a post joined with its author, category, location and
//!   comment count, as shown on listing and detail pages
//! - `PostFilter`: the parameters of the one canonical listing query
//! - `ListParams` / `PagedResult`: pagination

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Number of posts per listing page
pub const POSTS_PER_PAGE: u32 = 10;

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    /// Publication date; a future date defers publication
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    /// Image path relative to the media root
    pub image: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// Public visibility rule shared by the listing row and the SQL filter
pub fn is_publicly_visible(
    is_published: bool,
    category_published: Option<bool>,
    pub_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    is_published && category_published.unwrap_or(true) && pub_date <= now
}

/// Author reference embedded in a listing row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: i64,
    pub username: String,
}

/// Category reference embedded in a listing row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub is_published: bool,
}

/// Location reference embedded in a listing row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRef {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
}

/// Post joined with related rows and annotated with its comment count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithMeta {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author: AuthorRef,
    pub category: Option<CategoryRef>,
    pub location: Option<LocationRef>,
    pub image: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub comment_count: i64,
}

impl PostWithMeta {
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        is_publicly_visible(
            self.is_published,
            self.category.as_ref().map(|c| c.is_published),
            self.pub_date,
            now,
        )
    }
}

/// Parameters of the canonical post listing query.
///
/// Every set field narrows the result; results are always ordered by
/// `pub_date` descending, then id descending.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Only posts publicly visible at this instant
    pub visible_at: Option<DateTime<Utc>>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    /// Case-insensitive substring of the title
    pub title_contains: Option<String>,
    pub is_published: Option<bool>,
}

impl PostFilter {
    /// Posts visible to everyone at `now`
    pub fn visible_at(now: DateTime<Utc>) -> Self {
        Self {
            visible_at: Some(now),
            ..Default::default()
        }
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// All posts of one author, regardless of visibility
    pub fn by_author(author_id: i64) -> Self {
        Self {
            author_id: Some(author_id),
            ..Default::default()
        }
    }
}

/// Input for creating a post; the author comes from the session
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    pub image: Option<String>,
    pub is_published: bool,
}

/// What to do with a post's image on update
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageChange {
    #[default]
    Keep,
    Clear,
    Replace(String),
}

/// Input for the author's edit form; every field is rewritten
#[derive(Debug, Clone)]
pub struct UpdatePostInput {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    pub image: ImageChange,
    pub is_published: bool,
}

impl UpdatePostInput {
    /// Apply this input to a stored post
    pub fn apply(self, post: &mut Post) {
        post.title = self.title;
        post.text = self.text;
        post.pub_date = self.pub_date;
        post.location_id = self.location_id;
        post.category_id = self.category_id;
        post.is_published = self.is_published;
        match self.image {
            ImageChange::Keep => {}
            ImageChange::Clear => post.image = None,
            ImageChange::Replace(path) => post.image = Some(path),
        }
    }
}

/// Partial update made from the admin API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminPostPatch {
    pub is_published: Option<bool>,
    pub text: Option<String>,
    /// `null` detaches the category, an absent field keeps it
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
}

fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: POSTS_PER_PAGE,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Resolve a raw `?page=` value against the total item count.
    ///
    /// A missing or non-numeric value selects the first page; a number
    /// outside `1..=last` selects the last page. An empty collection has
    /// one empty page.
    pub fn resolve(raw_page: Option<&str>, per_page: u32, total: i64) -> Self {
        let per_page = per_page.clamp(1, 100);
        let last = total_pages(total, per_page).max(1);

        let page = match raw_page.map(str::trim).map(str::parse::<i64>) {
            None | Some(Err(_)) => 1,
            Some(Ok(n)) if n >= 1 && n <= i64::from(last) => n as u32,
            Some(Ok(_)) => last,
        };

        Self { page, per_page }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

fn total_pages(total: i64, per_page: u32) -> u32 {
    if per_page == 0 || total <= 0 {
        return 0;
    }
    let per_page = i64::from(per_page);
    u32::try_from((total + per_page - 1) / per_page).unwrap_or(u32::MAX)
}

/// Paginated result container.
///
/// The derived navigation fields are computed once so templates can read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PagedResult<T> {
    /// Create a new paginated result
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        let total_pages = total_pages(total, params.per_page);
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages,
            has_next: params.page < total_pages,
            has_prev: params.page > 1,
        }
    }
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self::new(Vec::new(), 0, &ListParams::default())
    }
}
