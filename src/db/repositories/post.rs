//! Post repository
//!
//! Database operations for posts.
//!
//! Every listing (index, category page, profile page, admin list) goes
//! through one query built from a `PostFilter`. The query joins the author,
//! category and location and counts comments in a subquery.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    AuthorRef, CategoryRef, ListParams, LocationRef, Post, PostFilter, PostWithMeta,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &Post) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Get a post joined with author, category, location and comment count
    async fn get_with_meta(&self, id: i64) -> Result<Option<PostWithMeta>>;

    /// List one page of posts matching the filter, newest first
    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<Vec<PostWithMeta>>;

    /// Count posts matching the filter
    async fn count(&self, filter: &PostFilter) -> Result<i64>;

    /// Rewrite every editable column of the post
    async fn update(&self, post: &Post) -> Result<Post>;

    /// Delete a post and its comments
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

const POST_COLUMNS: &str = "id, title, text, pub_date, author_id, location_id, category_id, image, is_published, created_at";

const META_SELECT: &str = r#"
    SELECT p.id, p.title, p.text, p.pub_date, p.image, p.is_published, p.created_at,
           p.author_id, u.username AS author_username,
           c.id AS category_id, c.title AS category_title, c.slug AS category_slug,
           c.is_published AS category_is_published,
           l.id AS location_id, l.name AS location_name, l.is_published AS location_is_published,
           (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id
"#;

const META_COUNT: &str = r#"
    SELECT COUNT(*)
    FROM posts p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

/// A value bound into a filter clause
#[derive(Debug, Clone)]
enum FilterArg {
    Time(DateTime<Utc>),
    Int(i64),
    Text(String),
    Bool(bool),
}

/// Compile a filter into a WHERE clause and its arguments, in placeholder order
fn filter_clause(filter: &PostFilter) -> (String, Vec<FilterArg>) {
    let mut conditions: Vec<&'static str> = Vec::new();
    let mut args = Vec::new();

    if let Some(now) = filter.visible_at {
        conditions.push("p.is_published = 1");
        conditions.push("(c.id IS NULL OR c.is_published = 1)");
        conditions.push("p.pub_date <= ?");
        args.push(FilterArg::Time(now));
    }
    if let Some(category_id) = filter.category_id {
        conditions.push("p.category_id = ?");
        args.push(FilterArg::Int(category_id));
    }
    if let Some(author_id) = filter.author_id {
        conditions.push("p.author_id = ?");
        args.push(FilterArg::Int(author_id));
    }
    if let Some(search) = filter.title_contains.as_deref().filter(|s| !s.is_empty()) {
        conditions.push("LOWER(p.title) LIKE ?");
        args.push(FilterArg::Text(format!("%{}%", search.to_lowercase())));
    }
    if let Some(is_published) = filter.is_published {
        conditions.push("p.is_published = ?");
        args.push(FilterArg::Bool(is_published));
    }

    if conditions.is_empty() {
        (String::new(), args)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), args)
    }
}

macro_rules! bind_args {
    ($query:expr, $args:expr) => {{
        let mut query = $query;
        for arg in $args {
            query = match arg {
                FilterArg::Time(t) => query.bind(*t),
                FilterArg::Int(i) => query.bind(*i),
                FilterArg::Text(s) => query.bind(s.clone()),
                FilterArg::Bool(b) => query.bind(*b),
            };
        }
        query
    }};
}

macro_rules! row_to_post {
    ($row:expr) => {
        Post {
            id: $row.get("id"),
            title: $row.get("title"),
            text: $row.get("text"),
            pub_date: $row.get("pub_date"),
            author_id: $row.get("author_id"),
            location_id: $row.get("location_id"),
            category_id: $row.get("category_id"),
            image: $row.get("image"),
            is_published: $row.get("is_published"),
            created_at: $row.get("created_at"),
        }
    };
}

macro_rules! row_to_post_with_meta {
    ($row:expr) => {{
        let row = $row;
        let category_id: Option<i64> = row.get("category_id");
        let location_id: Option<i64> = row.get("location_id");
        PostWithMeta {
            id: row.get("id"),
            title: row.get("title"),
            text: row.get("text"),
            pub_date: row.get("pub_date"),
            author: AuthorRef {
                id: row.get("author_id"),
                username: row.get("author_username"),
            },
            category: category_id.map(|id| CategoryRef {
                id,
                title: row.get("category_title"),
                slug: row.get("category_slug"),
                is_published: row.get("category_is_published"),
            }),
            location: location_id.map(|id| LocationRef {
                id,
                name: row.get("location_name"),
                is_published: row.get("location_is_published"),
            }),
            image: row.get("image"),
            is_published: row.get("is_published"),
            created_at: row.get("created_at"),
            comment_count: row.get("comment_count"),
        }
    }};
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        let sql = r#"
            INSERT INTO posts (title, text, pub_date, author_id, location_id, category_id, image, is_published, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&post.title)
                .bind(&post.text)
                .bind(post.pub_date)
                .bind(post.author_id)
                .bind(post.location_id)
                .bind(post.category_id)
                .bind(&post.image)
                .bind(post.is_published)
                .bind(post.created_at)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create post")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&post.title)
                .bind(&post.text)
                .bind(post.pub_date)
                .bind(post.author_id)
                .bind(post.location_id)
                .bind(post.category_id)
                .bind(&post.image)
                .bind(post.is_published)
                .bind(post.created_at)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create post")?
                .last_insert_id() as i64,
        };

        Ok(Post {
            id,
            ..post.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get post by ID")?;
                Ok(row.map(|row| row_to_post!(row)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get post by ID")?;
                Ok(row.map(|row| row_to_post!(row)))
            }
        }
    }

    async fn get_with_meta(&self, id: i64) -> Result<Option<PostWithMeta>> {
        let sql = format!("{} WHERE p.id = ?", META_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get post")?;
                Ok(row.map(|row| row_to_post_with_meta!(&row)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get post")?;
                Ok(row.map(|row| row_to_post_with_meta!(&row)))
            }
        }
    }

    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<Vec<PostWithMeta>> {
        let (clause, args) = filter_clause(filter);
        let sql = format!(
            "{} {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
            META_SELECT, clause
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = bind_args!(sqlx::query(&sql), &args)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list posts")?;
                Ok(rows.iter().map(|row| row_to_post_with_meta!(row)).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = bind_args!(sqlx::query(&sql), &args)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list posts")?;
                Ok(rows.iter().map(|row| row_to_post_with_meta!(row)).collect())
            }
        }
    }

    async fn count(&self, filter: &PostFilter) -> Result<i64> {
        let (clause, args) = filter_clause(filter);
        let sql = format!("{} {}", META_COUNT, clause);

        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_args!(sqlx::query_scalar::<_, i64>(&sql), &args)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count posts")?,
            DatabaseDriver::Mysql => bind_args!(sqlx::query_scalar::<_, i64>(&sql), &args)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count posts")?,
        };
        Ok(count)
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        let sql = r#"
            UPDATE posts
            SET title = ?, text = ?, pub_date = ?, location_id = ?, category_id = ?, image = ?, is_published = ?
            WHERE id = ?
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&post.title)
                    .bind(&post.text)
                    .bind(post.pub_date)
                    .bind(post.location_id)
                    .bind(post.category_id)
                    .bind(&post.image)
                    .bind(post.is_published)
                    .bind(post.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update post")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&post.title)
                    .bind(&post.text)
                    .bind(post.pub_date)
                    .bind(post.location_id)
                    .bind(post.category_id)
                    .bind(&post.image)
                    .bind(post.is_published)
                    .bind(post.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update post")?;
            }
        }

        self.get_by_id(post.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM posts WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete post")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete post")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        CategoryRepository, LocationRepository, SqlxCategoryRepository, SqlxLocationRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Category, Location, User};
    use chrono::Duration;

    struct Fixture {
        pool: DynDatabasePool,
        posts: SqlxPostRepository,
        categories: SqlxCategoryRepository,
        author_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let author = SqlxUserRepository::new(pool.clone())
            .create(&User::new("author".into(), String::new(), "hash".into(), false))
            .await
            .unwrap();
        Fixture {
            posts: SqlxPostRepository::new(pool.clone()),
            categories: SqlxCategoryRepository::new(pool.clone()),
            pool,
            author_id: author.id,
        }
    }

    fn post(author_id: i64, title: &str, pub_date: DateTime<Utc>) -> Post {
        Post {
            id: 0,
            title: title.to_string(),
            text: format!("Text of {}", title),
            pub_date,
            author_id,
            location_id: None,
            category_id: None,
            image: None,
            is_published: true,
            created_at: Utc::now(),
        }
    }

    async fn add_comment(pool: &DynDatabasePool, post_id: i64, author_id: i64) {
        sqlx::query("INSERT INTO comments (text, post_id, author_id, created_at) VALUES (?, ?, ?, ?)")
            .bind("nice")
            .bind(post_id)
            .bind(author_id)
            .bind(Utc::now())
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();
    }

    fn titles(posts: &[PostWithMeta]) -> Vec<&str> {
        posts.iter().map(|p| p.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let f = setup().await;
        let created = f.posts.create(&post(f.author_id, "First", Utc::now())).await.unwrap();
        assert!(created.id > 0);

        let found = f.posts.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.title, "First");
        assert_eq!(found.author_id, f.author_id);

        assert!(f.posts.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_with_meta_joins_related_rows() {
        let f = setup().await;
        let category = f
            .categories
            .create(&Category::new("News".into(), String::new(), "news".into()))
            .await
            .unwrap();
        let location = SqlxLocationRepository::new(f.pool.clone())
            .create(&Location {
                id: 0,
                name: "Moscow".into(),
                is_published: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let mut p = post(f.author_id, "Joined", Utc::now());
        p.category_id = Some(category.id);
        p.location_id = Some(location.id);
        let created = f.posts.create(&p).await.unwrap();
        add_comment(&f.pool, created.id, f.author_id).await;
        add_comment(&f.pool, created.id, f.author_id).await;

        let meta = f.posts.get_with_meta(created.id).await.unwrap().unwrap();
        assert_eq!(meta.author.username, "author");
        assert_eq!(meta.category.as_ref().unwrap().slug, "news");
        assert_eq!(meta.location.as_ref().unwrap().name, "Moscow");
        assert_eq!(meta.comment_count, 2);
    }

    #[tokio::test]
    async fn test_visible_filter() {
        let f = setup().await;
        let now = Utc::now();
        let hidden_category = f
            .categories
            .create(&Category {
                is_published: false,
                ..Category::new("Hidden".into(), String::new(), "hidden".into())
            })
            .await
            .unwrap();

        f.posts.create(&post(f.author_id, "past", now - Duration::days(1))).await.unwrap();
        f.posts.create(&post(f.author_id, "future", now + Duration::days(1))).await.unwrap();
        let mut draft = post(f.author_id, "draft", now - Duration::days(1));
        draft.is_published = false;
        f.posts.create(&draft).await.unwrap();
        let mut in_hidden = post(f.author_id, "in-hidden", now - Duration::days(1));
        in_hidden.category_id = Some(hidden_category.id);
        f.posts.create(&in_hidden).await.unwrap();

        let filter = PostFilter::visible_at(now);
        let visible = f.posts.list(&filter, &ListParams::default()).await.unwrap();

        assert_eq!(titles(&visible), vec!["past"]);
        assert_eq!(f.posts.count(&filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_order_and_pagination() {
        let f = setup().await;
        let now = Utc::now();
        for i in 0..12 {
            f.posts
                .create(&post(f.author_id, &format!("p{}", i), now - Duration::hours(i)))
                .await
                .unwrap();
        }

        let filter = PostFilter::visible_at(now);
        let first = f.posts.list(&filter, &ListParams::new(1, 10)).await.unwrap();
        let second = f.posts.list(&filter, &ListParams::new(2, 10)).await.unwrap();

        assert_eq!(first.len(), 10);
        assert_eq!(first[0].title, "p0");
        assert_eq!(titles(&second), vec!["p10", "p11"]);
        assert_eq!(f.posts.count(&filter).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_same_pub_date_ordered_by_id_desc() {
        let f = setup().await;
        let date = Utc::now() - Duration::days(1);
        f.posts.create(&post(f.author_id, "older-id", date)).await.unwrap();
        f.posts.create(&post(f.author_id, "newer-id", date)).await.unwrap();

        let list = f
            .posts
            .list(&PostFilter::visible_at(Utc::now()), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(titles(&list), vec!["newer-id", "older-id"]);
    }

    #[tokio::test]
    async fn test_author_filter_ignores_visibility() {
        let f = setup().await;
        let other = SqlxUserRepository::new(f.pool.clone())
            .create(&User::new("other".into(), String::new(), "hash".into(), false))
            .await
            .unwrap();

        let mut draft = post(f.author_id, "mine-draft", Utc::now() + Duration::days(3));
        draft.is_published = false;
        f.posts.create(&draft).await.unwrap();
        f.posts.create(&post(other.id, "theirs", Utc::now())).await.unwrap();

        let mine = f
            .posts
            .list(&PostFilter::by_author(f.author_id), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(titles(&mine), vec!["mine-draft"]);
    }

    #[tokio::test]
    async fn test_title_search_and_published_filter() {
        let f = setup().await;
        f.posts.create(&post(f.author_id, "Rust Tips", Utc::now())).await.unwrap();
        let mut hidden = post(f.author_id, "rusty nails", Utc::now());
        hidden.is_published = false;
        f.posts.create(&hidden).await.unwrap();
        f.posts.create(&post(f.author_id, "Gardening", Utc::now())).await.unwrap();

        let search = PostFilter {
            title_contains: Some("RUST".to_string()),
            ..Default::default()
        };
        assert_eq!(f.posts.count(&search).await.unwrap(), 2);

        let published_only = PostFilter {
            is_published: Some(true),
            ..search
        };
        let list = f.posts.list(&published_only, &ListParams::default()).await.unwrap();
        assert_eq!(titles(&list), vec!["Rust Tips"]);
    }

    #[tokio::test]
    async fn test_deleting_category_nulls_reference() {
        let f = setup().await;
        let category = f
            .categories
            .create(&Category::new("News".into(), String::new(), "news".into()))
            .await
            .unwrap();
        let mut p = post(f.author_id, "Survivor", Utc::now());
        p.category_id = Some(category.id);
        let created = f.posts.create(&p).await.unwrap();

        f.categories.delete(category.id).await.unwrap();

        let found = f.posts.get_by_id(created.id).await.unwrap().expect("post must survive");
        assert_eq!(found.category_id, None);
    }

    #[tokio::test]
    async fn test_deleting_location_nulls_reference() {
        let f = setup().await;
        let locations = SqlxLocationRepository::new(f.pool.clone());
        let location = locations
            .create(&Location {
                id: 0,
                name: "Paris".into(),
                is_published: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let mut p = post(f.author_id, "Trip", Utc::now());
        p.location_id = Some(location.id);
        let created = f.posts.create(&p).await.unwrap();

        locations.delete(location.id).await.unwrap();

        let found = f.posts.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.location_id, None);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_comments() {
        let f = setup().await;
        let created = f.posts.create(&post(f.author_id, "Doomed", Utc::now())).await.unwrap();
        add_comment(&f.pool, created.id, f.author_id).await;

        f.posts.delete(created.id).await.unwrap();

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(f.pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(remaining, 0);
        assert!(f.posts.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_rewrites_fields() {
        let f = setup().await;
        let mut created = f.posts.create(&post(f.author_id, "Before", Utc::now())).await.unwrap();

        created.title = "After".to_string();
        created.image = Some("posts_images/x.png".to_string());
        created.is_published = false;
        let updated = f.posts.update(&created).await.unwrap();

        assert_eq!(updated.title, "After");
        assert_eq!(updated.image.as_deref(), Some("posts_images/x.png"));
        assert!(!updated.is_published);
    }
}
