//! Location repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Location;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn create(&self, location: &Location) -> Result<Location>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>>;

    /// List all locations ordered by name
    async fn list(&self) -> Result<Vec<Location>>;

    async fn update(&self, location: &Location) -> Result<Location>;

    /// Delete a location; posts placed there lose the reference
    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxLocationRepository {
    pool: DynDatabasePool,
}

impl SqlxLocationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LocationRepository> {
        Arc::new(Self::new(pool))
    }
}

const LOCATION_COLUMNS: &str = "id, name, is_published, created_at";

macro_rules! row_to_location {
    ($row:expr) => {
        Location {
            id: $row.get("id"),
            name: $row.get("name"),
            is_published: $row.get("is_published"),
            created_at: $row.get("created_at"),
        }
    };
}

#[async_trait]
impl LocationRepository for SqlxLocationRepository {
    async fn create(&self, location: &Location) -> Result<Location> {
        let sql = "INSERT INTO locations (name, is_published, created_at) VALUES (?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&location.name)
                .bind(location.is_published)
                .bind(location.created_at)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create location")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&location.name)
                .bind(location.is_published)
                .bind(location.created_at)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create location")?
                .last_insert_id() as i64,
        };

        Ok(Location {
            id,
            ..location.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>> {
        let sql = format!("SELECT {} FROM locations WHERE id = ?", LOCATION_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get location by ID")?;
                Ok(row.map(|row| row_to_location!(row)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get location by ID")?;
                Ok(row.map(|row| row_to_location!(row)))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Location>> {
        let sql = format!("SELECT {} FROM locations ORDER BY name, id", LOCATION_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list locations")?;
                Ok(rows.into_iter().map(|row| row_to_location!(row)).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list locations")?;
                Ok(rows.into_iter().map(|row| row_to_location!(row)).collect())
            }
        }
    }

    async fn update(&self, location: &Location) -> Result<Location> {
        let sql = "UPDATE locations SET name = ?, is_published = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&location.name)
                    .bind(location.is_published)
                    .bind(location.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update location")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&location.name)
                    .bind(location.is_published)
                    .bind(location.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update location")?;
            }
        }

        self.get_by_id(location.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Location not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM locations WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete location")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete location")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Utc;

    fn location(name: &str) -> Location {
        Location {
            id: 0,
            name: name.to_string(),
            is_published: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_location_crud() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxLocationRepository::new(pool);

        let mut created = repo.create(&location("Moscow")).await.unwrap();
        repo.create(&location("Berlin")).await.unwrap();

        let names: Vec<_> = repo.list().await.unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Berlin", "Moscow"]);

        created.is_published = false;
        let updated = repo.update(&created).await.unwrap();
        assert!(!updated.is_published);

        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}
