//! Location service

use crate::db::repositories::LocationRepository;
use crate::models::{CreateLocationInput, Location, UpdateLocationInput};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

pub const NAME_MAX_LEN: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum LocationServiceError {
    #[error("Location not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct LocationService {
    repo: Arc<dyn LocationRepository>,
}

impl LocationService {
    pub fn new(repo: Arc<dyn LocationRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CreateLocationInput) -> Result<Location, LocationServiceError> {
        let name = validate_name(&input.name)?;
        let location = Location {
            id: 0,
            name,
            is_published: input.is_published,
            created_at: Utc::now(),
        };
        let created = self
            .repo
            .create(&location)
            .await
            .context("Failed to create location")?;
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Location>, LocationServiceError> {
        let location = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get location")?;
        Ok(location)
    }

    pub async fn list(&self) -> Result<Vec<Location>, LocationServiceError> {
        let locations = self.repo.list().await.context("Failed to list locations")?;
        Ok(locations)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateLocationInput,
    ) -> Result<Location, LocationServiceError> {
        let mut location = self
            .get_by_id(id)
            .await?
            .ok_or(LocationServiceError::NotFound(id))?;

        if let Some(name) = input.name {
            location.name = validate_name(&name)?;
        }
        if let Some(is_published) = input.is_published {
            location.is_published = is_published;
        }

        let updated = self
            .repo
            .update(&location)
            .await
            .context("Failed to update location")?;
        Ok(updated)
    }

    /// Delete a location; posts placed there keep existing without one
    pub async fn delete(&self, id: i64) -> Result<(), LocationServiceError> {
        if self.get_by_id(id).await?.is_none() {
            return Err(LocationServiceError::NotFound(id));
        }
        self.repo
            .delete(id)
            .await
            .context("Failed to delete location")?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, LocationServiceError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > NAME_MAX_LEN {
        return Err(LocationServiceError::ValidationError(format!(
            "Name must be 1-{} characters",
            NAME_MAX_LEN
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxLocationRepository;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_location_lifecycle() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = LocationService::new(SqlxLocationRepository::boxed(pool));

        let created = service
            .create(CreateLocationInput {
                name: "  Kazan ".to_string(),
                is_published: true,
            })
            .await
            .unwrap();
        assert_eq!(created.name, "Kazan");

        let updated = service
            .update(
                created.id,
                UpdateLocationInput {
                    name: None,
                    is_published: Some(false),
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_published);

        service.delete(created.id).await.unwrap();
        assert!(matches!(
            service.delete(created.id).await,
            Err(LocationServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = LocationService::new(SqlxLocationRepository::boxed(pool));

        let result = service
            .create(CreateLocationInput {
                name: "   ".to_string(),
                is_published: true,
            })
            .await;
        assert!(matches!(result, Err(LocationServiceError::ValidationError(_))));
    }
}
