//! Business logic layer for the directory.
//!
//! This module defines the [`BusinessService`] trait and its async
//! implementation [`BusinessServiceImpl`]. The service validates untrusted
//! input against the directory's business rules before anything reaches the
//! repository, and folds repository failures into the [`ServiceError`]
//! taxonomy the HTTP layer maps onto status codes.
//!
//! # Features
//! - Name-length enforcement per business variant before persistence.
//! - Review text and rating bounds checking.
//! - Repository abstraction via generics for testability.
//! - Well-typed error handling via [`ServiceError`].

use async_trait::async_trait;
use model::{
    Business, CreateBusiness, CreateReview, ONLINE_NAME_MAX, PHYSICAL_NAME_MAX, RATING_MAX,
    RATING_MIN, REVIEW_TEXT_MAX, REVIEW_TEXT_MIN, Review,
};
use repository::{BusinessRepository, RepositoryError};
use thiserror::Error;
use tracing::instrument;

/// The main error type for all operations in [`BusinessService`].
///
/// Callers are expected to match exhaustively: invalid input is
/// client-caused, not-found means the id was never issued, and `Db` wraps
/// any storage-layer fault.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request violates a business rule (name length, text length,
    /// rating range).
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The requested business has no corresponding record.
    #[error("Not found")]
    NotFound,
    /// A repository (storage) operation failed.
    #[error("Database error: {0}")]
    Db(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ServiceError::NotFound,
            other => ServiceError::Db(other),
        }
    }
}

/// Trait describing the directory's operations.
///
/// Implementations guarantee that input reaching the repository has already
/// passed business-rule validation.
#[async_trait]
pub trait BusinessService: Send + Sync {
    /// Validates and persists a new business of either variant.
    ///
    /// # Errors
    /// Returns [`ServiceError::InvalidInput`] if validation fails or
    /// [`ServiceError::Db`] for storage-level errors.
    async fn create_business(&self, input: CreateBusiness) -> Result<Business, ServiceError>;

    /// Retrieves a business by id with its derived review aggregates.
    ///
    /// # Errors
    /// Returns [`ServiceError::NotFound`] for an id that was never issued,
    /// or [`ServiceError::Db`] on storage failure.
    async fn get_business(&self, id: &str) -> Result<Business, ServiceError>;

    /// Validates and persists a review for an existing business.
    ///
    /// # Errors
    /// Returns [`ServiceError::InvalidInput`] for out-of-range text or
    /// rating, [`ServiceError::NotFound`] if the business does not exist,
    /// or [`ServiceError::Db`] on storage failure.
    async fn create_review(
        &self,
        business_id: &str,
        input: CreateReview,
    ) -> Result<Review, ServiceError>;
}

/// Async implementation of [`BusinessService`] over any repository.
pub struct BusinessServiceImpl<R> {
    repo: R,
}

impl<R> BusinessServiceImpl<R>
where
    R: BusinessRepository,
{
    /// Constructs a new service around the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Enforces the per-variant name length limit.
    fn validate_business(input: &CreateBusiness) -> Result<(), ServiceError> {
        let (name, limit) = match input {
            CreateBusiness::Online(data) => (&data.name, ONLINE_NAME_MAX),
            CreateBusiness::Physical(data) => (&data.name, PHYSICAL_NAME_MAX),
        };
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("name must not be empty".into()));
        }
        if name.chars().count() > limit {
            return Err(ServiceError::InvalidInput(format!(
                "name must be at most {limit} characters"
            )));
        }
        Ok(())
    }

    /// Enforces review text length and rating range.
    fn validate_review(input: &CreateReview) -> Result<(), ServiceError> {
        let text_len = input.text.chars().count();
        if !(REVIEW_TEXT_MIN..=REVIEW_TEXT_MAX).contains(&text_len) {
            return Err(ServiceError::InvalidInput(format!(
                "text must be between {REVIEW_TEXT_MIN} and {REVIEW_TEXT_MAX} characters"
            )));
        }
        if !(RATING_MIN..=RATING_MAX).contains(&input.rating) {
            return Err(ServiceError::InvalidInput(format!(
                "rating must be between {RATING_MIN} and {RATING_MAX}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<R> BusinessService for BusinessServiceImpl<R>
where
    R: BusinessRepository,
{
    #[instrument(skip(self, input))]
    async fn create_business(&self, input: CreateBusiness) -> Result<Business, ServiceError> {
        Self::validate_business(&input)?;
        let business = match input {
            CreateBusiness::Online(data) => self.repo.create_online(data).await?,
            CreateBusiness::Physical(data) => self.repo.create_physical(data).await?,
        };
        Ok(business)
    }

    #[instrument(skip(self))]
    async fn get_business(&self, id: &str) -> Result<Business, ServiceError> {
        Ok(self.repo.get(id).await?)
    }

    #[instrument(skip(self, input))]
    async fn create_review(
        &self,
        business_id: &str,
        input: CreateReview,
    ) -> Result<Review, ServiceError> {
        Self::validate_review(&input)?;
        Ok(self.repo.create_review(business_id, input).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{CreateOnlineBusiness, CreatePhysicalBusiness};
    use repository::MemoryBusinessRepository;

    fn service() -> BusinessServiceImpl<MemoryBusinessRepository> {
        BusinessServiceImpl::new(MemoryBusinessRepository::new())
    }

    fn online_business(name: &str) -> CreateBusiness {
        CreateBusiness::Online(CreateOnlineBusiness {
            name: name.to_string(),
            website: "test.com".to_string(),
            email: "test@test.com".to_string(),
        })
    }

    fn physical_business(name: &str) -> CreateBusiness {
        CreateBusiness::Physical(CreatePhysicalBusiness {
            name: name.to_string(),
            address: "1 Main St".to_string(),
            phone: "+1000000000".to_string(),
            email: "test@test.com".to_string(),
        })
    }

    fn review(text_len: usize, rating: i32) -> CreateReview {
        CreateReview {
            text: "x".repeat(text_len),
            rating,
            username: "tester".to_string(),
        }
    }

    #[tokio::test]
    async fn test_online_name_boundary() {
        let svc = service();
        assert!(svc.create_business(online_business(&"n".repeat(75))).await.is_ok());
        match svc.create_business(online_business(&"n".repeat(76))).await {
            Err(ServiceError::InvalidInput(_)) => {}
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_physical_name_boundary() {
        let svc = service();
        assert!(svc.create_business(physical_business(&"n".repeat(50))).await.is_ok());
        match svc.create_business(physical_business(&"n".repeat(51))).await {
            Err(ServiceError::InvalidInput(_)) => {}
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let svc = service();
        match svc.create_business(online_business("")).await {
            Err(ServiceError::InvalidInput(_)) => {}
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_review_text_boundaries() {
        let svc = service();
        let business = svc.create_business(online_business("test")).await.unwrap();

        assert!(svc.create_review(&business.id, review(20, 3)).await.is_ok());
        assert!(svc.create_review(&business.id, review(500, 3)).await.is_ok());
        for bad_len in [19, 501] {
            match svc.create_review(&business.id, review(bad_len, 3)).await {
                Err(ServiceError::InvalidInput(_)) => {}
                other => panic!("expected InvalidInput for length {bad_len}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_review_rating_boundaries() {
        let svc = service();
        let business = svc.create_business(online_business("test")).await.unwrap();

        assert!(svc.create_review(&business.id, review(30, 1)).await.is_ok());
        assert!(svc.create_review(&business.id, review(30, 5)).await.is_ok());
        for bad_rating in [0, 6, -1] {
            match svc.create_review(&business.id, review(30, bad_rating)).await {
                Err(ServiceError::InvalidInput(_)) => {}
                other => panic!("expected InvalidInput for rating {bad_rating}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_review_for_missing_business_is_not_found() {
        let svc = service();
        match svc.create_review("999", review(30, 5)).await {
            Err(ServiceError::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_missing_business_is_not_found() {
        let svc = service();
        match svc.get_business("999").await {
            Err(ServiceError::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
