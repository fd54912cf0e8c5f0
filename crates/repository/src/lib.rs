//! # Business Repository Layer
//!
//! This module provides the repository trait for the business directory and
//! its two implementations: an in-memory store and a PostgreSQL store.
//! Both expose the same external contract, including the derived review
//! aggregates (`total_reviews`, truncated `avg_rating`, bounded
//! `latest_reviews` window).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use model::{
    Business, BusinessKind, CreateOnlineBusiness, CreatePhysicalBusiness, CreateReview,
    LATEST_REVIEWS_WINDOW, Review,
};
use thiserror::Error;
use tokio::sync::RwLock;

/// # RepositoryError
///
/// Error conditions that can arise when interacting with the storage layer.
/// Expected failure modes are tagged variants the caller must handle;
/// storage faults wrap the underlying cause and never escape as panics.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),
    /// Failed to obtain a connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    /// The id string does not match the backend's identifier format.
    #[error("Malformed business id: {0}")]
    InvalidId(String),
    /// A stored record could not be mapped back to a model type.
    #[error("Inconsistent record: {0}")]
    Corrupt(String),
    /// No result found.
    #[error("Not found")]
    NotFound,
}

/// # BusinessRepository
///
/// Storage abstraction for the business directory. Implementations assign
/// ids and review timestamps; callers are expected to have validated
/// business rules (name length, rating range) already.
#[async_trait]
pub trait BusinessRepository: Send + Sync {
    /// Persist a new online business and return it with zeroed aggregates.
    async fn create_online(
        &self,
        input: CreateOnlineBusiness,
    ) -> Result<Business, RepositoryError>;

    /// Persist a new physical business and return it with zeroed aggregates.
    async fn create_physical(
        &self,
        input: CreatePhysicalBusiness,
    ) -> Result<Business, RepositoryError>;

    /// Fetch a business by id, with aggregates computed over its full
    /// review history. Unknown ids yield [`RepositoryError::NotFound`].
    async fn get(&self, id: &str) -> Result<Business, RepositoryError>;

    /// Persist a review for an existing business. Creating a review for a
    /// business that does not exist fails; it never crashes the caller.
    async fn create_review(
        &self,
        business_id: &str,
        input: CreateReview,
    ) -> Result<Review, RepositoryError>;
}

/// Average rating truncated (not rounded) to one decimal place.
///
/// Computed in integer arithmetic as floor(10 * sum / count) / 10 so the
/// result is exact; 0 when there are no reviews.
pub fn truncated_average(rating_sum: i64, total_reviews: u64) -> f64 {
    if total_reviews == 0 {
        return 0.0;
    }
    let tenths = rating_sum * 10 / total_reviews as i64;
    tenths as f64 / 10.0
}

/// The latest-reviews window: most-recent-first by `creation_date`,
/// truncated to [`LATEST_REVIEWS_WINDOW`].
///
/// The sort is stable, so reviews sharing a timestamp keep their insertion
/// order (the SQL backend mirrors this with a secondary `id ASC` key).
pub fn latest_reviews(reviews: &[Review]) -> Vec<Review> {
    let mut window: Vec<Review> = reviews.to_vec();
    window.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
    window.truncate(LATEST_REVIEWS_WINDOW);
    window
}

/// In-memory record: the business profile plus its full review history in
/// insertion order. Aggregates are derived on fetch, never stored.
#[derive(Debug, Clone)]
struct StoredBusiness {
    id: String,
    name: String,
    email: String,
    kind: BusinessKind,
    reviews: Vec<Review>,
}

impl StoredBusiness {
    fn to_business(&self) -> Business {
        let rating_sum: i64 = self.reviews.iter().map(|r| i64::from(r.rating)).sum();
        let total_reviews = self.reviews.len() as u64;
        Business {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            kind: self.kind.clone(),
            total_reviews,
            avg_rating: truncated_average(rating_sum, total_reviews),
            latest_reviews: latest_reviews(&self.reviews),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    businesses: HashMap<String, StoredBusiness>,
}

/// In-memory implementation of the [`BusinessRepository`] trait.
///
/// The store owns its own id counter (first issued id is `"1"`) and record
/// map behind a single `RwLock`; there is no global state, so each server
/// or test constructs an isolated instance. The write lock serializes
/// review append-and-recompute, which keeps the operation atomic on a
/// multi-threaded runtime.
#[derive(Debug, Default)]
pub struct MemoryBusinessRepository {
    inner: RwLock<MemoryState>,
}

impl MemoryBusinessRepository {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert(&self, name: String, email: String, kind: BusinessKind) -> Business {
        let mut state = self.inner.write().await;
        state.next_id += 1;
        let id = state.next_id.to_string();
        let record = StoredBusiness {
            id: id.clone(),
            name,
            email,
            kind,
            reviews: Vec::new(),
        };
        let business = record.to_business();
        state.businesses.insert(id, record);
        business
    }
}

#[async_trait]
impl BusinessRepository for MemoryBusinessRepository {
    async fn create_online(
        &self,
        input: CreateOnlineBusiness,
    ) -> Result<Business, RepositoryError> {
        let kind = BusinessKind::Online {
            website: input.website,
        };
        Ok(self.insert(input.name, input.email, kind).await)
    }

    async fn create_physical(
        &self,
        input: CreatePhysicalBusiness,
    ) -> Result<Business, RepositoryError> {
        let kind = BusinessKind::Physical {
            address: input.address,
            phone: input.phone,
        };
        Ok(self.insert(input.name, input.email, kind).await)
    }

    async fn get(&self, id: &str) -> Result<Business, RepositoryError> {
        let state = self.inner.read().await;
        match state.businesses.get(id) {
            Some(record) => Ok(record.to_business()),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn create_review(
        &self,
        business_id: &str,
        input: CreateReview,
    ) -> Result<Review, RepositoryError> {
        let mut state = self.inner.write().await;
        let record = state
            .businesses
            .get_mut(business_id)
            .ok_or(RepositoryError::NotFound)?;
        let review = Review {
            business_id: business_id.to_string(),
            text: input.text,
            rating: input.rating,
            username: input.username,
            creation_date: Utc::now(),
        };
        record.reviews.push(review.clone());
        Ok(review)
    }
}

/// PostgreSQL implementation of the [`BusinessRepository`] trait.
///
/// Businesses keep denormalized `total_reviews`/`rating_sum` counters that
/// are incremented in the same transaction as the review insert, so the
/// aggregate update is atomic rather than a read-mutate-write round trip.
/// The BIGSERIAL key is rendered as an opaque string at the API boundary.
pub struct PgBusinessRepository {
    pool: Pool,
}

impl PgBusinessRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn parse_id(id: &str) -> Result<i64, RepositoryError> {
        id.parse::<i64>()
            .map_err(|_| RepositoryError::InvalidId(id.to_string()))
    }

    async fn insert(
        &self,
        kind_tag: &str,
        name: &str,
        email: &str,
        website: Option<&str>,
        address: Option<&str>,
        phone: Option<&str>,
        kind: BusinessKind,
    ) -> Result<Business, RepositoryError> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO businesses (kind, name, email, website, address, phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
        "#;
        let row = client
            .query_one(query, &[&kind_tag, &name, &email, &website, &address, &phone])
            .await?;
        let id: i64 = row.get("id");
        Ok(Business {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            kind,
            total_reviews: 0,
            avg_rating: 0.0,
            latest_reviews: Vec::new(),
        })
    }
}

fn row_to_kind(row: &tokio_postgres::Row) -> Result<BusinessKind, RepositoryError> {
    let kind: String = row.get("kind");
    match kind.as_str() {
        "online" => Ok(BusinessKind::Online {
            website: row.get::<_, Option<String>>("website").unwrap_or_default(),
        }),
        "physical" => Ok(BusinessKind::Physical {
            address: row.get::<_, Option<String>>("address").unwrap_or_default(),
            phone: row.get::<_, Option<String>>("phone").unwrap_or_default(),
        }),
        other => Err(RepositoryError::Corrupt(format!(
            "unknown business kind '{other}'"
        ))),
    }
}

#[async_trait]
impl BusinessRepository for PgBusinessRepository {
    async fn create_online(
        &self,
        input: CreateOnlineBusiness,
    ) -> Result<Business, RepositoryError> {
        let kind = BusinessKind::Online {
            website: input.website.clone(),
        };
        self.insert(
            "online",
            &input.name,
            &input.email,
            Some(&input.website),
            None,
            None,
            kind,
        )
        .await
    }

    async fn create_physical(
        &self,
        input: CreatePhysicalBusiness,
    ) -> Result<Business, RepositoryError> {
        let kind = BusinessKind::Physical {
            address: input.address.clone(),
            phone: input.phone.clone(),
        };
        self.insert(
            "physical",
            &input.name,
            &input.email,
            None,
            Some(&input.address),
            Some(&input.phone),
            kind,
        )
        .await
    }

    async fn get(&self, id: &str) -> Result<Business, RepositoryError> {
        let business_id = Self::parse_id(id)?;
        let client = self.pool.get().await?;

        let query = r#"
            SELECT kind, name, email, website, address, phone, total_reviews, rating_sum
            FROM businesses WHERE id = $1
        "#;
        let row = client.query_opt(query, &[&business_id]).await?;
        let row = match row {
            Some(row) => row,
            None => return Err(RepositoryError::NotFound),
        };

        let kind = row_to_kind(&row)?;
        let total_reviews: i64 = row.get("total_reviews");
        let rating_sum: i64 = row.get("rating_sum");

        // Ties in creation_date fall back to insertion order via the serial key.
        let reviews_query = r#"
            SELECT text, rating, username, creation_date
            FROM reviews WHERE business_id = $1
            ORDER BY creation_date DESC, id ASC
            LIMIT $2
        "#;
        let limit = LATEST_REVIEWS_WINDOW as i64;
        let rows = client.query(reviews_query, &[&business_id, &limit]).await?;
        let mut window = Vec::with_capacity(rows.len());
        for row in rows {
            window.push(Review {
                business_id: id.to_string(),
                text: row.get("text"),
                rating: row.get("rating"),
                username: row.get("username"),
                creation_date: row.get("creation_date"),
            });
        }

        Ok(Business {
            id: id.to_string(),
            name: row.get("name"),
            email: row.get("email"),
            kind,
            total_reviews: total_reviews.max(0) as u64,
            avg_rating: truncated_average(rating_sum, total_reviews.max(0) as u64),
            latest_reviews: window,
        })
    }

    async fn create_review(
        &self,
        business_id: &str,
        input: CreateReview,
    ) -> Result<Review, RepositoryError> {
        let key = Self::parse_id(business_id)?;
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        // Counter update and review insert commit together; zero updated
        // rows means the business was never created.
        let updated = tx
            .execute(
                r#"
                UPDATE businesses
                SET total_reviews = total_reviews + 1, rating_sum = rating_sum + $2
                WHERE id = $1
                "#,
                &[&key, &i64::from(input.rating)],
            )
            .await?;
        if updated == 0 {
            return Err(RepositoryError::NotFound);
        }

        let row = tx
            .query_one(
                r#"
                INSERT INTO reviews (business_id, text, rating, username)
                VALUES ($1, $2, $3, $4)
                RETURNING creation_date
                "#,
                &[&key, &input.text, &input.rating, &input.username],
            )
            .await?;
        let creation_date = row.get("creation_date");

        tx.commit().await?;

        Ok(Review {
            business_id: business_id.to_string(),
            text: input.text,
            rating: input.rating,
            username: input.username,
            creation_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn sample_review(rating: i32, offset_secs: i64) -> Review {
        Review {
            business_id: "1".to_string(),
            text: "a review body long enough to pass validation".to_string(),
            rating,
            username: format!("user{rating}"),
            creation_date: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap()
                + Duration::seconds(offset_secs),
        }
    }

    fn online_input(name: &str) -> CreateOnlineBusiness {
        CreateOnlineBusiness {
            name: name.to_string(),
            website: "test.com".to_string(),
            email: "test@test.com".to_string(),
        }
    }

    #[test]
    fn test_truncated_average_empty() {
        assert_eq!(truncated_average(0, 0), 0.0);
    }

    #[test]
    fn test_truncated_average_truncates_not_rounds() {
        // 11 / 3 = 3.666... -> 3.6, where rounding would give 3.7
        assert_eq!(truncated_average(11, 3), 3.6);
        // 13 / 4 = 3.25 -> 3.2
        assert_eq!(truncated_average(13, 4), 3.2);
        // Exact tenths pass through unchanged.
        assert_eq!(truncated_average(9, 2), 4.5);
        assert_eq!(truncated_average(29, 10), 2.9);
    }

    #[test]
    fn test_latest_reviews_window_is_bounded_and_ordered() {
        let reviews = vec![
            sample_review(1, 0),
            sample_review(3, 1),
            sample_review(4, 2),
            sample_review(5, 3),
        ];
        let window = latest_reviews(&reviews);
        let ratings: Vec<i32> = window.iter().map(|r| r.rating).collect();
        assert_eq!(ratings, vec![5, 4, 3]);
    }

    #[test]
    fn test_latest_reviews_ties_keep_insertion_order() {
        // Two reviews share a timestamp; the earlier insertion stays first.
        let reviews = vec![sample_review(2, 5), sample_review(3, 5), sample_review(4, 0)];
        let window = latest_reviews(&reviews);
        let ratings: Vec<i32> = window.iter().map(|r| r.rating).collect();
        assert_eq!(ratings, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_memory_create_and_get() {
        let repo = MemoryBusinessRepository::new();
        let created = repo.create_online(online_input("test")).await.unwrap();
        assert_eq!(created.id, "1");

        let fetched = repo.get("1").await.unwrap();
        assert_eq!(fetched.name, "test");
        assert_eq!(fetched.email, "test@test.com");
        assert_eq!(
            fetched.kind,
            BusinessKind::Online {
                website: "test.com".to_string()
            }
        );
        assert_eq!(fetched.total_reviews, 0);
        assert_eq!(fetched.avg_rating, 0.0);
        assert!(fetched.latest_reviews.is_empty());
    }

    #[tokio::test]
    async fn test_memory_ids_are_sequential_per_store() {
        let repo = MemoryBusinessRepository::new();
        let first = repo.create_online(online_input("a")).await.unwrap();
        let second = repo
            .create_physical(CreatePhysicalBusiness {
                name: "b".to_string(),
                address: "1 Main St".to_string(),
                phone: "+1000000000".to_string(),
                email: "b@test.com".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(second.id, "2");

        // A fresh store starts counting again; no shared global counter.
        let other = MemoryBusinessRepository::new();
        let fresh = other.create_online(online_input("c")).await.unwrap();
        assert_eq!(fresh.id, "1");
    }

    #[tokio::test]
    async fn test_memory_get_unknown_id_is_not_found() {
        let repo = MemoryBusinessRepository::new();
        match repo.get("42").await {
            Err(RepositoryError::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_memory_review_updates_aggregates() {
        let repo = MemoryBusinessRepository::new();
        let business = repo.create_online(online_input("test")).await.unwrap();

        for rating in [1, 3, 4, 5] {
            repo.create_review(
                &business.id,
                CreateReview {
                    text: "a review body long enough to pass validation".to_string(),
                    rating,
                    username: "tester".to_string(),
                },
            )
            .await
            .unwrap();
        }

        let fetched = repo.get(&business.id).await.unwrap();
        assert_eq!(fetched.total_reviews, 4);
        // 13 / 4 = 3.25, truncated to 3.2
        assert_eq!(fetched.avg_rating, 3.2);
        let ratings: Vec<i32> = fetched.latest_reviews.iter().map(|r| r.rating).collect();
        assert_eq!(ratings, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn test_memory_orphan_review_fails() {
        let repo = MemoryBusinessRepository::new();
        let result = repo
            .create_review(
                "999",
                CreateReview {
                    text: "a review body long enough to pass validation".to_string(),
                    rating: 5,
                    username: "tester".to_string(),
                },
            )
            .await;
        match result {
            Err(RepositoryError::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_pg_id_parsing() {
        assert!(PgBusinessRepository::parse_id("17").is_ok());
        match PgBusinessRepository::parse_id("not-a-number") {
            Err(RepositoryError::InvalidId(id)) => assert_eq!(id, "not-a-number"),
            other => panic!("expected InvalidId, got {other:?}"),
        }
    }
}
