use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum name length for an online business.
pub const ONLINE_NAME_MAX: usize = 75;
/// Maximum name length for a physical business.
pub const PHYSICAL_NAME_MAX: usize = 50;
/// Review text length bounds (inclusive).
pub const REVIEW_TEXT_MIN: usize = 20;
pub const REVIEW_TEXT_MAX: usize = 500;
/// Review rating bounds (inclusive).
pub const RATING_MIN: i32 = 1;
pub const RATING_MAX: i32 = 5;
/// How many reviews the `latest_reviews` window exposes.
pub const LATEST_REVIEWS_WINDOW: usize = 3;

/// Review — a rated, timestamped piece of feedback tied to exactly one business.
///
/// `creation_date` is assigned by the repository at insertion and is used
/// only for ordering the latest-reviews window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    #[serde(rename = "business_id")]
    pub business_id: String,
    pub text: String,
    pub rating: i32,
    pub username: String,
    #[serde(rename = "creation_date")]
    pub creation_date: DateTime<Utc>,
}

/// Variant-specific fields of a business. Internally tagged so that a
/// flattened [`Business`] serializes `type` plus the variant fields at the
/// top level of the JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BusinessKind {
    Online { website: String },
    Physical { address: String, phone: String },
}

/// Business — the main aggregate of the directory.
///
/// `total_reviews`, `avg_rating` and `latest_reviews` are derived from the
/// full review history by the repository on every fetch; they are never
/// supplied by clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub kind: BusinessKind,
    #[serde(rename = "total_reviews")]
    pub total_reviews: u64,
    #[serde(rename = "avg_rating")]
    pub avg_rating: f64,
    #[serde(rename = "latest_reviews")]
    pub latest_reviews: Vec<Review>,
}

/// Input for creating an online business.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateOnlineBusiness {
    pub name: String,
    pub website: String,
    pub email: String,
}

/// Input for creating a physical business.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatePhysicalBusiness {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
}

/// Request body of `POST /business`: an externally shaped tagged union
/// `{"type": "online"|"physical", "value": {...}}`. Unknown extra fields
/// inside `value` are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CreateBusiness {
    Online(CreateOnlineBusiness),
    Physical(CreatePhysicalBusiness),
}

/// Request body of `POST /business/{id}/reviews`.
///
/// `rating` deserializes as an integer, so fractional JSON values are
/// rejected at the parsing boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateReview {
    pub text: String,
    pub rating: i32,
    pub username: String,
}
