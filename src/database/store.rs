use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use std::fmt;

use crate::models::{Otp, Placement, PlacementSlot, ProfileUpdate, User};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A unique index (email, username, otp email) rejected the write.
    Duplicate(String),
    Database(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Duplicate(msg) => write!(f, "Duplicate key: {}", msg),
            StoreError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Every document-store operation the service performs. `MongoDB` is the production
/// backend; `MemoryStore` backs local development and the test suite.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn find_user_by_roll(&self, roll_number: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    /// Returns the updated document, or `None` if no user has this id.
    async fn update_profile(
        &self,
        id: &ObjectId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, StoreError>;
    /// `None` removes the stored token.
    async fn set_refresh_token(&self, id: &ObjectId, token: Option<&str>) -> Result<(), StoreError>;
    async fn set_verified(
        &self,
        roll_number: &str,
        verified: bool,
    ) -> Result<Option<User>, StoreError>;
    /// Points `slot` at `placement_id` in one atomic write. Returns the updated user
    /// together with the placement id the slot held before, or `None` if no user has this id.
    async fn set_placement(
        &self,
        id: &ObjectId,
        slot: PlacementSlot,
        placement_id: &ObjectId,
    ) -> Result<Option<(User, Option<ObjectId>)>, StoreError>;

    /// Stores the code for its email, replacing any code issued earlier.
    async fn upsert_otp(&self, otp: &Otp) -> Result<(), StoreError>;
    /// Atomically deletes the unexpired OTP matching both email and code. Returns
    /// whether one was consumed.
    async fn consume_otp(&self, email: &str, code: &str) -> Result<bool, StoreError>;

    async fn insert_placement(&self, placement: &Placement) -> Result<(), StoreError>;
    async fn find_placements(&self, ids: &[ObjectId]) -> Result<Vec<Placement>, StoreError>;
    async fn delete_placement(&self, id: &ObjectId) -> Result<(), StoreError>;
}
