use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use std::time::Duration;

use super::store::{Store, StoreError};
use crate::models::{Otp, Placement, PlacementSlot, ProfileUpdate, User};

const USERS: &str = "users";
const OTPS: &str = "otps";
const PLACEMENTS: &str = "placements";

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str, fallback_db_name: &str) -> Result<Self, StoreError> {
        let mut client_options = ClientOptions::parse(uri).await?;

        // Connection pool
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(Duration::from_secs(300));

        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));

        let db_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| fallback_db_name.to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await;

        Ok(mongodb)
    }

    /// Unique identity indexes plus the OTP TTL index. Failures are logged; the service
    /// still starts against a database whose indexes were created out of band.
    async fn ensure_indexes(&self) {
        log::info!("🔧 Creating database indexes...");

        let unique = || IndexOptions::builder().unique(true).build();
        let indexes: Vec<(&str, &str, IndexModel)> = vec![
            (
                USERS,
                "users(email) unique",
                IndexModel::builder().keys(doc! { "email": 1 }).options(unique()).build(),
            ),
            (
                USERS,
                "users(username) unique",
                IndexModel::builder().keys(doc! { "username": 1 }).options(unique()).build(),
            ),
            (
                USERS,
                "users(rollNumber)",
                IndexModel::builder().keys(doc! { "rollNumber": 1 }).build(),
            ),
            (
                OTPS,
                "otps(email) unique",
                IndexModel::builder().keys(doc! { "email": 1 }).options(unique()).build(),
            ),
            (
                OTPS,
                "otps(expiresAt) ttl",
                IndexModel::builder()
                    .keys(doc! { "expiresAt": 1 })
                    .options(
                        IndexOptions::builder()
                            .expire_after(Duration::from_secs(0))
                            .build(),
                    )
                    .build(),
            ),
            (
                PLACEMENTS,
                "placements(student)",
                IndexModel::builder().keys(doc! { "student": 1 }).build(),
            ),
        ];

        for (collection, label, index) in indexes {
            match self
                .db
                .collection::<Document>(collection)
                .create_index(index)
                .await
            {
                Ok(_) => log::info!("   ✅ Index ready: {}", label),
                Err(e) => log::warn!("   ⚠️  Could not create index {}: {}", label, e),
            }
        }

        log::info!("✅ Database indexes ready");
    }

    fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    fn users(&self) -> Collection<User> {
        self.collection(USERS)
    }

    fn otps(&self) -> Collection<Otp> {
        self.collection(OTPS)
    }

    fn placements(&self) -> Collection<Placement> {
        self.collection(PLACEMENTS)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        ErrorKind::Command(e) => e.code == 11000,
        _ => false,
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            StoreError::Duplicate(err.to_string())
        } else {
            StoreError::Database(err.to_string())
        }
    }
}

#[async_trait]
impl Store for MongoDB {
    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(doc! { "_id": *id }).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .find_one(doc! { "email": email.to_lowercase() })
            .await?)
    }

    async fn find_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let filter = doc! {
            "$or": [
                { "username": username.to_lowercase() },
                { "email": email.to_lowercase() },
            ]
        };
        Ok(self.users().find_one(filter).await?)
    }

    async fn find_user_by_roll(&self, roll_number: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .find_one(doc! { "rollNumber": roll_number })
            .await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let cursor = self
            .users()
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.users().insert_one(user).await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: &ObjectId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": update.to_set_document() })
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn set_refresh_token(&self, id: &ObjectId, token: Option<&str>) -> Result<(), StoreError> {
        let update = match token {
            Some(token) => doc! { "$set": { "refreshToken": token } },
            None => doc! { "$unset": { "refreshToken": 1 } },
        };
        self.users().update_one(doc! { "_id": *id }, update).await?;
        Ok(())
    }

    async fn set_verified(
        &self,
        roll_number: &str,
        verified: bool,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .find_one_and_update(
                doc! { "rollNumber": roll_number },
                doc! { "$set": { "isVerified": verified, "updatedAt": DateTime::now() } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn set_placement(
        &self,
        id: &ObjectId,
        slot: PlacementSlot,
        placement_id: &ObjectId,
    ) -> Result<Option<(User, Option<ObjectId>)>, StoreError> {
        let now = DateTime::now();
        let mut set = Document::new();
        set.insert(slot.field(), *placement_id);
        set.insert("updatedAt", now);

        // The pre-image names the placement this write displaced
        let previous = self
            .users()
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": set })
            .return_document(ReturnDocument::Before)
            .await?;

        Ok(previous.map(|mut user| {
            let replaced = user.placement_ref(slot);
            user.set_placement_ref(slot, Some(*placement_id));
            user.updated_at = Some(now);
            (user, replaced)
        }))
    }

    async fn upsert_otp(&self, otp: &Otp) -> Result<(), StoreError> {
        self.otps()
            .replace_one(doc! { "email": otp.email.as_str() }, otp)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn consume_otp(&self, email: &str, code: &str) -> Result<bool, StoreError> {
        let filter = doc! {
            "email": email.to_lowercase(),
            "otp": code.trim(),
            "expiresAt": { "$gt": DateTime::now() },
        };
        Ok(self.otps().find_one_and_delete(filter).await?.is_some())
    }

    async fn insert_placement(&self, placement: &Placement) -> Result<(), StoreError> {
        self.placements().insert_one(placement).await?;
        Ok(())
    }

    async fn find_placements(&self, ids: &[ObjectId]) -> Result<Vec<Placement>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self
            .placements()
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_placement(&self, id: &ObjectId) -> Result<(), StoreError> {
        self.placements().delete_one(doc! { "_id": *id }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_round_trip() {
        dotenv::dotenv().ok();
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/student_portal_test".to_string());

        let db = MongoDB::new(&uri, "student_portal_test").await.unwrap();
        db.ping().await.unwrap();

        let otp = Otp::new("mongo-test@example.com", "424242".into(), 60);
        db.upsert_otp(&otp).await.unwrap();
        assert!(!db.consume_otp(&otp.email, "000000").await.unwrap());
        assert!(db.consume_otp(&otp.email, "424242").await.unwrap());
        assert!(!db.consume_otp(&otp.email, "424242").await.unwrap());
    }
}
