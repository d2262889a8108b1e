use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::store::{Store, StoreError};
use crate::models::{Otp, Placement, PlacementSlot, ProfileUpdate, User};
use crate::utils::otp::codes_match;

#[derive(Default)]
struct MemoryState {
    users: HashMap<ObjectId, User>,
    otps: HashMap<String, Otp>,
    placements: HashMap<ObjectId, Placement>,
}

impl MemoryState {
    fn identity_taken(&self, username: &str, email: &str, except: Option<ObjectId>) -> bool {
        self.users.values().any(|u| {
            Some(u.id) != except
                && (u.username.eq_ignore_ascii_case(username) || u.email.eq_ignore_ascii_case(email))
        })
    }
}

/// In-process document store with the same uniqueness and OTP guarantees as the
/// MongoDB backend. Used when no `DATABASE_URL` is configured and by the tests.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }

    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username) || u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_roll(&self, roll_number: &str) -> Result<Option<User>, StoreError> {
        let state = self.read()?;
        let mut matches: Vec<&User> = state
            .users
            .values()
            .filter(|u| u.roll_number == roll_number)
            .collect();
        matches.sort_by_key(|u| u.id);
        Ok(matches.first().map(|u| (*u).clone()))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.identity_taken(&user.username, &user.email, None) {
            return Err(StoreError::Duplicate(format!(
                "username '{}' or email '{}'",
                user.username, user.email
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_profile(
        &self,
        id: &ObjectId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.write()?;
        if let Some(email) = &update.email {
            if state.users.values().any(|u| u.id != *id && u.email.eq_ignore_ascii_case(email)) {
                return Err(StoreError::Duplicate(format!("email '{}'", email)));
            }
        }
        Ok(state.users.get_mut(id).map(|user| {
            update.apply(user);
            user.clone()
        }))
    }

    async fn set_refresh_token(&self, id: &ObjectId, token: Option<&str>) -> Result<(), StoreError> {
        if let Some(user) = self.write()?.users.get_mut(id) {
            user.refresh_token = token.map(|t| t.to_string());
        }
        Ok(())
    }

    async fn set_verified(
        &self,
        roll_number: &str,
        verified: bool,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.write()?;
        let target = state
            .users
            .values()
            .filter(|u| u.roll_number == roll_number)
            .map(|u| u.id)
            .min();
        let Some(id) = target else {
            return Ok(None);
        };
        Ok(state.users.get_mut(&id).map(|user| {
            user.is_verified = verified;
            user.updated_at = Some(DateTime::now());
            user.clone()
        }))
    }

    async fn set_placement(
        &self,
        id: &ObjectId,
        slot: PlacementSlot,
        placement_id: &ObjectId,
    ) -> Result<Option<(User, Option<ObjectId>)>, StoreError> {
        Ok(self.write()?.users.get_mut(id).map(|user| {
            let replaced = user.placement_ref(slot);
            user.set_placement_ref(slot, Some(*placement_id));
            user.updated_at = Some(DateTime::now());
            (user.clone(), replaced)
        }))
    }

    async fn upsert_otp(&self, otp: &Otp) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let now = DateTime::now();
        state.otps.retain(|_, issued| !issued.is_expired_at(now));
        state.otps.insert(otp.email.to_lowercase(), otp.clone());
        Ok(())
    }

    async fn consume_otp(&self, email: &str, code: &str) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        let key = email.to_lowercase();
        let matches = state
            .otps
            .get(&key)
            .map(|otp| !otp.is_expired_at(DateTime::now()) && codes_match(code, &otp.otp))
            .unwrap_or(false);
        if matches {
            state.otps.remove(&key);
        }
        Ok(matches)
    }

    async fn insert_placement(&self, placement: &Placement) -> Result<(), StoreError> {
        self.write()?.placements.insert(placement.id, placement.clone());
        Ok(())
    }

    async fn find_placements(&self, ids: &[ObjectId]) -> Result<Vec<Placement>, StoreError> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.placements.get(id).cloned())
            .collect())
    }

    async fn delete_placement(&self, id: &ObjectId) -> Result<(), StoreError> {
        self.write()?.placements.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, ROLE_USER};

    fn user(username: &str, email: &str, roll: &str) -> User {
        User::new(NewUser {
            username: username.into(),
            email: email.into(),
            full_name: "Test Student".into(),
            roll_number: roll.into(),
            password_hash: "hash".into(),
            id_card: None,
            roles: vec![ROLE_USER.into()],
            is_verified: false,
        })
    }

    #[tokio::test]
    async fn test_unique_identity() {
        let store = MemoryStore::new();
        store.insert_user(&user("asha", "asha@example.com", "R1")).await.unwrap();

        let same_email = store.insert_user(&user("other", "ASHA@example.com", "R2")).await;
        assert!(matches!(same_email, Err(StoreError::Duplicate(_))));

        let same_username = store.insert_user(&user("Asha", "new@example.com", "R3")).await;
        assert!(matches!(same_username, Err(StoreError::Duplicate(_))));

        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_email_update_conflict() {
        let store = MemoryStore::new();
        let first = user("asha", "asha@example.com", "R1");
        let second = user("ravi", "ravi@example.com", "R2");
        store.insert_user(&first).await.unwrap();
        store.insert_user(&second).await.unwrap();

        let update = ProfileUpdate {
            email: Some("asha@example.com".into()),
            ..Default::default()
        };
        let result = store.update_profile(&second.id, &update).await;
        assert!(matches!(result, Err(StoreError::Duplicate(_))));

        let own_email = ProfileUpdate {
            email: Some("asha@example.com".into()),
            branch: Some("cse".into()),
            ..Default::default()
        };
        let updated = store.update_profile(&first.id, &own_email).await.unwrap().unwrap();
        assert_eq!(updated.branch.as_deref(), Some("cse"));
    }

    #[tokio::test]
    async fn test_otp_is_consumed_once() {
        let store = MemoryStore::new();
        store
            .upsert_otp(&Otp::new("asha@example.com", "111111".into(), 60))
            .await
            .unwrap();
        store
            .upsert_otp(&Otp::new("asha@example.com", "222222".into(), 60))
            .await
            .unwrap();

        assert!(!store.consume_otp("asha@example.com", "111111").await.unwrap());
        assert!(store.consume_otp("Asha@Example.com", "222222").await.unwrap());
        assert!(!store.consume_otp("asha@example.com", "222222").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_otp_never_matches() {
        let store = MemoryStore::new();
        store
            .upsert_otp(&Otp::new("asha@example.com", "333333".into(), 0))
            .await
            .unwrap();
        assert!(!store.consume_otp("asha@example.com", "333333").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_otps_are_dropped_on_issue() {
        let store = MemoryStore::new();
        store
            .upsert_otp(&Otp::new("stale@example.com", "444444".into(), 0))
            .await
            .unwrap();
        store
            .upsert_otp(&Otp::new("fresh@example.com", "555555".into(), 60))
            .await
            .unwrap();

        let state = store.read().unwrap();
        assert_eq!(state.otps.len(), 1);
        assert!(state.otps.contains_key("fresh@example.com"));
    }

    #[tokio::test]
    async fn test_placement_slots() {
        let store = MemoryStore::new();
        let owner = user("asha", "asha@example.com", "R1");
        store.insert_user(&owner).await.unwrap();

        let placement = Placement {
            id: ObjectId::new(),
            student: owner.id,
            company: "Acme".into(),
            role: "SDE".into(),
            ctc: 12.0,
            date: "2024-06-01".into(),
            doc: "memory://offer".into(),
            created_at: None,
        };
        store.insert_placement(&placement).await.unwrap();

        let (updated, replaced) = store
            .set_placement(&owner.id, PlacementSlot::Three, &placement.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.placement_three, Some(placement.id));
        assert!(replaced.is_none());

        let next = ObjectId::new();
        let (_, replaced) = store
            .set_placement(&owner.id, PlacementSlot::Three, &next)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replaced, Some(placement.id));

        let found = store.find_placements(&updated.placement_refs()).await.unwrap();
        assert_eq!(found, vec![placement.clone()]);

        store.delete_placement(&placement.id).await.unwrap();
        assert!(store.find_placements(&[placement.id]).await.unwrap().is_empty());

        let missing = store
            .set_placement(&ObjectId::new(), PlacementSlot::One, &placement.id)
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
