//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Used when no
//! `DATABASE_URL` is configured and by the HTTP tests. Nothing survives a
//! restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reading_groups_core::domain::{Group, GroupFilter, NewGroup, User, UserCredentials};
use reading_groups_core::ports::{DatabaseService, PortError, PortResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, (User, String)>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    groups: HashMap<Uuid, Group>,
}

#[derive(Default)]
pub struct InMemoryDb {
    state: RwLock<MemoryState>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(filter: &GroupFilter, group: &Group) -> bool {
    match filter {
        GroupFilter::All => true,
        GroupFilter::Global => group.global,
        GroupFilter::SharedWith(email) => !group.is_owner(email) && group.member(email).is_some(),
        GroupFilter::OwnedBy(email) => group.is_owner(email),
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> PortResult<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|(u, _)| u.email.eq_ignore_ascii_case(email))
        {
            return Err(PortError::Invalid(format!(
                "Email {} is already registered",
                email
            )));
        }
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            photo_url: photo_url.map(str::to_string),
        };
        state
            .users
            .insert(user.user_id, (user.clone(), hashed_password.to_string()));
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.state
            .read()
            .await
            .users
            .get(&user_id)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.state
            .read()
            .await
            .users
            .values()
            .find(|(u, _)| u.email.eq_ignore_ascii_case(email))
            .map(|(u, hash)| UserCredentials {
                user_id: u.user_id,
                email: u.email.clone(),
                hashed_password: hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn count_users(&self) -> PortResult<u64> {
        Ok(self.state.read().await.users.len() as u64)
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.state
            .write()
            .await
            .auth_sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.state.read().await.auth_sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.state.write().await.auth_sessions.remove(session_id);
        Ok(())
    }

    async fn create_group(&self, new_group: NewGroup) -> PortResult<Group> {
        self.insert_group(new_group.into_group(Uuid::new_v4(), Utc::now()))
            .await
    }

    async fn insert_group(&self, group: Group) -> PortResult<Group> {
        let mut state = self.state.write().await;
        if state.groups.contains_key(&group.id) {
            return Err(PortError::Invalid(format!("Group {} already exists", group.id)));
        }
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn get_group(&self, group_id: Uuid) -> PortResult<Group> {
        self.state
            .read()
            .await
            .groups
            .get(&group_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group_id)))
    }

    async fn save_group(&self, group: &Group) -> PortResult<Group> {
        let mut state = self.state.write().await;
        let stored = state
            .groups
            .get_mut(&group.id)
            .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group.id)))?;
        if stored.version != group.version {
            return Err(PortError::Conflict(format!(
                "Group {} changed since version {}",
                group.id, group.version
            )));
        }
        let mut saved = group.clone();
        saved.version += 1;
        *stored = saved.clone();
        Ok(saved)
    }

    async fn list_groups(&self, filter: &GroupFilter) -> PortResult<Vec<Group>> {
        let state = self.state.read().await;
        let mut groups: Vec<Group> = state
            .groups
            .values()
            .filter(|g| matches(filter, g))
            .cloned()
            .collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(groups)
    }

    async fn count_groups(&self, filter: &GroupFilter) -> PortResult<u64> {
        let state = self.state.read().await;
        Ok(state.groups.values().filter(|g| matches(filter, g)).count() as u64)
    }
}
