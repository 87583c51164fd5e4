//! crates/reading_groups_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases.

use crate::domain::{Group, GroupFilter, NewGroup, User, UserCredentials};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The record changed since it was read; the caller should re-read and retry.
    #[error("Conflicting update: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn count_users(&self) -> PortResult<u64>;

    // --- Auth Methods ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Groups ---
    async fn create_group(&self, new_group: NewGroup) -> PortResult<Group>;

    /// Inserts a fully-formed group (used when importing legacy records).
    async fn insert_group(&self, group: Group) -> PortResult<Group>;

    async fn get_group(&self, group_id: Uuid) -> PortResult<Group>;

    /// Saves the whole group if its stored version still equals `group.version`.
    /// Returns the group with its new version, or `PortError::Conflict`.
    async fn save_group(&self, group: &Group) -> PortResult<Group>;

    async fn list_groups(&self, filter: &GroupFilter) -> PortResult<Vec<Group>>;

    async fn count_groups(&self, filter: &GroupFilter) -> PortResult<u64>;
}
