//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! A group is stored as one `groups` row (progress state in array columns)
//! plus its ordered `group_members` rows. Saves are guarded by the `version`
//! column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reading_groups_core::domain::{
    BookType, Group, GroupFilter, Intention, Member, NewGroup, User, UserCredentials,
};
use reading_groups_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn load_members(&self, group_ids: &[Uuid]) -> PortResult<HashMap<Uuid, Vec<Member>>> {
        let records = sqlx::query_as::<_, MemberRecord>(
            "SELECT group_id, email, name, picture_url, admin FROM group_members \
             WHERE group_id = ANY($1) ORDER BY group_id, position",
        )
        .bind(group_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut members: HashMap<Uuid, Vec<Member>> = HashMap::new();
        for record in records {
            members
                .entry(record.group_id)
                .or_default()
                .push(record.to_domain());
        }
        Ok(members)
    }

    async fn with_members(&self, records: Vec<GroupRecord>) -> PortResult<Vec<Group>> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut members = self.load_members(&ids).await?;
        records
            .into_iter()
            .map(|r| {
                let m = members.remove(&r.id).unwrap_or_default();
                r.to_domain(m)
            })
            .collect()
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

const GROUP_COLUMNS: &str = "id, version, name, description, dedicated_to, intention, book_type, \
     book_image, owner_email, owner_name, is_global, max_parts, completed_parts, claim_parts, \
     claim_times, legacy_in_progress, books_read, created_at";

/// The WHERE clause for a listing and whether it binds the email as `$1`.
fn filter_clause(filter: &GroupFilter) -> (&'static str, Option<&str>) {
    match filter {
        GroupFilter::All => ("", None),
        GroupFilter::Global => ("WHERE is_global", None),
        GroupFilter::SharedWith(email) => (
            "WHERE lower(owner_email) <> lower($1) AND EXISTS (\
             SELECT 1 FROM group_members m WHERE m.group_id = groups.id AND lower(m.email) = lower($1))",
            Some(email.as_str()),
        ),
        GroupFilter::OwnedBy(email) => ("WHERE lower(owner_email) = lower($1)", Some(email.as_str())),
    }
}

fn to_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn parts_to_sql<'a>(parts: impl Iterator<Item = &'a u32>) -> Vec<i32> {
    parts.map(|p| to_i32(*p)).collect()
}

fn parts_from_sql(parts: Vec<i32>) -> impl Iterator<Item = u32> {
    parts.into_iter().filter_map(|p| u32::try_from(p).ok())
}

async fn replace_members(conn: &mut PgConnection, group_id: Uuid, members: &[Member]) -> PortResult<()> {
    sqlx::query("DELETE FROM group_members WHERE group_id = $1")
        .bind(group_id)
        .execute(&mut *conn)
        .await
        .map_err(unexpected)?;

    for (position, member) in members.iter().enumerate() {
        sqlx::query(
            "INSERT INTO group_members (group_id, position, email, name, picture_url, admin) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(group_id)
        .bind(position as i32)
        .bind(&member.email)
        .bind(&member.name)
        .bind(&member.picture_url)
        .bind(member.admin)
        .execute(&mut *conn)
        .await
        .map_err(unexpected)?;
    }
    Ok(())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    display_name: String,
    photo_url: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            display_name: self.display_name,
            photo_url: self.photo_url,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct MemberRecord {
    group_id: Uuid,
    email: String,
    name: String,
    picture_url: String,
    admin: bool,
}
impl MemberRecord {
    fn to_domain(self) -> Member {
        Member {
            email: self.email,
            name: self.name,
            picture_url: self.picture_url,
            admin: self.admin,
        }
    }
}

#[derive(FromRow)]
struct GroupRecord {
    id: Uuid,
    version: i64,
    name: String,
    description: String,
    dedicated_to: String,
    intention: String,
    book_type: String,
    book_image: Option<String>,
    owner_email: String,
    owner_name: String,
    is_global: bool,
    max_parts: i32,
    completed_parts: Vec<i32>,
    claim_parts: Vec<i32>,
    claim_times: Vec<DateTime<Utc>>,
    legacy_in_progress: Vec<i32>,
    books_read: i32,
    created_at: DateTime<Utc>,
}
impl GroupRecord {
    fn to_domain(self, members: Vec<Member>) -> PortResult<Group> {
        let book_type = BookType::from_code(&self.book_type).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Group {} has unknown book type '{}'",
                self.id, self.book_type
            ))
        })?;
        let claims = parts_from_sql(self.claim_parts)
            .zip(self.claim_times)
            .collect();
        Ok(Group {
            id: self.id,
            version: self.version,
            name: self.name,
            description: self.description,
            dedicated_to: self.dedicated_to,
            intention: Intention::from_code(&self.intention),
            book_type,
            book_image: self.book_image,
            owner_email: self.owner_email,
            owner_name: self.owner_name,
            global: self.is_global,
            members,
            max: u32::try_from(self.max_parts).unwrap_or(0),
            completed: parts_from_sql(self.completed_parts).collect(),
            claims,
            legacy_in_progress: parts_from_sql(self.legacy_in_progress).collect(),
            books_read: u32::try_from(self.books_read).unwrap_or(0),
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password, display_name, photo_url) \
             VALUES ($1, $2, $3, $4, $5) RETURNING user_id, email, display_name, photo_url",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .bind(display_name)
        .bind(photo_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Invalid(format!("Email {} is already registered", email))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, display_name, photo_url FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn count_users(&self) -> PortResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count.max(0) as u64)
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_group(&self, new_group: NewGroup) -> PortResult<Group> {
        self.insert_group(new_group.into_group(Uuid::new_v4(), Utc::now()))
            .await
    }

    async fn insert_group(&self, group: Group) -> PortResult<Group> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let (claim_parts, claim_times): (Vec<i32>, Vec<DateTime<Utc>>) = group
            .claims
            .iter()
            .map(|(part, at)| (to_i32(*part), *at))
            .unzip();

        sqlx::query(
            "INSERT INTO groups (id, version, name, description, dedicated_to, intention, book_type, \
             book_image, owner_email, owner_name, is_global, max_parts, completed_parts, claim_parts, \
             claim_times, legacy_in_progress, books_read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(group.id)
        .bind(group.version)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.dedicated_to)
        .bind(group.intention.code())
        .bind(group.book_type.code())
        .bind(&group.book_image)
        .bind(&group.owner_email)
        .bind(&group.owner_name)
        .bind(group.global)
        .bind(to_i32(group.max))
        .bind(parts_to_sql(group.completed.iter()))
        .bind(claim_parts)
        .bind(claim_times)
        .bind(parts_to_sql(group.legacy_in_progress.iter()))
        .bind(to_i32(group.books_read))
        .bind(group.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Invalid(format!("Group {} already exists", group.id))
            }
            _ => unexpected(e),
        })?;

        replace_members(&mut *tx, group.id, &group.members).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(group)
    }

    async fn get_group(&self, group_id: Uuid) -> PortResult<Group> {
        let record = sqlx::query_as::<_, GroupRecord>(&format!(
            "SELECT {} FROM groups WHERE id = $1",
            GROUP_COLUMNS
        ))
        .bind(group_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Group {} not found", group_id)),
            _ => unexpected(e),
        })?;
        let mut members = self.load_members(&[group_id]).await?;
        record.to_domain(members.remove(&group_id).unwrap_or_default())
    }

    async fn save_group(&self, group: &Group) -> PortResult<Group> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let (claim_parts, claim_times): (Vec<i32>, Vec<DateTime<Utc>>) = group
            .claims
            .iter()
            .map(|(part, at)| (to_i32(*part), *at))
            .unzip();

        let result = sqlx::query(
            "UPDATE groups SET version = version + 1, name = $3, description = $4, \
             dedicated_to = $5, intention = $6, book_image = $7, is_global = $8, \
             completed_parts = $9, claim_parts = $10, claim_times = $11, \
             legacy_in_progress = $12, books_read = $13 \
             WHERE id = $1 AND version = $2",
        )
        .bind(group.id)
        .bind(group.version)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.dedicated_to)
        .bind(group.intention.code())
        .bind(&group.book_image)
        .bind(group.global)
        .bind(parts_to_sql(group.completed.iter()))
        .bind(claim_parts)
        .bind(claim_times)
        .bind(parts_to_sql(group.legacy_in_progress.iter()))
        .bind(to_i32(group.books_read))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(unexpected)?;
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM groups WHERE id = $1)")
                .bind(group.id)
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;
            return Err(if exists {
                PortError::Conflict(format!("Group {} changed since version {}", group.id, group.version))
            } else {
                PortError::NotFound(format!("Group {} not found", group.id))
            });
        }

        replace_members(&mut *tx, group.id, &group.members).await?;
        tx.commit().await.map_err(unexpected)?;

        let mut saved = group.clone();
        saved.version += 1;
        Ok(saved)
    }

    async fn list_groups(&self, filter: &GroupFilter) -> PortResult<Vec<Group>> {
        let (clause, email) = filter_clause(filter);
        let sql = format!(
            "SELECT {} FROM groups {} ORDER BY created_at DESC",
            GROUP_COLUMNS, clause
        );
        let mut query = sqlx::query_as::<_, GroupRecord>(&sql);
        if let Some(email) = email {
            query = query.bind(email);
        }
        let records = query.fetch_all(&self.pool).await.map_err(unexpected)?;
        self.with_members(records).await
    }

    async fn count_groups(&self, filter: &GroupFilter) -> PortResult<u64> {
        let (clause, email) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM groups {}", clause);
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(email) = email {
            query = query.bind(email);
        }
        let count = query.fetch_one(&self.pool).await.map_err(unexpected)?;
        Ok(count.max(0) as u64)
    }
}
