//! Tenant members
//!
//! Two read/write seams over the same table. [`MemberDirectory`] is the
//! read-only view the tasker uses to resolve notification recipients;
//! [`MemberStore`] is what the member import strategy writes through.
//! [`PgMemberRepository`] implements both over PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod postgres;

pub use postgres::PgMemberRepository;

/// Role held by tenant administrators
pub const ADMIN_ROLE: &str = "app-owner";

/// Role given to members created by an import
pub const GENERAL_MEMBER_ROLE: &str = "general-member";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: String,
    pub app_id: String,
    pub email: Option<String>,
    pub username: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a member created by an import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub app_id: String,
    pub email: String,
    pub username: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
}

/// Profile fields an import may overwrite; `None` leaves the column alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl MemberUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none()
    }
}

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn find_member(&self, app_id: &str, member_id: &str) -> anyhow::Result<Option<Member>>;

    async fn find_by_role(&self, app_id: &str, role: &str) -> anyhow::Result<Vec<Member>>;
}

#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Case-insensitive lookup by e-mail within a tenant
    async fn find_by_email(&self, app_id: &str, email: &str) -> anyhow::Result<Option<Member>>;

    async fn insert_member(&self, member: NewMember) -> anyhow::Result<Member>;

    async fn update_member(&self, member_id: &str, update: MemberUpdate) -> anyhow::Result<()>;
}
