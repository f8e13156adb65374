use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{Member, MemberDirectory, MemberStore, MemberUpdate, NewMember};

const MEMBER_COLUMNS: &str =
    "id, app_id, email, username, name, phone, role, created_at, updated_at";

#[derive(Clone)]
pub struct PgMemberRepository {
    pool: PgPool,
}

impl PgMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberDirectory for PgMemberRepository {
    async fn find_member(&self, app_id: &str, member_id: &str) -> anyhow::Result<Option<Member>> {
        let sql = format!("SELECT {} FROM members WHERE app_id = $1 AND id = $2", MEMBER_COLUMNS);

        sqlx::query_as::<_, Member>(&sql)
            .bind(app_id)
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to look up member {} in app {}", member_id, app_id))
    }

    async fn find_by_role(&self, app_id: &str, role: &str) -> anyhow::Result<Vec<Member>> {
        let sql = format!(
            "SELECT {} FROM members WHERE app_id = $1 AND role = $2 ORDER BY created_at, id",
            MEMBER_COLUMNS
        );

        sqlx::query_as::<_, Member>(&sql)
            .bind(app_id)
            .bind(role)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list '{}' members of app {}", role, app_id))
    }
}

#[async_trait]
impl MemberStore for PgMemberRepository {
    async fn find_by_email(&self, app_id: &str, email: &str) -> anyhow::Result<Option<Member>> {
        let sql = format!(
            "SELECT {} FROM members WHERE app_id = $1 AND lower(email) = lower($2)",
            MEMBER_COLUMNS
        );

        sqlx::query_as::<_, Member>(&sql)
            .bind(app_id)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up member by email")
    }

    async fn insert_member(&self, member: NewMember) -> anyhow::Result<Member> {
        let sql = format!(
            r#"
            INSERT INTO members (id, app_id, email, username, name, phone, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            MEMBER_COLUMNS
        );

        let record = sqlx::query_as::<_, Member>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&member.app_id)
            .bind(&member.email)
            .bind(&member.username)
            .bind(&member.name)
            .bind(&member.phone)
            .bind(&member.role)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to insert member {}", member.email))?;

        debug!(member_id = %record.id, app_id = %record.app_id, "Inserted member");
        Ok(record)
    }

    async fn update_member(&self, member_id: &str, update: MemberUpdate) -> anyhow::Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE members
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(member_id)
        .bind(&update.name)
        .bind(&update.phone)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update member {}", member_id))?;

        debug!(member_id, "Updated member");
        Ok(())
    }
}
