//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use kernel::id::{AdminId, AdminSessionId, SessionId, UserId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{
    admin_session::{AdminSession, NewAdminSession},
    session::{NewSession, Session},
};
use crate::domain::repository::{AdminSessionRepository, SessionCounts, SessionRepository};
use crate::error::{SessionError, SessionResult};

/// PostgreSQL-backed session repository
///
/// Implements both the user and the admin session store over one pool.
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// User Session Repository Implementation
// ============================================================================

impl SessionRepository for PgSessionRepository {
    async fn save(&self, session: NewSession) -> SessionResult<Session> {
        let session = session.with_id(SessionId::new());

        sqlx::query(
            r#"
            INSERT INTO sessions (
                session_id,
                user_id,
                access_token,
                refresh_token,
                access_expires_at,
                refresh_expires_at,
                created_at,
                last_activity
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(session.user_id.as_uuid())
        .bind(&session.access_token)
        .bind(&session.refresh_token)
        .bind(session.access_expires_at)
        .bind(session.refresh_expires_at)
        .bind(session.created_at)
        .bind(session.last_activity)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    async fn get_by_access_token(&self, token: &str) -> SessionResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT
                session_id,
                user_id,
                access_token,
                refresh_token,
                access_expires_at,
                refresh_expires_at,
                created_at,
                last_activity
            FROM sessions
            WHERE access_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_session()))
    }

    async fn get_by_refresh_token(&self, token: &str) -> SessionResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT
                session_id,
                user_id,
                access_token,
                refresh_token,
                access_expires_at,
                refresh_expires_at,
                created_at,
                last_activity
            FROM sessions
            WHERE refresh_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_session()))
    }

    async fn update(&self, session: &Session) -> SessionResult<Session> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE sessions SET
                access_token = $2,
                refresh_token = $3,
                access_expires_at = $4,
                refresh_expires_at = $5,
                last_activity = $6
            WHERE session_id = $1
            RETURNING
                session_id,
                user_id,
                access_token,
                refresh_token,
                access_expires_at,
                refresh_expires_at,
                created_at,
                last_activity
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(&session.access_token)
        .bind(&session.refresh_token)
        .bind(session.access_expires_at)
        .bind(session.refresh_expires_at)
        .bind(session.last_activity)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_session())
            .ok_or(SessionError::SessionNotFound)
    }

    async fn delete(&self, id: SessionId) -> SessionResult<bool> {
        let deleted = sqlx::query("DELETE FROM sessions WHERE session_id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn get_active_by_user_id(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> SessionResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT
                session_id,
                user_id,
                access_token,
                refresh_token,
                access_expires_at,
                refresh_expires_at,
                created_at,
                last_activity
            FROM sessions
            WHERE user_id = $1 AND refresh_expires_at > $2
            ORDER BY last_activity DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_session()).collect())
    }

    async fn count_sessions(&self, now: DateTime<Utc>) -> SessionResult<SessionCounts> {
        let (total, active) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE refresh_expires_at > $1)
            FROM sessions
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts(total, active))
    }

    async fn purge_invalid(&self, now: DateTime<Utc>) -> SessionResult<u64> {
        let deleted = sqlx::query("DELETE FROM sessions WHERE refresh_expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(sessions_deleted = deleted, "Purged invalid sessions");

        Ok(deleted)
    }
}

// ============================================================================
// Admin Session Repository Implementation
// ============================================================================

impl AdminSessionRepository for PgSessionRepository {
    async fn save(&self, session: NewAdminSession) -> SessionResult<AdminSession> {
        let session = session.with_id(AdminSessionId::new());

        sqlx::query(
            r#"
            INSERT INTO admin_sessions (
                admin_session_id,
                admin_id,
                access_token,
                access_expires_at,
                created_at,
                last_activity
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(session.admin_id.as_uuid())
        .bind(&session.access_token)
        .bind(session.access_expires_at)
        .bind(session.created_at)
        .bind(session.last_activity)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    async fn get_by_access_token(&self, token: &str) -> SessionResult<Option<AdminSession>> {
        let row = sqlx::query_as::<_, AdminSessionRow>(
            r#"
            SELECT
                admin_session_id,
                admin_id,
                access_token,
                access_expires_at,
                created_at,
                last_activity
            FROM admin_sessions
            WHERE access_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_admin_session()))
    }

    async fn update(&self, session: &AdminSession) -> SessionResult<AdminSession> {
        let row = sqlx::query_as::<_, AdminSessionRow>(
            r#"
            UPDATE admin_sessions SET
                last_activity = $2
            WHERE admin_session_id = $1
            RETURNING
                admin_session_id,
                admin_id,
                access_token,
                access_expires_at,
                created_at,
                last_activity
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(session.last_activity)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_admin_session())
            .ok_or(SessionError::SessionNotFound)
    }

    async fn delete(&self, id: AdminSessionId) -> SessionResult<bool> {
        let deleted = sqlx::query("DELETE FROM admin_sessions WHERE admin_session_id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn get_active_by_admin_id(
        &self,
        admin_id: &AdminId,
        now: DateTime<Utc>,
    ) -> SessionResult<Vec<AdminSession>> {
        let rows = sqlx::query_as::<_, AdminSessionRow>(
            r#"
            SELECT
                admin_session_id,
                admin_id,
                access_token,
                access_expires_at,
                created_at,
                last_activity
            FROM admin_sessions
            WHERE admin_id = $1 AND access_expires_at > $2
            "#,
        )
        .bind(admin_id.as_uuid())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_admin_session()).collect())
    }

    async fn count_sessions(&self, now: DateTime<Utc>) -> SessionResult<SessionCounts> {
        let (total, active) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE access_expires_at > $1)
            FROM admin_sessions
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts(total, active))
    }

    async fn purge_invalid(&self, now: DateTime<Utc>) -> SessionResult<u64> {
        let deleted = sqlx::query("DELETE FROM admin_sessions WHERE access_expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(sessions_deleted = deleted, "Purged expired admin sessions");

        Ok(deleted)
    }
}

fn counts(total: i64, active: i64) -> SessionCounts {
    let total = total.max(0) as u64;
    let active = (active.max(0) as u64).min(total);
    SessionCounts {
        total,
        active,
        inactive: total - active,
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    user_id: Uuid,
    access_token: String,
    refresh_token: String,
    access_expires_at: DateTime<Utc>,
    refresh_expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> Session {
        Session {
            id: SessionId::from_uuid(self.session_id),
            user_id: UserId::from_uuid(self.user_id),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            access_expires_at: self.access_expires_at,
            refresh_expires_at: self.refresh_expires_at,
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AdminSessionRow {
    admin_session_id: Uuid,
    admin_id: Uuid,
    access_token: String,
    access_expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl AdminSessionRow {
    fn into_admin_session(self) -> AdminSession {
        AdminSession {
            id: AdminSessionId::from_uuid(self.admin_session_id),
            admin_id: AdminId::from_uuid(self.admin_id),
            access_token: self.access_token,
            access_expires_at: self.access_expires_at,
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}
