//! # User Repository
//!
//! Users and their credit balances.
//!
//! ## Credit Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Balance changes are single-statement read-modify-writes:              │
//! │                                                                         │
//! │    UPDATE users SET credit_cents = credit_cents + ?delta               │
//! │    WHERE id = ?id AND (?delta >= 0 OR credit_cents + ?delta >= 0)      │
//! │                   AND (?delta <= 0 OR credit_cents <= MAX - ?delta)    │
//! │                                                                         │
//! │  rows_affected = 0 → the change would overdraw or overflow (or the     │
//! │  user is gone); nothing was written. No stale balance is ever written  │
//! │  back.                                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::IN_CLAUSE_CHUNK;
use tally_core::{User, UserRole};

const USER_COLUMNS: &str = "id, name, role, credit_cents, created_at, updated_at";

/// Outcome of a guarded balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditChange {
    Applied,
    /// The change would have left the balance negative; nothing was written.
    WouldOverdraw,
    /// The balance would have passed `i64::MAX` cents; nothing was written.
    WouldOverflow,
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Gets a user by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Lists users with the given role, sorted by name.
    pub async fn list_by_role(&self, role: UserRole) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY name"
        ))
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Loads several users at once, in no particular order.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut users = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(IN_CLAUSE_CHUNK) {
            let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new(format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id IN ("
            ));
            let mut separated = qb.separated(", ");
            for id in chunk {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");

            users.extend(qb.build_query_as::<User>().fetch_all(&self.pool).await?);
        }

        Ok(users)
    }

    /// Creates a user with a generated ID and opening balance.
    pub async fn create(&self, name: &str, role: UserRole, credit_cents: i64) -> DbResult<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            role,
            credit_cents,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %user.id, role = ?role, credit = credit_cents, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (id, name, role, credit_cents, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.role)
        .bind(user.credit_cents)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    // -------------------------------------------------------------------------
    // Transaction-scoped operations
    // -------------------------------------------------------------------------

    /// Loads a user inside a transaction.
    pub async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Adds a signed amount to a balance unless it would overdraw it or
    /// leave the `i64` range.
    pub async fn change_credit_in(
        conn: &mut SqliteConnection,
        id: &str,
        delta_cents: i64,
    ) -> DbResult<CreditChange> {
        debug!(user_id = %id, delta = delta_cents, "Changing credit");

        let result = sqlx::query(
            r#"
            UPDATE users SET
                credit_cents = credit_cents + ?2,
                updated_at = ?3
            WHERE id = ?1
              AND (?2 >= 0 OR credit_cents + ?2 >= 0)
              AND (?2 <= 0 OR credit_cents <= ?4 - ?2)
            "#,
        )
        .bind(id)
        .bind(delta_cents)
        .bind(Utc::now())
        .bind(i64::MAX)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(CreditChange::Applied);
        }

        // Distinguish a refused change from a missing user.
        Self::fetch_in(conn, id).await?;
        if delta_cents > 0 {
            Ok(CreditChange::WouldOverflow)
        } else {
            Ok(CreditChange::WouldOverdraw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db.users().create("Ada", UserRole::Customer, 10_000).await.unwrap();

        let found = db.users().get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(found.credit().cents(), 10_000);
        assert_eq!(found.role, UserRole::Customer);

        let managers = db.users().list_by_role(UserRole::Manager).await.unwrap();
        assert!(managers.is_empty());
    }

    #[tokio::test]
    async fn test_change_credit_guards_overdraw() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db.users().create("Ada", UserRole::Customer, 1_000).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        assert_eq!(
            UserRepository::change_credit_in(&mut tx, &user.id, -1_000).await.unwrap(),
            CreditChange::Applied
        );
        assert_eq!(
            UserRepository::change_credit_in(&mut tx, &user.id, -1).await.unwrap(),
            CreditChange::WouldOverdraw
        );
        assert_eq!(
            UserRepository::change_credit_in(&mut tx, &user.id, 250).await.unwrap(),
            CreditChange::Applied
        );
        tx.commit().await.unwrap();

        let found = db.users().get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(found.credit_cents, 250);
    }

    #[tokio::test]
    async fn test_change_credit_refuses_overflow() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db
            .users()
            .create("Ada", UserRole::Customer, i64::MAX - 10)
            .await
            .unwrap();

        let mut tx = db.begin().await.unwrap();
        assert_eq!(
            UserRepository::change_credit_in(&mut tx, &user.id, 11).await.unwrap(),
            CreditChange::WouldOverflow
        );
        assert_eq!(
            UserRepository::change_credit_in(&mut tx, &user.id, 10).await.unwrap(),
            CreditChange::Applied
        );
        tx.commit().await.unwrap();

        let found = db.users().get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(found.credit_cents, i64::MAX);
    }

    #[tokio::test]
    async fn test_get_many_splits_large_id_lists() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ada = db.users().create("Ada", UserRole::Customer, 0).await.unwrap();

        let mut ids: Vec<String> = (0..40_000).map(|n| format!("absent-{n}")).collect();
        ids.push(ada.id.clone());

        let users = db.users().get_many(&ids).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, ada.id);
    }

    #[tokio::test]
    async fn test_change_credit_unknown_user() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();

        let result = UserRepository::change_credit_in(&mut tx, "ghost", 100).await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }
}
