use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement, Value};
use uuid::Uuid;

use crate::entity;
use crate::error::{AccountError, AccountResult};
use crate::models::{NewUser, User, UserFilter};
use crate::repository::UserRepository;

/// PostgreSQL implementation of UserRepository using SeaORM
///
/// Case-insensitive uniqueness is enforced by the `LOWER(...)` unique indexes
/// created in the migration; their names identify the violated field.
#[derive(Clone)]
pub struct PgUserRepository {
    db: DatabaseConnection,
}

impl PgUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromQueryResult)]
struct CountResult {
    count: i64,
}

fn db_error(e: DbErr) -> AccountError {
    AccountError::Internal(format!("Database error: {}", e))
}

/// Maps unique index violations to the matching duplicate error
fn write_error(e: DbErr, user: &User) -> AccountError {
    let err_str = e.to_string();
    if !(err_str.contains("duplicate key") || err_str.contains("unique constraint")) {
        return db_error(e);
    }

    if err_str.contains("uq_accounts_users_email_ci") {
        AccountError::DuplicateEmail(user.email.clone().unwrap_or_default())
    } else if err_str.contains("uq_accounts_users_iban_ci") {
        AccountError::DuplicateIban(user.iban.clone().unwrap_or_default())
    } else {
        AccountError::DuplicateUsername(user.username.clone())
    }
}

fn json_array<T: serde::Serialize>(items: &[T]) -> AccountResult<serde_json::Value> {
    serde_json::to_value(items).map_err(|e| AccountError::Internal(e.to_string()))
}

/// Escapes LIKE wildcards so search terms match literally
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// `WHERE` clause and bind values for `filter`
fn filter_clause(filter: &UserFilter) -> (String, Vec<Value>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(created_by) = filter.created_by {
        values.push(created_by.into());
        conditions.push(format!("created_by = ${}", values.len()));
    }
    if let Some(is_active) = filter.is_active {
        values.push(is_active.into());
        conditions.push(format!("is_active = ${}", values.len()));
    }
    if let Some(is_staff) = filter.is_staff {
        values.push(is_staff.into());
        conditions.push(format!("is_staff = ${}", values.len()));
    }
    if let Some(is_superuser) = filter.is_superuser {
        values.push(is_superuser.into());
        conditions.push(format!("is_superuser = ${}", values.len()));
    }
    if let Some(after) = filter.joined_after {
        values.push(after.into());
        conditions.push(format!("date_joined >= ${}", values.len()));
    }
    if let Some(before) = filter.joined_before {
        values.push(before.into());
        conditions.push(format!("date_joined < ${}", values.len()));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        values.push(like_pattern(search).into());
        let n = values.len();
        conditions.push(format!(
            "(username ILIKE ${n} OR first_name ILIKE ${n} OR last_name ILIKE ${n} OR email ILIKE ${n})"
        ));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (clause, values)
}

impl PgUserRepository {
    async fn find_one(&self, sql: &str, values: Vec<Value>) -> AccountResult<Option<User>> {
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);

        let row = entity::Model::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(db_error)?;

        Ok(row.map(Into::into))
    }

    async fn count_where(&self, sql: &str, values: Vec<Value>) -> AccountResult<u64> {
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);

        let result = CountResult::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(db_error)?;

        Ok(result.map(|r| r.count.max(0) as u64).unwrap_or(0))
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, input: NewUser) -> AccountResult<User> {
        let sql = r#"
            INSERT INTO accounts_users (id, username, first_name, last_name, email, iban, password_hash,
                is_active, is_staff, is_superuser, groups, permissions, created_by, last_login, date_joined)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
        "#;

        let user = User::new(input);

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                user.id.into(),
                user.username.clone().into(),
                user.first_name.clone().into(),
                user.last_name.clone().into(),
                user.email.clone().into(),
                user.iban.clone().into(),
                user.password_hash.clone().into(),
                user.is_active.into(),
                user.is_staff.into(),
                user.is_superuser.into(),
                json_array(&user.groups)?.into(),
                json_array(&user.permissions)?.into(),
                user.created_by.into(),
                user.last_login.into(),
                user.date_joined.into(),
            ],
        );

        let row = entity::Model::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(|e| write_error(e, &user))?
            .ok_or_else(|| AccountError::Internal("Failed to create user".to_string()))?;

        tracing::info!(user_id = %row.id, username = %row.username, "Created user");
        Ok(row.into())
    }

    async fn get_by_id(&self, id: Uuid) -> AccountResult<Option<User>> {
        self.find_one("SELECT * FROM accounts_users WHERE id = $1", vec![id.into()])
            .await
    }

    async fn get_by_username(&self, username: &str) -> AccountResult<Option<User>> {
        self.find_one(
            "SELECT * FROM accounts_users WHERE LOWER(username) = LOWER($1)",
            vec![username.into()],
        )
        .await
    }

    async fn get_by_email(&self, email: &str) -> AccountResult<Option<User>> {
        self.find_one(
            "SELECT * FROM accounts_users WHERE LOWER(email) = LOWER($1)",
            vec![email.into()],
        )
        .await
    }

    async fn list(&self, filter: &UserFilter) -> AccountResult<Vec<User>> {
        let (clause, mut values) = filter_clause(filter);
        values.push(i64::try_from(filter.limit).unwrap_or(i64::MAX).into());
        values.push(i64::try_from(filter.offset).unwrap_or(i64::MAX).into());

        let sql = format!(
            "SELECT * FROM accounts_users{} ORDER BY date_joined DESC, id DESC LIMIT ${} OFFSET ${}",
            clause,
            values.len() - 1,
            values.len()
        );

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);

        let rows = entity::Model::find_by_statement(stmt)
            .all(&self.db)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self, filter: &UserFilter) -> AccountResult<u64> {
        let (clause, values) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) AS count FROM accounts_users{}", clause);
        self.count_where(&sql, values).await
    }

    async fn update(&self, user: User) -> AccountResult<User> {
        let sql = r#"
            UPDATE accounts_users
            SET username = $2, first_name = $3, last_name = $4, email = $5, iban = $6,
                password_hash = $7, is_active = $8, is_staff = $9, is_superuser = $10,
                groups = $11, permissions = $12, last_login = $13
            WHERE id = $1
            RETURNING *
        "#;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                user.id.into(),
                user.username.clone().into(),
                user.first_name.clone().into(),
                user.last_name.clone().into(),
                user.email.clone().into(),
                user.iban.clone().into(),
                user.password_hash.clone().into(),
                user.is_active.into(),
                user.is_staff.into(),
                user.is_superuser.into(),
                json_array(&user.groups)?.into(),
                json_array(&user.permissions)?.into(),
                user.last_login.into(),
            ],
        );

        let row = entity::Model::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(|e| write_error(e, &user))?;

        let row = row.ok_or(AccountError::NotFound(user.id))?;
        tracing::info!(user_id = %row.id, "Updated user");
        Ok(row.into())
    }

    async fn delete(&self, id: Uuid) -> AccountResult<bool> {
        // fk_accounts_users_created_by clears created_by on owned users
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "DELETE FROM accounts_users WHERE id = $1",
            [id.into()],
        );

        let result = self.db.execute_raw(stmt).await.map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn username_exists(&self, username: &str, exclude: Option<Uuid>) -> AccountResult<bool> {
        let count = self
            .count_where(
                "SELECT COUNT(*) AS count FROM accounts_users WHERE LOWER(username) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)",
                vec![username.into(), exclude.into()],
            )
            .await?;
        Ok(count > 0)
    }

    async fn email_exists(&self, email: &str, exclude: Option<Uuid>) -> AccountResult<bool> {
        let count = self
            .count_where(
                "SELECT COUNT(*) AS count FROM accounts_users WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)",
                vec![email.into(), exclude.into()],
            )
            .await?;
        Ok(count > 0)
    }

    async fn iban_exists(&self, iban: &str, exclude: Option<Uuid>) -> AccountResult<bool> {
        let count = self
            .count_where(
                "SELECT COUNT(*) AS count FROM accounts_users WHERE LOWER(iban) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)",
                vec![iban.into(), exclude.into()],
            )
            .await?;
        Ok(count > 0)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> AccountResult<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE accounts_users SET last_login = $2 WHERE id = $1",
            [id.into(), at.into()],
        );

        let result = self.db.execute_raw(stmt).await.map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(AccountError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelPermission;
    use sea_orm::{MockDatabase, MockExecResult, Transaction};
    use std::collections::BTreeMap;

    fn sample_user() -> User {
        User::new(NewUser {
            username: "john".to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: Some("john@example.com".to_string()),
            iban: Some("DE44500105175407324931".to_string()),
            password_hash: "hash".to_string(),
            is_active: true,
            is_staff: true,
            is_superuser: false,
            groups: vec![],
            permissions: vec![ModelPermission::ViewUser],
            created_by: None,
        })
    }

    fn count_row(count: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("count", Value::BigInt(Some(count)))])
    }

    #[tokio::test]
    async fn test_get_by_id_maps_row() {
        let user = sample_user();
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![entity::Model::from(user.clone())]])
            .into_connection();

        let repo = PgUserRepository::new(db);
        let found = repo.get_by_id(user.id).await.unwrap().unwrap();

        assert_eq!(found.id, user.id);
        assert_eq!(found.permissions, vec![ModelPermission::ViewUser]);
        assert_eq!(found.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_get_by_id_missing() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([Vec::<entity::Model>::new()])
            .into_connection();

        let repo = PgUserRepository::new(db);
        assert!(repo.get_by_id(Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_maps_iban_index_violation() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_errors([DbErr::Custom(
                "duplicate key value violates unique constraint \"uq_accounts_users_iban_ci\""
                    .to_string(),
            )])
            .into_connection();

        let repo = PgUserRepository::new(db);
        let user = sample_user();
        let err = repo
            .create(NewUser {
                username: user.username,
                first_name: user.first_name,
                last_name: user.last_name,
                email: user.email,
                iban: user.iban,
                password_hash: user.password_hash,
                is_active: true,
                is_staff: false,
                is_superuser: false,
                groups: vec![],
                permissions: vec![],
                created_by: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::DuplicateIban(ref iban) if iban == "DE44500105175407324931"));
    }

    #[tokio::test]
    async fn test_update_maps_username_index_violation() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_errors([DbErr::Custom(
                "duplicate key value violates unique constraint \"uq_accounts_users_username_ci\""
                    .to_string(),
            )])
            .into_connection();

        let repo = PgUserRepository::new(db);
        let err = repo.update(sample_user()).await.unwrap_err();
        assert!(err.is_username_conflict());
    }

    #[tokio::test]
    async fn test_other_errors_are_internal() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_errors([DbErr::Custom("connection reset".to_string())])
            .into_connection();

        let repo = PgUserRepository::new(db);
        let err = repo.get_by_username("john").await.unwrap_err();
        assert!(matches!(err, AccountError::Internal(_)));
    }

    #[tokio::test]
    async fn test_exists_queries_use_count() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![count_row(1)], vec![count_row(0)]])
            .into_connection();

        let repo = PgUserRepository::new(db);
        assert!(repo.username_exists("John", None).await.unwrap());
        assert!(!repo.iban_exists("DE44500105175407324931", Some(Uuid::now_v7())).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_reports_rows_affected() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();

        let repo = PgUserRepository::new(db);
        assert!(repo.delete(Uuid::now_v7()).await.unwrap());
        assert!(!repo.delete(Uuid::now_v7()).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_login_missing_user() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let repo = PgUserRepository::new(db);
        let err = repo.record_login(Uuid::now_v7(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AccountError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_builds_scoped_query() {
        let creator = Uuid::now_v7();
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([Vec::<entity::Model>::new()])
            .into_connection();

        let repo = PgUserRepository::new(db);
        let filter = UserFilter {
            created_by: Some(creator),
            search: Some("jo_hn".to_string()),
            limit: 10,
            ..Default::default()
        };
        assert!(repo.list(&filter).await.unwrap().is_empty());

        let expected = Transaction::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT * FROM accounts_users WHERE created_by = $1 AND (username ILIKE $2 OR first_name ILIKE $2 OR last_name ILIKE $2 OR email ILIKE $2) ORDER BY date_joined DESC, id DESC LIMIT $3 OFFSET $4",
            [
                creator.into(),
                "%jo\\_hn%".into(),
                10i64.into(),
                0i64.into(),
            ],
        );
        assert_eq!(repo.db.into_transaction_log(), vec![expected]);
    }

    #[tokio::test]
    async fn test_list_saturates_oversized_offset() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([Vec::<entity::Model>::new()])
            .into_connection();

        let repo = PgUserRepository::new(db);
        let filter = UserFilter {
            offset: u64::MAX,
            ..Default::default()
        };
        assert!(repo.list(&filter).await.unwrap().is_empty());

        let expected = Transaction::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT * FROM accounts_users ORDER BY date_joined DESC, id DESC LIMIT $1 OFFSET $2",
            [50i64.into(), i64::MAX.into()],
        );
        assert_eq!(repo.db.into_transaction_log(), vec![expected]);
    }

    #[test]
    fn test_filter_clause_empty() {
        let (clause, values) = filter_clause(&UserFilter::default());
        assert!(clause.is_empty());
        assert!(values.is_empty());
    }
}
