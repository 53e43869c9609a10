//! Embedded backend: identities, sessions and content tables in SQLite,
//! objects on the local filesystem.
//!
//! Row policies mirror what a hosted data service enforces per bearer
//! token: anonymous handles read only, user handles write only rows they
//! own, and the service handle bypasses policy.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{
    ffi, params, params_from_iter, Connection, OptionalExtension, TransactionBehavior,
};
use serde_json::{json, Value};

use super::objects::ObjectStore;
use super::{
    AuthSession, Backend, BackendError, BackendResult, Connector, Direction, Filter, Identity,
    ObjectInfo, Page, PendingIdentity, Query, Row, Table,
};
use crate::config::AuthConfig;
use crate::db::DbPool;

#[derive(Debug, Clone)]
pub struct LocalSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Window after rotation in which the old refresh token still yields
    /// the successor pair.
    pub refresh_reuse: Duration,
    pub bcrypt_cost: u32,
}

impl From<&AuthConfig> for LocalSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            access_ttl: Duration::seconds(config.access_token_secs),
            refresh_ttl: Duration::seconds(config.refresh_token_secs),
            refresh_reuse: Duration::seconds(config.refresh_reuse_secs),
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

struct LocalStore {
    pool: DbPool,
    objects: ObjectStore,
    settings: LocalSettings,
}

#[derive(Clone)]
pub struct LocalConnector {
    store: Arc<LocalStore>,
}

impl LocalConnector {
    pub fn new(pool: DbPool, objects: ObjectStore, settings: LocalSettings) -> Self {
        Self {
            store: Arc::new(LocalStore {
                pool,
                objects,
                settings,
            }),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.store.pool
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.store.objects
    }

    fn handle(&self, principal: Principal) -> Arc<dyn Backend> {
        Arc::new(LocalHandle {
            store: Arc::clone(&self.store),
            principal,
        })
    }
}

impl Connector for LocalConnector {
    fn anonymous(&self) -> Arc<dyn Backend> {
        self.handle(Principal::Anonymous)
    }

    fn for_token(&self, access_token: &str) -> Arc<dyn Backend> {
        self.handle(Principal::Bearer(access_token.to_string()))
    }

    fn service(&self) -> Arc<dyn Backend> {
        self.handle(Principal::Service)
    }
}

enum Principal {
    Anonymous,
    Bearer(String),
    Service,
}

enum Actor {
    Service,
    User(Identity),
}

struct LocalHandle {
    store: Arc<LocalStore>,
    principal: Principal,
}

struct RefreshRow {
    session_id: String,
    identity: Identity,
    expires_at: String,
    revoked: bool,
    replaced_by: Option<String>,
    rotated_at: Option<String>,
}

// -- identity --

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

fn parse_timestamp(raw: &str) -> BackendResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BackendError::InvalidQuery(format!("bad timestamp {raw:?}: {e}")))
}

impl LocalStore {
    fn issue_session(&self, conn: &Connection, identity: Identity) -> BackendResult<AuthSession> {
        self.insert_session(conn, &uuid::Uuid::now_v7().to_string(), identity)
    }

    fn insert_session(
        &self,
        conn: &Connection,
        session_id: &str,
        identity: Identity,
    ) -> BackendResult<AuthSession> {
        let now = Utc::now();
        let access_token = generate_token();
        let refresh_token = generate_token();

        conn.execute(
            "INSERT INTO auth_sessions
                (id, identity_id, access_token, refresh_token, access_expires_at, refresh_expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session_id,
                identity.id,
                access_token,
                refresh_token,
                (now + self.settings.access_ttl).to_rfc3339(),
                (now + self.settings.refresh_ttl).to_rfc3339(),
            ],
        )?;

        Ok(AuthSession {
            access_token,
            refresh_token,
            identity,
        })
    }

    fn verify(&self, conn: &Connection, token: &str) -> BackendResult<Identity> {
        let found: Option<(String, String, String)> = conn
            .query_row(
                "SELECT i.id, i.email, s.access_expires_at
                 FROM auth_sessions s
                 JOIN auth_identities i ON i.id = s.identity_id
                 WHERE s.access_token = ?1 AND s.revoked = 0",
                params![token],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (id, email, expires_at) =
            found.ok_or_else(|| BackendError::Auth("invalid access token".into()))?;
        if parse_timestamp(&expires_at)? <= Utc::now() {
            return Err(BackendError::Auth("access token expired".into()));
        }
        Ok(Identity { id, email })
    }

    /// Rotates the pair behind `refresh_token`. Replaying a rotated token
    /// within the reuse window returns the pair it was rotated into, so
    /// requests racing on the same cookies all stay signed in.
    fn refresh(&self, refresh_token: &str) -> BackendResult<AuthSession> {
        let mut conn = self.pool.get()?;
        // Take the write lock up front so concurrent refreshes serialize
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let found: Option<RefreshRow> = tx
            .query_row(
                "SELECT s.id, i.id, i.email, s.refresh_expires_at, s.revoked,
                        s.replaced_by, s.rotated_at
                 FROM auth_sessions s
                 JOIN auth_identities i ON i.id = s.identity_id
                 WHERE s.refresh_token = ?1",
                params![refresh_token],
                |row| {
                    Ok(RefreshRow {
                        session_id: row.get(0)?,
                        identity: Identity {
                            id: row.get(1)?,
                            email: row.get(2)?,
                        },
                        expires_at: row.get(3)?,
                        revoked: row.get(4)?,
                        replaced_by: row.get(5)?,
                        rotated_at: row.get(6)?,
                    })
                },
            )
            .optional()?;

        let found = found.ok_or_else(|| BackendError::Auth("invalid refresh token".into()))?;
        let now = Utc::now();
        if parse_timestamp(&found.expires_at)? <= now {
            return Err(BackendError::Auth("refresh token expired".into()));
        }

        if found.revoked {
            let successor = match (&found.replaced_by, &found.rotated_at) {
                (Some(next), Some(at)) if now - parse_timestamp(at)? <= self.settings.refresh_reuse => {
                    self.live_session(&tx, next, found.identity)?
                }
                _ => None,
            };
            return successor.ok_or_else(|| BackendError::Auth("refresh token already used".into()));
        }

        let next_id = uuid::Uuid::now_v7().to_string();
        tx.execute(
            "UPDATE auth_sessions SET revoked = 1, replaced_by = ?2, rotated_at = ?3
             WHERE id = ?1 AND revoked = 0",
            params![found.session_id, next_id, now.to_rfc3339()],
        )?;
        let session = self.insert_session(&tx, &next_id, found.identity)?;
        tx.commit()?;
        Ok(session)
    }

    /// The token pair of a session that is still live.
    fn live_session(
        &self,
        conn: &Connection,
        session_id: &str,
        identity: Identity,
    ) -> BackendResult<Option<AuthSession>> {
        let tokens: Option<(String, String)> = conn
            .query_row(
                "SELECT access_token, refresh_token FROM auth_sessions
                 WHERE id = ?1 AND revoked = 0",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(tokens.map(|(access_token, refresh_token)| AuthSession {
            access_token,
            refresh_token,
            identity,
        }))
    }

    fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        let conn = self.pool.get()?;
        let found: Option<(String, String, String, Option<String>)> = conn
            .query_row(
                "SELECT id, email, password_hash, confirmed_at
                 FROM auth_identities WHERE email = ?1",
                params![email.trim()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let invalid = || BackendError::Auth("invalid login credentials".into());
        let (id, email, hash, confirmed_at) = found.ok_or_else(invalid)?;
        if !bcrypt::verify(password, &hash).map_err(|_| invalid())? {
            return Err(invalid());
        }
        if confirmed_at.is_none() {
            return Err(BackendError::Auth("email not confirmed".into()));
        }

        self.issue_session(&conn, Identity { id, email })
    }

    fn sign_up(&self, email: &str, password: &str) -> BackendResult<PendingIdentity> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(BackendError::Auth("invalid email address".into()));
        }
        if password.len() < 6 {
            return Err(BackendError::Auth(
                "password should be at least 6 characters".into(),
            ));
        }

        let hash = bcrypt::hash(password, self.settings.bcrypt_cost)
            .map_err(|e| BackendError::Auth(format!("could not hash password: {e}")))?;
        let id = uuid::Uuid::now_v7().to_string();
        let confirmation_token = generate_token();

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO auth_identities (id, email, password_hash, confirmation_token)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, email, hash, confirmation_token],
        )
        .map_err(|e| match classify(e) {
            BackendError::Conflict(_) => BackendError::Conflict("user already registered".into()),
            other => other,
        })?;

        // There is no mailer; the token is only visible in debug logs
        tracing::debug!(identity_id = %id, %confirmation_token, "sign-up pending confirmation");

        Ok(PendingIdentity {
            id,
            email: email.to_string(),
            confirmation_token,
        })
    }

    fn confirm(&self, confirmation_token: &str) -> BackendResult<AuthSession> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let found: Option<(String, String)> = tx
            .query_row(
                "SELECT id, email FROM auth_identities WHERE confirmation_token = ?1",
                params![confirmation_token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (id, email) = found
            .ok_or_else(|| BackendError::Auth("invalid or expired confirmation token".into()))?;

        tx.execute(
            "UPDATE auth_identities
             SET confirmed_at = ?1, confirmation_token = NULL
             WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        let session = self.issue_session(&tx, Identity { id, email })?;
        tx.commit()?;
        Ok(session)
    }

    fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE auth_sessions SET revoked = 1 WHERE access_token = ?1",
            params![access_token],
        )?;
        Ok(())
    }
}

// -- query building --

fn classify(err: rusqlite::Error) -> BackendError {
    if let rusqlite::Error::SqliteFailure(code, ref message) = err {
        let detail = message.clone().unwrap_or_default();
        let extended = code.extended_code;
        if extended == ffi::SQLITE_CONSTRAINT_UNIQUE || extended == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return BackendError::Conflict(detail);
        }
        if extended == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
            return BackendError::ForeignKey(detail);
        }
        if extended == ffi::SQLITE_CONSTRAINT_CHECK {
            return BackendError::InvalidQuery(detail);
        }
    }
    BackendError::Database(err)
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

fn check_column(table: Table, column: &str) -> BackendResult<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(BackendError::InvalidQuery(format!(
            "unknown column {}.{}",
            table.name(),
            column
        )))
    }
}

fn where_clause(
    table: Table,
    filters: &[Filter],
    params: &mut Vec<SqlValue>,
) -> BackendResult<String> {
    let mut clauses = Vec::with_capacity(filters.len());
    for filter in filters {
        let column = filter.column();
        check_column(table, column)?;
        match filter {
            Filter::Eq(_, Value::Null) => clauses.push(format!("{column} IS NULL")),
            Filter::Eq(_, value) => {
                params.push(to_sql(value));
                clauses.push(format!("{column} = ?"));
            }
            Filter::ILike(_, pattern) => {
                params.push(SqlValue::Text(pattern.clone()));
                clauses.push(format!("{column} LIKE ? ESCAPE '\\'"));
            }
            Filter::In(_, values) if values.is_empty() => clauses.push("0".to_string()),
            Filter::In(_, values) => {
                params.extend(values.iter().map(to_sql));
                let marks = vec!["?"; values.len()].join(", ");
                clauses.push(format!("{column} IN ({marks})"));
            }
        }
    }

    if clauses.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", clauses.join(" AND ")))
    }
}

fn read_rows(
    conn: &Connection,
    sql: &str,
    params: Vec<SqlValue>,
) -> BackendResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let mut rows = stmt.query(params_from_iter(params))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = Row::new();
        for (i, name) in names.iter().enumerate() {
            map.insert(name.clone(), from_sql(row.get_ref(i)?));
        }
        out.push(map);
    }
    Ok(out)
}

/// Column that ties a row to the identity allowed to write it.
fn owner_column(table: Table) -> Option<&'static str> {
    match table {
        Table::Users => Some("id"),
        Table::Posts => Some("user_id"),
        Table::Likes => Some("user_id"),
        Table::Follows => Some("follower_id"),
        Table::Tags | Table::PostTags => None,
    }
}

impl LocalHandle {
    fn actor(&self, conn: &Connection) -> BackendResult<Actor> {
        match &self.principal {
            Principal::Service => Ok(Actor::Service),
            Principal::Bearer(token) => Ok(Actor::User(self.store.verify(conn, token)?)),
            Principal::Anonymous => Err(BackendError::Auth("authentication required".into())),
        }
    }

    fn check_insert(&self, conn: &Connection, table: Table, row: &Row) -> BackendResult<()> {
        let user = match self.actor(conn)? {
            Actor::Service => return Ok(()),
            Actor::User(identity) => identity,
        };

        if let Some(column) = owner_column(table) {
            return match row.get(column) {
                Some(Value::String(owner)) if *owner == user.id => Ok(()),
                _ => Err(BackendError::Forbidden(format!(
                    "{} rows must be owned by the caller",
                    table.name()
                ))),
            };
        }

        if table == Table::PostTags {
            let post_id = row.get("post_id").map(to_sql).unwrap_or(SqlValue::Null);
            let owner: Option<String> = conn
                .query_row(
                    "SELECT user_id FROM posts WHERE id = ?1",
                    params![post_id],
                    |r| r.get(0),
                )
                .optional()?;
            return match owner {
                Some(owner) if owner == user.id => Ok(()),
                Some(_) => Err(BackendError::Forbidden("post belongs to another user".into())),
                None => Err(BackendError::ForeignKey("post does not exist".into())),
            };
        }

        Ok(())
    }

    /// Narrows a mutation to the caller's own rows.
    fn scope_filters(
        &self,
        conn: &Connection,
        table: Table,
        filters: &[Filter],
    ) -> BackendResult<Vec<Filter>> {
        let mut scoped = filters.to_vec();
        match self.actor(conn)? {
            Actor::Service => {}
            Actor::User(identity) => match owner_column(table) {
                Some(column) => scoped.push(Filter::eq(column, identity.id)),
                None => {
                    return Err(BackendError::Forbidden(format!(
                        "{} rows can only be changed by the service",
                        table.name()
                    )))
                }
            },
        }
        Ok(scoped)
    }

    fn select_rows(&self, query: &Query) -> BackendResult<Vec<Row>> {
        let table = query.table;
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            table.columns().join(", "),
            table.name(),
            where_clause(table, &query.filters, &mut params)?
        );

        if !query.order.is_empty() {
            let mut terms = Vec::with_capacity(query.order.len());
            for order in &query.order {
                check_column(table, order.column)?;
                let dir = match order.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                terms.push(format!("{} {}", order.column, dir));
            }
            sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.store.pool.get()?;
        read_rows(&conn, &sql, params)
    }

    fn count_rows(&self, query: &Query) -> BackendResult<u64> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            query.table.name(),
            where_clause(query.table, &query.filters, &mut params)?
        );
        let conn = self.store.pool.get()?;
        let count: i64 = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn insert_row(&self, table: Table, row: Row) -> BackendResult<Row> {
        if row.is_empty() {
            return Err(BackendError::InvalidQuery("empty insert".into()));
        }
        let mut columns = Vec::with_capacity(row.len());
        let mut params = Vec::with_capacity(row.len());
        for (column, value) in &row {
            check_column(table, column)?;
            columns.push(column.as_str());
            params.push(to_sql(value));
        }

        let conn = self.store.pool.get()?;
        self.check_insert(&conn, table, &row)?;

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name(),
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        conn.execute(&sql, params_from_iter(params))
            .map_err(classify)?;

        let rowid = conn.last_insert_rowid();
        let sql = format!(
            "SELECT {} FROM {} WHERE rowid = ?",
            table.columns().join(", "),
            table.name()
        );
        read_rows(&conn, &sql, vec![SqlValue::Integer(rowid)])?
            .into_iter()
            .next()
            .ok_or(BackendError::NotFound)
    }

    fn update_rows(&self, table: Table, values: Row, filters: &[Filter]) -> BackendResult<u64> {
        if values.is_empty() {
            return Err(BackendError::InvalidQuery("empty update".into()));
        }
        let conn = self.store.pool.get()?;
        let filters = self.scope_filters(&conn, table, filters)?;

        let mut assignments = Vec::with_capacity(values.len());
        let mut params = Vec::with_capacity(values.len());
        for (column, value) in &values {
            check_column(table, column)?;
            assignments.push(format!("{column} = ?"));
            params.push(to_sql(value));
        }
        let sql = format!(
            "UPDATE {} SET {}{}",
            table.name(),
            assignments.join(", "),
            where_clause(table, &filters, &mut params)?
        );
        let changed = conn
            .execute(&sql, params_from_iter(params))
            .map_err(classify)?;
        Ok(changed as u64)
    }

    fn delete_rows(&self, table: Table, filters: &[Filter]) -> BackendResult<u64> {
        if filters.is_empty() {
            return Err(BackendError::InvalidQuery(
                "refusing to delete without a filter".into(),
            ));
        }
        let conn = self.store.pool.get()?;
        let filters = self.scope_filters(&conn, table, filters)?;

        let mut params = Vec::new();
        let sql = format!(
            "DELETE FROM {}{}",
            table.name(),
            where_clause(table, &filters, &mut params)?
        );
        let changed = conn
            .execute(&sql, params_from_iter(params))
            .map_err(classify)?;
        Ok(changed as u64)
    }

    fn call(&self, function: &str, args: &Row) -> BackendResult<Value> {
        let conn = self.store.pool.get()?;
        match function {
            "profile_total_likes" => {
                let user_id = args
                    .get("user_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| BackendError::InvalidQuery("user_id is required".into()))?;
                let total: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM likes l
                     JOIN posts p ON p.id = l.post_id
                     WHERE p.user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )?;
                Ok(json!(total))
            }
            "like_counts" => {
                let ids: Vec<SqlValue> = args
                    .get("post_ids")
                    .and_then(Value::as_array)
                    .ok_or_else(|| BackendError::InvalidQuery("post_ids is required".into()))?
                    .iter()
                    .map(to_sql)
                    .collect();
                let mut counts = serde_json::Map::new();
                if ids.is_empty() {
                    return Ok(Value::Object(counts));
                }
                let sql = format!(
                    "SELECT post_id, COUNT(*) FROM likes WHERE post_id IN ({}) GROUP BY post_id",
                    vec!["?"; ids.len()].join(", ")
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(ids), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
                })?;
                for row in rows {
                    let (post_id, count) = row?;
                    counts.insert(post_id.to_string(), json!(count));
                }
                Ok(Value::Object(counts))
            }
            other => Err(BackendError::InvalidQuery(format!(
                "unknown function {other}"
            ))),
        }
    }

    fn require_actor(&self) -> BackendResult<Actor> {
        let conn = self.store.pool.get()?;
        self.actor(&conn)
    }

    /// Runs identity work that hashes passwords or waits on the write lock
    /// on the blocking pool.
    async fn blocking<T, F>(&self, work: F) -> BackendResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&LocalStore) -> BackendResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || work(store.as_ref()))
            .await
            .map_err(|e| {
                BackendError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }
}

#[async_trait]
impl Backend for LocalHandle {
    async fn verify_access_token(&self, token: &str) -> BackendResult<Identity> {
        let conn = self.store.pool.get()?;
        self.store.verify(&conn, token)
    }

    async fn refresh_session(&self, refresh_token: &str) -> BackendResult<AuthSession> {
        let refresh_token = refresh_token.to_string();
        self.blocking(move |store| store.refresh(&refresh_token))
            .await
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        let (email, password) = (email.to_string(), password.to_string());
        self.blocking(move |store| store.sign_in(&email, &password))
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> BackendResult<PendingIdentity> {
        let (email, password) = (email.to_string(), password.to_string());
        self.blocking(move |store| store.sign_up(&email, &password))
            .await
    }

    async fn confirm_sign_up(&self, confirmation_token: &str) -> BackendResult<AuthSession> {
        self.store.confirm(confirmation_token)
    }

    async fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        self.store.sign_out(access_token)
    }

    async fn select(&self, query: &Query) -> BackendResult<Vec<Row>> {
        self.select_rows(query)
    }

    async fn count(&self, query: &Query) -> BackendResult<u64> {
        self.count_rows(query)
    }

    async fn insert(&self, table: Table, row: Row) -> BackendResult<Row> {
        self.insert_row(table, row)
    }

    async fn update(&self, table: Table, values: Row, filters: &[Filter]) -> BackendResult<u64> {
        self.update_rows(table, values, filters)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> BackendResult<u64> {
        self.delete_rows(table, filters)
    }

    async fn rpc(&self, function: &str, args: Row) -> BackendResult<Value> {
        self.call(function, &args)
    }

    async fn upload(&self, path: &str, bytes: Bytes) -> BackendResult<String> {
        self.require_actor()?;
        self.store.objects.put(path, bytes).await
    }

    async fn remove(&self, paths: &[String]) -> BackendResult<()> {
        self.require_actor()?;
        self.store.objects.remove(paths).await
    }

    async fn list(&self, folder: &str, page: Page) -> BackendResult<Vec<ObjectInfo>> {
        match self.require_actor()? {
            Actor::Service => self.store.objects.list(folder, page).await,
            Actor::User(_) => Err(BackendError::Forbidden(
                "listing objects requires the service role".into(),
            )),
        }
    }
}
