//! A backend whose next read of a table disagrees with the database, the
//! view a request has when another request writes between its read and
//! its write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use inkpost::backend::{
    AuthSession, Backend, BackendResult, Filter, Identity, ObjectInfo, Page, PendingIdentity,
    Query, Row, Table,
};

#[derive(Debug, Clone, Copy)]
pub enum Stale {
    /// Counts report 0 and selects return nothing.
    Absent,
    /// Counts report 1.
    Present,
}

pub struct StaleBackend {
    inner: Arc<dyn Backend>,
    pending: Mutex<HashMap<Table, Stale>>,
}

impl StaleBackend {
    pub fn new(inner: Arc<dyn Backend>) -> Self {
        Self {
            inner,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// The next count or select on `table` reports `view`. Later reads see
    /// the database again.
    pub fn once(self, table: Table, view: Stale) -> Self {
        self.pending.lock().unwrap().insert(table, view);
        self
    }

    fn take(&self, table: Table) -> Option<Stale> {
        self.pending.lock().unwrap().remove(&table)
    }
}

#[async_trait]
impl Backend for StaleBackend {
    async fn verify_access_token(&self, token: &str) -> BackendResult<Identity> {
        self.inner.verify_access_token(token).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> BackendResult<AuthSession> {
        self.inner.refresh_session(refresh_token).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        self.inner.sign_in(email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> BackendResult<PendingIdentity> {
        self.inner.sign_up(email, password).await
    }

    async fn confirm_sign_up(&self, confirmation_token: &str) -> BackendResult<AuthSession> {
        self.inner.confirm_sign_up(confirmation_token).await
    }

    async fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        self.inner.sign_out(access_token).await
    }

    async fn select(&self, query: &Query) -> BackendResult<Vec<Row>> {
        match self.take(query.table) {
            Some(Stale::Absent) => Ok(Vec::new()),
            Some(Stale::Present) | None => self.inner.select(query).await,
        }
    }

    async fn count(&self, query: &Query) -> BackendResult<u64> {
        match self.take(query.table) {
            Some(Stale::Absent) => Ok(0),
            Some(Stale::Present) => Ok(1),
            None => self.inner.count(query).await,
        }
    }

    async fn insert(&self, table: Table, row: Row) -> BackendResult<Row> {
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: Table, values: Row, filters: &[Filter]) -> BackendResult<u64> {
        self.inner.update(table, values, filters).await
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> BackendResult<u64> {
        self.inner.delete(table, filters).await
    }

    async fn rpc(&self, function: &str, args: Row) -> BackendResult<Value> {
        self.inner.rpc(function, args).await
    }

    async fn upload(&self, path: &str, bytes: Bytes) -> BackendResult<String> {
        self.inner.upload(path, bytes).await
    }

    async fn remove(&self, paths: &[String]) -> BackendResult<()> {
        self.inner.remove(paths).await
    }

    async fn list(&self, folder: &str, page: Page) -> BackendResult<Vec<ObjectInfo>> {
        self.inner.list(folder, page).await
    }
}
