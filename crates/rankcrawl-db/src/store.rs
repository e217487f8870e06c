//! The relational store the loader talks to.

use std::future::Future;

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};

use crate::connection::ConnectionParams;

/// Opens connections to a relational store.
pub trait RelationalStore: Send + Sync {
    type Connection: StoreConnection;

    fn connect(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<Self::Connection, sqlx::Error>> + Send;
}

/// One open connection.
pub trait StoreConnection: Send {
    /// Runs a single statement.
    fn execute(&mut self, sql: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Runs a `COPY ... FROM STDIN` statement and streams `data` into it.
    /// Returns the number of rows copied.
    fn copy_in(
        &mut self,
        statement: &str,
        data: &[u8],
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;

    fn close(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

/// Postgres over sqlx.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgStore;

impl RelationalStore for PgStore {
    type Connection = PgConnection;

    async fn connect(&self, params: &ConnectionParams) -> Result<PgConnection, sqlx::Error> {
        let mut options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.user)
            .database(&params.database);
        if let Some(password) = &params.password {
            options = options.password(password);
        }
        PgConnection::connect_with(&options).await
    }
}

impl StoreConnection for PgConnection {
    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        Executor::execute(&mut *self, sql).await?;
        Ok(())
    }

    async fn copy_in(&mut self, statement: &str, data: &[u8]) -> Result<u64, sqlx::Error> {
        let mut copy = self.copy_in_raw(statement).await?;
        let sent = copy.send(data).await.map(|_| ());
        if let Err(e) = sent {
            if let Err(abort) = copy.abort(e.to_string()).await {
                tracing::warn!(error = %abort, "could not abort COPY");
            }
            return Err(e);
        }
        copy.finish().await
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        Connection::close(self).await
    }
}
