use crate::backup::database::Connector;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::rules::{ConnectionParams, DatabaseSpec};

use derive_more::Display;

/// Identifies a server account; specs with the same key share a connection.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{user}@{host}")]
pub struct ConnectionKey {
    pub host: String,
    pub user: String,
}

impl From<&ConnectionParams> for ConnectionKey {
    fn from(params: &ConnectionParams) -> Self {
        Self {
            host: params.host_or_default().to_string(),
            user: params.user().clone(),
        }
    }
}

struct ActiveConnection<T> {
    key: ConnectionKey,
    conn: T,
}

/// Holds the single active connection of a backup run.
///
/// A spec with its own credentials replaces the active connection, closing
/// the previous one first, unless it names the same account. A spec without
/// credentials reuses whatever is active.
pub struct ConnectionCache<C: Connector> {
    connector: C,
    active: Option<ActiveConnection<C::Connection>>,
}

impl<C: Connector> ConnectionCache<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            active: None,
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn active_key(&self) -> Option<&ConnectionKey> {
        self.active.as_ref().map(|a| &a.key)
    }

    /// Resolves the connection `spec` should be dumped over.
    ///
    /// Fails with [`Error::NoConnection`] when the spec has no usable
    /// credentials and nothing is active yet.
    pub fn activate(&mut self, spec: &DatabaseSpec) -> Result<&mut C::Connection> {
        if let Some(params) = spec.override_params() {
            let key = ConnectionKey::from(params);
            if self.active_key() != Some(&key) {
                self.close();
                tracing::info!("Connecting to {} for database {:?}", key, spec.name());
                let conn = self.connector.connect(params, spec.name())?;
                let active = self.active.insert(ActiveConnection { key, conn });
                return Ok(&mut active.conn);
            }
        }

        match self.active.as_mut() {
            Some(active) => {
                tracing::debug!("Reusing connection {} for database {:?}", active.key, spec.name());
                Ok(&mut active.conn)
            }
            None => Err(Error::NoConnection {
                database: spec.name().clone(),
            }),
        }
    }

    /// Drops the active connection, if any.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!("Closing connection {}", active.key);
        }
    }
}
