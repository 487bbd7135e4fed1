//! Document store connection.
//!
//! The store handle is built once at startup, verified with a ping, and then
//! shared read-mostly by every concurrent transition. A failed initial
//! connection is one of the few fatal startup paths.

use crate::config::Config;
use crate::errors::ReconcilerError;
use common::secret::ExposeSecret;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::{Client, Collection, Database};
use std::future::IntoFuture;
use std::time::Duration;
use tracing::{info, instrument};

/// Collection holding meeting documents.
pub const MEETINGS_COLLECTION: &str = "meetings";

/// Collection holding user documents with embedded devices.
pub const USERS_COLLECTION: &str = "users";

const APP_NAME: &str = "meeting-reconciler";

/// Shared handle to the reconciler's database.
///
/// Cloning is cheap; the driver pools connections internally.
#[derive(Clone, Debug)]
pub struct StoreHandle {
    database: Database,
    operation_timeout: Duration,
}

impl StoreHandle {
    /// Wrap an existing database handle.
    pub fn new(database: Database, operation_timeout: Duration) -> Self {
        Self {
            database,
            operation_timeout,
        }
    }

    pub fn meetings(&self) -> Collection<Document> {
        self.database.collection(MEETINGS_COLLECTION)
    }

    pub fn users(&self) -> Collection<Document> {
        self.database.collection(USERS_COLLECTION)
    }

    /// Upper bound for a single store operation.
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }
}

/// Connect to the document store and verify the connection with a ping.
///
/// # Errors
///
/// Returns `ReconcilerError::Store` if the options are invalid or the server
/// cannot be reached, and `ReconcilerError::Timeout` if the ping does not
/// complete within the configured timeout.
#[instrument(skip_all, fields(host = %config.mongo_host, database = %config.mongo_database))]
pub async fn connect(config: &Config) -> Result<StoreHandle, ReconcilerError> {
    let address = ServerAddress::parse(&config.mongo_host)?;

    let credential = Credential::builder()
        .username(config.mongo_username.clone())
        .password(config.mongo_password.expose_secret().to_string())
        .source(config.mongo_auth_source.clone())
        .build();

    let options = ClientOptions::builder()
        .hosts(vec![address])
        .credential(credential)
        .connect_timeout(config.mongo_timeout)
        .server_selection_timeout(config.mongo_timeout)
        .app_name(APP_NAME.to_string())
        .build();

    let client = Client::with_options(options)?;
    let database = client.database(&config.mongo_database);

    with_timeout(
        config.mongo_timeout,
        "ping",
        database.run_command(doc! { "ping": 1 }),
    )
    .await?;

    info!(target: "reconciler.store", "Store connection verified");

    Ok(StoreHandle::new(database, config.mongo_timeout))
}

/// Run a driver operation with an upper time bound.
pub(crate) async fn with_timeout<T, F>(
    timeout: Duration,
    operation: &str,
    future: F,
) -> Result<T, ReconcilerError>
where
    F: IntoFuture<Output = Result<T, mongodb::error::Error>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result.map_err(ReconcilerError::from),
        Err(_) => Err(ReconcilerError::Timeout(format!(
            "store {} exceeded {}ms",
            operation,
            timeout.as_millis()
        ))),
    }
}
