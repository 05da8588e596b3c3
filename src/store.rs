use crate::config::{SaveMode, StoreEndpoint};
use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// An open control connection to the store.
#[async_trait]
pub trait StoreControl: Send {
    /// Sends the save command for `mode`. The reply only says the request was
    /// accepted; completion is observed on disk.
    async fn request_save(&mut self, mode: SaveMode) -> Result<(), StoreError>;
}

/// Opens control connections. Kept behind a trait so the snapshot protocol
/// can run against a scripted store.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, endpoint: &StoreEndpoint) -> Result<Box<dyn StoreControl>, StoreError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RedisConnector;

pub struct RedisControl {
    conn: redis::aio::MultiplexedConnection,
    endpoint: String,
}

/// `redis://[:password@]host:port/`, with the password percent-encoded.
pub fn connection_url(endpoint: &StoreEndpoint) -> Result<Url, StoreError> {
    let unreachable = |reason: String| StoreError::Unreachable {
        endpoint: endpoint.address(),
        reason,
    };

    let mut url = Url::parse(&format!("redis://{}/", endpoint.address()))
        .map_err(|e| unreachable(format!("invalid address: {}", e)))?;
    if let Some(ref password) = endpoint.password {
        url.set_password(Some(password))
            .map_err(|_| unreachable("password cannot be encoded in URL".to_string()))?;
    }
    Ok(url)
}

#[async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self, endpoint: &StoreEndpoint) -> Result<Box<dyn StoreControl>, StoreError> {
        let address = endpoint.address();
        let unreachable = |reason: String| StoreError::Unreachable {
            endpoint: address.clone(),
            reason,
        };

        let url = connection_url(endpoint)?;
        let client = redis::Client::open(url.as_str()).map_err(|e| unreachable(e.to_string()))?;

        info!("Connecting to store at {}...", address);
        let mut conn = tokio::time::timeout(CONNECT_TIMEOUT, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| unreachable(format!("no answer within {:?}", CONNECT_TIMEOUT)))?
            .map_err(|e| unreachable(e.to_string()))?;

        // Authentication problems only surface on the first command.
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| unreachable(format!("PING failed: {}", e)))?;

        debug!("Store connected at {}", address);
        Ok(Box::new(RedisControl {
            conn,
            endpoint: address,
        }))
    }
}

#[async_trait]
impl StoreControl for RedisControl {
    async fn request_save(&mut self, mode: SaveMode) -> Result<(), StoreError> {
        let Some(command) = mode.command() else {
            return Ok(());
        };

        info!("Sending {} to {}", command, self.endpoint);
        match redis::cmd(command).query_async::<String>(&mut self.conn).await {
            Ok(reply) => {
                debug!("{} reply: {}", command, reply);
                Ok(())
            }
            Err(e) if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() => {
                Err(StoreError::CommandFailed {
                    endpoint: self.endpoint.clone(),
                    command,
                    reason: e.to_string(),
                })
            }
            // e.g. a background save already running: the file still gets
            // rewritten, so keep watching it.
            Err(e) => {
                warn!("{} returned an error, waiting for the snapshot anyway: {}", command, e);
                Ok(())
            }
        }
    }
}
