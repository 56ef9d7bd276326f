//! Minimal fixed-size pool for `tiberius`, which has no pooling of its own.

use std::sync::Arc;

use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

pub type MssqlClient = Client<Compat<TcpStream>>;

/// A small pool of idle clients guarded by a semaphore; connections are
/// created lazily up to `capacity` and recycled on return.
#[derive(Clone)]
pub struct MssqlPool {
    config: Config,
    idle: Arc<Mutex<Vec<MssqlClient>>>,
    permits: Arc<Semaphore>,
}

impl MssqlPool {
    pub async fn connect(connection_string: &str, capacity: usize) -> Result<Self, anyhow::Error> {
        let config = Config::from_ado_string(connection_string)?;
        // Validate the connection string eagerly by opening and dropping one client.
        let probe = Self::open_client(&config).await?;
        let idle = Arc::new(Mutex::new(vec![probe]));
        Ok(Self {
            config,
            idle,
            permits: Arc::new(Semaphore::new(capacity)),
        })
    }

    async fn open_client(config: &Config) -> Result<MssqlClient, anyhow::Error> {
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        let client = Client::connect(config.clone(), tcp.compat_write()).await?;
        Ok(client)
    }

    /// Borrow a client for the duration of a request; returns it to the idle
    /// pool on drop of the guard.
    pub async fn acquire(&self) -> Result<MssqlGuard, anyhow::Error> {
        let permit = self.permits.clone().acquire_owned().await?;
        let client = {
            let mut idle = self.idle.lock().await;
            idle.pop()
        };
        let client = match client {
            Some(c) => c,
            None => Self::open_client(&self.config).await?,
        };
        Ok(MssqlGuard {
            client: Some(client),
            idle: self.idle.clone(),
            _permit: permit,
        })
    }
}

pub struct MssqlGuard {
    client: Option<MssqlClient>,
    idle: Arc<Mutex<Vec<MssqlClient>>>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl std::ops::Deref for MssqlGuard {
    type Target = MssqlClient;
    fn deref(&self) -> &Self::Target {
        self.client.as_ref().expect("client taken")
    }
}

impl std::ops::DerefMut for MssqlGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client.as_mut().expect("client taken")
    }
}

impl Drop for MssqlGuard {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            let idle = self.idle.clone();
            tokio::spawn(async move {
                idle.lock().await.push(client);
            });
        }
    }
}
