//! Memcached page store.
//!
//! The connection is opened on first use. Values are stored as raw bytes with
//! no expiry; the client does not compress.

use bytes::Bytes;
use memcache::Client;
use once_cell::sync::OnceCell;
use tracing::info;

use crate::cache::{CacheConfig, PageStore, StoreError};

pub struct MemcachedStore {
    endpoint: String,
    url: String,
    client: OnceCell<Client>,
}

impl MemcachedStore {
    pub fn new(config: &CacheConfig) -> Self {
        let endpoint = config.server_addr().to_string();
        let url = format!(
            "memcache://{endpoint}?timeout={}&tcp_nodelay=true",
            config.io_timeout.as_secs_f64()
        );
        Self {
            endpoint,
            url,
            client: OnceCell::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn client(&self) -> Result<&Client, StoreError> {
        self.client.get_or_try_init(|| {
            let client = Client::connect(self.url.as_str())
                .map_err(|err| StoreError::connect(self.endpoint.clone(), err))?;
            info!(endpoint = %self.endpoint, "connected to memcached");
            Ok(client)
        })
    }
}

impl PageStore for MemcachedStore {
    fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.client()?
            .get::<Vec<u8>>(key)
            .map(|value| value.map(Bytes::from))
            .map_err(|err| StoreError::operation("get", err))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.client()?
            .set(key, value, 0)
            .map_err(|err| StoreError::operation("set", err))
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.client()?
            .delete(key)
            .map_err(|err| StoreError::operation("delete", err))
    }

    fn backend(&self) -> &'static str {
        "memcached"
    }
}
