use anyhow::{Context, Result, bail};
use redis::Commands;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A key-value store reachable by every server process
pub trait SharedStore: Send + Sync {
    fn ping(&self) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Redis-backed shared store holding one reusable connection.
///
/// A command error drops the connection; the next command reconnects.
pub struct RedisStore {
    client: redis::Client,
    timeout: Duration,
    connection: Mutex<Option<redis::Connection>>,
}

impl RedisStore {
    pub fn open(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url).with_context(|| format!("Invalid redis URL: {}", url))?;
        Ok(Self {
            client,
            timeout,
            connection: Mutex::new(None),
        })
    }

    /// Whether a connection is currently held open
    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    fn connect(&self) -> Result<redis::Connection> {
        let con = self
            .client
            .get_connection_with_timeout(self.timeout)
            .context("Failed to connect to redis")?;
        con.set_read_timeout(Some(self.timeout))
            .context("Failed to set redis read timeout")?;
        con.set_write_timeout(Some(self.timeout))
            .context("Failed to set redis write timeout")?;
        Ok(con)
    }

    fn with_connection<T>(&self, f: impl FnOnce(&mut redis::Connection) -> Result<T>) -> Result<T> {
        let mut slot = self
            .connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_none() {
            *slot = Some(self.connect()?);
        }
        let Some(con) = slot.as_mut() else {
            bail!("redis connection unavailable");
        };

        let result = f(con);
        if result.is_err() {
            *slot = None;
        }
        result
    }
}

impl SharedStore for RedisStore {
    fn ping(&self) -> Result<()> {
        self.with_connection(|con| {
            let _: String = redis::cmd("PING").query(con).context("redis PING failed")?;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_connection(|con| con.get(key).context("redis GET failed"))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.with_connection(|con| con.set::<_, _, ()>(key, value).context("redis SET failed"))
    }
}

#[derive(Debug)]
enum Health {
    Up,
    Down { since: Instant },
}

/// Shared store plus its connection health.
///
/// Any failure marks the tier down. While down, calls are skipped until
/// `retry_after` has passed, at which point the next call re-probes with a
/// ping and brings the tier back if it answers.
pub struct SharedTier {
    store: Option<Box<dyn SharedStore>>,
    health: Mutex<Health>,
    retry_after: Duration,
}

impl SharedTier {
    /// Wrap a store, probing it once up front
    pub fn new(store: Box<dyn SharedStore>, retry_after: Duration) -> Self {
        let health = match store.ping() {
            Ok(()) => Health::Up,
            Err(e) => {
                tracing::warn!(error = %e, "shared store not available, falling back to disk cache");
                Health::Down {
                    since: Instant::now(),
                }
            }
        };

        Self {
            store: Some(store),
            health: Mutex::new(health),
            retry_after,
        }
    }

    /// A tier with no backing store; every lookup misses
    pub fn disabled() -> Self {
        Self {
            store: None,
            health: Mutex::new(Health::Up),
            retry_after: Duration::ZERO,
        }
    }

    /// Connect to redis, degrading to a disabled tier on a bad URL
    pub fn redis(url: &str, retry_after: Duration) -> Self {
        match RedisStore::open(url, Duration::from_secs(5)) {
            Ok(store) => Self::new(Box::new(store), retry_after),
            Err(e) => {
                tracing::warn!(error = %e, "shared store disabled, using disk cache only");
                Self::disabled()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    /// Whether the tier is currently believed reachable
    pub fn is_up(&self) -> bool {
        self.store.is_some() && matches!(*self.lock_health(), Health::Up)
    }

    fn lock_health(&self) -> std::sync::MutexGuard<'_, Health> {
        self.health.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the store if it is up or due for a successful re-probe.
    ///
    /// The health lock is not held while pinging. The first caller past the
    /// cooldown restarts it, so concurrent callers skip the store instead of
    /// waiting on the probe.
    fn available(&self) -> Option<&dyn SharedStore> {
        let store = self.store.as_deref()?;
        {
            let mut health = self.lock_health();
            match *health {
                Health::Up => return Some(store),
                Health::Down { since } if since.elapsed() >= self.retry_after => {
                    *health = Health::Down {
                        since: Instant::now(),
                    };
                }
                Health::Down { .. } => return None,
            }
        }

        match store.ping() {
            Ok(()) => {
                tracing::info!("shared store reachable again");
                *self.lock_health() = Health::Up;
                Some(store)
            }
            Err(e) => {
                tracing::debug!(error = %e, "shared store still unavailable");
                self.mark_down();
                None
            }
        }
    }

    fn mark_down(&self) {
        *self.lock_health() = Health::Down {
            since: Instant::now(),
        };
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let store = self.available()?;
        match store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read from shared store");
                self.mark_down();
                None
            }
        }
    }

    /// Best-effort write; returns whether the value was stored
    pub fn set(&self, key: &str, value: &[u8]) -> bool {
        let Some(store) = self.available() else {
            return false;
        };
        match store.set(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to write to shared store");
                self.mark_down();
                false
            }
        }
    }
}
