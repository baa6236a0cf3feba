use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{SessionData, SessionError};

/// Где живут сессии между запросами.
#[derive(Clone)]
pub enum SessionStore {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl SessionStore {
    pub async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        match self {
            SessionStore::Memory(store) => Ok(store.load(id).await),
            SessionStore::Redis(store) => store.load(id).await,
        }
    }

    pub async fn save(&self, id: &str, data: &SessionData) -> Result<(), SessionError> {
        match self {
            SessionStore::Memory(store) => {
                store.save(id, data.clone()).await;
                Ok(())
            }
            SessionStore::Redis(store) => store.save(id, data).await,
        }
    }
}

/// Сессии в памяти процесса. Запись живёт `ttl` с последнего сохранения,
/// просроченные вычищаются при каждом сохранении.
#[derive(Clone)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, (Instant, SessionData)>>>,
    ttl: Duration,
}

impl MemoryStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            sessions: Arc::default(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    pub async fn load(&self, id: &str) -> Option<SessionData> {
        let sessions = self.sessions.read().await;
        let (expires_at, data) = sessions.get(id)?;
        (*expires_at > Instant::now()).then(|| data.clone())
    }

    pub async fn save(&self, id: &str, data: SessionData) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, (expires_at, _)| *expires_at > now);
        sessions.insert(id.to_string(), (now + self.ttl, data));
    }

    /// Число хранимых записей, включая ещё не вычищенные просроченные.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Сессии в Redis: JSON-документ под ключом `session:<id>` с TTL.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    ttl_seconds: u64,
}

impl RedisStore {
    pub async fn connect(redis_url: &str, ttl_seconds: u64) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(RedisStore { conn, ttl_seconds })
    }

    fn key(id: &str) -> String {
        format!("session:{}", id)
    }

    pub async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(id)).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(SessionError::from)
    }

    pub async fn save(&self, id: &str, data: &SessionData) -> Result<(), SessionError> {
        let json = serde_json::to_string(data)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(Self::key(id), json, self.ttl_seconds).await?;
        Ok(())
    }
}
