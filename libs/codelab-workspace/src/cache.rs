//! Best-effort persistence for learner buffers and the server template map
//!
//! Buffers are keyed by owner and problem so two learners never see each
//! other's drafts; templates are global.

use crate::error::CacheError;
use async_trait::async_trait;
use codelab_common::redis::{self as keys, BufferMap};
use parking_lot::Mutex;
use std::collections::HashMap;

#[async_trait]
pub trait BufferCache: Send + Sync {
    async fn load_buffers(&self, owner: &str, problem_id: &str)
        -> Result<Option<BufferMap>, CacheError>;

    async fn store_buffers(
        &self,
        owner: &str,
        problem_id: &str,
        buffers: &BufferMap,
    ) -> Result<(), CacheError>;

    async fn load_templates(&self) -> Result<Option<HashMap<String, String>>, CacheError>;

    async fn store_templates(&self, templates: &HashMap<String, String>) -> Result<(), CacheError>;
}

/// In-process cache; lives as long as the process
#[derive(Default)]
pub struct MemoryCache {
    buffers: Mutex<HashMap<(String, String), BufferMap>>,
    templates: Mutex<Option<HashMap<String, String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BufferCache for MemoryCache {
    async fn load_buffers(
        &self,
        owner: &str,
        problem_id: &str,
    ) -> Result<Option<BufferMap>, CacheError> {
        let key = (owner.to_string(), problem_id.to_string());
        Ok(self.buffers.lock().get(&key).cloned())
    }

    async fn store_buffers(
        &self,
        owner: &str,
        problem_id: &str,
        buffers: &BufferMap,
    ) -> Result<(), CacheError> {
        self.buffers
            .lock()
            .insert((owner.to_string(), problem_id.to_string()), buffers.clone());
        Ok(())
    }

    async fn load_templates(&self) -> Result<Option<HashMap<String, String>>, CacheError> {
        Ok(self.templates.lock().clone())
    }

    async fn store_templates(&self, templates: &HashMap<String, String>) -> Result<(), CacheError> {
        *self.templates.lock() = Some(templates.clone());
        Ok(())
    }
}

/// Redis-backed cache shared by every process pointing at the same server
#[derive(Clone)]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl BufferCache for RedisCache {
    async fn load_buffers(
        &self,
        owner: &str,
        problem_id: &str,
    ) -> Result<Option<BufferMap>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(keys::load_buffers(&mut conn, owner, problem_id).await?)
    }

    async fn store_buffers(
        &self,
        owner: &str,
        problem_id: &str,
        buffers: &BufferMap,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        Ok(keys::store_buffers(&mut conn, owner, problem_id, buffers).await?)
    }

    async fn load_templates(&self) -> Result<Option<HashMap<String, String>>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(keys::load_templates(&mut conn).await?)
    }

    async fn store_templates(&self, templates: &HashMap<String, String>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        Ok(keys::store_templates(&mut conn, templates).await?)
    }
}
