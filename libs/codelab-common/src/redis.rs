use redis::{AsyncCommands, RedisResult};
use std::collections::HashMap;

/// Redis cache semantics for the evaluation workspace
/// Keys are deterministic so the API process and any CLI session
/// read and write the same entries

pub const BUFFER_PREFIX: &str = "codelab:buffers";
pub const TEMPLATE_CACHE_KEY: &str = "codelab:templates";

/// Persisted buffers survive a reload for 7 days
pub const BUFFER_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Language -> source code for one problem
pub type BufferMap = HashMap<String, String>;

/// Generate the buffer key for one owner's copy of a problem
/// The owner (learner or workspace id) keeps drafts private to whoever wrote them
pub fn buffer_key(owner: &str, problem_id: &str) -> String {
    format!("{}:{}:{}", BUFFER_PREFIX, owner, problem_id)
}

fn encode(map: &BufferMap) -> RedisResult<String> {
    serde_json::to_string(map)
        .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string())))
}

fn decode(payload: Option<String>) -> RedisResult<Option<BufferMap>> {
    match payload {
        Some(data) => {
            let map: BufferMap = serde_json::from_str(&data)
                .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string())))?;
            Ok(Some(map))
        }
        None => Ok(None),
    }
}

/// Store the learner's buffers for a problem
pub async fn store_buffers(
    conn: &mut redis::aio::ConnectionManager,
    owner: &str,
    problem_id: &str,
    buffers: &BufferMap,
) -> RedisResult<()> {
    let payload = encode(buffers)?;
    let _: () = conn
        .set_ex(buffer_key(owner, problem_id), payload, BUFFER_TTL_SECONDS as _)
        .await?;
    Ok(())
}

/// Load the learner's buffers for a problem
pub async fn load_buffers(
    conn: &mut redis::aio::ConnectionManager,
    owner: &str,
    problem_id: &str,
) -> RedisResult<Option<BufferMap>> {
    let payload: Option<String> = conn.get(buffer_key(owner, problem_id)).await?;
    decode(payload)
}

/// Store the server template map
/// No TTL: every successful fetch overwrites it
pub async fn store_templates(
    conn: &mut redis::aio::ConnectionManager,
    templates: &BufferMap,
) -> RedisResult<()> {
    let payload = encode(templates)?;
    let _: () = conn.set(TEMPLATE_CACHE_KEY, payload).await?;
    Ok(())
}

/// Load the cached server template map
pub async fn load_templates(
    conn: &mut redis::aio::ConnectionManager,
) -> RedisResult<Option<BufferMap>> {
    let payload: Option<String> = conn.get(TEMPLATE_CACHE_KEY).await?;
    decode(payload)
}
