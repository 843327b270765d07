//! Response cache for hot read endpoints
//!
//! 使用 DashMap 实现无锁并发的响应缓存。
//! 写路径在持久化之后、响应之前同步失效相关条目，
//! 读路径最多只会看到一个 TTL 窗口内的旧数据。

pub mod middleware;

pub use middleware::cache_layer;

use dashmap::DashMap;
use std::sync::Arc;

use crate::utils::time::now_millis;

/// 缓存条目: 已序列化的响应体
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    /// 过期时间 (Unix millis)
    pub expires_at: i64,
}

/// 响应缓存
///
/// key 格式: `"{METHOD} {path}"` (带查询串时为 `"{METHOD} {path}?{query}"`)。
/// 失效按子串匹配：`invalidate("/api/orders")` 同时清掉
/// open/archived 列表和单个订单的缓存视图。
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CachedResponse>>,
    ttl_secs: u64,
}

impl ResponseCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl_secs,
        }
    }

    /// 查询缓存，过期条目视为未命中并顺手移除
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let hit = self.entries.get(key)?;
        if hit.expires_at <= now_millis() {
            drop(hit);
            self.entries.remove(key);
            return None;
        }
        Some(hit.clone())
    }

    /// 写入缓存 (TTL 为 0 时禁用缓存)
    pub fn set(&self, key: String, body: Vec<u8>, content_type: Option<String>) {
        if self.ttl_secs == 0 {
            return;
        }
        self.entries.insert(
            key,
            CachedResponse {
                body,
                content_type,
                expires_at: now_millis() + (self.ttl_secs as i64) * 1000,
            },
        );
    }

    /// 失效所有 key 包含给定片段的条目
    ///
    /// 必须在写路径返回响应之前调用，保证同一客户端写后读不命中旧值。
    pub fn invalidate(&self, fragment: &str) {
        self.entries.retain(|key, _| !key.contains(fragment));
    }

    /// 清理过期条目 (由后台任务周期调用)
    pub fn sweep(&self) -> usize {
        let now = now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_ttl(ttl_secs: u64) -> ResponseCache {
        ResponseCache::new(ttl_secs)
    }

    #[test]
    fn test_get_miss_then_hit() {
        let cache = cache_with_ttl(60);
        assert!(cache.get("GET /api/pizzas").is_none());

        cache.set("GET /api/pizzas".to_string(), b"[]".to_vec(), None);
        let hit = cache.get("GET /api/pizzas").unwrap();
        assert_eq!(hit.body, b"[]");
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let cache = cache_with_ttl(0);
        cache.set("GET /api/pizzas".to_string(), b"[]".to_vec(), None);
        assert!(cache.get("GET /api/pizzas").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = cache_with_ttl(60);
        cache.entries.insert(
            "GET /api/pizzas".to_string(),
            CachedResponse {
                body: b"[]".to_vec(),
                content_type: None,
                expires_at: now_millis() - 1,
            },
        );
        assert!(cache.get("GET /api/pizzas").is_none());
        // The lazy removal kicked in
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_matches_substring() {
        let cache = cache_with_ttl(60);
        cache.set("GET /api/orders/open".to_string(), b"a".to_vec(), None);
        cache.set("GET /api/orders/archived".to_string(), b"b".to_vec(), None);
        cache.set("GET /api/pizzas".to_string(), b"c".to_vec(), None);

        cache.invalidate("/api/orders");

        assert!(cache.get("GET /api/orders/open").is_none());
        assert!(cache.get("GET /api/orders/archived").is_none());
        assert!(cache.get("GET /api/pizzas").is_some());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let cache = cache_with_ttl(60);
        cache.set("GET /api/pizzas".to_string(), b"fresh".to_vec(), None);
        cache.entries.insert(
            "GET /api/ingredients".to_string(),
            CachedResponse {
                body: b"stale".to_vec(),
                content_type: None,
                expires_at: now_millis() - 1,
            },
        );

        let removed = cache.sweep();
        assert_eq!(removed, 1);
        assert!(cache.get("GET /api/pizzas").is_some());
        assert_eq!(cache.len(), 1);
    }
}
