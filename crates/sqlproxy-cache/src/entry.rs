use std::time::{Duration, Instant};

use sqlproxy_core::{row_to_json, Row};

/// One cached result set plus its bookkeeping (spec §4.3).
#[derive(Clone)]
pub struct CacheEntry {
    pub rows: Vec<Row>,
    pub cached_at: Instant,
    pub ttl: Duration,
    /// Byte length of a canonical JSON marshal of `rows` at insertion time.
    pub size: usize,
}

impl CacheEntry {
    pub fn new(rows: Vec<Row>, ttl: Duration) -> Self {
        let size = canonical_size(&rows);
        Self {
            rows,
            cached_at: Instant::now(),
            ttl,
            size,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }

    /// `ttl - (now - cached_at)`, floored at zero.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.cached_at.elapsed())
    }
}

fn canonical_size(rows: &[Row]) -> usize {
    let values: Vec<serde_json::Value> = rows.iter().map(row_to_json).collect();
    serde_json::to_vec(&values).map(|b| b.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlproxy_core::RowValue;

    #[test]
    fn size_reflects_canonical_json_length() {
        let mut row = Row::new();
        row.insert("id".to_string(), RowValue::Int(1));
        let entry = CacheEntry::new(vec![row], Duration::from_secs(60));
        assert_eq!(entry.size, serde_json::to_vec(&serde_json::json!([{"id": 1}])).unwrap().len());
    }

    #[test]
    fn not_expired_immediately_after_insertion() {
        let entry = CacheEntry::new(vec![], Duration::from_secs(60));
        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining() <= Duration::from_secs(60));
        assert!(entry.ttl_remaining() > Duration::from_secs(59));
    }
}
