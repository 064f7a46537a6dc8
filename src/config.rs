//! Store configuration

use serde::{Deserialize, Serialize};

/// Tunables for a [`Store`](crate::store::Store)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// fsync the log after every commit
    pub sync_on_commit: bool,
    /// Default page size of the `mutations` history query
    pub history_page_size: usize,
    /// Fire the committing connection's own on-change callback
    pub notify_self_on_commit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_on_commit: false,
            history_page_size: 10,
            notify_self_on_commit: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let cfg: StoreConfig = serde_json::from_str(r#"{"sync_on_commit": true}"#).unwrap();
        assert!(cfg.sync_on_commit);
        assert_eq!(cfg.history_page_size, 10);
        assert!(cfg.notify_self_on_commit);
    }
}
