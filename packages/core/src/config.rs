//! Configuration for the tree projection

use crate::models::{ColumnLayout, KeyField};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default capacity of the tree event broadcast channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Which columns carry the hierarchy and how new records are tagged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Column holding each record's unique id
    pub id_column: usize,

    /// Column holding the id of the record's parent (0 = virtual root)
    pub parent_column: usize,

    /// Value written into the id field of inserted records instead of a
    /// freshly allocated id (e.g. null to let the store generate keys)
    pub default_id: Option<Value>,

    /// Parent value that marks a record under construction during insert
    pub insert_sentinel: i64,

    /// Buffered tree events per subscriber before it starts lagging
    pub event_channel_capacity: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            id_column: 0,
            parent_column: 1,
            default_id: None,
            insert_sentinel: -1,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl TreeConfig {
    /// Tracked column pair described by this configuration
    pub fn layout(&self) -> Result<ColumnLayout, String> {
        ColumnLayout::new(self.id_column, self.parent_column).map_err(|e| e.to_string())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.id_column == self.parent_column {
            return Err(format!(
                "id_column and parent_column must differ (both are {})",
                self.id_column
            ));
        }

        // Legal parent values are 0 and positive ids
        if self.insert_sentinel >= 0 {
            return Err(format!(
                "insert_sentinel must be negative, got {}",
                self.insert_sentinel
            ));
        }

        if let Some(default_id) = &self.default_id {
            match KeyField::parse(default_id) {
                KeyField::Unset => {}
                KeyField::Id(id) if id > 0 => {}
                _ => {
                    return Err(format!(
                        "default_id must be null or a positive integer, got {}",
                        default_id
                    ))
                }
            }
        }

        if self.event_channel_capacity == 0 {
            return Err("event_channel_capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = TreeConfig::default();
        assert_eq!(config.id_column, 0);
        assert_eq!(config.parent_column, 1);
        assert_eq!(config.default_id, None);
        assert_eq!(config.insert_sentinel, -1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TreeConfig::default();

        // Invalid: shared column
        config.parent_column = 0;
        assert!(config.validate().is_err());

        // Invalid: sentinel collides with the virtual root
        config.parent_column = 1;
        config.insert_sentinel = 0;
        assert!(config.validate().is_err());

        // Invalid: zero default id
        config.insert_sentinel = -7;
        config.default_id = Some(json!(0));
        assert!(config.validate().is_err());

        // Valid: null default lets the store generate keys
        config.default_id = Some(Value::Null);
        assert!(config.validate().is_ok());

        // Invalid: zero capacity
        config.event_channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: TreeConfig = serde_json::from_value(json!({"id_column": 2})).unwrap();
        assert_eq!(config.id_column, 2);
        assert_eq!(config.parent_column, 1);
        assert_eq!(config.event_channel_capacity, DEFAULT_EVENT_CHANNEL_CAPACITY);
        assert_eq!(config.layout().unwrap().id_column(), 2);
    }
}
