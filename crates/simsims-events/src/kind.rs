//! Resource kinds tracked by the world.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The resource variants circulating through the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A worker with vitality
    Worker,
    /// A generic manufactured product
    Product,
    /// A food unit with quality
    Food,
}

/// Fixed column order of every recorded row.
pub const TRACKED_KINDS: [ResourceKind; 3] =
    [ResourceKind::Worker, ResourceKind::Product, ResourceKind::Food];

impl ResourceKind {
    /// Column index of this kind within a recorded row.
    pub fn column(self) -> usize {
        match self {
            ResourceKind::Worker => 0,
            ResourceKind::Product => 1,
            ResourceKind::Food => 2,
        }
    }

    /// Human-readable column name.
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Worker => "Worker",
            ResourceKind::Product => "Product",
            ResourceKind::Food => "Food",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_order_matches_columns() {
        for (index, kind) in TRACKED_KINDS.iter().enumerate() {
            assert_eq!(kind.column(), index);
        }
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ResourceKind::Worker).unwrap(),
            r#""worker""#
        );
        assert_eq!(ResourceKind::Food.to_string(), "Food");
    }
}
