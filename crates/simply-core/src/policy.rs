//! Aggregation policies for multi-host operations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// How per-host results of a fan-out are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Mapping host identifier to per-host result
    Map,
    /// One entry per host, in host order
    Append,
    /// Per-host sequences concatenated in host order
    Extend,
    /// Logical AND, stopping at the first falsy result
    AllTrue,
    /// Logical OR, stopping at the first truthy result
    AnyTrue,
    /// Always the owning object
    CollapseSelf,
    /// The owning object if every result is empty, else the mapping
    CollapseNone,
}

impl AggregationPolicy {
    /// Every policy, in declaration order
    pub const ALL: [AggregationPolicy; 7] = [
        Self::Map,
        Self::Append,
        Self::Extend,
        Self::AllTrue,
        Self::AnyTrue,
        Self::CollapseSelf,
        Self::CollapseNone,
    ];

    /// Canonical textual name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Append => "append",
            Self::Extend => "extend",
            Self::AllTrue => "all_true",
            Self::AnyTrue => "any_true",
            Self::CollapseSelf => "collapse_self",
            Self::CollapseNone => "collapse_none",
        }
    }

    /// Whether the merge may stop before every host was invoked
    pub fn short_circuits(&self) -> bool {
        matches!(self, Self::AllTrue | Self::AnyTrue)
    }
}

impl fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| Error::InvalidPolicy(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for policy in AggregationPolicy::ALL {
            assert_eq!(policy.as_str().parse::<AggregationPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_unknown_name_is_invalid() {
        for name in ["", "Map", "all-true", "collapse"] {
            assert!(matches!(
                name.parse::<AggregationPolicy>(),
                Err(Error::InvalidPolicy(n)) if n == name
            ));
        }
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        let json = serde_json::to_string(&AggregationPolicy::CollapseNone).unwrap();
        assert_eq!(json, "\"collapse_none\"");
    }
}
