//! Ordered host sets

use indexmap::IndexMap;
use serde::Serialize;

use crate::{Error, Result};

/// One host: its identifier and the address the backend reaches it at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Host<'a> {
    /// Short host identifier
    pub id: &'a str,
    /// Container name, IP or VM id
    pub address: &'a str,
}

/// Ordered mapping from host identifier to address.
///
/// Insertion order is the fan-out order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HostSet {
    hosts: IndexMap<String, String>,
}

impl HostSet {
    /// Create an empty host set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host, replacing the address of an existing identifier in place
    pub fn insert(&mut self, id: impl Into<String>, address: impl Into<String>) {
        self.hosts.insert(id.into(), address.into());
    }

    /// Look up a host by identifier
    pub fn get(&self, id: &str) -> Option<Host<'_>> {
        self.hosts
            .get_key_value(id)
            .map(|(id, address)| Host { id, address })
    }

    /// Address of a host
    pub fn address(&self, id: &str) -> Option<&str> {
        self.hosts.get(id).map(String::as_str)
    }

    /// Identifier of the host with the given address
    pub fn host_for_address(&self, address: &str) -> Result<&str> {
        self.hosts
            .iter()
            .find(|(_, a)| a.as_str() == address)
            .map(|(id, _)| id.as_str())
            .ok_or_else(|| Error::HostNotFound {
                address: address.to_string(),
            })
    }

    /// Whether the identifier is part of this set
    pub fn contains(&self, id: &str) -> bool {
        self.hosts.contains_key(id)
    }

    /// Hosts in fan-out order
    pub fn iter(&self) -> impl Iterator<Item = Host<'_>> {
        self.hosts.iter().map(|(id, address)| Host { id, address })
    }

    /// Host identifiers in fan-out order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    /// Number of hosts
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the set has no hosts
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for HostSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            hosts: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<IndexMap<String, String>> for HostSet {
    fn from(hosts: IndexMap<String, String>) -> Self {
        Self { hosts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_and_lookup() {
        let hosts: HostSet = [("h2", "a2"), ("h1", "a1")].into_iter().collect();
        assert_eq!(hosts.ids().collect::<Vec<_>>(), ["h2", "h1"]);
        assert_eq!(hosts.address("h1"), Some("a1"));
        assert_eq!(
            hosts.get("h2"),
            Some(Host {
                id: "h2",
                address: "a2"
            })
        );
        assert!(hosts.get("h3").is_none());
    }

    #[test]
    fn test_host_for_address() {
        let hosts: HostSet = [("h1", "a1"), ("h2", "a2")].into_iter().collect();
        assert_eq!(hosts.host_for_address("a2").unwrap(), "h2");
        assert!(matches!(
            hosts.host_for_address("a3"),
            Err(Error::HostNotFound { address }) if address == "a3"
        ));
    }

    #[test]
    fn test_serializes_as_mapping() {
        let hosts: HostSet = [("h1", "a1")].into_iter().collect();
        assert_eq!(
            serde_json::to_value(&hosts).unwrap(),
            serde_json::json!({"h1": "a1"})
        );
    }
}
