//! Single-host to multi-host dispatch
//!
//! An operation written for one host becomes callable either for one named
//! host, returning the raw per-host result, or for every host of a
//! [`HostSet`], merging results by an [`AggregationPolicy`].
//!
//! Hosts are always visited sequentially in set order. The first per-host
//! error aborts the call and no later host is invoked.

use command_executor::CommandResult;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use tracing::debug;

use crate::hosts::{Host, HostSet};
use crate::policy::AggregationPolicy;
use crate::{Error, Result};

/// Per-host results understood by the aggregation policies
pub trait Outcome: Sized {
    /// Truth value used by `AllTrue` and `AnyTrue`
    fn is_truthy(&self) -> bool;

    /// Whether this result counts as absent for `CollapseNone`
    fn is_empty(&self) -> bool;

    /// Items contributed to an `Extend` merge
    fn flatten(self) -> Vec<Self> {
        vec![self]
    }
}

/// JSON values: `null`, `false`, `0`, `""`, `[]` and `{}` are falsy.
/// Only `null` and empty strings, arrays and objects are empty.
impl Outcome for Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(_) | Value::Number(_) => false,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
        }
    }

    fn flatten(self) -> Vec<Self> {
        match self {
            Value::Array(items) => items,
            other => vec![other],
        }
    }
}

impl Outcome for bool {
    fn is_truthy(&self) -> bool {
        *self
    }

    fn is_empty(&self) -> bool {
        false
    }
}

impl Outcome for String {
    fn is_truthy(&self) -> bool {
        !str::is_empty(self)
    }

    fn is_empty(&self) -> bool {
        str::is_empty(self)
    }
}

impl Outcome for () {
    fn is_truthy(&self) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        true
    }
}

impl<T: Outcome> Outcome for Option<T> {
    fn is_truthy(&self) -> bool {
        self.as_ref().is_some_and(T::is_truthy)
    }

    fn is_empty(&self) -> bool {
        self.is_none()
    }
}

impl Outcome for CommandResult {
    fn is_truthy(&self) -> bool {
        self.success()
    }

    fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

/// Result of a dispatch
#[derive(Debug)]
pub enum Dispatched<'a, O: ?Sized, T> {
    /// Raw result for an explicitly named host
    Single(T),
    /// `Map`, or `CollapseNone` with at least one non-empty result
    Map(IndexMap<String, T>),
    /// `Append` and `Extend`
    List(Vec<T>),
    /// `AllTrue` and `AnyTrue`
    Bool(bool),
    /// `CollapseSelf`, or `CollapseNone` with only empty results
    Owner(&'a O),
}

impl<'a, O: ?Sized, T> Dispatched<'a, O, T> {
    /// Whether the call collapsed to its owner
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner(_))
    }

    /// The raw result of a single-host call
    pub fn into_single(self) -> Option<T> {
        match self {
            Self::Single(value) => Some(value),
            _ => None,
        }
    }

    /// The per-host mapping
    pub fn into_map(self) -> Option<IndexMap<String, T>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The merged sequence
    pub fn into_list(self) -> Option<Vec<T>> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    /// The owner a collapsing call returned
    pub fn owner(&self) -> Option<&'a O> {
        match self {
            Self::Owner(owner) => Some(*owner),
            _ => None,
        }
    }

    /// Convert every contained result
    pub fn map<U, F>(self, mut f: F) -> Dispatched<'a, O, U>
    where
        F: FnMut(T) -> U,
    {
        match self {
            Self::Single(value) => Dispatched::Single(f(value)),
            Self::Map(map) => Dispatched::Map(map.into_iter().map(|(k, v)| (k, f(v))).collect()),
            Self::List(list) => Dispatched::List(list.into_iter().map(f).collect()),
            Self::Bool(b) => Dispatched::Bool(b),
            Self::Owner(owner) => Dispatched::Owner(owner),
        }
    }

    /// JSON rendering; a collapsed owner renders as `null`
    pub fn into_json(self) -> serde_json::Result<Value>
    where
        T: Serialize,
    {
        match self {
            Self::Single(value) => serde_json::to_value(value),
            Self::Map(map) => serde_json::to_value(map),
            Self::List(list) => serde_json::to_value(list),
            Self::Bool(b) => Ok(Value::Bool(b)),
            Self::Owner(_) => Ok(Value::Null),
        }
    }
}

impl<O: ?Sized, T: Outcome> Dispatched<'_, O, T> {
    /// Truth value of a boolean merge or a single result
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Single(value) => Some(value.is_truthy()),
            _ => None,
        }
    }
}

/// Dispatches per-host operations over the hosts of an owner
#[derive(Debug)]
pub struct FanOut<'a, O: ?Sized> {
    owner: &'a O,
    hosts: &'a HostSet,
}

impl<O: ?Sized> Clone for FanOut<'_, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O: ?Sized> Copy for FanOut<'_, O> {}

impl<'a, O: ?Sized> FanOut<'a, O> {
    /// Dispatch over `hosts`, collapsing to `owner` where the policy says so
    pub fn new(owner: &'a O, hosts: &'a HostSet) -> Self {
        Self { owner, hosts }
    }

    /// Invoke `op` for one host or for every host.
    ///
    /// With `Some(host)` the host must belong to the set and its raw result
    /// is returned whatever the policy. With `None` every host is invoked in
    /// order and the results merged by `policy`.
    pub async fn dispatch<T, F, Fut>(
        &self,
        host: Option<&str>,
        policy: AggregationPolicy,
        mut op: F,
    ) -> Result<Dispatched<'a, O, T>>
    where
        T: Outcome,
        F: FnMut(Host<'a>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let set: &'a HostSet = self.hosts;

        if let Some(id) = host {
            let host = set.get(id).ok_or_else(|| Error::unknown_host(id))?;
            debug!(host = host.id, "dispatching to single host");
            return Ok(Dispatched::Single(op(host).await?));
        }

        debug!(%policy, hosts = set.len(), "dispatching to all hosts");
        let hosts = set.iter();

        let merged = match policy {
            AggregationPolicy::Map => {
                let mut results = IndexMap::with_capacity(set.len());
                for host in hosts {
                    results.insert(host.id.to_string(), op(host).await?);
                }
                Dispatched::Map(results)
            }
            AggregationPolicy::Append => {
                let mut results = Vec::with_capacity(set.len());
                for host in hosts {
                    results.push(op(host).await?);
                }
                Dispatched::List(results)
            }
            AggregationPolicy::Extend => {
                let mut results = Vec::new();
                for host in hosts {
                    results.extend(op(host).await?.flatten());
                }
                Dispatched::List(results)
            }
            AggregationPolicy::AllTrue => {
                for host in hosts {
                    if !op(host).await?.is_truthy() {
                        debug!(host = host.id, "short-circuit on falsy result");
                        return Ok(Dispatched::Bool(false));
                    }
                }
                Dispatched::Bool(true)
            }
            AggregationPolicy::AnyTrue => {
                for host in hosts {
                    if op(host).await?.is_truthy() {
                        debug!(host = host.id, "short-circuit on truthy result");
                        return Ok(Dispatched::Bool(true));
                    }
                }
                Dispatched::Bool(false)
            }
            AggregationPolicy::CollapseSelf => {
                for host in hosts {
                    op(host).await?;
                }
                Dispatched::Owner(self.owner)
            }
            AggregationPolicy::CollapseNone => {
                let mut results = IndexMap::with_capacity(set.len());
                for host in hosts {
                    results.insert(host.id.to_string(), op(host).await?);
                }
                if results.values().all(Outcome::is_empty) {
                    Dispatched::Owner(self.owner)
                } else {
                    Dispatched::Map(results)
                }
            }
        };
        Ok(merged)
    }
}
