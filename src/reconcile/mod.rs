pub mod normalize;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::registry::RegistryClient;

pub use normalize::normalize;

/// Which roster a shareholder is absent from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Known to the accounting client, absent from the registry.
    Registry,
    /// Listed by the registry, absent from the accounting client.
    Local,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Registry => Side::Local,
            Side::Local => Side::Registry,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Registry => f.write_str("registry"),
            Side::Local => f.write_str("local records"),
        }
    }
}

/// A normalized name present on exactly one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    pub name: String,
    pub missing_from: Side,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} missing from {}", self.name, self.missing_from)
    }
}

/// Outcome of comparing two shareholder rosters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub divergent: bool,
    pub differences: Vec<Difference>,
}

/// Result of a successful reconciliation against the registry.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub registry_names: Vec<String>,
    pub divergent: bool,
    pub differences: Vec<Difference>,
}

/// Compare two rosters as sets of normalized names.
///
/// Local-only names come first in local order, then registry-only names in
/// registry order. A name repeated on one side is reported once.
pub fn compare(local: &[String], registry: &[String]) -> Comparison {
    let local_names = ordered_unique(local);
    let registry_names = ordered_unique(registry);

    let local_set: HashSet<&str> = local_names.iter().map(String::as_str).collect();
    let registry_set: HashSet<&str> = registry_names.iter().map(String::as_str).collect();

    let mut differences = Vec::new();

    for name in &local_names {
        if !registry_set.contains(name.as_str()) {
            differences.push(Difference {
                name: name.clone(),
                missing_from: Side::Registry,
            });
        }
    }

    for name in &registry_names {
        if !local_set.contains(name.as_str()) {
            differences.push(Difference {
                name: name.clone(),
                missing_from: Side::Local,
            });
        }
    }

    Comparison {
        divergent: !differences.is_empty(),
        differences,
    }
}

/// Normalize every name, keeping the first occurrence of each.
fn ordered_unique(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| normalize(n))
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

/// Fetches the authoritative roster and diffs it against the local one.
pub struct ReconciliationEngine {
    registry: Arc<dyn RegistryClient>,
}

impl ReconciliationEngine {
    pub fn new(registry: Arc<dyn RegistryClient>) -> Self {
        Self { registry }
    }

    /// Look up `tax_id` in the registry and compare its roster with `local`.
    ///
    /// A registry failure is returned as an error and must be treated by the
    /// caller as "unverified", never as a divergence.
    pub async fn reconcile(&self, local: &[String], tax_id: &str) -> Result<Reconciliation> {
        let registry_names = self.registry.lookup(tax_id).await?;
        let comparison = compare(local, &registry_names);

        tracing::debug!(
            tax_id = tax_id,
            local = local.len(),
            registry = registry_names.len(),
            divergent = comparison.divergent,
            "Shareholder rosters compared"
        );

        Ok(Reconciliation {
            registry_names,
            divergent: comparison.divergent,
            differences: comparison.differences,
        })
    }
}
