//! Enumerates export partitions from the store.
//!
//! The list is a point-in-time read. A cohort added afterwards is only seen
//! by the next enumeration.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::partition::Partition;
use crate::store::EventStore;

/// A partition together with the unique slug it is published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredPartition {
    pub slug: String,
    pub partition: Partition,
}

#[derive(Debug, Clone)]
pub struct PartitionRegistry {
    store: EventStore,
}

impl PartitionRegistry {
    pub fn new(store: EventStore) -> Self {
        PartitionRegistry { store }
    }

    /// `Partition::All` first, then one partition per cohort ordered by name.
    ///
    /// Slugs are unique within one enumeration: a cohort whose slug collides
    /// with an earlier one gets its id appended.
    pub fn partitions(&self) -> StoreResult<Vec<RegisteredPartition>> {
        let cohorts = self.store.list_cohorts()?;

        let mut seen = HashSet::new();
        let mut partitions = Vec::with_capacity(cohorts.len() + 1);

        for partition in std::iter::once(Partition::All).chain(cohorts.into_iter().map(Partition::Cohort)) {
            let mut slug = partition.slug();
            if slug.is_empty() || seen.contains(&slug) {
                let fallback = match &partition {
                    Partition::Cohort(cohort) if slug.is_empty() => format!("cohort-{}", cohort.id),
                    Partition::Cohort(cohort) => format!("{}-{}", slug, cohort.id),
                    Partition::All => slug.clone(),
                };
                warn!(partition = %partition, slug = %slug, fallback = %fallback, "slug already taken");
                slug = fallback;
            }
            seen.insert(slug.clone());
            partitions.push(RegisteredPartition { slug, partition });
        }

        debug!(count = partitions.len(), "enumerated partitions");
        Ok(partitions)
    }

    /// Look up a partition by its published slug.
    pub fn find(&self, slug: &str) -> StoreResult<Option<Partition>> {
        Ok(self
            .partitions()?
            .into_iter()
            .find(|p| p.slug == slug)
            .map(|p| p.partition))
    }
}
