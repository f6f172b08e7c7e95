//! Export partitions: the whole dataset, or one cohort.

use std::fmt;

use crate::cohort::Cohort;
use crate::store::EventQuery;
use crate::version::VersionKey;

pub const ALL_SLUG: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partition {
    All,
    Cohort(Cohort),
}

impl Partition {
    /// Counter the partition's cache entries are compared against.
    pub fn version_key(&self) -> VersionKey {
        match self {
            Partition::All => VersionKey::Global,
            Partition::Cohort(cohort) => VersionKey::Cohort(cohort.id),
        }
    }

    /// Rows covered by this partition.
    pub fn query(&self) -> EventQuery {
        match self {
            Partition::All => EventQuery::all(),
            Partition::Cohort(cohort) => EventQuery::cohort(cohort.id),
        }
    }

    /// URL-friendly name, e.g. `m1-e3a`.
    pub fn slug(&self) -> String {
        match self {
            Partition::All => ALL_SLUG.to_string(),
            Partition::Cohort(cohort) => slug::slugify(&cohort.name),
        }
    }

    /// Deterministic file stem for the cache entry. Includes the cohort id
    /// so renamed or similarly named cohorts never share a file or a lock.
    pub fn file_stem(&self) -> String {
        match self {
            Partition::All => ALL_SLUG.to_string(),
            Partition::Cohort(cohort) => format!("cohort-{}-{}", cohort.id, self.slug()),
        }
    }

    pub fn calendar_name(&self) -> &str {
        match self {
            Partition::All => "All cohorts",
            Partition::Cohort(cohort) => &cohort.name,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Partition::All => write!(f, "all"),
            Partition::Cohort(cohort) => write!(f, "cohort {}", cohort.name),
        }
    }
}
