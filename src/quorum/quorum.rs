use crate::quorum::{Election, ElectionError};
use crate::sequence::Sequence;
use std::collections::BTreeSet;

// Every quorum created in this process draws its id from here.
static QUORUM_IDS: Sequence = Sequence::new();

/// Quorum is an immutable set of hosts that work together to make decisions, identified by a
/// process-unique, monotonically increasing id.
///
/// Hosts are identified by string (a name or a network address). The empty string is never a
/// member and duplicate hosts collapse into one.
#[derive(Clone, Debug)]
pub struct Quorum {
    id: u64,
    hosts: BTreeSet<String>,
}

impl Quorum {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hosts = hosts
            .into_iter()
            .map(Into::into)
            .filter(|host: &String| !host.is_empty())
            .collect();

        Quorum {
            id: QUORUM_IDS.next(),
            hosts,
        }
    }

    /// Snapshot the current membership into a fresh, single-use ballot tracker.
    pub fn election(&self) -> Result<Election, ElectionError> {
        Election::new(self)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    pub fn size(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    /// Whether every host of `self` is also in `other`.
    pub fn is_subset(&self, other: &Quorum) -> bool {
        self.hosts.is_subset(&other.hosts)
    }

    pub fn is_superset(&self, other: &Quorum) -> bool {
        other.is_subset(self)
    }

    pub fn intersects(&self, other: &Quorum) -> bool {
        !self.hosts.is_disjoint(&other.hosts)
    }
}
