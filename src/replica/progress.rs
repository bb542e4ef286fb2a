use std::collections::HashMap;

/// The leader's view of how far each peer's log matches its own.
#[derive(Debug, Default)]
pub(crate) struct LeaderProgress {
    peers: HashMap<String, PeerProgress>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct PeerProgress {
    // > index of the next log entry to send to that server
    // > (initialized to leader last log index + 1)
    pub(crate) next: u64,
    // > index of highest log entry known to be replicated on server
    // > (initialized to 0, increases monotonically)
    pub(crate) matched: u64,
}

impl LeaderProgress {
    pub(crate) fn new<'a, I: IntoIterator<Item = &'a str>>(peers: I, last_log_index: u64) -> Self {
        LeaderProgress {
            peers: peers
                .into_iter()
                .map(|name| {
                    let progress = PeerProgress {
                        next: last_log_index.saturating_add(1),
                        matched: 0,
                    };
                    (name.to_string(), progress)
                })
                .collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, peer: &str) -> Option<&PeerProgress> {
        self.peers.get(peer)
    }

    pub(crate) fn record_success(&mut self, peer: &str, matched: u64) -> bool {
        match self.peers.get_mut(peer) {
            Some(progress) => {
                progress.matched = progress.matched.max(matched);
                progress.next = progress.next.max(progress.matched.saturating_add(1));
                true
            }
            None => false,
        }
    }

    /// Back up after a failed consistency check, using the peer's last index as a hint.
    pub(crate) fn record_failure(&mut self, peer: &str, peer_last_index: u64) -> bool {
        match self.peers.get_mut(peer) {
            Some(progress) => {
                let next = progress.next.saturating_sub(1).min(peer_last_index.saturating_add(1));
                progress.next = next.max(progress.matched.saturating_add(1)).max(1);
                true
            }
            None => false,
        }
    }

    /// Distinct next indexes with the peers waiting at each, so peers at the same position share
    /// one request.
    pub(crate) fn groups(&self) -> HashMap<u64, Vec<&str>> {
        let mut groups: HashMap<u64, Vec<&str>> = HashMap::new();
        for (name, progress) in self.peers.iter() {
            groups.entry(progress.next).or_default().push(name.as_str());
        }
        groups
    }

    pub(crate) fn matched(&self) -> Vec<u64> {
        self.peers.values().map(|progress| progress.matched).collect()
    }
}

/// The highest index the leader knows is stored on a majority, given what every peer (leader
/// excluded) has matched. `None` when there are no peers.
///
/// The leader's log is always at least as long as any match, so it sits at the tail. With `n` peers
/// the cluster has `n + 1` members and needs `n / 2` peers besides the leader; after an ascending
/// sort that is the element at `n / 2`.
pub(crate) fn cluster_commit_index(mut matched: Vec<u64>) -> Option<u64> {
    matched.sort_unstable();
    matched.get(matched.len() / 2).copied()
}
