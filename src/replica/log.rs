use crate::grpc::LogEntry;

/// The replicated log, held in memory. Indexes start at 1; index 0 is the empty prefix every log
/// shares, with term 0.
#[derive(Debug, Default)]
pub(crate) struct RaftLog {
    entries: Vec<LogEntry>,
}

impl RaftLog {
    pub(crate) fn last_index(&self) -> u64 {
        self.entries.len() as u64
    }

    pub(crate) fn last_term(&self) -> u64 {
        self.entries.last().map(|entry| entry.term).unwrap_or(0)
    }

    pub(crate) fn term_at(&self, index: u64) -> Option<u64> {
        if index == 0 {
            return Some(0);
        }
        self.get(index).map(|entry| entry.term)
    }

    pub(crate) fn get(&self, index: u64) -> Option<&LogEntry> {
        if index == 0 {
            return None;
        }
        self.entries.get((index - 1) as usize)
    }

    pub(crate) fn append(&mut self, term: u64, data: Vec<u8>) -> u64 {
        let index = self.last_index() + 1;
        self.entries.push(LogEntry { index, term, data });
        index
    }

    /// Up to `max` entries starting at `index`.
    pub(crate) fn entries_from(&self, index: u64, max: usize) -> Vec<LogEntry> {
        if index == 0 || index > self.last_index() {
            return Vec::new();
        }

        self.entries[(index - 1) as usize..]
            .iter()
            .take(max)
            .cloned()
            .collect()
    }

    /// Whether a log ending at (`last_term`, `last_index`) is at least as up-to-date as this one.
    ///
    /// > If the logs have last entries with different terms, then the log with the later term is
    /// > more up-to-date. If the logs end with the same term, then whichever log is longer is more
    /// > up-to-date.
    pub(crate) fn covered_by(&self, last_term: u64, last_index: u64) -> bool {
        if last_term != self.last_term() {
            return last_term > self.last_term();
        }
        last_index >= self.last_index()
    }

    /// Place `entries` right after `previous_index`, dropping any existing entry (and everything
    /// after it) whose term conflicts. Entries that already match are kept untouched. Returns the
    /// index of the last entry placed.
    ///
    /// The caller must have checked that the entry at `previous_index` matches the leader's.
    pub(crate) fn merge(&mut self, previous_index: u64, entries: Vec<LogEntry>) -> u64 {
        let mut index = previous_index;
        for entry in entries {
            index += 1;
            match self.term_at(index) {
                Some(term) if term == entry.term => continue,
                Some(_) => self.entries.truncate((index - 1) as usize),
                None => {}
            }
            self.entries.push(LogEntry {
                index,
                term: entry.term,
                data: entry.data,
            });
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(term: u64, data: &str) -> LogEntry {
        LogEntry {
            index: 0,
            term,
            data: data.as_bytes().to_vec(),
        }
    }

    fn terms(log: &RaftLog) -> Vec<u64> {
        (1..=log.last_index()).filter_map(|i| log.term_at(i)).collect()
    }

    #[test]
    fn append_and_read() {
        let mut log = RaftLog::default();
        assert_eq!((log.last_index(), log.last_term()), (0, 0));
        assert_eq!(log.term_at(0), Some(0));
        assert_eq!(log.term_at(1), None);

        assert_eq!(log.append(1, b"a".to_vec()), 1);
        assert_eq!(log.append(2, b"b".to_vec()), 2);
        assert_eq!((log.last_index(), log.last_term()), (2, 2));
        assert_eq!(log.get(2).unwrap().data, b"b".to_vec());
        assert_eq!(log.get(2).unwrap().index, 2);

        assert_eq!(log.entries_from(1, 10).len(), 2);
        assert_eq!(log.entries_from(2, 10)[0].data, b"b".to_vec());
        assert_eq!(log.entries_from(1, 1).len(), 1);
        assert!(log.entries_from(3, 10).is_empty());
    }

    #[test]
    fn merge_appends_and_skips_duplicates() {
        let mut log = RaftLog::default();
        assert_eq!(log.merge(0, vec![entry(1, "a"), entry(1, "b")]), 2);
        // Retransmission of the same entries is a no-op.
        assert_eq!(log.merge(0, vec![entry(1, "a"), entry(1, "b")]), 2);
        assert_eq!(log.merge(2, vec![entry(2, "c")]), 3);
        assert_eq!(terms(&log), vec![1, 1, 2]);

        // Heartbeats place nothing.
        assert_eq!(log.merge(3, vec![]), 3);
    }

    #[test]
    fn merge_truncates_conflicts() {
        let mut log = RaftLog::default();
        log.merge(0, vec![entry(1, "a"), entry(1, "b"), entry(1, "c"), entry(1, "d")]);

        assert_eq!(log.merge(1, vec![entry(1, "b"), entry(3, "x")]), 3);
        assert_eq!(terms(&log), vec![1, 1, 3]);
        assert_eq!(log.get(3).unwrap().data, b"x".to_vec());
    }

    #[test]
    fn up_to_date_comparison() {
        let mut log = RaftLog::default();
        assert!(log.covered_by(0, 0));

        log.append(2, vec![]);
        log.append(2, vec![]);

        assert!(log.covered_by(3, 1));
        assert!(log.covered_by(2, 2));
        assert!(log.covered_by(2, 5));
        assert!(!log.covered_by(2, 1));
        assert!(!log.covered_by(1, 9));
    }
}
