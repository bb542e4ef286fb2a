use crate::quorum::Quorum;
use std::collections::HashMap;

/// Election is a single-use majority vote over a snapshot of a quorum. Each member may cast one
/// accept ballot; once a majority (`n/2 + 1`) has voted the election has passed, and it stays
/// passed for every later successful vote.
///
/// Membership is copied when the election is created, so later quorum changes never affect an
/// election that is already running.
#[derive(Debug)]
pub struct Election {
    quorum_id: u64,
    voted: HashMap<String, bool>,
    ballots: u16,
}

/// Construction failures. These indicate a misconfigured cluster rather than something a remote
/// peer can trigger, so callers should treat them as fatal.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ElectionError {
    #[error("cannot create a vote for an empty quorum")]
    EmptyQuorum,
    #[error("cannot create a vote for extremely large quorum")]
    QuorumTooLarge,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VoteError {
    #[error("{0:?} is not a member of the quorum")]
    NotAMember(String),
    #[error("{0:?} has already voted in this election")]
    AlreadyVoted(String),
}

impl Election {
    pub(super) fn new(quorum: &Quorum) -> Result<Self, ElectionError> {
        match quorum.size() {
            0 => return Err(ElectionError::EmptyQuorum),
            size if size > u16::MAX as usize => return Err(ElectionError::QuorumTooLarge),
            _ => {}
        }

        let voted = quorum.hosts().map(|host| (host.to_string(), false)).collect();

        Ok(Election {
            quorum_id: quorum.id(),
            voted,
            ballots: 0,
        })
    }

    /// Record an accept ballot for `member` and return whether the election has passed.
    pub fn vote(&mut self, member: &str) -> Result<bool, VoteError> {
        match self.voted.get_mut(member) {
            None => return Err(VoteError::NotAMember(member.to_string())),
            Some(true) => return Err(VoteError::AlreadyVoted(member.to_string())),
            Some(has_voted) => *has_voted = true,
        }

        self.ballots += 1;
        Ok(self.passed())
    }

    pub fn passed(&self) -> bool {
        self.ballots as usize >= self.majority()
    }

    pub fn majority(&self) -> usize {
        (self.voted.len() / 2) + 1
    }

    pub fn ballots(&self) -> u16 {
        self.ballots
    }

    /// Id of the quorum this election was created from.
    pub fn quorum_id(&self) -> u64 {
        self.quorum_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seats(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("seat{:03}", i)).collect()
    }

    #[test]
    fn construction_bounds() {
        let empty = Quorum::new(Vec::<String>::new());
        assert_eq!(empty.election().unwrap_err(), ElectionError::EmptyQuorum);

        let huge = Quorum::new((0..=u16::MAX as usize).map(|i| format!("q{:x}", i)));
        assert_eq!(huge.size(), u16::MAX as usize + 1);
        assert_eq!(huge.election().unwrap_err(), ElectionError::QuorumTooLarge);

        let largest = Quorum::new((0..u16::MAX as usize).map(|i| format!("q{:x}", i)));
        assert!(largest.election().is_ok());
    }

    #[test]
    fn vote_validation() {
        let quorum = Quorum::new(vec!["jade", "kira", "opal"]);
        let mut election = quorum.election().unwrap();
        assert_eq!(election.quorum_id(), quorum.id());

        assert_eq!(
            election.vote("artemis").unwrap_err().to_string(),
            r#""artemis" is not a member of the quorum"#
        );

        election.vote("jade").unwrap();
        assert_eq!(
            election.vote("jade").unwrap_err().to_string(),
            r#""jade" has already voted in this election"#
        );
    }

    #[test]
    fn no_cheating() {
        let quorum = Quorum::new(vec!["jade", "kira", "opal"]);
        let mut election = quorum.election().unwrap();

        assert_eq!(election.vote("kira"), Ok(false));
        assert!(election.vote("artemis").is_err());
        assert!(election.vote("kira").is_err());
        assert_eq!(election.ballots(), 1);

        assert_eq!(election.vote("opal"), Ok(true));
        assert!(election.vote("opal").is_err());
        assert_eq!(election.ballots(), 2);
        assert!(election.passed());
    }

    #[test]
    fn snapshot_is_independent_of_quorum() {
        let quorum = Quorum::new(vec!["jade", "kira", "opal"]);
        let mut election = quorum.election().unwrap();
        drop(quorum);

        assert_eq!(election.majority(), 2);
        assert_eq!(election.vote("jade"), Ok(false));
        assert_eq!(election.vote("kira"), Ok(true));
    }

    #[test]
    fn majority_by_size() {
        let hosts = seats(256);

        for &(size, majority) in [
            (1, 1),
            (2, 2),
            (3, 2),
            (4, 3),
            (5, 3),
            (6, 4),
            (7, 4),
            (9, 5),
            (11, 6),
            (13, 7),
            (99, 50),
            (256, 129),
        ]
        .iter()
        {
            let quorum = Quorum::new(hosts[..size].iter().cloned());
            let mut election = quorum.election().unwrap();
            assert_eq!(election.majority(), majority, "Q{}", size);

            // Not passed until the majority-th vote.
            for host in &hosts[..majority - 1] {
                assert_eq!(election.vote(host), Ok(false), "Q{}", size);
            }

            // Passes exactly on the majority-th vote.
            assert_eq!(election.vote(&hosts[majority - 1]), Ok(true), "Q{}", size);

            // And stays passed.
            for host in &hosts[majority..size] {
                assert_eq!(election.vote(host), Ok(true), "Q{}", size);
            }
            assert_eq!(election.ballots() as usize, size);
        }
    }
}
