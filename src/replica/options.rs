use crate::peers::ConnectOptions;
use crate::ticker::Interval;
use std::convert::TryFrom;
use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct ReplicaOptions {
    /// How often a leader sends append-entries, default 100ms.
    pub heartbeat: Option<Duration>,
    /// Nominal election timeout, default 1s.
    pub election_timeout: Option<Duration>,
    /// Election timeouts are uniform within this factor of the nominal value, default 0.5.
    pub election_jitter: Option<f64>,
    /// Deadline for each outbound RPC, default 300ms.
    pub rpc_timeout: Option<Duration>,
    /// Batch queued write-aheads into one replication round, default true.
    pub aggregate: Option<bool>,
    /// Capacity of the event pipe, default 1024.
    pub buffer_size: Option<usize>,
    /// Seed for the timeout intervals. Unseeded intervals draw from entropy.
    pub seed: Option<u64>,
    pub connect: Option<ConnectOptions>,
}

#[derive(Clone, Debug)]
pub(crate) struct ReplicaOptionsValidated {
    pub heartbeat: Duration,
    pub election_timeout: Duration,
    pub election_jitter: f64,
    pub rpc_timeout: Duration,
    pub aggregate: bool,
    pub buffer_size: usize,
    pub seed: Option<u64>,
    pub connect: ConnectOptions,
}

impl ReplicaOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.heartbeat == Duration::from_nanos(0) {
            return Err("Heartbeat must be greater than zero");
        }
        if !(self.election_jitter > 0.0 && self.election_jitter <= 1.0) {
            return Err("Election jitter must be 0 < f <= 1.0");
        }
        if self.heartbeat >= self.min_election_timeout() {
            return Err("Minimum election timeout must be greater than the heartbeat");
        }
        if self.rpc_timeout >= self.min_election_timeout() {
            return Err("RPC timeout must be less than the minimum election timeout");
        }
        if self.buffer_size == 0 {
            return Err("Event buffer must hold at least one event");
        }

        Ok(())
    }

    pub(crate) fn min_election_timeout(&self) -> Duration {
        self.election_timeout.mul_f64(1.0 - self.election_jitter)
    }

    pub(crate) fn heartbeat_interval(&self) -> Interval {
        Interval::fixed(self.heartbeat)
    }

    pub(crate) fn election_interval(&self) -> Interval {
        // Both values were checked by validate(); fall back to fixed just in case.
        let interval = Interval::jitter(self.election_timeout, self.election_jitter)
            .unwrap_or_else(|_| Interval::fixed(self.election_timeout));

        match self.seed {
            Some(seed) => interval.with_seed(seed),
            None => interval,
        }
    }
}

impl TryFrom<ReplicaOptions> for ReplicaOptionsValidated {
    type Error = &'static str;

    fn try_from(options: ReplicaOptions) -> Result<Self, Self::Error> {
        let values = ReplicaOptionsValidated {
            heartbeat: options.heartbeat.unwrap_or(Duration::from_millis(100)),
            election_timeout: options.election_timeout.unwrap_or(Duration::from_millis(1000)),
            election_jitter: options.election_jitter.unwrap_or(0.5),
            rpc_timeout: options.rpc_timeout.unwrap_or(Duration::from_millis(300)),
            aggregate: options.aggregate.unwrap_or(true),
            buffer_size: options.buffer_size.unwrap_or(crate::events::BUFFER_SIZE),
            seed: options.seed,
            connect: options.connect.unwrap_or_default(),
        };

        values.validate()?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ReplicaOptionsValidated::try_from(ReplicaOptions::default()).unwrap();
        assert_eq!(options.heartbeat, Duration::from_millis(100));
        assert_eq!(options.election_timeout, Duration::from_millis(1000));
        assert_eq!(options.min_election_timeout(), Duration::from_millis(500));
        assert_eq!(options.rpc_timeout, Duration::from_millis(300));
        assert!(options.aggregate);
        assert_eq!(options.buffer_size, 1024);
    }

    #[test]
    fn validation() {
        let cases = vec![
            (
                ReplicaOptions {
                    heartbeat: Some(Duration::from_millis(600)),
                    ..Default::default()
                },
                "Minimum election timeout must be greater than the heartbeat",
            ),
            (
                ReplicaOptions {
                    election_jitter: Some(1.5),
                    ..Default::default()
                },
                "Election jitter must be 0 < f <= 1.0",
            ),
            (
                ReplicaOptions {
                    buffer_size: Some(0),
                    ..Default::default()
                },
                "Event buffer must hold at least one event",
            ),
            (
                ReplicaOptions {
                    rpc_timeout: Some(Duration::from_millis(500)),
                    ..Default::default()
                },
                "RPC timeout must be less than the minimum election timeout",
            ),
            (
                ReplicaOptions {
                    heartbeat: Some(Duration::from_nanos(0)),
                    ..Default::default()
                },
                "Heartbeat must be greater than zero",
            ),
        ];

        for (i, (options, expected)) in cases.into_iter().enumerate() {
            let err = ReplicaOptionsValidated::try_from(options).err();
            assert_eq!(err, Some(expected), "test case {} failed", i);
        }
    }

    #[test]
    fn election_interval_respects_jitter() {
        let options = ReplicaOptionsValidated::try_from(ReplicaOptions {
            seed: Some(3),
            ..Default::default()
        })
        .unwrap();

        let mut interval = options.election_interval();
        for _ in 0..1000 {
            let delay = interval.delay();
            assert!(delay >= Duration::from_millis(500) && delay < Duration::from_millis(1500));
        }
    }
}
