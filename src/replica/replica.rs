use crate::events::{
    aggregating_loop, event_loop, pipe, Callback, Event, EventReceiver, EventSender, Handler, WeakEventSender,
    WriteAhead, WriteAheadError, WriteAheadReceipt,
};
use crate::grpc::{AppendReply, AppendRequest, VoteReply, VoteRequest};
use crate::peers::{Broadcast, PeerError, Peers, RpcContext};
use crate::quorum::{Election, Quorum};
use crate::replica::commit_stream::{CommitStreamPublisher, CommittedEntry};
use crate::replica::log::RaftLog;
use crate::replica::options::ReplicaOptionsValidated;
use crate::replica::progress::{cluster_commit_index, LeaderProgress};
use crate::replica::state_listener::{self, StateListener, StateNotifier, StateSnapshot};
use crate::replica::{HealthStatus, ReplicaError, ReplicaOptions, State};
use crate::ticker::{Tick, Ticker};
use bytes::Bytes;
use std::convert::TryFrom;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Upper bound on entries shipped in a single AppendRequest.
const MAX_ENTRIES_PER_APPEND: usize = 512;

pub struct ReplicaConfig {
    pub logger: slog::Logger,
    /// This replica's name. If the roster lists it, that entry is ignored.
    pub name: String,
    pub peers: Peers,
    pub options: ReplicaOptions,
    pub commit_stream_publisher: CommitStreamPublisher,
}

/// Replica is the consensus state machine of one member of the quorum.
///
/// It is created `Stopped`. `serve()` moves it into its own task, which becomes the only place its
/// state changes; everybody else talks to it by putting events into its pipe.
pub struct Replica {
    logger: slog::Logger,
    name: String,
    peers: Peers,
    quorum: Quorum,
    options: ReplicaOptionsValidated,
    state: State,
    bootstrapped: bool,

    term: u64,
    voted_for: Option<String>,
    leader: Option<String>,
    log: RaftLog,
    commit_index: u64,
    last_applied: u64,

    // Reset whenever a new role is taken.
    election: Option<Election>,
    progress: Option<LeaderProgress>,

    heartbeat_ticker: Option<Ticker>,
    election_ticker: Option<Ticker>,
    events: Option<WeakEventSender>,
    // Cancelled on stop; parent of every outbound call and ticker.
    cancel: CancellationToken,

    commits: CommitStreamPublisher,
    notifier: StateNotifier,
    status: Arc<HealthStatus>,
}

/// ReplicaHandle is how the outside world reaches a serving replica.
pub struct ReplicaHandle {
    events: EventSender,
    state_listener: StateListener,
    status: Arc<HealthStatus>,
    stop: CancellationToken,
    task: JoinHandle<Result<(), ReplicaError>>,
}

impl Replica {
    pub fn new(config: ReplicaConfig) -> Result<Self, ReplicaError> {
        let options = ReplicaOptionsValidated::try_from(config.options).map_err(ReplicaError::InvalidOptions)?;
        let name = config.name;
        let peers = config.peers.filter(|peer| peer.name != name);
        let quorum = Quorum::new(peers.names().into_iter().chain(std::iter::once(name.as_str())));
        let logger = config.logger.new(slog::o!("replica" => name.clone()));
        let notifier = state_listener::new();

        Ok(Replica {
            logger,
            name,
            peers,
            quorum,
            options,
            state: State::Stopped,
            bootstrapped: false,
            term: 0,
            voted_for: None,
            leader: None,
            log: RaftLog::default(),
            commit_index: 0,
            last_applied: 0,
            election: None,
            progress: None,
            heartbeat_ticker: None,
            election_ticker: None,
            events: None,
            cancel: CancellationToken::new(),
            commits: config.commit_stream_publisher,
            notifier,
            status: Arc::new(HealthStatus::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn term(&self) -> u64 {
        self.term
    }

    pub fn state_listener(&self) -> StateListener {
        self.notifier.subscribe()
    }

    /// Put an event into the replica's pipe.
    pub async fn dispatch(&self, event: Event) -> Result<(), ReplicaError> {
        let events = self
            .events
            .as_ref()
            .and_then(WeakEventSender::upgrade)
            .ok_or(ReplicaError::NotListening)?;

        events.send(event).await.map_err(|_| ReplicaError::NotListening)
    }

    /// Bootstrap the replica (connect to peers, start the election timer) and run its event loop
    /// on a new task. Must be called from within a tokio runtime.
    pub fn serve(mut self) -> Result<ReplicaHandle, ReplicaError> {
        let (events, receiver) = pipe(self.options.buffer_size);
        self.events = Some(events.downgrade());

        if let Err(e) = self.start() {
            self.stop();
            return Err(e);
        }

        let state_listener = self.notifier.subscribe();
        let status = self.status.clone();
        let stop = CancellationToken::new();
        let task = tokio::spawn(self.run(receiver, stop.clone()));

        Ok(ReplicaHandle {
            events,
            state_listener,
            status,
            stop,
            task,
        })
    }

    fn start(&mut self) -> Result<(), ReplicaError> {
        self.set_state(State::Initialized)?;
        self.set_state(State::Running)?;
        self.set_state(State::Follower)
    }

    fn stop(&mut self) {
        if let Err(e) = self.set_state(State::Stopped) {
            slog::warn!(self.logger, "Could not stop cleanly: {}", e);
        }
    }

    async fn run(mut self, mut events: EventReceiver, stop: CancellationToken) -> Result<(), ReplicaError> {
        slog::info!(self.logger, "Event loop started"; "aggregate" => self.options.aggregate);

        let result = tokio::select! {
            biased;
            _ = stop.cancelled() => Ok(()),
            result = self.drive(&mut events) => result,
        };

        // Anything still queued is dropped, which answers waiting callers with an error.
        events.close();

        if let Err(e) = &result {
            slog::error!(self.logger, "Event loop aborted: {}", e);
            self.status.set_healthy(false);
        }
        self.stop();

        result
    }

    async fn drive(&mut self, events: &mut EventReceiver) -> Result<(), ReplicaError> {
        if self.options.aggregate {
            aggregating_loop(events, self).await
        } else {
            event_loop(events, self).await
        }
    }

    /// Run the hook of `state` and, only if it succeeds, enter it.
    fn set_state(&mut self, state: State) -> Result<(), ReplicaError> {
        let hook = match state {
            State::Stopped => self.on_stopped(),
            State::Initialized => self.on_initialized(),
            State::Running => self.on_running(),
            State::Follower => self.on_follower(),
            State::Candidate => self.on_candidate(),
            State::Leader => self.on_leader(),
        };
        hook?;

        if self.state != state {
            slog::info!(self.logger, "State change"; "from" => %self.state, "to" => %state, "term" => self.term);
        }
        self.state = state;
        self.publish();

        Ok(())
    }

    fn on_stopped(&mut self) -> Result<(), ReplicaError> {
        if self.state == State::Stopped {
            return Ok(());
        }

        if let Some(ticker) = self.heartbeat_ticker.take() {
            ticker.stop();
        }
        if let Some(ticker) = self.election_ticker.take() {
            ticker.stop();
        }
        self.cancel.cancel();

        // Bootstrap may have connected only some peers before failing.
        for peer in self.peers.iter() {
            match peer.close() {
                Ok(()) | Err(PeerError::NotConnected) => {}
                Err(e) => {
                    slog::warn!(self.logger, "Failed closing connection to {}: {}", peer.name, e);
                }
            }
        }

        self.events = None;
        self.leader = None;
        self.status.set_ready(false);
        Ok(())
    }

    fn on_initialized(&mut self) -> Result<(), ReplicaError> {
        self.election = None;
        self.progress = None;
        Ok(())
    }

    fn on_running(&mut self) -> Result<(), ReplicaError> {
        if self.bootstrapped {
            return Ok(());
        }

        self.peers.connect(&self.options.connect)?;
        self.election_ticker = Some(self.start_ticker(Tick::ElectionTimeout));
        self.bootstrapped = true;
        self.status.set_healthy(true);
        Ok(())
    }

    fn on_follower(&mut self) -> Result<(), ReplicaError> {
        self.on_initialized()?;

        if let Some(ticker) = self.heartbeat_ticker.take() {
            ticker.stop();
        }

        match self.election_ticker.take() {
            Some(ticker) => {
                ticker.interrupt();
                self.election_ticker = Some(ticker);
            }
            None => self.election_ticker = Some(self.start_ticker(Tick::ElectionTimeout)),
        }

        self.status.set_ready(true);
        Ok(())
    }

    fn on_candidate(&mut self) -> Result<(), ReplicaError> {
        self.on_initialized()?;

        let mut election = self.quorum.election()?;
        if let Err(e) = election.vote(&self.name) {
            slog::warn!(self.logger, "Could not vote for myself: {}", e);
        }
        self.election = Some(election);
        Ok(())
    }

    fn on_leader(&mut self) -> Result<(), ReplicaError> {
        self.on_initialized()?;

        if let Some(ticker) = self.election_ticker.take() {
            ticker.stop();
        }
        self.heartbeat_ticker = Some(self.start_ticker(Tick::HeartbeatTimeout));
        self.progress = Some(LeaderProgress::new(self.peers.names(), self.log.last_index()));
        self.leader = Some(self.name.clone());
        Ok(())
    }

    fn start_ticker(&self, tick: Tick) -> Ticker {
        let interval = match tick {
            Tick::HeartbeatTimeout => self.options.heartbeat_interval(),
            Tick::ElectionTimeout => self.options.election_interval(),
        };

        let (ticker, ticks) = Ticker::spawn_with_parent(interval, tick, &self.cancel);
        if let Some(events) = &self.events {
            tokio::spawn(ticks.forward(events.clone()));
        }
        ticker
    }

    fn publish(&self) {
        self.notifier.notify(StateSnapshot {
            state: self.state,
            term: self.term,
            leader: self.leader.clone(),
        });
    }

    /// > If RPC request or response contains term T > currentTerm:
    /// > set currentTerm = T, convert to follower (§5.1)
    fn step_down(&mut self, term: u64, leader: Option<String>) -> Result<(), ReplicaError> {
        if term > self.term {
            self.term = term;
            self.voted_for = None;
        }
        self.leader = leader;

        if self.state != State::Follower {
            self.set_state(State::Follower)
        } else {
            self.publish();
            Ok(())
        }
    }

    fn become_leader(&mut self) -> Result<(), ReplicaError> {
        self.set_state(State::Leader)?;
        // A lone replica commits on its own.
        self.advance_commit_index();
        self.replicate();
        Ok(())
    }

    fn rpc_context(&self) -> RpcContext {
        RpcContext {
            timeout: self.options.rpc_timeout,
            cancel: self.cancel.child_token(),
        }
    }

    /// Feed the replies of a broadcast back into the pipe.
    fn forward_replies<T: Send + 'static>(
        &self,
        mut replies: mpsc::Receiver<T>,
        broadcast: Broadcast,
        into_event: fn(T) -> Event,
    ) {
        let events = match &self.events {
            Some(events) => events.clone(),
            None => return,
        };
        let logger = self.logger.clone();

        tokio::spawn(async move {
            while let Some(reply) = replies.recv().await {
                if events.send(into_event(reply)).await.is_err() {
                    return;
                }
            }

            let succeeded = broadcast.join().await;
            slog::trace!(logger, "Broadcast complete"; "succeeded" => succeeded);
        });
    }

    fn handle_write_ahead(&mut self, batch: Vec<WriteAhead>) {
        if self.state != State::Leader {
            for write_ahead in batch {
                write_ahead.respond(Err(WriteAheadError::NotLeader {
                    leader: self.leader.clone(),
                }));
            }
            return;
        }

        // > If command received from client: append entry to local log,
        // > respond after entry applied to state machine (§5.3)
        for write_ahead in batch {
            let index = self.log.append(self.term, write_ahead.data.to_vec());
            write_ahead.respond(Ok(WriteAheadReceipt { term: self.term, index }));
        }

        self.advance_commit_index();
        self.replicate();
    }

    fn handle_heartbeat_timeout(&mut self) {
        if self.state == State::Leader {
            self.replicate();
        } else {
            slog::debug!(self.logger, "Ignoring heartbeat timeout as {}", self.state);
        }
    }

    /// > If election timeout elapses without receiving AppendEntries RPC from current leader or
    /// > granting vote to candidate: convert to candidate
    fn handle_election_timeout(&mut self) -> Result<(), ReplicaError> {
        if !matches!(self.state, State::Follower | State::Candidate) {
            slog::debug!(self.logger, "Ignoring election timeout as {}", self.state);
            return Ok(());
        }

        self.term += 1;
        self.voted_for = Some(self.name.clone());
        self.leader = None;
        slog::info!(self.logger, "Election timeout, starting election"; "term" => self.term);

        self.set_state(State::Candidate)?;
        if self.election.as_ref().map_or(false, Election::passed) {
            return self.become_leader();
        }

        let request = VoteRequest {
            term: self.term,
            candidate: self.name.clone(),
            last_log_index: self.log.last_index(),
            last_log_term: self.log.last_term(),
        };
        let (tx, rx) = mpsc::channel(self.peers.len().max(1));
        let broadcast = self.peers.request_vote(&self.logger, &self.rpc_context(), request, tx);
        self.forward_replies(rx, broadcast, Event::VoteReply);

        Ok(())
    }

    fn handle_vote_request(&mut self, request: VoteRequest) -> Result<VoteReply, ReplicaError> {
        // 1. Reply false if term < currentTerm (§5.1)
        if request.term < self.term {
            slog::info!(self.logger, "Not granting vote, candidate term is stale"; "candidate" => &request.candidate);
            return Ok(self.vote_reply(false));
        }

        if request.term > self.term {
            self.step_down(request.term, None)?;
        }

        // 2. If votedFor is null or candidateId, and candidate’s log is at
        // least as up-to-date as receiver’s log, grant vote (§5.2, §5.4)
        let unvoted = match &self.voted_for {
            None => true,
            Some(voted_for) => *voted_for == request.candidate,
        };
        let granted = unvoted
            && self.quorum.contains(&request.candidate)
            && self.log.covered_by(request.last_log_term, request.last_log_index);

        if granted {
            self.voted_for = Some(request.candidate.clone());
            if let Some(ticker) = &self.election_ticker {
                ticker.interrupt();
            }
        }

        slog::info!(self.logger, "Vote requested"; "candidate" => &request.candidate, "term" => request.term, "granted" => granted);
        Ok(self.vote_reply(granted))
    }

    fn vote_reply(&self, granted: bool) -> VoteReply {
        VoteReply {
            remote: self.name.clone(),
            term: self.term,
            granted,
        }
    }

    fn handle_vote_reply(&mut self, reply: VoteReply) -> Result<(), ReplicaError> {
        if reply.term > self.term {
            return self.step_down(reply.term, None);
        }

        if self.state != State::Candidate || reply.term != self.term {
            slog::debug!(self.logger, "Ignoring stale vote"; "remote" => &reply.remote, "term" => reply.term);
            return Ok(());
        }

        if !reply.granted {
            slog::info!(self.logger, "Vote not granted"; "remote" => &reply.remote);
            return Ok(());
        }

        let passed = match self.election.as_mut().map(|election| election.vote(&reply.remote)) {
            Some(Ok(passed)) => passed,
            Some(Err(e)) => {
                slog::warn!(self.logger, "Discarding vote: {}", e);
                return Ok(());
            }
            None => return Ok(()),
        };

        if passed {
            slog::info!(self.logger, "Won election"; "term" => self.term);
            self.become_leader()?;
        }
        Ok(())
    }

    fn handle_append_request(&mut self, request: AppendRequest) -> Result<AppendReply, ReplicaError> {
        // 1. Reply false if term < currentTerm (§5.1)
        if request.term < self.term {
            return Ok(self.append_reply(false, self.log.last_index()));
        }

        if request.term > self.term
            || self.state != State::Follower
            || self.leader.as_deref() != Some(request.leader.as_str())
        {
            self.step_down(request.term, Some(request.leader.clone()))?;
        }

        if let Some(ticker) = &self.election_ticker {
            ticker.interrupt();
        }

        // 2. Reply false if log doesn't contain an entry at prevLogIndex
        // whose term matches prevLogTerm (§5.3)
        match self.log.term_at(request.prev_log_index) {
            Some(term) if term == request.prev_log_term => {}
            _ => return Ok(self.append_reply(false, self.log.last_index())),
        }

        // 3. If an existing entry conflicts with a new one (same index
        // but different terms), delete the existing entry and all that
        // follow it (§5.3)
        // 4. Append any new entries not already in the log
        let last_new_index = self.log.merge(request.prev_log_index, request.entries);

        // 5. If leaderCommit > commitIndex, set commitIndex =
        // min(leaderCommit, index of last new entry)
        let commit_index = request.leader_commit.min(last_new_index);
        if commit_index > self.commit_index {
            self.commit_index = commit_index;
            self.apply_committed();
        }

        Ok(self.append_reply(true, last_new_index))
    }

    fn append_reply(&self, success: bool, index: u64) -> AppendReply {
        AppendReply {
            remote: self.name.clone(),
            term: self.term,
            success,
            index,
            commit_index: self.commit_index,
        }
    }

    fn handle_append_reply(&mut self, reply: AppendReply) -> Result<(), ReplicaError> {
        if reply.term > self.term {
            return self.step_down(reply.term, None);
        }

        if self.state != State::Leader || reply.term != self.term {
            return Ok(());
        }

        // A peer can't hold more of this term's log than the leader does.
        let index = reply.index.min(self.log.last_index());
        let progress = match self.progress.as_mut() {
            Some(progress) => progress,
            None => return Ok(()),
        };

        let known = if reply.success {
            progress.record_success(&reply.remote, index)
        } else {
            slog::debug!(self.logger, "Peer log is behind"; "remote" => &reply.remote, "last_index" => reply.index);
            progress.record_failure(&reply.remote, index)
        };

        if !known {
            slog::warn!(self.logger, "Append reply from unknown peer {:?}", reply.remote);
        } else if reply.success {
            self.advance_commit_index();
        }
        Ok(())
    }

    /// > If there exists an N such that N > commitIndex, a majority
    /// > of matchIndex[i] ≥ N, and log[N].term == currentTerm:
    /// > set commitIndex = N (§5.3, §5.4).
    fn advance_commit_index(&mut self) {
        let candidate = match &self.progress {
            Some(progress) => cluster_commit_index(progress.matched()).unwrap_or_else(|| self.log.last_index()),
            None => return,
        };

        if candidate > self.commit_index && self.log.term_at(candidate) == Some(self.term) {
            self.commit_index = candidate;
            self.apply_committed();
        }
    }

    fn apply_committed(&mut self) {
        while self.last_applied < self.commit_index {
            self.last_applied += 1;
            if let Some(entry) = self.log.get(self.last_applied) {
                self.commits.notify_commit(
                    &self.logger,
                    CommittedEntry {
                        term: entry.term,
                        index: entry.index,
                        data: Bytes::from(entry.data.clone()),
                    },
                );
            }
        }
    }

    /// Send every peer the part of the log it is missing (nothing, for peers that are caught up).
    /// Peers waiting on the same index share one request.
    fn replicate(&self) {
        let progress = match &self.progress {
            Some(progress) => progress,
            None => return,
        };

        for (next_index, names) in progress.groups() {
            let prev_log_index = next_index - 1;
            let prev_log_term = match self.log.term_at(prev_log_index) {
                Some(term) => term,
                None => {
                    slog::error!(self.logger, "Peers expect index {} beyond my log", next_index; "peers" => ?names);
                    continue;
                }
            };

            let request = AppendRequest {
                term: self.term,
                leader: self.name.clone(),
                prev_log_index,
                prev_log_term,
                leader_commit: self.commit_index,
                entries: self.log.entries_from(next_index, MAX_ENTRIES_PER_APPEND),
            };

            let group = self.peers.filter(|peer| names.contains(&peer.name.as_str()));
            let (tx, rx) = mpsc::channel(group.len().max(1));
            let broadcast = group.append_entries(&self.logger, &self.rpc_context(), request, tx);
            self.forward_replies(rx, broadcast, Event::AppendReply);
        }
    }
}

impl Handler for Replica {
    type Error = ReplicaError;

    fn handle(&mut self, event: Event) -> Result<(), ReplicaError> {
        slog::trace!(self.logger, "Handling event"; "type" => %event.event_type());

        match event {
            Event::Error(message) => return Err(ReplicaError::Aborted(message)),
            Event::WriteAhead(write_ahead) => self.handle_write_ahead(vec![write_ahead]),
            Event::AggregatedWriteAhead(batch) => self.handle_write_ahead(batch),
            Event::HeartbeatTimeout => self.handle_heartbeat_timeout(),
            Event::ElectionTimeout => self.handle_election_timeout()?,
            Event::VoteRequest(request, callback) => {
                let reply = self.handle_vote_request(request)?;
                callback.send(reply);
            }
            Event::VoteReply(reply) => self.handle_vote_reply(reply)?,
            Event::AppendRequest(request, callback) => {
                let reply = self.handle_append_request(request)?;
                callback.send(reply);
            }
            Event::AppendReply(reply) => self.handle_append_reply(reply)?,
        }

        Ok(())
    }
}

impl ReplicaHandle {
    /// A producer for the replica's pipe, e.g. for the RPC server.
    pub fn sender(&self) -> EventSender {
        self.events.clone()
    }

    pub async fn dispatch(&self, event: Event) -> Result<(), ReplicaError> {
        self.events.send(event).await.map_err(|_| ReplicaError::NotListening)
    }

    /// Ask the replica to append `data` to the replicated log.
    pub async fn write_ahead<B: Into<Bytes>>(&self, data: B) -> Result<WriteAheadReceipt, WriteAheadError> {
        let (callback, receipt) = Callback::new();
        let event = Event::WriteAhead(WriteAhead::with_callback(data, callback));

        if self.events.send(event).await.is_err() {
            return Err(WriteAheadError::Stopped);
        }
        receipt.await.unwrap_or(Err(WriteAheadError::Stopped))
    }

    pub fn state_listener(&self) -> StateListener {
        self.state_listener.clone()
    }

    pub fn status(&self) -> Arc<HealthStatus> {
        self.status.clone()
    }

    /// Stop the event loop and wait for the replica to reach `Stopped`. Returns the error that
    /// aborted the loop, if any.
    pub async fn shutdown(self) -> Result<(), ReplicaError> {
        self.stop.cancel();
        drop(self.events);
        self.task.await?
    }
}
