use bytes::Bytes;
use otter::{
    CommitStream, Peer, Peers, Replica, ReplicaConfig, ReplicaHandle, ReplicaOptions, RpcServer,
    RpcServerShutdownHandle, State, WriteAheadError,
};
use std::error::Error;
use std::net::SocketAddr;
use tokio::time::{Duration, Instant};

const NAMES: [&str; 3] = ["kira", "opal", "jade"];

struct Member {
    name: &'static str,
    replica: ReplicaHandle,
    commits: CommitStream,
    server: RpcServerShutdownHandle,
}

#[tokio::test]
async fn elects_one_leader() -> Result<(), Box<dyn Error>> {
    let cluster = start_cluster(3410)?;

    let leader = discover_leader(&cluster, Duration::from_secs(10)).await;
    wait_for_followers(&cluster, leader, Duration::from_secs(10)).await;

    let leaders: Vec<_> = cluster
        .iter()
        .filter(|member| member.replica.state_listener().current().state == State::Leader)
        .map(|member| member.name)
        .collect();
    assert_eq!(leaders, vec![leader]);

    stop_cluster(cluster).await;
    Ok(())
}

#[tokio::test]
async fn commits_on_every_replica() -> Result<(), Box<dyn Error>> {
    let mut cluster = start_cluster(3420)?;

    for data in &["Hello world", "it's me"] {
        let data = Bytes::from(*data);
        let receipt = replicate(&cluster, data.clone(), Duration::from_secs(10)).await;

        for member in cluster.iter_mut() {
            let committed = tokio::time::timeout(Duration::from_secs(10), member.commits.recv())
                .await
                .expect("Timeout waiting for commit")
                .expect("Expected commit stream to be alive");

            assert_eq!(committed.index, receipt.index, "replica {}", member.name);
            assert_eq!(committed.term, receipt.term, "replica {}", member.name);
            assert_eq!(committed.data, data, "replica {}", member.name);
        }
    }

    stop_cluster(cluster).await;
    Ok(())
}

fn roster(port_base: u16) -> Peers {
    NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| Peer::new(i as u16 + 1, *name, format!("127.0.0.1:{}", port_base + i as u16)))
        .collect()
}

fn start_cluster(port_base: u16) -> Result<Vec<Member>, Box<dyn Error>> {
    let mut cluster = Vec::with_capacity(NAMES.len());
    for (i, &name) in NAMES.iter().enumerate() {
        let logger = slog::Logger::root(slog::Discard, slog::o!("replica" => name));
        let (publisher, commits) = otter::create_commit_stream();

        let replica = Replica::new(ReplicaConfig {
            logger: logger.clone(),
            name: name.to_string(),
            peers: roster(port_base),
            options: options(),
            commit_stream_publisher: publisher,
        })?
        .serve()?;

        let addr: SocketAddr = format!("127.0.0.1:{}", port_base + i as u16).parse()?;
        let (server, signal) = otter::shutdown_signal();
        tokio::spawn(RpcServer::new(logger, replica.sender()).run(addr, signal));

        cluster.push(Member {
            name,
            replica,
            commits,
            server,
        });
    }

    Ok(cluster)
}

fn options() -> ReplicaOptions {
    ReplicaOptions {
        heartbeat: Some(Duration::from_millis(50)),
        election_timeout: Some(Duration::from_millis(500)),
        rpc_timeout: Some(Duration::from_millis(100)),
        ..ReplicaOptions::default()
    }
}

async fn stop_cluster(cluster: Vec<Member>) {
    for member in cluster {
        member.server.shutdown();
        member.replica.shutdown().await.expect("replica failed");
    }
}

async fn discover_leader(cluster: &[Member], timeout: Duration) -> &'static str {
    let deadline = Instant::now() + timeout;

    loop {
        let leader = cluster
            .iter()
            .find(|member| member.replica.state_listener().current().state == State::Leader);
        if let Some(leader) = leader {
            return leader.name;
        }

        assert!(Instant::now() < deadline, "Timeout waiting for leader election");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn wait_for_followers(cluster: &[Member], leader: &str, timeout: Duration) {
    for member in cluster.iter().filter(|member| member.name != leader) {
        let mut listener = member.replica.state_listener();
        let snapshot = tokio::time::timeout(
            timeout,
            listener.wait_for(|s| s.state == State::Follower && s.leader.as_deref() == Some(leader)),
        )
        .await
        .expect("Timeout waiting for follower to learn the leader")
        .expect("Expected state listener to be alive");

        assert!(snapshot.term > 0);
    }
}

/// Hand `data` to whoever leads, following redirects until a leader accepts it.
async fn replicate(cluster: &[Member], data: Bytes, timeout: Duration) -> otter::WriteAheadReceipt {
    let deadline = Instant::now() + timeout;

    loop {
        let leader = discover_leader(cluster, deadline.saturating_duration_since(Instant::now())).await;
        let member = cluster
            .iter()
            .find(|member| member.name == leader)
            .expect("Leader missing!");

        match member.replica.write_ahead(data.clone()).await {
            Ok(receipt) => return receipt,
            Err(WriteAheadError::NotLeader { .. }) => {
                assert!(Instant::now() < deadline, "Timeout finding a leader that accepts writes");
            }
            Err(e) => panic!("Write ahead failed: {}", e),
        }
    }
}
