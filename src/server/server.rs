use crate::events::{Callback, Event, EventSender};
use crate::grpc::raft_server::{Raft, RaftServer};
use crate::grpc::{AppendReply, AppendRequest, VoteReply, VoteRequest};
use crate::server::RpcServerShutdownSignal;
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// RpcServer implements the Raft gRPC interface by turning every call into an event on the local
/// replica's pipe and waiting for the loop to answer it. It is the only way remote replicas reach
/// this one.
pub struct RpcServer {
    logger: slog::Logger,
    events: EventSender,
}

impl RpcServer {
    pub fn new(logger: slog::Logger, events: EventSender) -> Self {
        RpcServer { logger, events }
    }

    /// Serve until `shutdown_signal` fires. Fails if the address can't be bound.
    pub async fn run(
        self,
        socket_addr: SocketAddr,
        shutdown_signal: RpcServerShutdownSignal,
    ) -> Result<(), tonic::transport::Error> {
        let logger = self.logger.clone();
        slog::info!(logger, "Listening on '{:?}'", socket_addr);

        let result = Server::builder()
            .add_service(RaftServer::new(self))
            .serve_with_shutdown(socket_addr, shutdown_signal)
            .await;

        slog::info!(logger, "Server run() has exited: {:?}", result);
        result
    }

    async fn dispatch<O>(&self, event: Event, reply: oneshot::Receiver<O>) -> Result<O, Status> {
        if self.events.send(event).await.is_err() {
            return Err(Status::unavailable("replica is not listening for events"));
        }

        reply
            .await
            .map_err(|_| Status::unavailable("replica stopped before replying"))
    }
}

#[async_trait::async_trait]
impl Raft for RpcServer {
    async fn request_vote(&self, rpc_request_wrapped: Request<VoteRequest>) -> Result<Response<VoteReply>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);

        let (callback, reply) = Callback::new();
        let rpc_result = self.dispatch(Event::VoteRequest(rpc_request, callback), reply).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }

    async fn append_entries(
        &self,
        rpc_request_wrapped: Request<AppendRequest>,
    ) -> Result<Response<AppendReply>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);

        let (callback, reply) = Callback::new();
        let rpc_result = self.dispatch(Event::AppendRequest(rpc_request, callback), reply).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::pipe;
    use tonic::Code;

    fn server() -> (RpcServer, crate::events::EventReceiver) {
        let (events, receiver) = pipe(4);
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        (RpcServer::new(logger, events), receiver)
    }

    #[tokio::test]
    async fn request_vote_is_answered_by_the_loop() {
        let (server, mut receiver) = server();

        let responder = tokio::spawn(async move {
            match receiver.recv().await {
                Some(Event::VoteRequest(request, callback)) => callback.send(VoteReply {
                    remote: "opal".into(),
                    term: request.term,
                    granted: true,
                }),
                other => panic!("unexpected event: {:?}", other.map(|e| e.event_type())),
            }
        });

        let request = VoteRequest {
            term: 3,
            candidate: "jade".into(),
            ..Default::default()
        };
        let reply = server.request_vote(Request::new(request)).await.unwrap().into_inner();
        assert_eq!(reply, VoteReply {
            remote: "opal".into(),
            term: 3,
            granted: true,
        });
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_callback_is_unavailable() {
        let (server, mut receiver) = server();

        tokio::spawn(async move {
            // Swallow the event without answering.
            let _ = receiver.recv().await;
        });

        let status = server
            .append_entries(Request::new(AppendRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
        assert_eq!(status.message(), "replica stopped before replying");
    }

    #[tokio::test]
    async fn closed_pipe_is_unavailable() {
        let (server, receiver) = server();
        drop(receiver);

        let status = server
            .request_vote(Request::new(VoteRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
        assert_eq!(status.message(), "replica is not listening for events");
    }
}
