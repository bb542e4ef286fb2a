use tonic::codegen::http::uri;

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("peer does not have an endpoint to connect on")]
    NoEndpoint,
    #[error("already connected to remote peer")]
    AlreadyConnected,
    #[error("not connected to remote peer")]
    NotConnected,
    #[error("no peer found named {0:?}")]
    NotFound(String),
    #[error("invalid address for {name}: {source}")]
    InvalidAddress {
        name: String,
        #[source]
        source: uri::InvalidUri,
    },
    #[error("could not connect to {name}: {source}")]
    Transport {
        name: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("rpc to {name} failed: {status}")]
    Rpc { name: String, status: tonic::Status },
    #[error("rpc to {0} timed out")]
    DeadlineExceeded(String),
    #[error("rpc to {0} was cancelled")]
    Cancelled(String),
    #[error("could not access roster: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed roster: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{}", join(.0))]
    Multiple(Vec<PeerError>),
}

impl PeerError {
    /// Fold every error of an all-attempted operation into one result.
    pub(crate) fn collect(mut errors: Vec<PeerError>) -> Result<(), PeerError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.swap_remove(0)),
            _ => Err(PeerError::Multiple(errors)),
        }
    }
}

fn join(errors: &[PeerError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_joins_errors() {
        assert!(PeerError::collect(vec![]).is_ok());

        let single = PeerError::collect(vec![PeerError::NotConnected]).unwrap_err();
        assert!(matches!(single, PeerError::NotConnected));

        let multiple =
            PeerError::collect(vec![PeerError::NoEndpoint, PeerError::AlreadyConnected]).unwrap_err();
        assert_eq!(
            multiple.to_string(),
            "peer does not have an endpoint to connect on\nalready connected to remote peer"
        );
    }
}
