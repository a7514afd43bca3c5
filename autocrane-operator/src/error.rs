/// Error kinds the orchestrator loop can surface.
///
/// Parse/validation failures on individual annotations are *not* represented
/// here — they collapse to `Option::None` at the point of parsing (see
/// `autocrane_types::decode_request`) and never reach this enum, per the
/// spec's error-handling design (they must not poison the consecutive-error
/// counter).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("Json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Leader election failure: {0}")]
    LeaderElection(String),
}
