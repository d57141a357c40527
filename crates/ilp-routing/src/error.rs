/// Errors that can occur within the routing layer.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("no route found for destination {destination}")]
    NoRoute { destination: String },

    #[error("address must start with prefix: address={address} prefix={prefix}")]
    PrefixMismatch { address: String, prefix: String },

    #[error("own address not set")]
    OwnAddressNotSet,

    #[error("peer not found: {0}")]
    PeerNotFound(String),
}
