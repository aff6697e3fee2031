use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpBridgeError {
    #[error("make_synchronous_call was already made on this bridge")]
    CallAlreadyMade,

    #[error("Response is not available before the call has completed")]
    ResponseNotReady,

    #[error("Request parameters cannot change once the call has been made")]
    RequestLocked,

    #[error("No URL was set on the bridge")]
    UrlNotSet,

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Blocking call issued on the network context '{0}' would deadlock")]
    CalledOnNetworkContext(String),

    #[error("Network context is no longer running")]
    NetworkContextUnavailable,

    #[error("Fetch engine dropped the completion callback without invoking it")]
    CompletionDropped,

    #[error("Response body is not valid UTF-8: {0}")]
    ResponseNotUtf8(#[from] std::str::Utf8Error),

    #[error("Response body is not valid JSON: {0}")]
    ResponseNotJson(#[from] serde_json::Error),

    #[error("Failed to start network context: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

pub type Result<T> = std::result::Result<T, HttpBridgeError>;
