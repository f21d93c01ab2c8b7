//! User-facing reply text for the proxy's non-success branches

/// Credential missing from the proxy environment
pub const CONFIGURATION_ERROR_REPLY: &str =
    "The assistant isn't configured correctly right now. Please contact the site owner or try again later.";

/// Upstream unreachable or answered with an error status
pub const UPSTREAM_ERROR_REPLY: &str =
    "I'm having trouble reaching the AI service right now. Please try again in a moment.";

/// Upstream payload did not have the expected structure
pub const UNEXPECTED_RESPONSE_REPLY: &str =
    "I got an unexpected response from the AI service. Please try again in a moment.";

/// Upstream succeeded without generating any text
pub const EMPTY_COMPLETION_REPLY: &str = "Sorry, I couldn't generate a response. Could you rephrase your question?";

/// Request body exceeded the size limit
pub const MESSAGE_TOO_LONG_REPLY: &str =
    "That message is too long for me to handle. Please shorten it and try again.";
