//! Error kind taxonomy.

use std::fmt;

use serde::Serialize;

/// Category of a failure talking to an inference server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The server could not be reached (refused, DNS, unreachable host).
    Connection,
    /// The server rejected the credentials or the request shape (4xx).
    Authentication,
    /// The server failed internally (5xx) or answered with garbage.
    Server,
    /// The request did not complete within its deadline.
    Timeout,
    /// Local setup is wrong (bad URL, client already shut down).
    Configuration,
    /// Nothing matched.
    Unknown,
}

impl ErrorKind {
    /// Short stable label, used for metrics and logs.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Server => "server",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Human-readable explanation of the likely causes.
    pub fn explanation(self) -> &'static str {
        match self {
            ErrorKind::Connection => {
                "The inference server could not be reached. It may not be running, \
                 the network path may be down, or a firewall may be blocking the connection."
            }
            ErrorKind::Authentication => {
                "The server rejected the request. The API key may be wrong or the \
                 authentication scheme may not match what the server expects."
            }
            ErrorKind::Server => {
                "The inference server failed while handling the request. It may be \
                 overloaded or its model may have failed to load."
            }
            ErrorKind::Timeout => {
                "The request took longer than its deadline. The network may be slow \
                 or the server may be stalled."
            }
            ErrorKind::Configuration => {
                "The client configuration is invalid. A base URL may be malformed or \
                 a required value may be missing."
            }
            ErrorKind::Unknown => "The failure could not be categorized.",
        }
    }

    /// Default remediation hint for this kind.
    pub fn suggestion(self) -> &'static str {
        match self {
            ErrorKind::Connection => {
                "Check that the server is running and that its base URL and port are correct."
            }
            ErrorKind::Authentication => "Verify the API key and the request format for this server.",
            ErrorKind::Server => "Check the server logs and retry after a short wait.",
            ErrorKind::Timeout => "Check network connectivity, retry later, or raise the timeout.",
            ErrorKind::Configuration => "Review the server entries and timeouts in the router configuration.",
            ErrorKind::Unknown => "Run with RUST_LOG=debug and inspect the full error chain.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
