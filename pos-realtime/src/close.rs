//! WebSocket close codes used by the hub. These live in the application
//! range (4000-4999) per RFC 6455 so clients can distinguish *why* the hub
//! closed the connection from ordinary transport-level closes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubCloseCode {
    /// No valid auth frame arrived within the handshake window.
    Unauthenticated,
    /// Auth frame verified, but the role doesn't match the requested
    /// connection type (e.g. a cashier opening a `kitchen` connection).
    Forbidden,
    /// Message-rate limit exceeded for this connection.
    RateLimited,
    /// Per-user or per-IP concurrent connection ceiling exceeded.
    TooManyConnections,
    /// Malformed frame, oversized frame, or any other protocol violation.
    Protocol,
    /// No pong seen within roughly two ping intervals; the peer is presumed
    /// gone and the connection is torn down rather than held open forever.
    Idle,
}

impl HubCloseCode {
    pub const fn code(self) -> u16 {
        match self {
            HubCloseCode::Unauthenticated => 4401,
            HubCloseCode::Forbidden => 4403,
            HubCloseCode::RateLimited => 4429,
            HubCloseCode::TooManyConnections => 4430,
            HubCloseCode::Protocol => 4000,
            HubCloseCode::Idle => 4408,
        }
    }

    pub const fn reason(self) -> &'static str {
        match self {
            HubCloseCode::Unauthenticated => "authentication required",
            HubCloseCode::Forbidden => "connection type not permitted for this role",
            HubCloseCode::RateLimited => "message rate limit exceeded",
            HubCloseCode::TooManyConnections => "too many concurrent connections",
            HubCloseCode::Protocol => "protocol violation",
            HubCloseCode::Idle => "no pong received within the dead-connection window",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_codes_match_the_documented_values() {
        assert_eq!(HubCloseCode::Unauthenticated.code(), 4401);
        assert_eq!(HubCloseCode::Forbidden.code(), 4403);
        assert_eq!(HubCloseCode::RateLimited.code(), 4429);
        assert_eq!(HubCloseCode::TooManyConnections.code(), 4430);
        assert_eq!(HubCloseCode::Protocol.code(), 4000);
        assert_eq!(HubCloseCode::Idle.code(), 4408);
    }
}
