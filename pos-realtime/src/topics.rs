//! Connection types and the topics each is permitted to subscribe to.
//!
//! A single WebSocket connects as exactly one type, chosen by the client at
//! handshake time (`?connection_type=pos|kitchen|management`), and the
//! server enforces that the caller's role actually permits it.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    /// Front-of-house terminals: order and payment status updates.
    Pos,
    /// Kitchen display systems: new/updated order line items only.
    Kitchen,
    /// Back-office dashboards: everything, plus operational alerts.
    Management,
}

impl ConnectionType {
    pub fn from_query_param(value: &str) -> Option<Self> {
        match value {
            "pos" => Some(ConnectionType::Pos),
            "kitchen" => Some(ConnectionType::Kitchen),
            "management" => Some(ConnectionType::Management),
            _ => None,
        }
    }

    /// Roles (from the verified identity) allowed to open this connection
    /// type. A `management` connection sees strictly more than a `pos` one,
    /// so management-roled staff may also open the narrower types.
    pub fn allowed_for_roles(self, roles: &[String]) -> bool {
        let has = |r: &str| roles.iter().any(|role| role == r);
        match self {
            ConnectionType::Pos => has("cashier") || has("manager") || has("owner"),
            ConnectionType::Kitchen => has("kitchen_staff") || has("manager") || has("owner"),
            ConnectionType::Management => has("manager") || has("owner"),
        }
    }

    /// Topic keys this connection type receives, independent of any specific
    /// restaurant — combined with the tenant id to form a room name.
    pub fn topics(self) -> &'static [&'static str] {
        match self {
            ConnectionType::Pos => &["order.status", "payment.status"],
            ConnectionType::Kitchen => &["order.items"],
            ConnectionType::Management => &["order.status", "payment.status", "order.items", "alert"],
        }
    }

    pub fn subscribes_to(self, topic: &str) -> bool {
        self.topics().contains(&topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kitchen_staff_cannot_open_a_management_connection() {
        let roles = vec!["kitchen_staff".to_string()];
        assert!(!ConnectionType::Management.allowed_for_roles(&roles));
        assert!(ConnectionType::Kitchen.allowed_for_roles(&roles));
    }

    #[test]
    fn managers_can_open_any_connection_type() {
        let roles = vec!["manager".to_string()];
        assert!(ConnectionType::Pos.allowed_for_roles(&roles));
        assert!(ConnectionType::Kitchen.allowed_for_roles(&roles));
        assert!(ConnectionType::Management.allowed_for_roles(&roles));
    }

    #[test]
    fn kitchen_connections_do_not_receive_payment_topics() {
        assert!(!ConnectionType::Kitchen.subscribes_to("payment.status"));
        assert!(ConnectionType::Kitchen.subscribes_to("order.items"));
    }

    #[test]
    fn unknown_query_param_is_rejected() {
        assert!(ConnectionType::from_query_param("admin").is_none());
    }
}
