//! The authenticated identity attached to a session (§3 Session, §9 ambiguity #3).

use std::collections::HashMap;

use haip_wire::Channel;

/// Which channels an event type may be sent/received on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelGrant {
    /// Permitted on any channel.
    Wildcard,
    /// Permitted only on the listed channels.
    Channels(Vec<Channel>),
}

impl ChannelGrant {
    pub fn allows(&self, channel: Channel) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Channels(list) => list.contains(&channel),
        }
    }
}

/// `permissions: Map<event, channels[]>` from §9 ambiguity #3, keyed by the
/// event type's wire name (e.g. `"MESSAGE_START"`).
pub type PermissionMap = HashMap<String, ChannelGrant>;

/// The verified identity behind a session, produced by the (out-of-scope)
/// bearer-credential authenticator and consumed only by the core (§1, §6).
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub permissions: PermissionMap,
    /// Scalar credit allowance used as an upper bound when negotiating flow
    /// control credits at handshake (§4.3).
    pub credit_allowance: u64,
}

impl Principal {
    pub fn new(id: impl Into<String>, credit_allowance: u64) -> Self {
        Self {
            id: id.into(),
            permissions: PermissionMap::new(),
            credit_allowance,
        }
    }

    pub fn with_permission(mut self, event_type: impl Into<String>, grant: ChannelGrant) -> Self {
        self.permissions.insert(event_type.into(), grant);
        self
    }

    /// Enforce the permission map on every inbound event (§9 ambiguity #3):
    /// an event type with no entry in the map is denied by default.
    pub fn permits(&self, event_type: &str, channel: Channel) -> bool {
        self.permissions
            .get(event_type)
            .map(|grant| grant.allows(channel))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_allows_any_channel() {
        let p = Principal::new("u1", 100).with_permission("PING", ChannelGrant::Wildcard);
        assert!(p.permits("PING", Channel::System));
        assert!(p.permits("PING", Channel::User));
    }

    #[test]
    fn channel_list_restricts_permission() {
        let p = Principal::new("u1", 100)
            .with_permission("MESSAGE_START", ChannelGrant::Channels(vec![Channel::User]));
        assert!(p.permits("MESSAGE_START", Channel::User));
        assert!(!p.permits("MESSAGE_START", Channel::Agent));
    }

    #[test]
    fn unlisted_event_type_is_denied_by_default() {
        let p = Principal::new("u1", 100);
        assert!(!p.permits("MESSAGE_START", Channel::User));
    }
}
