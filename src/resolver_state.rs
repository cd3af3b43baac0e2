//! Per-session resolver configuration.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Nameserver slots available to one resolver session, across both
/// address families. Entries past this are dropped without error.
pub const MAXNS: usize = 3;

/// Default DNS port.
pub const NAMESERVER_PORT: u16 = 53;

/// Nameserver configuration bound to one resolver handle.
///
/// IPv4 servers live in the primary list; IPv6 servers live in the
/// extension list. Both draw from the same [`MAXNS`] slots, and insertion
/// order within each list is priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverState {
    primary: Vec<SocketAddrV4>,
    extension: Vec<SocketAddrV6>,
    ipv6: bool,
    /// `true` once a successful init populated this state.
    pub initialized: bool,
}

impl ResolverState {
    /// An empty, uninitialized state with IPv6 extension support.
    #[must_use]
    pub fn new() -> Self {
        Self {
            primary: Vec::with_capacity(MAXNS),
            extension: Vec::new(),
            ipv6: true,
            initialized: false,
        }
    }

    /// An empty state for a resolver without extended (IPv6) slots.
    #[must_use]
    pub fn without_ipv6() -> Self {
        Self {
            ipv6: false,
            ..Self::new()
        }
    }

    /// An empty, uninitialized state with the same IPv6 capability.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self {
            ipv6: self.ipv6,
            ..Self::new()
        }
    }

    #[must_use]
    pub const fn supports_ipv6(&self) -> bool {
        self.ipv6
    }

    /// Total configured nameservers.
    #[must_use]
    pub fn nameserver_count(&self) -> usize {
        self.primary.len() + self.extension.len()
    }

    #[must_use]
    pub fn ipv4_count(&self) -> usize {
        self.primary.len()
    }

    #[must_use]
    pub fn ipv6_count(&self) -> usize {
        self.extension.len()
    }

    #[must_use]
    pub fn ipv4_nameservers(&self) -> &[SocketAddrV4] {
        &self.primary
    }

    #[must_use]
    pub fn ipv6_nameservers(&self) -> &[SocketAddrV6] {
        &self.extension
    }

    /// All nameservers in query order: IPv4 first, then the extension list.
    pub fn nameservers(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.primary
            .iter()
            .copied()
            .map(SocketAddr::V4)
            .chain(self.extension.iter().copied().map(SocketAddr::V6))
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.nameserver_count() >= MAXNS
    }

    /// Adds a nameserver if a slot is free. Returns `false` when the entry
    /// was dropped, either for lack of room or because IPv6 is unsupported.
    pub fn push(&mut self, addr: SocketAddr) -> bool {
        if self.is_full() {
            return false;
        }
        match addr {
            SocketAddr::V4(v4) => self.primary.push(v4),
            SocketAddr::V6(v6) if self.ipv6 => self.extension.push(v6),
            SocketAddr::V6(_) => return false,
        }
        true
    }

    pub fn push_ipv4(&mut self, ip: Ipv4Addr) -> bool {
        self.push(SocketAddr::V4(SocketAddrV4::new(ip, NAMESERVER_PORT)))
    }

    pub fn push_ipv6(&mut self, ip: Ipv6Addr) -> bool {
        self.push(SocketAddr::V6(SocketAddrV6::new(ip, NAMESERVER_PORT, 0, 0)))
    }

    /// Replaces the nameserver list with the one from `other` in one step.
    pub fn replace_nameservers(&mut self, other: Self) {
        self.primary = other.primary;
        self.extension = other.extension;
    }

    /// Frees the IPv6 extension list.
    pub fn release_extension(&mut self) {
        self.extension = Vec::new();
    }

    /// Releases the extension list and resets the session. Safe to call
    /// more than once.
    pub fn close(&mut self) {
        self.release_extension();
        self.primary.clear();
        self.initialized = false;
    }
}

impl Default for ResolverState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_empty_and_uninitialized() {
        let state = ResolverState::new();
        assert_eq!(state.nameserver_count(), 0);
        assert!(!state.initialized);
        assert!(state.supports_ipv6());
    }

    #[test]
    fn push_respects_shared_capacity() {
        let mut state = ResolverState::new();
        assert!(state.push_ipv4(Ipv4Addr::new(127, 0, 0, 1)));
        assert!(state.push_ipv6(Ipv6Addr::LOCALHOST));
        assert!(state.push_ipv4(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(!state.push_ipv4(Ipv4Addr::new(10, 0, 0, 2)));
        assert!(!state.push_ipv6(Ipv6Addr::LOCALHOST));

        assert_eq!(state.ipv4_count(), 2);
        assert_eq!(state.ipv6_count(), 1);
        assert_eq!(state.nameserver_count(), MAXNS);
    }

    #[test]
    fn nameservers_in_priority_order() {
        let mut state = ResolverState::new();
        state.push_ipv6(Ipv6Addr::LOCALHOST);
        state.push_ipv4(Ipv4Addr::new(10, 0, 0, 1));
        state.push_ipv4(Ipv4Addr::new(10, 0, 0, 2));

        let order: Vec<SocketAddr> = state.nameservers().collect();
        assert_eq!(
            order,
            vec![
                "10.0.0.1:53".parse().unwrap(),
                "10.0.0.2:53".parse().unwrap(),
                "[::1]:53".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn ipv6_dropped_without_extension() {
        let mut state = ResolverState::without_ipv6();
        assert!(!state.push_ipv6(Ipv6Addr::LOCALHOST));
        assert_eq!(state.nameserver_count(), 0);
    }

    #[test]
    fn close_twice_is_safe() {
        let mut state = ResolverState::new();
        state.push_ipv6(Ipv6Addr::LOCALHOST);
        state.initialized = true;

        state.close();
        state.close();
        assert_eq!(state.nameserver_count(), 0);
        assert!(!state.initialized);
    }
}
