//! The resolver the wrapper falls back to when no override applies.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config;
use crate::dns_message::build_query;
use crate::dns_question_and_answer::DnsQuestion;
use crate::error::Result;
use crate::forwarder::{self, DEFAULT_TIMEOUT};
use crate::resolver_state::ResolverState;

/// Default system resolver configuration.
pub const SYSTEM_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Operations the dispatcher needs from the underlying resolver.
pub trait RealResolver {
    /// Populate `state` with the baseline configuration.
    fn init(&mut self, state: &mut ResolverState) -> Result<()>;

    /// Send one question to the nameservers in `state` and return the raw reply.
    fn query(&mut self, state: &ResolverState, name: &str, class: u16, qtype: u16) -> Result<Vec<u8>>;

    /// Like [`query`](Self::query), applying the resolver's search rules.
    fn search(&mut self, state: &ResolverState, name: &str, class: u16, qtype: u16) -> Result<Vec<u8>> {
        self.query(state, name, class, qtype)
    }

    /// Tear down `state`.
    fn close(&mut self, state: &mut ResolverState) {
        state.close();
    }
}

/// Resolver reading the host's `resolv.conf` and querying over UDP.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    conf_path: PathBuf,
    timeout: Duration,
    next_id: u16,
}

impl SystemResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::with_conf(SYSTEM_RESOLV_CONF)
    }

    /// Read nameservers from `path` instead of `/etc/resolv.conf`.
    #[must_use]
    pub fn with_conf(path: impl Into<PathBuf>) -> Self {
        Self {
            conf_path: path.into(),
            timeout: DEFAULT_TIMEOUT,
            next_id: std::process::id() as u16,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn take_id(&mut self) -> u16 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl RealResolver for SystemResolver {
    fn init(&mut self, state: &mut ResolverState) -> Result<()> {
        let mut fresh = state.empty_like();
        if let Err(e) = config::parse(&self.conf_path, &mut fresh) {
            if !e.is_not_found() {
                return Err(e);
            }
            debug!(path = %self.conf_path.display(), "No system resolver config");
        }
        if fresh.nameserver_count() == 0 {
            // Same fallback as the C library: the local host.
            fresh.push_ipv4(Ipv4Addr::LOCALHOST);
        }

        state.replace_nameservers(fresh);
        Ok(())
    }

    fn query(&mut self, state: &ResolverState, name: &str, class: u16, qtype: u16) -> Result<Vec<u8>> {
        let question = DnsQuestion {
            name: name.to_string(),
            qtype,
            qclass: class,
        };
        let query = build_query(self.take_id(), &question)?;

        forwarder::send_query(state, &query, self.timeout).inspect_err(|e| {
            warn!(name, error = %e, "Query failed on every nameserver");
        })
    }
}
