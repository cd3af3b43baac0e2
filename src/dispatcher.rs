//! Resolver entry points: init, query, search and close.
//!
//! A [`Dispatcher`] owns everything the wrapper would otherwise keep in
//! process globals: the real resolver, the overrides and the state used by
//! the handle-less calls. One caller drives it at a time.

use std::net::Ipv4Addr;

use tracing::{debug, trace, Level};

use crate::config::{self, Overrides};
use crate::dns_message::{build_query, DnsMessage};
use crate::dns_question_and_answer::{DnsQuestion, RData};
use crate::error::{ResolvError, Result};
use crate::local::RecordTable;
use crate::logging;
use crate::real_resolver::{RealResolver, SystemResolver};
use crate::resolver_state::ResolverState;
use crate::server::answer_query;

/// Routes resolver calls to the real resolver or the fake record table.
#[derive(Debug)]
pub struct Dispatcher<R> {
    real: R,
    overrides: Overrides,
    table: Option<RecordTable>,
    default_state: ResolverState,
    next_id: u16,
}

impl Dispatcher<SystemResolver> {
    /// Dispatcher over the host resolver, configured from the environment.
    ///
    /// Also installs the stderr subscriber at `RESOLV_WRAPPER_DEBUGLEVEL`
    /// unless the process already has one.
    ///
    /// # Errors
    ///
    /// Fails if `RESOLV_WRAPPER_HOSTS` names a file that cannot be read.
    pub fn from_env() -> Result<Self> {
        let dispatcher = Self::new(SystemResolver::new(), Overrides::from_env())?;
        dispatcher.init_logging();
        Ok(dispatcher)
    }
}

impl<R: RealResolver> Dispatcher<R> {
    /// # Errors
    ///
    /// Fails if `overrides.hosts_path` is set and cannot be read.
    pub fn new(real: R, overrides: Overrides) -> Result<Self> {
        let table = overrides
            .hosts_path
            .as_ref()
            .map(RecordTable::from_hosts_file)
            .transpose()?;

        Ok(Self {
            real,
            overrides,
            table,
            default_state: ResolverState::new(),
            next_id: 0,
        })
    }

    /// Answer every query from `table` instead of the network.
    #[must_use]
    pub fn with_table(mut self, table: RecordTable) -> Self {
        self.table = Some(table);
        self
    }

    pub const fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// Install the global log subscriber at the configured debug level.
    /// Returns `false` if one was already installed.
    pub fn init_logging(&self) -> bool {
        logging::init(self.overrides.debug_level)
    }

    pub const fn real(&self) -> &R {
        &self.real
    }

    /// State used by the handle-less calls.
    pub const fn default_state(&self) -> &ResolverState {
        &self.default_state
    }

    /// Initialize `state` from the real resolver, then apply overrides.
    ///
    /// An override replaces the whole nameserver list. If it fails the
    /// baseline list is kept, but `state` stays uninitialized.
    ///
    /// # Errors
    ///
    /// Propagates baseline failures, [`ResolvError::InvalidAddress`] for a
    /// bad nameserver override and [`ResolvError::File`] for an unreadable
    /// override file.
    pub fn init(&mut self, state: &mut ResolverState) -> Result<()> {
        state.initialized = false;
        self.real.init(state)?;

        if let Some(addr) = &self.overrides.nameserver {
            let ip: Ipv4Addr = addr
                .parse()
                .map_err(|_| ResolvError::InvalidAddress(addr.clone()))?;
            let mut fresh = state.empty_like();
            fresh.push_ipv4(ip);
            state.replace_nameservers(fresh);
            debug!(nameserver = %ip, "Using override nameserver");
        } else if let Some(path) = &self.overrides.config_path {
            let mut fresh = state.empty_like();
            config::parse(path, &mut fresh)?;
            state.replace_nameservers(fresh);
            debug!(
                path = %path.display(),
                nameservers = state.nameserver_count(),
                "Using override nameserver list"
            );
        }

        state.initialized = true;
        Ok(())
    }

    /// Release `state`. Calling this twice is harmless.
    pub fn close(&mut self, state: &mut ResolverState) {
        state.release_extension();
        self.real.close(state);
        state.initialized = false;
    }

    /// Send one question and return the raw reply.
    ///
    /// # Errors
    ///
    /// [`ResolvError::NotInitialized`] before a successful [`init`](Self::init);
    /// otherwise whatever the transport reports.
    pub fn query(&mut self, state: &ResolverState, name: &str, class: u16, qtype: u16) -> Result<Vec<u8>> {
        self.dispatch(state, name, class, qtype, false)
    }

    /// Initialize `state` if needed, then query with the resolver's
    /// search rules.
    ///
    /// # Errors
    ///
    /// As for [`init`](Self::init) and [`query`](Self::query).
    pub fn search(&mut self, state: &mut ResolverState, name: &str, class: u16, qtype: u16) -> Result<Vec<u8>> {
        if !state.initialized {
            self.init(state)?;
        }
        self.dispatch(state, name, class, qtype, true)
    }

    /// Handle-less init on the dispatcher's own state.
    ///
    /// # Errors
    ///
    /// As for [`init`](Self::init).
    pub fn init_default(&mut self) -> Result<()> {
        let mut state = std::mem::take(&mut self.default_state);
        let result = self.init(&mut state);
        self.default_state = state;
        result
    }

    /// Handle-less query; initializes the dispatcher's state on first use.
    ///
    /// # Errors
    ///
    /// As for [`init`](Self::init) and [`query`](Self::query).
    pub fn query_default(&mut self, name: &str, class: u16, qtype: u16) -> Result<Vec<u8>> {
        if !self.default_state.initialized {
            self.init_default()?;
        }
        let state = std::mem::take(&mut self.default_state);
        let result = self.dispatch(&state, name, class, qtype, false);
        self.default_state = state;
        result
    }

    /// Handle-less search.
    ///
    /// # Errors
    ///
    /// As for [`search`](Self::search).
    pub fn search_default(&mut self, name: &str, class: u16, qtype: u16) -> Result<Vec<u8>> {
        let mut state = std::mem::take(&mut self.default_state);
        let result = self.search(&mut state, name, class, qtype);
        self.default_state = state;
        result
    }

    pub fn close_default(&mut self) {
        let mut state = std::mem::take(&mut self.default_state);
        self.close(&mut state);
        self.default_state = state;
    }

    fn dispatch(&mut self, state: &ResolverState, name: &str, class: u16, qtype: u16, search: bool) -> Result<Vec<u8>> {
        if !state.initialized {
            return Err(ResolvError::NotInitialized);
        }
        trace!(name, class, qtype, search, "Query");

        let reply = match &self.table {
            Some(table) => {
                self.next_id = self.next_id.wrapping_add(1);
                let question = DnsQuestion {
                    name: name.to_string(),
                    qtype,
                    qclass: class,
                };
                let query = build_query(self.next_id, &question)?;
                answer_query(table, &query)?
            }
            None if search => self.real.search(state, name, class, qtype)?,
            None => self.real.query(state, name, class, qtype)?,
        };

        trace!(name, len = reply.len(), "Response");
        if tracing::enabled!(Level::TRACE) {
            trace_reply(&reply);
        }
        Ok(reply)
    }
}

/// Decode a reply for the trace log. Failures are logged, never returned.
fn trace_reply(reply: &[u8]) {
    let message = match DnsMessage::from_bytes(reply) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "Could not decode reply");
            return;
        }
    };

    trace!(
        id = message.header.id,
        rcode = message.rcode(),
        answers = message.answers.len(),
        "Reply header"
    );
    for answer in &message.answers {
        match &answer.rdata {
            RData::A(ip) => trace!(name = %answer.name, %ip, "A"),
            RData::Aaaa(ip) => trace!(name = %answer.name, %ip, "AAAA"),
            RData::Cname(target) => trace!(name = %answer.name, %target, "CNAME"),
            rdata => trace!(name = %answer.name, rtype = answer.rtype, ?rdata, "Record"),
        }
    }
}
