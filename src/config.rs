//! Override configuration and the nameserver-list loader.
//!
//! Overrides come from the environment (see [`Overrides::from_env`]); the
//! loader reads `resolv.conf`-style files:
//!
//! ```text
//! # comment
//! ; also a comment
//! nameserver 127.0.0.1
//! nameserver 2607:f8b0:4009:802::1011
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::error::{ResolvError, Result};
use crate::resolver_state::{ResolverState, NAMESERVER_PORT};

/// Single IPv4 nameserver replacing the whole list.
pub const ENV_NAMESERVER: &str = "RESOLV_WRAPPER_NAMESERVER";
/// Path of an alternate nameserver-list file.
pub const ENV_CONF: &str = "RESOLV_WRAPPER_CONF";
/// Path of a fake hosts file answered in-process.
pub const ENV_HOSTS: &str = "RESOLV_WRAPPER_HOSTS";
/// Log verbosity: 0 error, 1 warn, 2 debug, 3 trace.
pub const ENV_DEBUGLEVEL: &str = "RESOLV_WRAPPER_DEBUGLEVEL";

/// Test-controlled configuration replacing the host's DNS setup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// IPv4 literal of a single nameserver.
    pub nameserver: Option<String>,
    /// Alternate nameserver-list file. Ignored when `nameserver` is set.
    pub config_path: Option<PathBuf>,
    /// Fake hosts file. When set, queries never leave the process.
    pub hosts_path: Option<PathBuf>,
    pub debug_level: u32,
}

impl Overrides {
    /// Reads the `RESOLV_WRAPPER_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds overrides from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            nameserver: lookup(ENV_NAMESERVER),
            config_path: lookup(ENV_CONF).map(PathBuf::from),
            hosts_path: lookup(ENV_HOSTS).map(PathBuf::from),
            debug_level: lookup(ENV_DEBUGLEVEL).map_or(0, |v| parse_debug_level(&v)),
        }
    }

    #[must_use]
    pub fn with_nameserver(mut self, addr: impl Into<String>) -> Self {
        self.nameserver = Some(addr.into());
        self
    }

    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.hosts_path = Some(path.into());
        self
    }

    /// `true` if any override replaces the baseline nameserver list.
    #[must_use]
    pub const fn replaces_nameservers(&self) -> bool {
        self.nameserver.is_some() || self.config_path.is_some()
    }
}

/// Leading digits as a level, like `atoi`; anything else is 0.
fn parse_debug_level(value: &str) -> u32 {
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Address family of a [`ConfigEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

/// One parsed `nameserver` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigEntry {
    pub family: Family,
    pub address: IpAddr,
    pub port: u16,
}

impl ConfigEntry {
    #[must_use]
    pub fn new(address: IpAddr) -> Self {
        let family = match address {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        };
        Self {
            family,
            address,
            port: NAMESERVER_PORT,
        }
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

/// Outcome of one configuration line.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Nameserver(ConfigEntry),
    BadAddress(&'a str),
    Ignored,
}

fn classify(line: &str) -> Line<'_> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        return Line::Ignored;
    }

    let mut parts = line.split_whitespace();
    if parts.next() != Some("nameserver") {
        return Line::Ignored;
    }

    let Some(addr) = parts.next() else {
        return Line::BadAddress("");
    };
    // IPv4 first, then IPv6.
    match addr.parse::<std::net::Ipv4Addr>() {
        Ok(v4) => Line::Nameserver(ConfigEntry::new(IpAddr::V4(v4))),
        Err(_) => match addr.parse::<std::net::Ipv6Addr>() {
            Ok(v6) => Line::Nameserver(ConfigEntry::new(IpAddr::V6(v6))),
            Err(_) => Line::BadAddress(addr),
        },
    }
}

fn apply_line(line: &str, state: &mut ResolverState) {
    match classify(line) {
        Line::Ignored => {}
        Line::BadAddress(addr) => {
            warn!(address = %addr, "Malformed nameserver address, skipping line");
        }
        Line::Nameserver(entry) => {
            if entry.family == Family::V6 && !state.supports_ipv6() {
                warn!(address = %entry.address, "IPv6 nameservers not supported, skipping");
            } else if state.push(entry.socket_addr()) {
                debug!(nameserver = %entry.socket_addr(), "Added nameserver");
            } else {
                trace!(address = %entry.address, "Nameserver slots full, dropping entry");
            }
        }
    }
}

/// Parses the nameserver-list file at `path`, appending entries to `state`.
///
/// Returns the state's nameserver count afterwards. A file without any
/// `nameserver` line is valid and yields `Ok(0)` on an empty state.
///
/// # Errors
///
/// Returns [`ResolvError::File`] if the file cannot be opened or a read
/// fails partway; entries read before the failure remain in `state`.
pub fn parse(path: impl AsRef<Path>, state: &mut ResolverState) -> Result<usize> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ResolvError::file(path, e))?;

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| ResolvError::file(path, e))?;
        apply_line(&line, state);
    }

    debug!(
        path = %path.display(),
        ipv4 = state.ipv4_count(),
        ipv6 = state.ipv6_count(),
        "Parsed nameserver list"
    );
    Ok(state.nameserver_count())
}

/// Same rules as [`parse`] for content already in memory.
pub fn parse_str(content: &str, state: &mut ResolverState) -> usize {
    for line in content.lines() {
        apply_line(line, state);
    }
    state.nameserver_count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::net::Ipv4Addr;

    fn write_conf(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn comments_and_blank_lines_skipped() {
        let mut state = ResolverState::new();
        let n = parse_str(
            "# Hello world\n; This is resolv_wrapper\n\n  # indented\nnameserver 127.0.0.1\n",
            &mut state,
        );
        assert_eq!(n, 1);
        assert_eq!(
            state.ipv4_nameservers()[0],
            "127.0.0.1:53".parse().unwrap()
        );
    }

    #[test]
    fn tab_separator_accepted() {
        let mut state = ResolverState::new();
        assert_eq!(parse_str("nameserver\t10.0.0.1\n", &mut state), 1);
    }

    #[test]
    fn ipv4_count_capped() {
        let mut state = ResolverState::new();
        let content: String = (1..=5).map(|i| format!("nameserver 10.0.0.{i}\n")).collect();
        assert_eq!(parse_str(&content, &mut state), 3);
        assert_eq!(
            state.ipv4_nameservers().last().unwrap().ip(),
            &Ipv4Addr::new(10, 0, 0, 3)
        );
    }

    #[test]
    fn mixed_families_share_slots() {
        let mut state = ResolverState::new();
        let content = "nameserver 127.0.0.1\n\
                       nameserver 10.10.10.1\n\
                       nameserver 2607:f8b0:4009:802::1011\n\
                       nameserver 10.10.10.2\n\
                       nameserver 10.10.10.3\n\
                       nameserver 2607:f8b0:4009:802::1012\n";
        assert_eq!(parse_str(content, &mut state), 3);
        assert_eq!(state.ipv4_count(), 2);
        assert_eq!(state.ipv6_count(), 1);
        assert_eq!(
            state.ipv6_nameservers()[0].ip().to_string(),
            "2607:f8b0:4009:802::1011"
        );
        assert_eq!(state.ipv6_nameservers()[0].port(), 53);
    }

    #[test]
    fn ipv6_lines_accumulate_up_to_capacity() {
        let mut state = ResolverState::new();
        assert_eq!(
            parse_str("nameserver ::1\nnameserver fe80::1\n", &mut state),
            2
        );
        assert_eq!(state.ipv6_count(), 2);
    }

    #[test]
    fn ipv6_skipped_without_extension() {
        let mut state = ResolverState::without_ipv6();
        assert_eq!(parse_str("nameserver ::1\nnameserver 10.0.0.1\n", &mut state), 1);
        assert_eq!(state.ipv6_count(), 0);
    }

    #[test]
    fn malformed_address_skipped() {
        let mut state = ResolverState::new();
        let content = "nameserver not-an-ip\nnameserver\nnameserver 10.0.0.1\n";
        assert_eq!(parse_str(content, &mut state), 1);
    }

    #[test]
    fn other_directives_ignored() {
        let mut state = ResolverState::new();
        let content = "search cwrap.org\noptions ndots:2\nnameservers 10.0.0.9\n";
        assert_eq!(parse_str(content, &mut state), 0);
    }

    #[test]
    fn parse_file() {
        let file = write_conf("nameserver 127.0.0.1\nnameserver ::1\n");
        let mut state = ResolverState::new();
        assert_eq!(parse(file.path(), &mut state).unwrap(), 2);
    }

    #[test]
    fn parse_empty_file() {
        let file = write_conf("# nothing here\n");
        let mut state = ResolverState::new();
        assert_eq!(parse(file.path(), &mut state).unwrap(), 0);
    }

    #[test]
    fn parse_missing_file() {
        let mut state = ResolverState::new();
        let err = parse("/no/such/file", &mut state).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("/no/such/file"));
    }

    #[test]
    fn overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_NAMESERVER, "127.0.0.10"),
            (ENV_CONF, "/tmp/rwrap.conf"),
            (ENV_DEBUGLEVEL, "3"),
        ]
        .into_iter()
        .collect();
        let overrides = Overrides::from_lookup(|k| vars.get(k).map(|v| (*v).to_string()));

        assert_eq!(overrides.nameserver.as_deref(), Some("127.0.0.10"));
        assert_eq!(overrides.config_path, Some(PathBuf::from("/tmp/rwrap.conf")));
        assert_eq!(overrides.hosts_path, None);
        assert_eq!(overrides.debug_level, 3);
        assert!(overrides.replaces_nameservers());
    }

    #[test]
    fn debug_level_like_atoi() {
        assert_eq!(parse_debug_level("2"), 2);
        assert_eq!(parse_debug_level("3trace"), 3);
        assert_eq!(parse_debug_level("verbose"), 0);
        assert_eq!(parse_debug_level(""), 0);
    }
}
