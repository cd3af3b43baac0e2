use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{ResolvError, Result};
use crate::resolver_state::ResolverState;

/// How long to wait for each nameserver before trying the next one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest reply accepted from a nameserver.
const MAX_REPLY: usize = 4096;

/// Send a built query to the state's nameservers in priority order
/// Returns the first reply whose ID matches the query
pub fn send_query(state: &ResolverState, query: &[u8], timeout: Duration) -> Result<Vec<u8>> {
    if query.len() < 2 {
        return Err(ResolvError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "query too short to carry an ID",
        )));
    }
    let id = [query[0], query[1]];

    let mut last_error = None;
    for nameserver in state.nameservers() {
        match exchange(nameserver, query, id, timeout) {
            Ok(reply) => return Ok(reply),
            Err(e) => {
                debug!(%nameserver, error = %e, "Nameserver did not answer");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(ResolvError::Io(e)),
        None => Err(ResolvError::NoNameservers),
    }
}

/// One query/reply exchange with a single nameserver
fn exchange(nameserver: SocketAddr, query: &[u8], id: [u8; 2], timeout: Duration) -> io::Result<Vec<u8>> {
    // Create a socket of the nameserver's family
    let local: SocketAddr = match nameserver {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local)?;
    socket.set_read_timeout(Some(timeout))?;
    socket.connect(nameserver)?;

    socket.send(query)?;
    trace!(%nameserver, size = query.len(), "Sent query");

    let mut buf = vec![0u8; MAX_REPLY];
    loop {
        let size = socket.recv(&mut buf)?;
        if size >= 2 && buf[..2] == id {
            buf.truncate(size);
            return Ok(buf);
        }
        trace!(%nameserver, size, "Ignoring reply with foreign ID");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn state_for(addr: SocketAddr) -> ResolverState {
        let mut state = ResolverState::new();
        state.push(addr);
        state
    }

    #[test]
    fn empty_state_has_no_nameservers() {
        let err = send_query(&ResolverState::new(), &[0, 1, 0, 0], DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, ResolvError::NoNameservers));
    }

    #[test]
    fn reply_with_matching_id_returned() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (n, peer) = server.recv_from(&mut buf).unwrap();
            // A stale reply first, then the real one.
            server.send_to(&[0xFF, 0xFF, 1], peer).unwrap();
            server.send_to(&buf[..n], peer).unwrap();
        });

        let reply = send_query(&state_for(addr), &[0xAB, 0xCD, 9, 9], DEFAULT_TIMEOUT).unwrap();
        assert_eq!(reply, vec![0xAB, 0xCD, 9, 9]);
        handle.join().unwrap();
    }

    #[test]
    fn silent_nameserver_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();

        let err = send_query(&state_for(addr), &[1, 2, 3], Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, ResolvError::Io(_)));
        drop(server);
    }
}
