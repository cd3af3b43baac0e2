use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use tracing::{debug, info, trace, warn};

use crate::dns_message::{build_reply, parse_query};
use crate::error::CodecError;
use crate::local::RecordTable;

/// Largest datagram read from a client.
pub const BUFSIZE: usize = 1024;

/// Parse a query, resolve it against `table` and build the reply bytes.
pub fn answer_query(table: &RecordTable, buf: &[u8]) -> Result<Vec<u8>, CodecError> {
    let query = parse_query(buf)?;
    let answers = table.resolve(&query.question.name, query.question.qtype);

    debug!(
        name = %query.question.name,
        qtype = query.question.qtype,
        answers = answers.len(),
        "Resolved query"
    );

    build_reply(&query, &answers)
}

/// Fake DNS server answering from a static record table
pub struct DnsServer {
    socket: UdpSocket,
    table: RecordTable,
}

impl DnsServer {
    /// Create a new DNS server bound to the given address
    pub fn bind(bind_addr: impl ToSocketAddrs, table: RecordTable) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr)?;
        info!(addr = %socket.local_addr()?, records = table.len(), "Fake DNS server listening");

        Ok(Self { socket, table })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Run the DNS server main loop
    /// Malformed or unanswerable queries are dropped without a reply
    pub fn run(&self) -> ! {
        loop {
            if let Err(e) = self.serve_one() {
                warn!(error = %e, "Error serving datagram");
            }
        }
    }

    /// Receive one datagram and reply to it if it is a valid query.
    /// Returns `true` when a reply was sent.
    pub fn serve_one(&self) -> io::Result<bool> {
        let mut buf = [0u8; BUFSIZE];
        let (size, source) = self.socket.recv_from(&mut buf)?;
        trace!(size, %source, "Received datagram");

        let reply = match self.handle_request(&buf[..size]) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(%source, error = %e, "Dropping query");
                return Ok(false);
            }
        };

        self.socket.send_to(&reply, source)?;
        trace!(size = reply.len(), %source, "Sent reply");
        Ok(true)
    }

    /// Handle a DNS request: parse, resolve, and build response
    pub fn handle_request(&self, buf: &[u8]) -> Result<Vec<u8>, CodecError> {
        answer_query(&self.table, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns_header::HEADER_SIZE;
    use crate::dns_message::{build_query, DnsMessage};
    use crate::dns_question_and_answer::{DnsQuestion, RData, RecordType};
    use std::net::Ipv4Addr;

    fn table() -> RecordTable {
        let mut table = RecordTable::new();
        table.insert("cwrap.org", RData::A(Ipv4Addr::new(127, 0, 0, 21)));
        table
    }

    #[test]
    fn answer_query_found() {
        let query = build_query(7, &DnsQuestion::new("cwrap.org", RecordType::A)).unwrap();
        let reply = DnsMessage::from_bytes(&answer_query(&table(), &query).unwrap()).unwrap();

        assert_eq!(reply.header.id, 7);
        assert_eq!(reply.header.answer_count, 1);
        assert_eq!(reply.answers[0].rdata, RData::A(Ipv4Addr::new(127, 0, 0, 21)));
    }

    #[test]
    fn answer_query_not_found_is_success() {
        let query = build_query(8, &DnsQuestion::new("nosuchentry.org", RecordType::A)).unwrap();
        let reply = DnsMessage::from_bytes(&answer_query(&table(), &query).unwrap()).unwrap();

        assert_eq!(reply.rcode(), 0);
        assert!(reply.answers.is_empty());
    }

    fn raw_query(id: u16, qname: &[u8]) -> Vec<u8> {
        let mut bytes = build_query(id, &DnsQuestion::new("x.org", RecordType::A)).unwrap();
        bytes.truncate(HEADER_SIZE);
        bytes.extend_from_slice(qname);
        bytes.extend_from_slice(&[0, 1, 0, 1]);
        bytes
    }

    #[test]
    fn answer_query_echoes_dotted_label() {
        let query = raw_query(10, &[3, b'a', b'.', b'b', 3, b'o', b'r', b'g', 0]);
        let reply = answer_query(&table(), &query).unwrap();
        assert_eq!(&reply[HEADER_SIZE..query.len()], &query[HEADER_SIZE..]);
    }

    #[test]
    fn answer_query_accepts_non_utf8_name() {
        let query = raw_query(11, &[4, b'c', b'a', b'f', 0xE9, 3, b'o', b'r', b'g', 0]);
        let reply = answer_query(&table(), &query).unwrap();

        assert_eq!(&reply[HEADER_SIZE..], &query[HEADER_SIZE..]);
        assert_eq!(DnsMessage::from_bytes(&reply).unwrap().rcode(), 0);
    }

    #[test]
    fn answer_query_rejects_garbage() {
        assert!(answer_query(&table(), b"junk").is_err());
    }

    #[test]
    fn serve_one_over_udp() {
        let server = DnsServer::bind("127.0.0.1:0", table()).unwrap();
        let addr = server.local_addr().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        let query = build_query(9, &DnsQuestion::new("cwrap.org", RecordType::A)).unwrap();
        client.send_to(&query, addr).unwrap();

        assert!(server.serve_one().unwrap());

        let mut buf = [0u8; BUFSIZE];
        let (n, _) = client.recv_from(&mut buf).unwrap();
        let reply = DnsMessage::from_bytes(&buf[..n]).unwrap();
        assert_eq!(reply.header.id, 9);
        assert_eq!(reply.answers.len(), 1);
    }

    #[test]
    fn serve_one_drops_malformed() {
        let server = DnsServer::bind("127.0.0.1:0", table()).unwrap();
        let addr = server.local_addr().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(&[0u8; 4], addr).unwrap();

        assert!(!server.serve_one().unwrap());
    }
}
