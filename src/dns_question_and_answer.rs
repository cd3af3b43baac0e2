use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};

use crate::dns_header::DnsHeader;
use crate::error::CodecError;

/// Longest label allowed on the wire.
pub const MAX_LABEL_LEN: usize = 63;
/// Longest encoded name allowed on the wire, length bytes included.
pub const MAX_NAME_LEN: usize = 255;
/// Compression pointers followed before a name is rejected.
const MAX_POINTER_JUMPS: usize = 16;

/// DNS Question Section
/// Format: QNAME + QTYPE (2 bytes) + QCLASS (2 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String, // Domain name (e.g., "example.com")
    pub qtype: u16,   // Query type (A, AAAA, CNAME, etc.)
    pub qclass: u16,  // Query class (usually IN for Internet)
}

/// Typed resource data for the record types the fake server can serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Cname(String),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    Soa {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    /// Raw bytes of any other type, kept as received.
    Other(Vec<u8>),
}

/// DNS Answer/Resource Record Section
/// Format: NAME + TYPE (2 bytes) + CLASS (2 bytes) + TTL (4 bytes) + RDLENGTH (2 bytes) + RDATA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsAnswer {
    pub name: String, // Domain name
    pub rtype: u16,   // Record type (A, AAAA, CNAME, etc.)
    pub rclass: u16,  // Record class (usually IN for Internet)
    pub ttl: u32,     // Time to live in seconds
    pub rdata: RData, // Resource data
}

/// Common DNS record types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A = 1,     // IPv4 address
    NS = 2,    // Name server
    CNAME = 5, // Canonical name
    SOA = 6,   // Start of authority
    PTR = 12,  // Pointer record
    MX = 15,   // Mail exchange
    TXT = 16,  // Text record
    AAAA = 28, // IPv6 address
    SRV = 33,  // Service locator
    OPT = 41,  // EDNS0 option
}

impl RecordType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(RecordType::A),
            2 => Some(RecordType::NS),
            5 => Some(RecordType::CNAME),
            6 => Some(RecordType::SOA),
            12 => Some(RecordType::PTR),
            15 => Some(RecordType::MX),
            16 => Some(RecordType::TXT),
            28 => Some(RecordType::AAAA),
            33 => Some(RecordType::SRV),
            41 => Some(RecordType::OPT),
            _ => None,
        }
    }

    /// Parse a record type mnemonic such as `"AAAA"`, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let t = match name.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "NS" => RecordType::NS,
            "CNAME" => RecordType::CNAME,
            "SOA" => RecordType::SOA,
            "PTR" => RecordType::PTR,
            "MX" => RecordType::MX,
            "TXT" => RecordType::TXT,
            "AAAA" => RecordType::AAAA,
            "SRV" => RecordType::SRV,
            _ => return None,
        };
        Some(t)
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Common DNS classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    IN = 1, // Internet
    CS = 2, // CSNET (obsolete)
    CH = 3, // CHAOS
    HS = 4, // Hesiod
}

impl RecordClass {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(RecordClass::IN),
            2 => Some(RecordClass::CS),
            3 => Some(RecordClass::CH),
            4 => Some(RecordClass::HS),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

impl DnsQuestion {
    pub fn new(name: impl Into<String>, qtype: RecordType) -> Self {
        DnsQuestion {
            name: name.into(),
            qtype: qtype.to_u16(),
            qclass: RecordClass::IN.to_u16(),
        }
    }

    /// Parse a DNS question from bytes starting at the given offset
    /// Returns the question and the new offset after parsing
    pub fn from_bytes(bytes: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        let (name, new_offset) = parse_domain_name(bytes, offset)?;

        if new_offset + 4 > bytes.len() {
            return Err(CodecError::Truncated(new_offset));
        }

        let qtype = u16::from_be_bytes([bytes[new_offset], bytes[new_offset + 1]]);
        let qclass = u16::from_be_bytes([bytes[new_offset + 2], bytes[new_offset + 3]]);

        Ok((
            DnsQuestion {
                name,
                qtype,
                qclass,
            },
            new_offset + 4,
        ))
    }

    pub fn write_to(&self, w: &mut MessageWriter) -> Result<(), CodecError> {
        w.put_name(&self.name)?;
        w.put_u16(self.qtype);
        w.put_u16(self.qclass);
        Ok(())
    }
}

impl RData {
    /// Wire type code of this rdata.
    pub fn record_type(&self) -> Option<RecordType> {
        match self {
            RData::A(_) => Some(RecordType::A),
            RData::Aaaa(_) => Some(RecordType::AAAA),
            RData::Cname(_) => Some(RecordType::CNAME),
            RData::Srv { .. } => Some(RecordType::SRV),
            RData::Soa { .. } => Some(RecordType::SOA),
            RData::Other(_) => None,
        }
    }

    /// Decode `rdlength` bytes of type `rtype` found at `offset` in `message`.
    /// Names inside the rdata may point anywhere in the message.
    fn parse(message: &[u8], rtype: u16, offset: usize, rdlength: usize) -> Result<Self, CodecError> {
        let end = offset + rdlength;
        let data = &message[offset..end];

        let rdata = match RecordType::from_u16(rtype) {
            Some(RecordType::A) => {
                let octets: [u8; 4] = data.try_into().map_err(|_| CodecError::Truncated(offset))?;
                RData::A(Ipv4Addr::from(octets))
            }
            Some(RecordType::AAAA) => {
                let octets: [u8; 16] = data.try_into().map_err(|_| CodecError::Truncated(offset))?;
                RData::Aaaa(Ipv6Addr::from(octets))
            }
            Some(RecordType::CNAME) => RData::Cname(parse_domain_name(message, offset)?.0),
            Some(RecordType::SRV) => {
                let f = fixed_field(message, offset, 6, end)?;
                RData::Srv {
                    priority: u16::from_be_bytes([f[0], f[1]]),
                    weight: u16::from_be_bytes([f[2], f[3]]),
                    port: u16::from_be_bytes([f[4], f[5]]),
                    target: parse_domain_name(message, offset + 6)?.0,
                }
            }
            Some(RecordType::SOA) => {
                let (mname, next) = parse_domain_name(message, offset)?;
                let (rname, next) = parse_domain_name(message, next)?;
                let f = fixed_field(message, next, 20, end)?;
                let word = |i: usize| u32::from_be_bytes([f[i], f[i + 1], f[i + 2], f[i + 3]]);
                RData::Soa {
                    mname,
                    rname,
                    serial: word(0),
                    refresh: word(4),
                    retry: word(8),
                    expire: word(12),
                    minimum: word(16),
                }
            }
            _ => RData::Other(data.to_vec()),
        };

        Ok(rdata)
    }

    fn write_to(&self, w: &mut MessageWriter) -> Result<(), CodecError> {
        match self {
            RData::A(ip) => w.put_slice(&ip.octets()),
            RData::Aaaa(ip) => w.put_slice(&ip.octets()),
            RData::Cname(name) => w.put_name(name)?,
            RData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                w.put_u16(*priority);
                w.put_u16(*weight);
                w.put_u16(*port);
                w.put_name(target)?;
            }
            RData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                w.put_name(mname)?;
                w.put_name(rname)?;
                for value in [serial, refresh, retry, expire, minimum] {
                    w.put_u32(*value);
                }
            }
            RData::Other(data) => w.put_slice(data),
        }
        Ok(())
    }
}

impl DnsAnswer {
    /// Create an Internet-class answer whose type follows from `rdata`.
    pub fn new(name: impl Into<String>, ttl: u32, rdata: RData) -> Self {
        let rtype = rdata.record_type().map_or(0, RecordType::to_u16);
        DnsAnswer {
            name: name.into(),
            rtype,
            rclass: RecordClass::IN.to_u16(),
            ttl,
            rdata,
        }
    }

    /// Create an A record (IPv4 address) answer
    pub fn new_a_record(name: impl Into<String>, ttl: u32, ip: [u8; 4]) -> Self {
        Self::new(name, ttl, RData::A(Ipv4Addr::from(ip)))
    }

    /// Parse a DNS answer/resource record from bytes starting at the given offset
    /// Returns the answer and the new offset after parsing
    pub fn from_bytes(bytes: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        let (name, new_offset) = parse_domain_name(bytes, offset)?;

        if new_offset + 10 > bytes.len() {
            return Err(CodecError::Truncated(new_offset));
        }

        let rtype = u16::from_be_bytes([bytes[new_offset], bytes[new_offset + 1]]);
        let rclass = u16::from_be_bytes([bytes[new_offset + 2], bytes[new_offset + 3]]);
        let ttl = u32::from_be_bytes([
            bytes[new_offset + 4],
            bytes[new_offset + 5],
            bytes[new_offset + 6],
            bytes[new_offset + 7],
        ]);
        let rdlength = u16::from_be_bytes([bytes[new_offset + 8], bytes[new_offset + 9]]) as usize;

        let data_offset = new_offset + 10;
        if data_offset + rdlength > bytes.len() {
            return Err(CodecError::Truncated(data_offset));
        }

        let rdata = RData::parse(bytes, rtype, data_offset, rdlength)?;

        Ok((
            DnsAnswer {
                name,
                rtype,
                rclass,
                ttl,
                rdata,
            },
            data_offset + rdlength,
        ))
    }

    /// Append the record; RDLENGTH is filled in after the rdata is written
    /// since compressed names make its size unknown up front.
    pub fn write_to(&self, w: &mut MessageWriter) -> Result<(), CodecError> {
        w.put_name(&self.name)?;
        w.put_u16(self.rtype);
        w.put_u16(self.rclass);
        w.put_u32(self.ttl);

        let length_at = w.len();
        w.put_u16(0);
        self.rdata.write_to(w)?;
        let rdlength = w.len() - length_at - 2;
        w.patch_u16(length_at, rdlength as u16);

        Ok(())
    }
}

/// Builds a DNS message, compressing names against the ones already written.
#[derive(Debug)]
pub struct MessageWriter {
    buf: BytesMut,
    names: HashMap<String, u16>,
    compress: bool,
}

impl MessageWriter {
    pub fn new() -> Self {
        MessageWriter {
            buf: BytesMut::with_capacity(512),
            names: HashMap::new(),
            compress: true,
        }
    }

    /// A writer that always spells names out in full.
    pub fn uncompressed() -> Self {
        MessageWriter {
            compress: false,
            ..Self::new()
        }
    }

    pub fn put_header(&mut self, header: &DnsHeader) {
        header.write_to(&mut self.buf);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn put_slice(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Write `name`, replacing the longest suffix seen before with a pointer.
    pub fn put_name(&mut self, name: &str) -> Result<(), CodecError> {
        let labels = split_labels(name)?;

        for i in 0..labels.len() {
            if !self.compress {
                break;
            }
            let suffix = labels[i..].join(".").to_ascii_lowercase();
            if let Some(&pointer) = self.names.get(&suffix) {
                for label in &labels[..i] {
                    self.put_label(label);
                }
                self.buf.put_u16(0xC000 | pointer);
                return Ok(());
            }
        }

        for (i, label) in labels.iter().enumerate() {
            let here = self.buf.len();
            if self.compress && here <= 0x3FFF {
                self.names
                    .entry(labels[i..].join(".").to_ascii_lowercase())
                    .or_insert(here as u16);
            }
            self.put_label(label);
        }
        self.buf.put_u8(0);

        Ok(())
    }

    /// Copy an already encoded name as is. `name` is its decoded form and
    /// becomes a compression target at the copied offset. Suffixes are
    /// only registered when re-encoding `name` gives back `encoded`.
    pub fn put_encoded_name(&mut self, encoded: &[u8], name: &str) {
        let start = self.buf.len();
        self.buf.put_slice(encoded);

        if !self.compress || start > 0x3FFF {
            return;
        }
        let Ok(labels) = split_labels(name) else {
            return;
        };
        if labels.is_empty() {
            return;
        }

        let mut canonical = Vec::with_capacity(encoded.len());
        for label in &labels {
            canonical.push(label.len() as u8);
            canonical.extend_from_slice(label.as_bytes());
        }
        canonical.push(0);

        if canonical != encoded {
            self.names.entry(name.to_ascii_lowercase()).or_insert(start as u16);
            return;
        }

        let mut here = start;
        for i in 0..labels.len() {
            if here > 0x3FFF {
                break;
            }
            self.names
                .entry(labels[i..].join(".").to_ascii_lowercase())
                .or_insert(here as u16);
            here += labels[i].len() + 1;
        }
    }

    fn put_label(&mut self, label: &str) {
        self.buf.put_u8(label.len() as u8);
        self.buf.put_slice(label.as_bytes());
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn patch_u16(&mut self, at: usize, value: u16) {
        self.buf[at..at + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

impl Default for MessageWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// `n` bytes at `at`, all of them inside the rdata ending at `end`.
fn fixed_field(message: &[u8], at: usize, n: usize, end: usize) -> Result<&[u8], CodecError> {
    if at + n > end {
        return Err(CodecError::Truncated(at));
    }
    message.get(at..at + n).ok_or(CodecError::Truncated(at))
}

/// Split a dotted name into labels, dropping the empty root label.
fn split_labels(name: &str) -> Result<Vec<&str>, CodecError> {
    let labels: Vec<&str> = name.split('.').filter(|l| !l.is_empty()).collect();

    let mut encoded_len = 1;
    for label in &labels {
        if label.len() > MAX_LABEL_LEN {
            return Err(CodecError::NameTooLong(name.to_string()));
        }
        encoded_len += label.len() + 1;
    }
    if encoded_len > MAX_NAME_LEN {
        return Err(CodecError::NameTooLong(name.to_string()));
    }

    Ok(labels)
}

/// Parse a domain name from DNS message format
/// Supports DNS name compression (pointers)
/// Returns the parsed domain name and the new offset
pub fn parse_domain_name(bytes: &[u8], mut offset: usize) -> Result<(String, usize), CodecError> {
    let mut labels = Vec::new();
    let mut jumped = false;
    let mut jump_offset = offset;
    let mut jumps = 0;
    let mut encoded_len = 1;

    loop {
        if offset >= bytes.len() {
            return Err(CodecError::Truncated(offset));
        }

        let length = bytes[offset];

        // Check if this is a pointer (compression)
        if (length & 0xC0) == 0xC0 {
            if offset + 1 >= bytes.len() {
                return Err(CodecError::Truncated(offset));
            }

            // Pointer: the next 14 bits indicate the offset
            let pointer = u16::from_be_bytes([bytes[offset] & 0x3F, bytes[offset + 1]]);

            if !jumped {
                jump_offset = offset + 2;
            }

            offset = pointer as usize;
            jumped = true;
            jumps += 1;

            if jumps > MAX_POINTER_JUMPS {
                return Err(CodecError::TooManyPointers);
            }
            continue;
        }

        // Move past the length byte
        offset += 1;

        // Check for end of name
        if length == 0 {
            break;
        }

        // Read the label
        let length = length as usize;
        if offset + length > bytes.len() {
            return Err(CodecError::Truncated(offset));
        }

        encoded_len += length + 1;
        if encoded_len > MAX_NAME_LEN {
            return Err(CodecError::NameTooLong(labels.join(".")));
        }

        // Bytes outside UTF-8 survive only in the raw question section
        let label = String::from_utf8_lossy(&bytes[offset..offset + length]);

        labels.push(label.into_owned());
        offset += length;
    }

    let final_offset = if jumped { jump_offset } else { offset };
    let domain_name = if labels.is_empty() {
        ".".to_string() // Root domain
    } else {
        labels.join(".")
    };

    Ok((domain_name, final_offset))
}

/// Encode a domain name to DNS message format
/// Format: length-prefixed labels terminated with a null byte
/// Example: "example.com" -> [7]example[3]com[0]
pub fn encode_domain_name(name: &str) -> Result<Vec<u8>, CodecError> {
    let mut w = MessageWriter::uncompressed();
    w.put_name(name)?;
    Ok(w.finish())
}
