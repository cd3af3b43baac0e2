use bytes::BufMut;

use crate::error::CodecError;

/// Size of the fixed DNS header.
pub const HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DnsFlags {
    pub qr: bool,              // Query/Response (false = query, true = response)
    pub opcode: u8,            // Operation code (0 = standard query)
    pub aa: bool,              // Authoritative Answer
    pub tc: bool,              // Truncation
    pub rd: bool,              // Recursion Desired
    pub ra: bool,              // Recursion Available
    pub z: u8,                 // Reserved (must be 0)
    pub rcode: u8,             // Response code (0 = no error, 1 = format error, etc.)
}

impl DnsFlags {
    /// Flags of an outgoing standard query with recursion desired.
    pub fn query() -> Self {
        DnsFlags {
            rd: true,
            ..Default::default()
        }
    }

    /// Flags of a fake reply: QR, RD and RA set, no error.
    pub fn reply() -> Self {
        DnsFlags {
            qr: true,
            rd: true,
            ra: true,
            ..Default::default()
        }
    }

    pub fn to_u16(&self) -> u16 {
        let mut flags: u16 = 0;

        if self.qr { flags |= 1 << 15; }           // QR at bit 15
        flags |= (self.opcode as u16 & 0xF) << 11; // OPCODE at bits 11-14
        if self.aa { flags |= 1 << 10; }           // AA at bit 10
        if self.tc { flags |= 1 << 9; }            // TC at bit 9
        if self.rd { flags |= 1 << 8; }            // RD at bit 8
        if self.ra { flags |= 1 << 7; }            // RA at bit 7
        flags |= (self.z as u16 & 0x7) << 4;       // Z at bits 4-6 (reserved)
        flags |= self.rcode as u16 & 0xF;          // RCODE at bits 0-3

        flags
    }

    pub fn from_u16(flags: u16) -> Self {
        DnsFlags {
            qr: (flags & (1 << 15)) != 0,
            opcode: ((flags >> 11) & 0xF) as u8,
            aa: (flags & (1 << 10)) != 0,
            tc: (flags & (1 << 9)) != 0,
            rd: (flags & (1 << 8)) != 0,
            ra: (flags & (1 << 7)) != 0,
            z: ((flags >> 4) & 0x7) as u8,
            rcode: (flags & 0xF) as u8,
        }
    }
}

impl DnsHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CodecError::TooShort(bytes.len()));
        }

        let word = |i: usize| u16::from_be_bytes([bytes[i], bytes[i + 1]]);

        Ok(DnsHeader {
            id: word(0),
            flags: word(2),
            question_count: word(4),
            answer_count: word(6),
            authority_count: word(8),
            additional_count: word(10),
        })
    }

    pub fn flags(&self) -> DnsFlags {
        DnsFlags::from_u16(self.flags)
    }

    /// Append the 12 header bytes to `buf`.
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16(self.id);
        buf.put_u16(self.flags);
        buf.put_u16(self.question_count);
        buf.put_u16(self.answer_count);
        buf.put_u16(self.authority_count);
        buf.put_u16(self.additional_count);
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        self.write_to(&mut &mut bytes[..]);
        bytes
    }
}
