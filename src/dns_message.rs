use crate::dns_header::{DnsFlags, DnsHeader, HEADER_SIZE};
use crate::dns_question_and_answer::{DnsAnswer, DnsQuestion, MessageWriter, RecordClass};
use crate::error::CodecError;

/// A single-question standard query as accepted by the fake server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    pub id: u16,
    pub question: DnsQuestion,
    /// QNAME exactly as it arrived on the wire.
    pub raw_name: Vec<u8>,
}

/// A fully decoded message: header, questions and answer records.
/// Authority and additional sections are not decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsMessage {
    pub header: DnsHeader,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsAnswer>,
}

/// Parse the DNS request from the buffer
/// Only standard queries with a single Internet-class question are accepted
pub fn parse_query(buf: &[u8]) -> Result<DnsQuery, CodecError> {
    let header = DnsHeader::from_bytes(buf)?;
    let flags = header.flags();

    if flags.opcode != 0 {
        return Err(CodecError::UnsupportedOpcode(flags.opcode));
    }

    if header.question_count != 1 {
        return Err(CodecError::QuestionCount(header.question_count));
    }

    // No room for class and type
    if buf.len() < HEADER_SIZE + 4 {
        return Err(CodecError::TooShort(buf.len()));
    }

    let (question, end) = DnsQuestion::from_bytes(buf, HEADER_SIZE)?;

    if question.qclass != RecordClass::IN.to_u16() {
        return Err(CodecError::UnsupportedClass(question.qclass));
    }

    Ok(DnsQuery {
        id: header.id,
        question,
        raw_name: buf[HEADER_SIZE..end - 4].to_vec(),
    })
}

/// Build a DNS query with a single question
pub fn build_query(id: u16, question: &DnsQuestion) -> Result<Vec<u8>, CodecError> {
    let header = DnsHeader {
        id,
        flags: DnsFlags::query().to_u16(),
        question_count: 1, // Single question
        ..Default::default()
    };

    let mut w = MessageWriter::new();
    w.put_header(&header);
    question.write_to(&mut w)?;

    Ok(w.finish())
}

/// Create response header for a parsed query
pub fn create_response_header(query: &DnsQuery, answer_count: u16) -> DnsHeader {
    DnsHeader {
        id: query.id,                          // Echo request ID
        flags: DnsFlags::reply().to_u16(),     // QR, RD, RA; no error
        question_count: 1,                     // Echo the single question
        answer_count,                          // Number of answers we're providing
        authority_count: 0,
        additional_count: 0,
    }
}

/// Build the complete DNS response message
/// The question section is copied byte for byte from the query
pub fn build_reply(query: &DnsQuery, answers: &[DnsAnswer]) -> Result<Vec<u8>, CodecError> {
    let header = create_response_header(query, answers.len() as u16);

    let mut w = MessageWriter::new();
    w.put_header(&header);
    w.put_encoded_name(&query.raw_name, &query.question.name);
    w.put_u16(query.question.qtype);
    w.put_u16(query.question.qclass);
    for answer in answers {
        answer.write_to(&mut w)?;
    }

    Ok(w.finish())
}

impl DnsMessage {
    /// Parse a response (or any message) from the buffer
    pub fn from_bytes(buf: &[u8]) -> Result<Self, CodecError> {
        let header = DnsHeader::from_bytes(buf)?;
        let mut offset = HEADER_SIZE; // Start after header

        let mut questions = Vec::new();
        for _ in 0..header.question_count {
            let (question, new_offset) = DnsQuestion::from_bytes(buf, offset)?;
            questions.push(question);
            offset = new_offset;
        }

        let mut answers = Vec::new();
        for _ in 0..header.answer_count {
            let (answer, new_offset) = DnsAnswer::from_bytes(buf, offset)?;
            answers.push(answer);
            offset = new_offset;
        }

        Ok(DnsMessage {
            header,
            questions,
            answers,
        })
    }

    pub fn rcode(&self) -> u8 {
        self.header.flags().rcode
    }
}
