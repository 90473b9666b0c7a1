//! Wire codec for the register protocol (Modbus/TCP framing).
//!
//! Each transaction is an MBAP header (transaction id, protocol id, length,
//! unit id) followed by a PDU (function code + data). The daemon serves
//! three functions: read holding registers (0x03), write single register
//! (0x06) and write multiple registers (0x10). Anything else answers with
//! an exception PDU. The codec is pure framing; register semantics live in
//! the dispatch layer.

use std::io::{self, Read};

use thiserror::Error;

/// MBAP header length in bytes.
const HEADER_LEN: usize = 7;

/// Protocol identifier carried by every conforming frame.
const PROTOCOL_ID: u16 = 0;

/// Largest PDU a frame may carry.
const MAX_PDU_LEN: usize = 253;

/// Read holding registers.
pub(crate) const FN_READ_HOLDING: u8 = 0x03;
/// Write single register.
pub(crate) const FN_WRITE_SINGLE: u8 = 0x06;
/// Write multiple registers.
pub(crate) const FN_WRITE_MULTIPLE: u8 = 0x10;

/// Largest register count a read request may carry.
const MAX_READ_COUNT: u16 = 125;
/// Largest register count a multiple-write request may carry.
const MAX_WRITE_COUNT: u16 = 123;

/// Exception codes returned in error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    /// The function code is not supported.
    IllegalFunction,
    /// The register range falls outside the block.
    IllegalDataAddress,
    /// The request structure or value is invalid.
    IllegalDataValue,
    /// The request repeats the in-flight operation; no new work started.
    Acknowledge,
    /// A job is already running; retry later.
    DeviceBusy,
}

impl ExceptionCode {
    /// Wire value of the exception code.
    pub(crate) fn as_byte(self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::Acknowledge => 0x05,
            Self::DeviceBusy => 0x06,
        }
    }
}

/// MBAP fields echoed back in the response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Client-chosen transaction identifier.
    pub transaction_id: u16,
    /// Addressed unit; the daemon serves a single unit and echoes it.
    pub unit_id: u8,
}

/// A request the dispatch layer can act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Read `count` registers starting at `address`.
    ReadHolding { address: u16, count: u16 },
    /// Write one register.
    WriteSingle { address: u16, value: u16 },
    /// Write a contiguous run of registers.
    WriteMultiple { address: u16, values: Vec<u16> },
}

impl Request {
    /// Function code of the request, used when framing the response.
    pub(crate) fn function(&self) -> u8 {
        match self {
            Self::ReadHolding { .. } => FN_READ_HOLDING,
            Self::WriteSingle { .. } => FN_WRITE_SINGLE,
            Self::WriteMultiple { .. } => FN_WRITE_MULTIPLE,
        }
    }
}

/// Outcome of parsing a well-framed PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedRequest {
    /// A supported, structurally valid request.
    Valid(Request),
    /// A recognisable transaction that must be answered with an exception.
    Invalid {
        /// Function code to echo (with the error bit set).
        function: u8,
        /// Exception to report.
        exception: ExceptionCode,
    },
}

/// Response payloads the handler can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Register values for a read.
    ReadHolding { values: Vec<u16> },
    /// Echo of a single-register write.
    WriteSingle { address: u16, value: u16 },
    /// Echo of a multiple-register write.
    WriteMultiple { address: u16, count: u16 },
    /// Exception response.
    Exception { code: ExceptionCode },
}

/// Errors that invalidate the connection's framing.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The stream failed or ended mid-frame.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The frame declared an unsupported protocol identifier.
    #[error("unsupported protocol id {0}")]
    Protocol(u16),
    /// The declared frame length cannot carry a PDU.
    #[error("frame length {0} outside supported range")]
    Length(u16),
}

/// Reads one frame, returning `None` on a clean end of stream.
///
/// # Errors
///
/// Returns [`FrameError`] when the stream fails mid-frame or the header is
/// not a conforming frame; the caller should drop the connection.
pub fn read_frame<R: Read>(stream: &mut R) -> Result<Option<(FrameHeader, Vec<u8>)>, FrameError> {
    let mut header = [0_u8; HEADER_LEN];
    if !read_exact_or_eof(stream, &mut header)? {
        return Ok(None);
    }

    let transaction_id = u16::from_be_bytes([header[0], header[1]]);
    let protocol_id = u16::from_be_bytes([header[2], header[3]]);
    let length = u16::from_be_bytes([header[4], header[5]]);
    let unit_id = header[6];

    if protocol_id != PROTOCOL_ID {
        return Err(FrameError::Protocol(protocol_id));
    }
    // Length counts the unit id plus the PDU.
    let pdu_len = usize::from(length)
        .checked_sub(1)
        .filter(|len| (1..=MAX_PDU_LEN).contains(len))
        .ok_or(FrameError::Length(length))?;

    let mut pdu = vec![0_u8; pdu_len];
    stream.read_exact(&mut pdu)?;

    Ok(Some((
        FrameHeader {
            transaction_id,
            unit_id,
        },
        pdu,
    )))
}

/// Fills `buffer`, distinguishing a clean EOF before the first byte from a
/// truncated frame.
fn read_exact_or_eof<R: Read>(stream: &mut R, buffer: &mut [u8]) -> Result<bool, FrameError> {
    let mut filled = 0;
    while filled < buffer.len() {
        match stream.read(&mut buffer[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(FrameError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended mid-frame",
                )));
            }
            Ok(read) => filled += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(FrameError::Io(error)),
        }
    }
    Ok(true)
}

/// Parses a PDU into a request or the exception it must be answered with.
pub fn parse_request(pdu: &[u8]) -> DecodedRequest {
    let Some((&function, body)) = pdu.split_first() else {
        return DecodedRequest::Invalid {
            function: 0,
            exception: ExceptionCode::IllegalFunction,
        };
    };
    match function {
        FN_READ_HOLDING => parse_read_holding(body),
        FN_WRITE_SINGLE => parse_write_single(body),
        FN_WRITE_MULTIPLE => parse_write_multiple(body),
        other => DecodedRequest::Invalid {
            function: other,
            exception: ExceptionCode::IllegalFunction,
        },
    }
}

fn parse_read_holding(body: &[u8]) -> DecodedRequest {
    let [a0, a1, c0, c1] = body else {
        return invalid(FN_READ_HOLDING, ExceptionCode::IllegalDataValue);
    };
    let address = u16::from_be_bytes([*a0, *a1]);
    let count = u16::from_be_bytes([*c0, *c1]);
    if !(1..=MAX_READ_COUNT).contains(&count) {
        return invalid(FN_READ_HOLDING, ExceptionCode::IllegalDataValue);
    }
    DecodedRequest::Valid(Request::ReadHolding { address, count })
}

fn parse_write_single(body: &[u8]) -> DecodedRequest {
    let [a0, a1, v0, v1] = body else {
        return invalid(FN_WRITE_SINGLE, ExceptionCode::IllegalDataValue);
    };
    DecodedRequest::Valid(Request::WriteSingle {
        address: u16::from_be_bytes([*a0, *a1]),
        value: u16::from_be_bytes([*v0, *v1]),
    })
}

fn parse_write_multiple(body: &[u8]) -> DecodedRequest {
    let Some(([a0, a1, c0, c1, byte_count], data)) = body.split_first_chunk::<5>() else {
        return invalid(FN_WRITE_MULTIPLE, ExceptionCode::IllegalDataValue);
    };
    let address = u16::from_be_bytes([*a0, *a1]);
    let count = u16::from_be_bytes([*c0, *c1]);
    if !(1..=MAX_WRITE_COUNT).contains(&count)
        || usize::from(*byte_count) != usize::from(count) * 2
        || data.len() != usize::from(*byte_count)
    {
        return invalid(FN_WRITE_MULTIPLE, ExceptionCode::IllegalDataValue);
    }
    let values = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    DecodedRequest::Valid(Request::WriteMultiple { address, values })
}

fn invalid(function: u8, exception: ExceptionCode) -> DecodedRequest {
    DecodedRequest::Invalid {
        function,
        exception,
    }
}

/// Encodes a response frame for the given transaction.
pub fn encode_response(header: FrameHeader, function: u8, response: &Response) -> Vec<u8> {
    let mut pdu = Vec::new();
    match response {
        Response::ReadHolding { values } => {
            pdu.push(function);
            pdu.push((values.len() * 2) as u8);
            for value in values {
                pdu.extend_from_slice(&value.to_be_bytes());
            }
        }
        Response::WriteSingle { address, value } => {
            pdu.push(function);
            pdu.extend_from_slice(&address.to_be_bytes());
            pdu.extend_from_slice(&value.to_be_bytes());
        }
        Response::WriteMultiple { address, count } => {
            pdu.push(function);
            pdu.extend_from_slice(&address.to_be_bytes());
            pdu.extend_from_slice(&count.to_be_bytes());
        }
        Response::Exception { code } => {
            pdu.push(function | 0x80);
            pdu.push(code.as_byte());
        }
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + pdu.len());
    frame.extend_from_slice(&header.transaction_id.to_be_bytes());
    frame.extend_from_slice(&PROTOCOL_ID.to_be_bytes());
    frame.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
    frame.push(header.unit_id);
    frame.extend_from_slice(&pdu);
    frame
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;

    fn frame(transaction_id: u16, unit_id: u8, pdu: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&transaction_id.to_be_bytes());
        bytes.extend_from_slice(&PROTOCOL_ID.to_be_bytes());
        bytes.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
        bytes.push(unit_id);
        bytes.extend_from_slice(pdu);
        bytes
    }

    #[test]
    fn reads_a_complete_frame() {
        let bytes = frame(0x0102, 0x11, &[FN_READ_HOLDING, 0x00, 0x01, 0x00, 0x02]);
        let mut cursor = Cursor::new(bytes);

        let (header, pdu) = read_frame(&mut cursor)
            .expect("frame should parse")
            .expect("frame should be present");
        assert_eq!(header.transaction_id, 0x0102);
        assert_eq!(header.unit_id, 0x11);
        assert_eq!(pdu, vec![FN_READ_HOLDING, 0x00, 0x01, 0x00, 0x02]);
    }

    #[test]
    fn clean_eof_reads_as_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(
            read_frame(&mut cursor)
                .expect("clean EOF is not an error")
                .is_none()
        );
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let mut bytes = frame(1, 1, &[FN_READ_HOLDING, 0x00, 0x01, 0x00, 0x02]);
        bytes.truncate(9);
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(FrameError::Io(_))
        ));
    }

    #[test]
    fn nonzero_protocol_id_is_rejected() {
        let mut bytes = frame(1, 1, &[FN_READ_HOLDING, 0, 1, 0, 1]);
        bytes[2] = 0xFF;
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(FrameError::Protocol(_))
        ));
    }

    #[test]
    fn zero_length_frame_is_rejected() {
        let bytes = frame(1, 1, &[]);
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(FrameError::Length(1))
        ));
    }

    #[test]
    fn parses_read_holding() {
        let decoded = parse_request(&[FN_READ_HOLDING, 0x00, 0x02, 0x00, 0x20]);
        assert_eq!(
            decoded,
            DecodedRequest::Valid(Request::ReadHolding {
                address: 2,
                count: 32,
            })
        );
    }

    #[test]
    fn parses_write_single() {
        let decoded = parse_request(&[FN_WRITE_SINGLE, 0x00, 0x01, 0x00, 0x01]);
        assert_eq!(
            decoded,
            DecodedRequest::Valid(Request::WriteSingle {
                address: 1,
                value: 1,
            })
        );
    }

    #[test]
    fn parses_write_multiple() {
        let decoded = parse_request(&[
            FN_WRITE_MULTIPLE,
            0x00,
            0x03, // address
            0x00,
            0x02, // count
            0x04, // byte count
            0x00,
            0x41,
            0x00,
            0x42,
        ]);
        assert_eq!(
            decoded,
            DecodedRequest::Valid(Request::WriteMultiple {
                address: 3,
                values: vec![0x41, 0x42],
            })
        );
    }

    #[rstest]
    #[case(&[FN_READ_HOLDING, 0x00, 0x01, 0x00, 0x00])] // zero count
    #[case(&[FN_READ_HOLDING, 0x00, 0x01, 0x00, 0x7E])] // count above 125
    #[case(&[FN_READ_HOLDING, 0x00, 0x01])] // short body
    #[case(&[FN_WRITE_MULTIPLE, 0x00, 0x01, 0x00, 0x01, 0x03, 0x00])] // bad byte count
    fn malformed_bodies_answer_illegal_data_value(#[case] pdu: &[u8]) {
        assert!(matches!(
            parse_request(pdu),
            DecodedRequest::Invalid {
                exception: ExceptionCode::IllegalDataValue,
                ..
            }
        ));
    }

    #[test]
    fn unknown_function_answers_illegal_function() {
        assert_eq!(
            parse_request(&[0x08, 0x00, 0x00]),
            DecodedRequest::Invalid {
                function: 0x08,
                exception: ExceptionCode::IllegalFunction,
            }
        );
    }

    #[test]
    fn encodes_read_response() {
        let header = FrameHeader {
            transaction_id: 7,
            unit_id: 1,
        };
        let bytes = encode_response(
            header,
            FN_READ_HOLDING,
            &Response::ReadHolding {
                values: vec![0x0001, 0x000A],
            },
        );
        assert_eq!(
            bytes,
            vec![0, 7, 0, 0, 0, 6, 1, FN_READ_HOLDING, 4, 0, 1, 0, 0x0A]
        );
    }

    #[test]
    fn encodes_exception_with_error_bit() {
        let header = FrameHeader {
            transaction_id: 1,
            unit_id: 2,
        };
        let bytes = encode_response(
            header,
            FN_WRITE_SINGLE,
            &Response::Exception {
                code: ExceptionCode::DeviceBusy,
            },
        );
        assert_eq!(bytes, vec![0, 1, 0, 0, 0, 3, 2, 0x86, 0x06]);
    }

    #[test]
    fn round_trips_an_encoded_response_frame() {
        let header = FrameHeader {
            transaction_id: 9,
            unit_id: 3,
        };
        let bytes = encode_response(
            header,
            FN_WRITE_SINGLE,
            &Response::WriteSingle {
                address: 1,
                value: 1,
            },
        );
        let mut cursor = Cursor::new(bytes);
        let (parsed_header, pdu) = read_frame(&mut cursor)
            .expect("encoded frame should parse")
            .expect("frame should be present");
        assert_eq!(parsed_header, header);
        assert_eq!(pdu, vec![FN_WRITE_SINGLE, 0, 1, 0, 1]);
    }
}
