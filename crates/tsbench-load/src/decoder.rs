//! Streaming point decoders for the two input wire formats.

use crate::error::{LoadError, Result};
use bytes::Bytes;
use std::io::{BufRead, ErrorKind, Read};
use tsbench_core::exposition::ExpositionParser;
use tsbench_core::wire::{frame_len, FRAME_HEADER_LEN};

/// One undecoded record pulled off the input stream, with where it sat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedPoint {
    /// A single exposition line without its line terminator
    Line { text: Bytes, line_no: u64 },
    /// A single snappy-compressed remote-write payload
    Frame { payload: Bytes, index: u64, offset: u64 },
}

impl DecodedPoint {
    /// Bytes the hash indexer routes on
    pub fn routing_key(&self) -> &[u8] {
        match self {
            DecodedPoint::Line { text, .. } => ExpositionParser::metric_name(text),
            DecodedPoint::Frame { payload, .. } => payload,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DecodedPoint::Line { text: b, .. } | DecodedPoint::Frame { payload: b, .. } => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable location in the input stream
    pub fn position(&self) -> String {
        match self {
            DecodedPoint::Line { line_no, .. } => line_position(*line_no),
            DecodedPoint::Frame { index, offset, .. } => frame_position(*index, *offset),
        }
    }
}

pub(crate) fn line_position(line_no: u64) -> String {
    format!("line {}", line_no)
}

pub(crate) fn frame_position(index: u64, offset: u64) -> String {
    format!("frame {} (byte offset {})", index, offset)
}

/// Pulls records off an input stream one at a time.
///
/// `Ok(None)` marks a clean end of stream.
pub trait PointDecoder: Send {
    fn decode(&mut self) -> Result<Option<DecodedPoint>>;
}

impl<D: PointDecoder + ?Sized> PointDecoder for Box<D> {
    fn decode(&mut self) -> Result<Option<DecodedPoint>> {
        (**self).decode()
    }
}

/// Newline-delimited exposition text.
pub struct TextDecoder<R> {
    reader: R,
    line: Vec<u8>,
    line_no: u64,
}

impl<R: BufRead + Send> TextDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::with_capacity(1024),
            line_no: 0,
        }
    }

    /// Number of lines consumed so far, including skipped ones
    pub fn line_no(&self) -> u64 {
        self.line_no
    }
}

impl<R: BufRead + Send> PointDecoder for TextDecoder<R> {
    fn decode(&mut self) -> Result<Option<DecodedPoint>> {
        loop {
            self.line.clear();
            let n = self
                .reader
                .read_until(b'\n', &mut self.line)
                .map_err(|e| LoadError::decode(line_position(self.line_no + 1), e.to_string()))?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let mut end = self.line.len();
            if end > 0 && self.line[end - 1] == b'\n' {
                end -= 1;
            }
            if end > 0 && self.line[end - 1] == b'\r' {
                end -= 1;
            }

            let line = &self.line[..end];
            let first = line.iter().position(|b| !b.is_ascii_whitespace());
            match first {
                None => continue,
                Some(i) if line[i] == b'#' => continue,
                Some(_) => {
                    return Ok(Some(DecodedPoint::Line {
                        text: Bytes::copy_from_slice(line),
                        line_no: self.line_no,
                    }))
                }
            }
        }
    }
}

/// Length-prefixed frames: u64 big-endian length followed by the payload.
pub struct FramedDecoder<R> {
    reader: R,
    buf: Vec<u8>,
    max_frame_len: u64,
    frame_index: u64,
    offset: u64,
}

impl<R: Read + Send> FramedDecoder<R> {
    pub fn new(reader: R, max_frame_len: u64) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            max_frame_len,
            frame_index: 0,
            offset: 0,
        }
    }

    fn position(&self) -> String {
        frame_position(self.frame_index, self.offset)
    }

    /// Fill `buf` as far as the stream allows and return the byte count read
    fn read_full(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + Send> PointDecoder for FramedDecoder<R> {
    fn decode(&mut self) -> Result<Option<DecodedPoint>> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        let got = Self::read_full(&mut self.reader, &mut header)
            .map_err(|e| LoadError::decode(self.position(), e.to_string()))?;
        match got {
            0 => return Ok(None),
            FRAME_HEADER_LEN => {}
            n => {
                return Err(LoadError::decode(
                    self.position(),
                    format!("truncated length header: {} of {} bytes", n, FRAME_HEADER_LEN),
                ))
            }
        }

        let len = frame_len(&header);
        if len > self.max_frame_len {
            return Err(LoadError::decode(
                self.position(),
                format!("frame length {} exceeds limit {}", len, self.max_frame_len),
            ));
        }

        let len = len as usize;
        self.buf.resize(len, 0);
        let got = Self::read_full(&mut self.reader, &mut self.buf)
            .map_err(|e| LoadError::decode(self.position(), e.to_string()))?;
        if got < len {
            return Err(LoadError::decode(
                self.position(),
                format!("truncated payload: {} of {} bytes", got, len),
            ));
        }

        let point = DecodedPoint::Frame {
            payload: Bytes::copy_from_slice(&self.buf),
            index: self.frame_index,
            offset: self.offset,
        };
        self.frame_index += 1;
        self.offset += (FRAME_HEADER_LEN + len) as u64;
        Ok(Some(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tsbench_core::wire::encode_frame;

    fn drain<D: PointDecoder>(mut d: D) -> Vec<DecodedPoint> {
        let mut out = Vec::new();
        while let Some(p) = d.decode().unwrap() {
            out.push(p);
        }
        out
    }

    fn line(s: &str, line_no: u64) -> DecodedPoint {
        DecodedPoint::Line {
            text: Bytes::copy_from_slice(s.as_bytes()),
            line_no,
        }
    }

    #[test]
    fn test_text_decoder_lines() {
        let input = "a 1 2\n\n# HELP a\nb{x=\"y\"} 3 4\r\n   \nc 5 6";
        let points = drain(TextDecoder::new(Cursor::new(input)));
        assert_eq!(
            points,
            vec![line("a 1 2", 1), line("b{x=\"y\"} 3 4", 4), line("c 5 6", 6)]
        );
        assert_eq!(points[1].position(), "line 4");
    }

    #[test]
    fn test_text_decoder_empty_input() {
        let mut d = TextDecoder::new(Cursor::new(""));
        assert!(d.decode().unwrap().is_none());
        assert!(d.decode().unwrap().is_none());
    }

    #[test]
    fn test_framed_decoder_round_trip() {
        let payloads: Vec<&[u8]> = vec![b"first", b"", b"third payload"];
        let mut input = Vec::new();
        for p in &payloads {
            input.extend_from_slice(&encode_frame(p));
        }

        let points = drain(FramedDecoder::new(Cursor::new(input), 1024));
        let mut offset = 0;
        let expected: Vec<DecodedPoint> = payloads
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let point = DecodedPoint::Frame {
                    payload: Bytes::copy_from_slice(p),
                    index: i as u64,
                    offset,
                };
                offset += (FRAME_HEADER_LEN + p.len()) as u64;
                point
            })
            .collect();
        assert_eq!(points, expected);
        assert_eq!(points[2].position(), "frame 2 (byte offset 21)");
    }

    #[test]
    fn test_framed_decoder_truncated_header() {
        let mut input = encode_frame(b"ok");
        input.extend_from_slice(&[0, 0, 0]);

        let mut d = FramedDecoder::new(Cursor::new(input), 1024);
        assert!(d.decode().unwrap().is_some());
        match d.decode() {
            Err(LoadError::Decode { position, .. }) => assert!(position.contains("frame 1")),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_framed_decoder_truncated_payload() {
        let mut input = encode_frame(b"abcdef");
        input.truncate(input.len() - 2);

        let mut d = FramedDecoder::new(Cursor::new(input), 1024);
        match d.decode() {
            Err(LoadError::Decode { position, message }) => {
                assert!(position.contains("frame 0"));
                assert!(message.contains("4 of 6"));
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_framed_decoder_rejects_oversized_frame() {
        let input = u64::MAX.to_be_bytes().to_vec();
        let mut d = FramedDecoder::new(Cursor::new(input), 1024);
        assert!(matches!(d.decode(), Err(LoadError::Decode { .. })));
    }

    #[test]
    fn test_routing_key() {
        assert_eq!(line("cpu_usage{a=\"b\"} 1 2", 1).routing_key(), b"cpu_usage");
        let frame = DecodedPoint::Frame {
            payload: Bytes::from_static(b"raw"),
            index: 0,
            offset: 0,
        };
        assert_eq!(frame.routing_key(), b"raw");
    }
}
