//! Length-prefixed framing: a 4-byte big-endian length followed by the message bytes.

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf as _, BufMut as _, Bytes, BytesMut};

use crate::error::{Error, Result};

pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 4;

fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|_| len <= MAX_FRAME_LEN)
        .ok_or(Error::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        })
}

/// Prefixes `message` with its length. Fails for messages over [`MAX_FRAME_LEN`].
pub fn encode_frame(message: &[u8]) -> Result<Bytes> {
    let len = frame_len(message.len())?;
    let mut out = BytesMut::with_capacity(HEADER_LEN + message.len());
    out.put_u32(len);
    out.put_slice(message);
    Ok(out.freeze())
}

/// Incremental decoder for byte streams that deliver frames in arbitrary chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(Error::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }

        self.buf.advance(HEADER_LEN);
        Ok(Some(self.buf.split_to(len).freeze()))
    }
}

/// Reads one frame; `Ok(None)` on a clean end of stream before a header.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Option<Bytes>> {
    let mut header = [0u8; HEADER_LEN];
    match r.read_exact(&mut header) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = vec![0u8; len];
    match r.read_exact(&mut body) {
        Ok(()) => Ok(Some(Bytes::from(body))),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Err(Error::TruncatedFrame),
        Err(err) => Err(err.into()),
    }
}

pub fn write_frame<W: Write>(w: &mut W, message: &[u8]) -> Result<()> {
    w.write_all(&encode_frame(message)?)?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame(message: &[u8]) -> Bytes {
        match encode_frame(message) {
            Ok(f) => f,
            Err(err) => panic!("encode: {err}"),
        }
    }

    #[test]
    fn decoder_waits_for_complete_frames() {
        let a = frame(b"hello");
        let b = frame(b"");
        let mut stream = Vec::new();
        stream.extend_from_slice(&a);
        stream.extend_from_slice(&b);

        let mut dec = FrameDecoder::default();
        dec.extend_from_slice(&stream[..3]);
        assert!(matches!(dec.next_frame(), Ok(None)));

        dec.extend_from_slice(&stream[3..7]);
        assert!(matches!(dec.next_frame(), Ok(None)));

        dec.extend_from_slice(&stream[7..]);
        match dec.next_frame() {
            Ok(Some(f)) => assert_eq!(f.as_ref(), b"hello"),
            other => panic!("expected first frame, got {other:?}"),
        }
        match dec.next_frame() {
            Ok(Some(f)) => assert!(f.is_empty()),
            other => panic!("expected empty frame, got {other:?}"),
        }
        assert!(matches!(dec.next_frame(), Ok(None)));
        assert_eq!(dec.buffered(), 0);
    }

    #[test]
    fn decoder_rejects_oversized_header() {
        let mut dec = FrameDecoder::default();
        dec.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            dec.next_frame(),
            Err(Error::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn oversized_message_is_not_encoded() {
        let message = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(matches!(
            encode_frame(&message),
            Err(Error::FrameTooLarge { len, .. }) if len == MAX_FRAME_LEN + 1
        ));

        let mut out = Vec::new();
        assert!(write_frame(&mut out, &message).is_err());
        assert!(out.is_empty());

        assert_eq!(frame(&vec![7u8; MAX_FRAME_LEN]).len(), MAX_FRAME_LEN + 4);
    }

    #[test]
    fn blocking_read_write() {
        let mut out = Vec::new();
        if let Err(err) = write_frame(&mut out, b"abc") {
            panic!("write: {err}");
        }
        if let Err(err) = write_frame(&mut out, b"de") {
            panic!("write: {err}");
        }

        let mut r = Cursor::new(out);
        assert_eq!(
            read_frame(&mut r).ok().flatten().as_deref(),
            Some(&b"abc"[..])
        );
        assert_eq!(
            read_frame(&mut r).ok().flatten().as_deref(),
            Some(&b"de"[..])
        );
        assert!(matches!(read_frame(&mut r), Ok(None)));
    }

    #[test]
    fn truncated_body_is_an_error() {
        let encoded = frame(b"abcdef");
        let mut r = Cursor::new(encoded[..6].to_vec());
        assert!(matches!(read_frame(&mut r), Err(Error::TruncatedFrame)));
    }
}
