// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cuts a growing TCP byte stream into whole MODBUS/TCP frames.
//!
//! The MBAP `length` field alone is authoritative: no resync or function-code
//! lookahead is needed. If fewer than 6 bytes are buffered, nothing can be
//! extracted yet; otherwise `length` at offset 4 gives the total frame size
//! as `length + 6`.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::error::Error;

/// Attempt to split one whole frame off the front of `buf`, returning it and
/// removing it from `buf`. Returns `None` if `buf` doesn't yet hold a
/// complete frame. Performs no validation beyond length; the wire codec
/// rejects invalid frames on its own.
pub fn extract_frame(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    if buf.len() < 6 {
        return None;
    }
    let length = u16::from_be_bytes([buf[4], buf[5]]) as usize;
    let frame_size = length + 6;
    if buf.len() < frame_size {
        return None;
    }
    Some(buf.drain(..frame_size).collect())
}

/// A [`tokio_util::codec::Decoder`] that turns a byte stream from a
/// `TcpStream` into discrete MODBUS/TCP frames, for use with
/// `tokio_util::codec::Framed`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Vec<u8>;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 6 {
            return Ok(None);
        }
        let length = u16::from_be_bytes([src[4], src[5]]) as usize;
        let frame_size = length + 6;
        if src.len() < frame_size {
            return Ok(None);
        }
        let frame = src.split_to(frame_size);
        Ok(Some(frame.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_nothing_below_six_bytes() {
        let mut buf = vec![0, 1, 2, 3, 4];
        assert!(extract_frame(&mut buf).is_none());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn yields_nothing_for_incomplete_frame() {
        // length field says 6, but only 4 bytes follow
        let mut buf = vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x11, 0x03, 0x00, 0x6B];
        assert!(extract_frame(&mut buf).is_none());
    }

    #[test]
    fn extracts_one_complete_frame_and_retains_remainder() {
        let mut buf = vec![
            0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x11, 0x01, 0x00, 0x13, 0x00, 0x13, 0xAA, 0xBB,
        ];
        let frame = extract_frame(&mut buf).unwrap();
        assert_eq!(frame.len(), 12);
        assert_eq!(buf, vec![0xAA, 0xBB]);
    }

    #[test]
    fn frame_codec_decoder_matches_plain_function() {
        let mut src = BytesMut::from(
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x11, 0x01, 0x00, 0x13, 0x00, 0x13][..],
        );
        let mut codec = FrameCodec;
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(frame.len(), 12);
        assert!(codec.decode(&mut src).unwrap().is_none());
    }
}
