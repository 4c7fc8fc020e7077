//! Reading framed packets out of the ring
//!
//! Headers and payloads are both read through the wraparound-safe reader;
//! neither is assumed to be contiguous.

use crate::RingBuffer;
use overlay_link_core::{DecodeError, DecodeResult, Packet, PacketHeader, PacketKind};

/// Read the header at `tail`.
///
/// A frame longer than the ring itself can only come from a desynchronised
/// stream, so it is reported as [`DecodeError::MalformedFraming`].
pub fn decode_header(ring: &RingBuffer, tail: usize) -> DecodeResult<PacketHeader> {
    let mut raw = [0u8; PacketHeader::SIZE];
    ring.read_at(tail, &mut raw).map_err(|_| DecodeError::MalformedFraming {
        frame_len: PacketHeader::SIZE,
        limit: ring.capacity(),
    })?;

    let header = PacketHeader::from_bytes(raw);
    if header.frame_len() > ring.capacity() {
        return Err(DecodeError::MalformedFraming {
            frame_len: header.frame_len(),
            limit: ring.capacity(),
        });
    }
    Ok(header)
}

/// Reject a frame that runs past the published bytes.
///
/// The producer publishes whole frames only, so this is framing corruption too.
pub fn ensure_published(header: &PacketHeader, available: usize) -> DecodeResult<()> {
    if header.frame_len() > available {
        return Err(DecodeError::MalformedFraming {
            frame_len: header.frame_len(),
            limit: available,
        });
    }
    Ok(())
}

/// Read and decode the payload that starts at `data_start`.
///
/// Errors here cover one packet only; the caller still skips
/// `header.frame_len()` bytes.
pub fn decode_payload(ring: &RingBuffer, data_start: usize, header: &PacketHeader) -> DecodeResult<Packet> {
    let kind = PacketKind::try_from(header.kind)?;

    let expected = kind.payload_size();
    let actual = header.payload_size as usize;
    if actual != expected {
        return Err(DecodeError::SizeMismatch { kind, expected, actual });
    }

    let mut payload = vec![0u8; expected];
    ring.read_at(data_start, &mut payload)
        .map_err(|_| DecodeError::SizeMismatch { kind, expected, actual })?;

    Packet::decode(kind, &payload)
}
