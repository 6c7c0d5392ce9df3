//! Continuation-marker framing for oversized payloads.
//!
//! A serialized payload is sliced into parts no larger than the configured
//! maximum; every part except the last carries [`CONTINUATION_MARKER`] as a
//! suffix. The receiving side accumulates parts until it sees one without the
//! marker, then joins them back into the original payload.
//!
//! Everything here is pure and does no I/O.

use bytes::Bytes;

/// Maximum payload bytes per wire part.
pub const MAX_PART: usize = 128 * 1024 * 1024;

/// Suffix marking a part as continued.
///
/// Contains NUL bytes: serialized JSON never contains a raw NUL, so the
/// marker cannot collide with sliced payload content. It is appended whole
/// after slicing, never embedded, so it cannot straddle a part boundary.
pub const CONTINUATION_MARKER: &[u8] = b"\x00continued\x00continued\x00";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedStreamError {
    #[error("empty part sequence")]
    Empty,

    /// A non-final part did not end with the continuation marker.
    #[error("part {index} of {total} is not marked continued")]
    MissingMarker { index: usize, total: usize },

    /// The transport ended inside a continued message.
    #[error("stream ended inside a continued message")]
    Truncated,
}

/// Slice `payload` into parts of at most `max_part` bytes, marking every part
/// except the last as continued.
///
/// An empty payload still produces exactly one (empty) part.
pub fn split(payload: &[u8], max_part: usize) -> Vec<Bytes> {
    debug_assert!(max_part > 0, "max_part must be non-zero");
    let mut parts = Vec::with_capacity(payload.len() / max_part.max(1) + 1);
    let mut rest = payload;
    loop {
        let take = rest.len().min(max_part);
        let (chunk, remaining) = rest.split_at(take);
        if remaining.is_empty() {
            parts.push(Bytes::copy_from_slice(chunk));
            return parts;
        }
        let mut part = Vec::with_capacity(chunk.len() + CONTINUATION_MARKER.len());
        part.extend_from_slice(chunk);
        part.extend_from_slice(CONTINUATION_MARKER);
        parts.push(Bytes::from(part));
        rest = remaining;
    }
}

/// True iff more parts follow this one.
pub fn is_continued(part: &[u8]) -> bool {
    part.ends_with(CONTINUATION_MARKER)
}

/// Reassemble the payload from an ordered part sequence.
///
/// Every part except the last must carry the continuation marker; a missing
/// marker indicates a framing desync with the peer.
pub fn join(parts: &[Bytes]) -> Result<Vec<u8>, MalformedStreamError> {
    let (last, continued) = parts.split_last().ok_or(MalformedStreamError::Empty)?;
    let mut payload = Vec::with_capacity(parts.iter().map(Bytes::len).sum());
    for (index, part) in continued.iter().enumerate() {
        if !is_continued(part) {
            return Err(MalformedStreamError::MissingMarker {
                index,
                total: parts.len(),
            });
        }
        payload.extend_from_slice(&part[..part.len() - CONTINUATION_MARKER.len()]);
    }
    payload.extend_from_slice(last);
    Ok(payload)
}
