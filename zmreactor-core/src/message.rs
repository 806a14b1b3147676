//! Multipart message construction and envelope handling.
//!
//! Router and dealer sockets prefix a message body with routing frames. The
//! envelope ends at the first empty delimiter frame:
//!
//! ```text
//! [ peer id ][ hop id ][ (empty) ][ body 1 ][ body 2 ]
//!  \_________ envelope _________/ \____ parts ______/
//! ```

use crate::pattern::Pattern;
use bytes::Bytes;
use std::borrow::Cow;

/// Builder for constructing multipart messages.
///
/// # Examples
///
/// ```
/// use zmreactor_core::message::Message;
///
/// // ROUTER reply: [identity, empty, body]
/// let frames = Message::new()
///     .push(&b"client-123"[..])
///     .push_empty()
///     .push_str("Hello")
///     .into_frames();
/// assert_eq!(frames.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    frames: Vec<Bytes>,
}

impl Message {
    /// Create a new empty message builder.
    #[must_use]
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Create a message from existing frames.
    #[must_use]
    pub const fn from_frames(frames: Vec<Bytes>) -> Self {
        Self { frames }
    }

    /// Add a frame from any type that can be converted to `Bytes`.
    #[must_use]
    pub fn push(mut self, frame: impl Into<Bytes>) -> Self {
        self.frames.push(frame.into());
        self
    }

    /// Add a string frame.
    #[must_use]
    pub fn push_str(mut self, s: &str) -> Self {
        self.frames.push(Bytes::copy_from_slice(s.as_bytes()));
        self
    }

    /// Add an empty delimiter frame.
    #[must_use]
    pub fn push_empty(mut self) -> Self {
        self.frames.push(Bytes::new());
        self
    }

    /// Prefix the message with routing frames.
    ///
    /// The envelope is used as-is, so it should already end with its empty
    /// delimiter if the peer expects one.
    #[must_use]
    pub fn with_envelope(self, envelope: impl IntoIterator<Item = Bytes>) -> Self {
        let mut frames: Vec<Bytes> = envelope.into_iter().collect();
        frames.extend(self.frames);
        Self { frames }
    }

    /// Get the number of frames in the message.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the message has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Get a reference to the frames without consuming the builder.
    #[must_use]
    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    /// Consume the builder and return the frames.
    #[must_use]
    pub fn into_frames(self) -> Vec<Bytes> {
        self.frames
    }
}

impl From<Vec<Bytes>> for Message {
    fn from(frames: Vec<Bytes>) -> Self {
        Self::from_frames(frames)
    }
}

impl From<Message> for Vec<Bytes> {
    fn from(msg: Message) -> Self {
        msg.into_frames()
    }
}

/// Split a received message into `(envelope, parts)`.
///
/// Frames up to and including the first empty frame form the envelope. With
/// no delimiter present a router treats the leading peer identity as the
/// envelope and every other pattern gets an empty one.
#[must_use]
pub fn split_envelope(pattern: Pattern, mut frames: Vec<Bytes>) -> (Vec<Bytes>, Vec<Bytes>) {
    if let Some(delim) = frames.iter().position(Bytes::is_empty) {
        let parts = frames.split_off(delim + 1);
        return (frames, parts);
    }
    if pattern == Pattern::Router && !frames.is_empty() {
        let parts = frames.split_off(1);
        return (frames, parts);
    }
    (Vec::new(), frames)
}

/// Render a frame for logs: UTF-8 text as-is, anything else hex-encoded.
#[must_use]
pub fn render_frame(frame: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(frame) {
        Ok(text) if !text.chars().any(char::is_control) => Cow::Borrowed(text),
        _ => Cow::Owned(hex::encode(frame)),
    }
}

/// Render every frame as hex, joined by `|`. Used for routing envelopes,
/// whose identities are usually binary.
#[must_use]
pub fn render_envelope(envelope: &[Bytes]) -> String {
    envelope
        .iter()
        .map(hex::encode)
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(parts: &[&'static [u8]]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::from_static(p)).collect()
    }

    #[test]
    fn test_build_message() {
        let msg = Message::new()
            .push_str("topic")
            .push(Vec::from(&b"World"[..]))
            .push_empty();

        assert_eq!(msg.len(), 3);
        let out = msg.into_frames();
        assert_eq!(out[0], Bytes::from_static(b"topic"));
        assert!(out[2].is_empty());
    }

    #[test]
    fn test_with_envelope() {
        let msg = Message::new()
            .push_str("body")
            .with_envelope(frames(&[b"peer", b""]));
        assert_eq!(msg.frames(), &frames(&[b"peer", b"", b"body"])[..]);
    }

    #[test]
    fn test_split_at_delimiter() {
        let (envelope, parts) =
            split_envelope(Pattern::Router, frames(&[b"peer", b"hop", b"", b"a", b"b"]));
        assert_eq!(envelope, frames(&[b"peer", b"hop", b""]));
        assert_eq!(parts, frames(&[b"a", b"b"]));
    }

    #[test]
    fn test_router_without_delimiter_takes_identity() {
        let (envelope, parts) = split_envelope(Pattern::Router, frames(&[b"peer", b"a"]));
        assert_eq!(envelope, frames(&[b"peer"]));
        assert_eq!(parts, frames(&[b"a"]));
    }

    #[test]
    fn test_dealer_without_delimiter_has_empty_envelope() {
        let (envelope, parts) = split_envelope(Pattern::Dealer, frames(&[b"a", b"b"]));
        assert!(envelope.is_empty());
        assert_eq!(parts, frames(&[b"a", b"b"]));
    }

    #[test]
    fn test_render_frame() {
        assert_eq!(render_frame(b"hello"), "hello");
        assert_eq!(render_frame(&[0x00, 0x80, 0xff]), "0080ff");
        assert_eq!(render_frame(b"a\nb"), "610a62");
        assert_eq!(render_envelope(&frames(&[&[0x00, 0x01], b""])), "0001|");
    }
}
