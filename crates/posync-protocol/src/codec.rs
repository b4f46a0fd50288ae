//! Codec trait and the text codec.
//!
//! A codec turns a [`Message`] into the bytes handed to the transport and
//! back. The grammar lives in [`crate::wire`]; a codec only decides how the
//! text is laid out as bytes.

use crate::{Message, ProtocolError};

/// Encodes messages to bytes and decodes bytes back into messages.
///
/// `Send + Sync + 'static` so one codec instance can live inside a
/// long-running driver task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a message.
    ///
    /// # Errors
    /// [`ProtocolError::Unencodable`] if the message can't be represented.
    fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError>;

    /// Parses a message.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedMessage`] for anything that isn't a valid
    /// message. Callers log it and drop the input; the connection stays
    /// open.
    fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError>;
}

/// How the protocol text is laid out as bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// UTF-16, little-endian, no byte-order mark. Wire-compatible with
    /// the existing clients.
    #[default]
    Utf16Le,
    /// UTF-8. Half the size for ASCII names; handy when debugging with
    /// generic WebSocket tools.
    Utf8,
}

/// The `HEADER|field|...` text codec.
///
/// ```rust
/// use posync_protocol::{Codec, Message, TextCodec};
///
/// let codec = TextCodec::utf8();
/// let bytes = codec.encode(&Message::NameIs { name: "Bob".into() }).unwrap();
/// assert_eq!(bytes, b"NAMEIS|Bob");
/// assert_eq!(codec.decode(&bytes).unwrap(), Message::NameIs { name: "Bob".into() });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec {
    encoding: TextEncoding,
}

impl TextCodec {
    pub fn new(encoding: TextEncoding) -> Self {
        Self { encoding }
    }

    /// UTF-16LE codec (the default).
    pub fn utf16() -> Self {
        Self::new(TextEncoding::Utf16Le)
    }

    /// UTF-8 codec.
    pub fn utf8() -> Self {
        Self::new(TextEncoding::Utf8)
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }
}

impl Codec for TextCodec {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError> {
        let text = message.to_wire()?;
        Ok(match self.encoding {
            TextEncoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            TextEncoding::Utf8 => text.into_bytes(),
        })
    }

    fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        let text = match self.encoding {
            TextEncoding::Utf16Le => decode_utf16le(data)?,
            TextEncoding::Utf8 => std::str::from_utf8(data)
                .map_err(|e| ProtocolError::malformed(format!("invalid UTF-8: {e}")))?
                .to_owned(),
        };
        text.parse()
    }
}

fn decode_utf16le(data: &[u8]) -> Result<String, ProtocolError> {
    let chunks = data.chunks_exact(2);
    if !chunks.remainder().is_empty() {
        return Err(ProtocolError::malformed(format!(
            "odd byte count {} for UTF-16",
            data.len()
        )));
    }
    let units: Vec<u16> = chunks.map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
    String::from_utf16(&units)
        .map_err(|e| ProtocolError::malformed(format!("invalid UTF-16: {e}")))
}

#[cfg(test)]
mod tests {
    use posync_transport::ConnectionId;

    use super::*;
    use crate::Vec3;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn test_default_codec_is_utf16() {
        assert_eq!(TextCodec::default().encoding(), TextEncoding::Utf16Le);
    }

    #[test]
    fn test_encode_utf16_is_little_endian_without_bom() {
        let bytes = TextCodec::utf16()
            .encode(&Message::Disconnected { id: ConnectionId::new(9) })
            .unwrap();
        assert_eq!(bytes, vec![b'D', 0, b'C', 0, b'|', 0, b'9', 0]);
    }

    #[test]
    fn test_decode_utf16_wire_bytes() {
        let msg = TextCodec::utf16()
            .decode(&utf16le("MYPOSITION|1|2.5|-3"))
            .unwrap();
        assert_eq!(msg, Message::MyPosition { position: Vec3::new(1.0, 2.5, -3.0) });
    }

    #[test]
    fn test_decode_utf16_odd_length_is_malformed() {
        let mut bytes = utf16le("DC|1");
        bytes.push(0);
        assert!(matches!(
            TextCodec::utf16().decode(&bytes),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_decode_utf16_lone_surrogate_is_malformed() {
        let mut bytes = utf16le("NAMEIS|");
        bytes.extend_from_slice(&0xD800u16.to_le_bytes());
        assert!(matches!(
            TextCodec::utf16().decode(&bytes),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_utf16_round_trips_astral_names() {
        let codec = TextCodec::utf16();
        let msg = Message::NameIs { name: "🦀 crab".into() };
        assert_eq!(codec.decode(&codec.encode(&msg).unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_decode_utf8_invalid_bytes_is_malformed() {
        assert!(matches!(
            TextCodec::utf8().decode(&[b'D', b'C', b'|', 0xFF]),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_encode_propagates_unencodable() {
        let result = TextCodec::utf8().encode(&Message::NameIs { name: "x|y".into() });
        assert!(matches!(result, Err(ProtocolError::Unencodable(_))));
    }
}
