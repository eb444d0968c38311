use std::io::Read;

use super::{msg_type::MsgType, MalformedMessageError, NodeId};

/// Decode a 1-byte unsigned integer.
///
/// # Errors
/// - Returns `MalformedMessageError` if the reader is exhausted.
pub(crate) fn decode_u8<R: Read>(reader: &mut R) -> Result<u8, MalformedMessageError> {
    let mut decoded_value = [0; 1];
    reader
        .read_exact(&mut decoded_value)
        .map_err(|_| MalformedMessageError("Failed to read u8".to_string()))?;

    Ok(decoded_value[0])
}

/// Decode the header shared by every message.
///
/// **Layout:**
/// - Byte 1: node id.
/// - Byte 2: message type discriminant (0..=5).
///
/// # Errors
/// - Returns `MalformedMessageError` if the header is truncated or the
///   discriminant is unknown.
pub(crate) fn decode_header<R: Read>(
    reader: &mut R,
) -> Result<(NodeId, MsgType), MalformedMessageError> {
    let node_id = decode_u8(reader)
        .map_err(|_| MalformedMessageError("Failed to read node id".to_string()))?;
    let discriminant = decode_u8(reader)
        .map_err(|_| MalformedMessageError("Failed to read message type".to_string()))?;

    let msg_type = MsgType::from_u8(discriminant).ok_or_else(|| {
        MalformedMessageError(format!("Unknown message type: {discriminant}"))
    })?;

    Ok((NodeId(node_id), msg_type))
}

/// Decode a byte holding flags, rejecting any bit set outside `allowed_mask`.
///
/// # Errors
/// - Returns `MalformedMessageError` if reading fails or reserved bits are set.
pub(crate) fn decode_flags<R: Read>(
    reader: &mut R,
    allowed_mask: u8,
) -> Result<u8, MalformedMessageError> {
    let flags = decode_u8(reader)?;

    let reserved = flags & !allowed_mask;
    if reserved != 0 {
        return Err(MalformedMessageError(format!(
            "Reserved flag bits are set: {reserved:#010b}"
        )));
    }

    Ok(flags)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn header_rejects_unknown_discriminant() {
        let mut cursor = Cursor::new(&[3u8, 9][..]);
        let err = decode_header(&mut cursor).unwrap_err();
        assert_eq!(err, MalformedMessageError("Unknown message type: 9".to_string()));
    }

    #[test]
    fn header_rejects_truncated_input() {
        assert!(decode_header(&mut Cursor::new(&[][..])).is_err());
        assert!(decode_header(&mut Cursor::new(&[3u8][..])).is_err());
    }

    #[test]
    fn flags_reject_reserved_bits() {
        assert_eq!(decode_flags(&mut Cursor::new(&[0b0000_0001u8][..]), 0b1), Ok(1));
        assert!(decode_flags(&mut Cursor::new(&[0b1000_0001u8][..]), 0b1).is_err());
    }
}
