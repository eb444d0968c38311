use bytes::{BufMut, BytesMut};

use super::{msg_type::MsgType, NodeId};

/// Encode the header shared by every message.
///
/// **Layout:**
///
/// | Byte | Field             |
/// |------|-------------------|
/// | 1    | Node id           |
/// | 2    | Message type      |
pub(crate) fn encode_header(buf: &mut BytesMut, node_id: NodeId, msg_type: MsgType) {
    buf.put_u8(node_id.0);
    buf.put_u8(msg_type.to_u8());
}

/// Pack a slice of booleans into the low bits of a byte, starting at `shift`.
///
/// Element `i` lands on bit `shift + i`.
pub(crate) fn pack_bits(flags: &[bool], shift: u8) -> u8 {
    flags
        .iter()
        .enumerate()
        .fold(0, |acc, (i, &flag)| acc | (u8::from(flag) << (shift as usize + i)))
}

/// Inverse of [`pack_bits`] for `N` consecutive bits.
pub(crate) fn unpack_bits<const N: usize>(byte: u8, shift: u8) -> [bool; N] {
    let mut flags = [false; N];
    for (i, flag) in flags.iter_mut().enumerate() {
        *flag = (byte >> (shift as usize + i)) & 1 == 1;
    }
    flags
}
