//! Node record codec
//!
//! Record layout, all integers little-endian:
//!
//! ```text
//! [len:1][label:len][(child_id:4, first_byte:1)]*[posting_count:4][posting_pointer:5]
//! ```
//!
//! The child area has no count of its own; it spans everything between the
//! label and the fixed 9-byte trailer.

use super::types::{ChildRef, NodeId, NodeRecord, MAX_LABEL_LEN, MAX_POSTING_POINTER, ROOT};
use crate::error::TextrieError;
use crate::Result;

/// Size of the trailing posting count + pointer
pub const TRAILER_LEN: usize = 9;
/// Size of one (child id, first byte) entry
pub const CHILD_LEN: usize = 5;

/// Variable-byte encoding: 7 bits per byte, low groups first, high bit set
/// on the final byte
pub fn encode_vbyte(mut value: u32, output: &mut Vec<u8>) {
    while value >= 0x80 {
        output.push((value & 0x7F) as u8);
        value >>= 7;
    }
    output.push(value as u8 | 0x80);
}

/// Decode one variable-byte integer, pulling bytes from `next_byte`.
///
/// A u32 takes at most five bytes; a longer run is corruption.
pub fn decode_vbyte<F>(mut next_byte: F) -> Result<u32>
where
    F: FnMut() -> Result<u8>,
{
    let mut value = 0u32;
    for shift in (0..32).step_by(7) {
        let byte = next_byte()?;
        value |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 != 0 {
            return Ok(value);
        }
    }
    Err(TextrieError::corrupt("vbyte value longer than five bytes"))
}

/// Append an encoded node record to `output`
pub fn encode_node(
    label: &[u8],
    children: &[ChildRef],
    posting_count: u32,
    posting_pointer: u64,
    output: &mut Vec<u8>,
) -> Result<()> {
    if label.len() > MAX_LABEL_LEN {
        return Err(TextrieError::InvalidRequest(format!(
            "label of {} bytes exceeds {}",
            label.len(),
            MAX_LABEL_LEN
        )));
    }
    if posting_pointer > MAX_POSTING_POINTER {
        return Err(TextrieError::InvalidRequest(format!(
            "posting pointer {} does not fit in 5 bytes",
            posting_pointer
        )));
    }

    output.push(label.len() as u8);
    output.extend_from_slice(label);
    for child in children {
        output.extend_from_slice(&child.id.to_le_bytes());
        output.push(child.first);
    }
    output.extend_from_slice(&posting_count.to_le_bytes());
    output.extend_from_slice(&posting_pointer.to_le_bytes()[..5]);
    Ok(())
}

/// Decode the record of node `id` from its raw bytes
pub fn decode_node(id: NodeId, bytes: &[u8]) -> Result<NodeRecord> {
    if bytes.len() < 1 + TRAILER_LEN {
        return Err(TextrieError::corrupt(format!(
            "record of node {} is {} bytes, too short for its trailer",
            id,
            bytes.len()
        )));
    }

    let label_len = bytes[0] as usize;
    let children_start = 1 + label_len;
    let trailer_start = bytes.len() - TRAILER_LEN;
    if children_start > trailer_start {
        return Err(TextrieError::corrupt(format!(
            "label of node {} ({} bytes) overruns its record",
            id, label_len
        )));
    }
    if label_len == 0 && id != ROOT {
        return Err(TextrieError::corrupt(format!("node {} has an empty label", id)));
    }

    let child_area = &bytes[children_start..trailer_start];
    if child_area.len() % CHILD_LEN != 0 {
        return Err(TextrieError::corrupt(format!(
            "child list of node {} is {} bytes, not a multiple of {}",
            id,
            child_area.len(),
            CHILD_LEN
        )));
    }

    let children = child_area
        .chunks_exact(CHILD_LEN)
        .map(|entry| ChildRef {
            id: u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]),
            first: entry[4],
        })
        .collect();

    let trailer = &bytes[trailer_start..];
    let posting_count = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let mut pointer = [0u8; 8];
    pointer[..5].copy_from_slice(&trailer[4..9]);

    Ok(NodeRecord {
        id,
        label: bytes[1..children_start].to_vec(),
        children,
        posting_count,
        posting_pointer: u64::from_le_bytes(pointer),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decode `count` values, returning them with the number of bytes read
    fn decode_n(bytes: &[u8], count: usize) -> Result<(Vec<u32>, usize)> {
        let mut pos = 0;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(decode_vbyte(|| {
                let byte = bytes
                    .get(pos)
                    .copied()
                    .ok_or_else(|| TextrieError::corrupt("end of input"))?;
                pos += 1;
                Ok(byte)
            })?);
        }
        Ok((values, pos))
    }

    #[test]
    fn test_vbyte_encoding() {
        let values = [0, 127, 128, 16383, 16384, u32::MAX];
        let mut output = Vec::new();
        for value in values {
            encode_vbyte(value, &mut output);
        }
        assert_eq!(&output[..4], &[0x80, 0xFF, 0x00, 0x81]);
        assert_eq!(output.len(), 14);

        let (decoded, used) = decode_n(&output, values.len()).unwrap();
        assert_eq!(decoded, values.to_vec());
        assert_eq!(used, output.len());
    }

    #[test]
    fn test_vbyte_malformed() {
        assert!(decode_n(&[0x01, 0x02], 1).unwrap_err().is_corruption());
        assert!(decode_n(&[0x01; 6], 1).unwrap_err().is_corruption());
    }

    #[test]
    fn test_node_record_layout() {
        let children = vec![
            ChildRef { id: 4, first: b'a' },
            ChildRef { id: 9, first: b'A' },
        ];
        let mut bytes = Vec::new();
        encode_node(b"ca", &children, 3, 0x01_0203_0405, &mut bytes).unwrap();

        assert_eq!(bytes.len(), 1 + 2 + 2 * CHILD_LEN + TRAILER_LEN);
        assert_eq!(bytes[0], 2);
        assert_eq!(&bytes[1..3], b"ca");
        assert_eq!(&bytes[3..7], &4u32.to_le_bytes());
        assert_eq!(bytes[7], b'a');

        let node = decode_node(5, &bytes).unwrap();
        assert_eq!(node.id, 5);
        assert_eq!(node.label, b"ca".to_vec());
        assert_eq!(node.children, children);
        assert_eq!(node.posting_count, 3);
        assert_eq!(node.posting_pointer, 0x01_0203_0405);
        assert!(node.is_inner());
        assert!(node.holds_token());
    }

    #[test]
    fn test_root_with_empty_label() {
        let mut bytes = Vec::new();
        encode_node(b"", &[ChildRef { id: 1, first: b'x' }], 0, 0, &mut bytes).unwrap();
        let root = decode_node(ROOT, &bytes).unwrap();
        assert!(root.label.is_empty());
        assert!(!root.holds_token());

        assert!(decode_node(3, &bytes).unwrap_err().is_corruption());
    }

    #[test]
    fn test_malformed_records() {
        assert!(decode_node(1, &[0u8; 9]).unwrap_err().is_corruption());

        // label length claims more bytes than the record holds
        let mut bytes = vec![20u8];
        bytes.extend_from_slice(&[0u8; 12]);
        assert!(decode_node(1, &bytes).unwrap_err().is_corruption());

        // child area of 3 bytes
        let mut bytes = vec![1u8, b'q', 0, 0, 0];
        bytes.extend_from_slice(&[0u8; TRAILER_LEN]);
        assert!(decode_node(1, &bytes).unwrap_err().is_corruption());
    }

    #[test]
    fn test_encode_limits() {
        let long = vec![b'x'; MAX_LABEL_LEN + 1];
        assert!(encode_node(&long, &[], 0, 0, &mut Vec::new()).is_err());
        assert!(encode_node(b"x", &[], 1, MAX_POSTING_POINTER + 1, &mut Vec::new()).is_err());
    }
}
