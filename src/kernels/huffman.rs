//! This module contains the Huffman table used by the compressed array envelopes.
//!
//! A table is built per array: every value is counted with `add_entry`, then
//! `compute_tags` merges the two least frequent nodes until one root is left and
//! assigns each leaf the path to it as its tag (left = 0, right = 1). Ties are
//! broken by stable sort order, so the same input always yields the same table.
//!
//! The decoder never repeats the frequency analysis. It rebuilds the table from
//! the serialized `(tag, tag_length, value)` triples written by `write_dict`,
//! which makes decoding independent of construction order.

use std::collections::VecDeque;
use std::io::Cursor;

use hashbrown::HashMap;

use crate::error::FieldPackError;
use crate::kernels::bitstream::{BitPacker, BitUnpacker};
use crate::kernels::range::compute_bits;
use crate::utils::{read_bytes, read_len, read_u8, write_len};

/// Largest tag length the 5-bit length field can carry.
pub const MAX_TAG_LENGTH: u32 = 31;

/// Width of the per-entry tag-length field in the dictionary.
const TAG_LENGTH_BITS: u32 = 5;

//==================================================================================
// 1. Types
//==================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanEntry {
    pub value: i32,
    pub frequency: u64,
    pub tag: u32,
    pub tag_length: u32,
}

/// A tree node used only while computing tags.
struct Node {
    frequency: u64,
    leaf: Option<usize>,
    children: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Default)]
pub struct HuffmanTable {
    entries: Vec<HuffmanEntry>,
    index: HashMap<i32, usize>,
    max_tag_length: u32,
    data_length: u32,
    /// Decode lookup, `lookup[tag_length - 1][tag] -> value`.
    lookup: Vec<HashMap<u32, i32>>,
}

//==================================================================================
// 2. Construction
//==================================================================================

/// Takes the least frequent node from the two queues. On a tie the leaf wins,
/// which places a new parent after every node of equal frequency.
fn pop_lowest(
    leaves: &mut VecDeque<usize>,
    parents: &mut VecDeque<usize>,
    nodes: &[Node],
) -> Option<usize> {
    match (leaves.front(), parents.front()) {
        (Some(&leaf), Some(&parent)) => {
            if nodes[leaf].frequency <= nodes[parent].frequency {
                leaves.pop_front()
            } else {
                parents.pop_front()
            }
        }
        (Some(_), None) => leaves.pop_front(),
        (None, _) => parents.pop_front(),
    }
}

impl HuffmanTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one occurrence of `value`.
    pub fn add_entry(&mut self, value: i32) {
        match self.index.get(&value) {
            Some(&i) => self.entries[i].frequency += 1,
            None => {
                self.index.insert(value, self.entries.len());
                self.entries.push(HuffmanEntry {
                    value,
                    frequency: 1,
                    tag: 0,
                    tag_length: 0,
                });
            }
        }
    }

    pub fn add_all(&mut self, values: &[i32]) {
        for &v in values {
            self.add_entry(v);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HuffmanEntry] {
        &self.entries
    }

    pub fn max_tag_length(&self) -> u32 {
        self.max_tag_length
    }

    /// Bit width used for each value in the serialized dictionary.
    pub fn data_length(&self) -> u32 {
        self.data_length
    }

    /// Returns `(tag, tag_length)` for a value, if it is in the table.
    pub fn tag_for(&self, value: i32) -> Option<(u32, u32)> {
        self.index
            .get(&value)
            .map(|&i| (self.entries[i].tag, self.entries[i].tag_length))
    }

    /// Builds the tree and assigns tags to every entry.
    pub fn compute_tags(&mut self) -> Result<(), FieldPackError> {
        self.data_length = self
            .entries
            .iter()
            .map(|e| compute_bits(e.value as u32 as i64))
            .max()
            .unwrap_or(1);
        self.max_tag_length = 0;

        match self.entries.len() {
            0 => {}
            1 => {
                // A lone value still needs a one-bit tag to be countable.
                self.entries[0].tag = 0;
                self.entries[0].tag_length = 1;
                self.max_tag_length = 1;
            }
            _ => self.assign_from_tree()?,
        }
        self.build_lookup()
    }

    fn assign_from_tree(&mut self) -> Result<(), FieldPackError> {
        let mut nodes: Vec<Node> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| Node {
                frequency: e.frequency,
                leaf: Some(i),
                children: None,
            })
            .collect();

        // Ascending by frequency; stable, so equal counts keep insertion order.
        let mut sorted: Vec<usize> = (0..nodes.len()).collect();
        sorted.sort_by_key(|&id| nodes[id].frequency);
        let mut leaves: VecDeque<usize> = sorted.into();
        // Parents are created in non-decreasing frequency order.
        let mut parents: VecDeque<usize> = VecDeque::new();

        while leaves.len() + parents.len() > 1 {
            let (left, right) = match (
                pop_lowest(&mut leaves, &mut parents, &nodes),
                pop_lowest(&mut leaves, &mut parents, &nodes),
            ) {
                (Some(left), Some(right)) => (left, right),
                _ => {
                    return Err(FieldPackError::InternalError(
                        "huffman merge ran out of nodes".to_string(),
                    ))
                }
            };
            let frequency = nodes[left].frequency + nodes[right].frequency;
            parents.push_back(nodes.len());
            nodes.push(Node {
                frequency,
                leaf: None,
                children: Some((left, right)),
            });
        }

        let root = match leaves.front().or(parents.front()) {
            Some(&root) => root,
            None => return Ok(()),
        };
        let mut stack = vec![(root, 0u32, 0u32)];
        while let Some((id, tag, depth)) = stack.pop() {
            match (nodes[id].leaf, nodes[id].children) {
                (Some(entry), _) => {
                    if depth > MAX_TAG_LENGTH {
                        return Err(FieldPackError::TagTooLong(depth));
                    }
                    self.entries[entry].tag = tag;
                    self.entries[entry].tag_length = depth;
                    self.max_tag_length = self.max_tag_length.max(depth);
                }
                (None, Some((left, right))) => {
                    if depth >= MAX_TAG_LENGTH {
                        return Err(FieldPackError::TagTooLong(depth + 1));
                    }
                    stack.push((right, (tag << 1) | 1, depth + 1));
                    stack.push((left, tag << 1, depth + 1));
                }
                (None, None) => {
                    return Err(FieldPackError::InternalError(
                        "huffman node with neither leaf nor children".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    fn build_lookup(&mut self) -> Result<(), FieldPackError> {
        let mut lookup: Vec<HashMap<u32, i32>> =
            (0..self.max_tag_length).map(|_| HashMap::new()).collect();
        for e in &self.entries {
            if e.tag_length == 0 || e.tag_length > self.max_tag_length {
                return Err(FieldPackError::CorruptStream(format!(
                    "tag length {} outside 1..={}",
                    e.tag_length, self.max_tag_length
                )));
            }
            if lookup[e.tag_length as usize - 1].insert(e.tag, e.value).is_some() {
                return Err(FieldPackError::CorruptStream(format!(
                    "duplicate huffman tag {:#b}/{}",
                    e.tag, e.tag_length
                )));
            }
        }
        self.lookup = lookup;
        Ok(())
    }

    //==============================================================================
    // 3. Dictionary I/O
    //==============================================================================

    /// Size in bits of the packed dictionary body.
    fn dict_bits(&self) -> usize {
        self.entries.len()
            * (self.max_tag_length + TAG_LENGTH_BITS + self.data_length) as usize
    }

    /// Serializes the table. Returns the number of bytes written.
    pub fn write_dict(&self, output_buf: &mut Vec<u8>) -> Result<usize, FieldPackError> {
        let start = output_buf.len();
        write_len(output_buf, self.entries.len())?;
        output_buf.push(self.max_tag_length as u8);
        output_buf.push(self.data_length as u8);

        let mut packer = BitPacker::with_capacity(self.dict_bits().div_ceil(8));
        for e in &self.entries {
            packer.pack(e.tag as i64, self.max_tag_length)?;
            packer.pack(e.tag_length as i64, TAG_LENGTH_BITS)?;
            packer.pack(e.value as i64, self.data_length)?;
        }
        let packed = packer.into_bytes();
        write_len(output_buf, packed.len())?;
        output_buf.extend_from_slice(&packed);
        Ok(output_buf.len() - start)
    }

    /// Rebuilds a table written by `write_dict`.
    pub fn read_dict(cursor: &mut Cursor<&[u8]>) -> Result<Self, FieldPackError> {
        let count = read_len(cursor, "huffman entry count")?;
        let max_tag_length = read_u8(cursor, "huffman max tag length")? as u32;
        let data_length = read_u8(cursor, "huffman data length")? as u32;
        if max_tag_length > MAX_TAG_LENGTH || data_length > 32 {
            return Err(FieldPackError::CorruptStream(format!(
                "huffman dictionary widths tag={} data={} out of range",
                max_tag_length, data_length
            )));
        }
        let packed_len = read_len(cursor, "huffman dictionary length")?;
        let packed = read_bytes(cursor, packed_len, "huffman dictionary")?;

        let entry_bits = (max_tag_length + TAG_LENGTH_BITS + data_length) as usize;
        if count.saturating_mul(entry_bits) > packed.len() * 8 {
            return Err(FieldPackError::truncated("huffman dictionary entries"));
        }

        let mut table = HuffmanTable {
            max_tag_length,
            data_length,
            ..Default::default()
        };
        let mut unpacker = BitUnpacker::new(packed);
        for _ in 0..count {
            let tag = unpacker.unpack_unsigned(max_tag_length)?;
            let tag_length = unpacker.unpack_unsigned(TAG_LENGTH_BITS)?;
            let value = unpacker.unpack_unsigned(data_length)? as i32;
            if tag_length < 32 && tag >> tag_length != 0 {
                return Err(FieldPackError::CorruptStream(format!(
                    "huffman tag {:#b} wider than its length {}",
                    tag, tag_length
                )));
            }
            table.index.insert(value, table.entries.len());
            table.entries.push(HuffmanEntry {
                value,
                frequency: 0,
                tag,
                tag_length,
            });
        }
        table.build_lookup()?;
        Ok(table)
    }

    //==============================================================================
    // 4. Tag Stream
    //==============================================================================

    /// Number of bits `encode_values` will produce for `values`.
    pub fn stream_bits(&self, values: &[i32]) -> Result<usize, FieldPackError> {
        values.iter().try_fold(0usize, |acc, &v| {
            let (_, len) = self.tag_for(v).ok_or_else(|| Self::missing(v))?;
            Ok(acc + len as usize)
        })
    }

    fn missing(value: i32) -> FieldPackError {
        FieldPackError::InternalError(format!("value {} has no huffman tag", value))
    }

    /// Writes the tag of each value, returning the packed tag bytes.
    pub fn encode_values(&self, values: &[i32]) -> Result<Vec<u8>, FieldPackError> {
        let mut packer = BitPacker::with_capacity(self.stream_bits(values)?.div_ceil(8));
        for &v in values {
            let (tag, len) = self.tag_for(v).ok_or_else(|| Self::missing(v))?;
            packer.pack(tag as i64, len)?;
        }
        Ok(packer.into_bytes())
    }

    /// Decodes `count` values from a tag stream.
    pub fn decode(&self, tag_bytes: &[u8], count: usize) -> Result<Vec<i32>, FieldPackError> {
        let mut out = Vec::with_capacity(count.min(tag_bytes.len() * 8));
        let mut unpacker = BitUnpacker::new(tag_bytes);
        while out.len() < count {
            let mut tag = 0u32;
            let mut length = 0u32;
            loop {
                if length == self.max_tag_length {
                    return Err(FieldPackError::CorruptStream(format!(
                        "no huffman tag matches within {} bits at element {}",
                        self.max_tag_length,
                        out.len()
                    )));
                }
                if unpacker.remaining() == 0 {
                    return Err(FieldPackError::CorruptStream(format!(
                        "huffman tag stream ended after {} of {} elements",
                        out.len(),
                        count
                    )));
                }
                tag = (tag << 1) | unpacker.unpack_unsigned(1)?;
                length += 1;
                if let Some(&value) = self.lookup[length as usize - 1].get(&tag) {
                    out.push(value);
                    break;
                }
            }
        }
        Ok(out)
    }
}

//==================================================================================
// 5. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(values: &[i32]) -> (HuffmanTable, Vec<i32>) {
        let mut table = HuffmanTable::new();
        table.add_all(values);
        table.compute_tags().unwrap();

        let mut dict = Vec::new();
        table.write_dict(&mut dict).unwrap();
        let tags = table.encode_values(values).unwrap();

        let mut cursor = Cursor::new(&dict[..]);
        let rebuilt = HuffmanTable::read_dict(&mut cursor).unwrap();
        assert_eq!(cursor.position() as usize, dict.len());
        let decoded = rebuilt.decode(&tags, values.len()).unwrap();
        (table, decoded)
    }

    #[test]
    fn test_most_frequent_value_gets_shortest_tag() {
        let values = [5, 5, 5, 2, 2, 9];
        let (table, decoded) = roundtrip(&values);
        assert_eq!(decoded, values);

        assert_eq!(table.tag_for(5), Some((0b0, 1)));
        assert_eq!(table.tag_for(9), Some((0b10, 2)));
        assert_eq!(table.tag_for(2), Some((0b11, 2)));
        assert_eq!(table.max_tag_length(), 2);
        assert_eq!(table.data_length(), 4);
        assert_eq!(table.stream_bits(&values).unwrap(), 3 + 2 * 2 + 2);
    }

    #[test]
    fn test_single_repeated_value() {
        let values = [7; 10];
        let (table, decoded) = roundtrip(&values);
        assert_eq!(decoded, values);
        assert_eq!(table.tag_for(7), Some((0, 1)));
    }

    #[test]
    fn test_all_distinct_values() {
        let values: Vec<i32> = (0..37).map(|i| i * 3).collect();
        let (table, decoded) = roundtrip(&values);
        assert_eq!(decoded, values);
        assert_eq!(table.len(), 37);
        assert!(table.max_tag_length() <= 6);
    }

    #[test]
    fn test_negative_values_use_full_width() {
        let values = [-1, -1, 4, 0];
        let (table, decoded) = roundtrip(&values);
        assert_eq!(decoded, values);
        assert_eq!(table.data_length(), 32);
    }

    #[test]
    fn test_dictionary_layout() {
        let mut table = HuffmanTable::new();
        table.add_all(&[1, 1, 0]);
        table.compute_tags().unwrap();
        let mut dict = Vec::new();
        let written = table.write_dict(&mut dict).unwrap();
        assert_eq!(written, dict.len());
        // count, max tag length, data length, packed length
        assert_eq!(&dict[..4], &[0, 0, 0, 2]);
        assert_eq!(dict[4], 1);
        assert_eq!(dict[5], 1);
        assert_eq!(&dict[6..10], &[0, 0, 0, 2]);
        // entry 1: tag 1, len 00001, value 1; entry 0: tag 0, len 00001, value 0
        assert_eq!(&dict[10..], &[0b1000_011_0, 0b0000_1000]);
    }

    #[test]
    fn test_truncated_tag_stream_is_corrupt() {
        let values = [1, 2, 3, 4, 1, 1];
        let mut table = HuffmanTable::new();
        table.add_all(&values);
        table.compute_tags().unwrap();
        let tags = table.encode_values(&values).unwrap();
        let result = table.decode(&tags, values.len() + 8);
        assert!(matches!(result, Err(FieldPackError::CorruptStream(_))));
    }

    #[test]
    fn test_unmatched_tag_is_corrupt() {
        // A table holding only the tag "0" cannot decode a run of 1 bits.
        let mut table = HuffmanTable::new();
        table.add_entry(3);
        table.compute_tags().unwrap();
        let result = table.decode(&[0xFF], 1);
        assert!(matches!(result, Err(FieldPackError::CorruptStream(_))));
    }

    #[test]
    fn test_truncated_dictionary_is_corrupt() {
        let mut table = HuffmanTable::new();
        table.add_all(&[1, 2, 2, 3]);
        table.compute_tags().unwrap();
        let mut dict = Vec::new();
        table.write_dict(&mut dict).unwrap();
        dict.pop();
        let mut cursor = Cursor::new(&dict[..]);
        assert!(matches!(
            HuffmanTable::read_dict(&mut cursor),
            Err(FieldPackError::CorruptStream(_))
        ));
    }

    #[test]
    fn test_fibonacci_frequencies_deep_tree_within_limit() {
        // Fibonacci counts produce a maximally skewed tree one level per value.
        let mut table = HuffmanTable::new();
        let (mut a, mut b) = (1u64, 1u64);
        for value in 0..34 {
            for _ in 0..a {
                table.add_entry(value);
            }
            let next = a + b;
            a = b;
            b = next;
            if a > 200_000 {
                break;
            }
        }
        // 27 values keep the depth within 31 bits.
        assert!(table.len() < 32);
        assert!(table.compute_tags().is_ok());
        assert_eq!(table.max_tag_length(), table.len() as u32 - 1);
    }

    #[test]
    fn test_fibonacci_frequencies_past_tag_limit_fail() {
        // 33 Fibonacci counts chain the tree 32 levels deep.
        let mut table = HuffmanTable::new();
        let (mut a, mut b) = (1u64, 1u64);
        for value in 0..33 {
            for _ in 0..a {
                table.add_entry(value);
            }
            let next = a + b;
            a = b;
            b = next;
        }
        assert_eq!(table.len(), 33);
        assert!(matches!(table.compute_tags(), Err(FieldPackError::TagTooLong(32))));
    }
}
