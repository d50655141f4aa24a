//! Binary layout of an index entry.
//!
//! An entry is the packed key (fixed size for a given kmer size) followed by a value block :
//!  - a flag byte. Low nibble is the width class of the count, high nibble the width class of values.
//!  - the count of values, on 1, 2 or 4 bytes.
//!  - the values, each on 1, 2, 4 or 8 bytes.
//!
//! All integers are big endian. A sample index stores exactly one value (the frequency) per entry.

use std::io::{Read, Write};

use crate::error::{KmerSimError, Result};
use crate::seq::{codec::packed_size, KmerKey};

/// width in bytes of the 4 width classes
const CLASS_WIDTH: [usize; 4] = [1, 2, 4, 8];

/// A key and its frequency in one sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: KmerKey,
    pub value: u64,
}

impl IndexEntry {
    pub fn new(key: KmerKey, value: u64) -> Self {
        IndexEntry { key, value }
    }
}

/// smallest width class able to store v
#[inline]
fn width_class(v: u64) -> u8 {
    if v <= u8::MAX as u64 {
        0
    } else if v <= u16::MAX as u64 {
        1
    } else if v <= u32::MAX as u64 {
        2
    } else {
        3
    }
}

fn put_uint(out: &mut Vec<u8>, v: u64, class: u8) {
    let width = CLASS_WIDTH[class as usize];
    out.extend_from_slice(&v.to_be_bytes()[8 - width..]);
}

fn get_uint<R: Read>(reader: &mut R, class: u8) -> Result<u64> {
    let width = CLASS_WIDTH[class as usize];
    let mut buf = [0u8; 8];
    reader
        .read_exact(&mut buf[8 - width..])
        .map_err(|e| KmerSimError::from_chunk_read(e, "value block"))?;
    Ok(u64::from_be_bytes(buf))
}

/// appends the value block of values to out
pub fn encode_value_block(values: &[u64], out: &mut Vec<u8>) -> Result<()> {
    let count = values.len() as u64;
    let count_class = width_class(count);
    if count_class > 2 {
        return Err(KmerSimError::CorruptIndex(format!("too many values in one entry : {}", count)));
    }
    let value_class = values.iter().map(|v| width_class(*v)).max().unwrap_or(0);
    out.push(count_class | (value_class << 4));
    put_uint(out, count, count_class);
    for v in values {
        put_uint(out, *v, value_class);
    }
    Ok(())
} // end of encode_value_block

/// decodes a value block into values (cleared first), returns the number of bytes consumed
pub fn decode_value_block<R: Read>(reader: &mut R, values: &mut Vec<u64>) -> Result<usize> {
    let mut flag = [0u8; 1];
    reader
        .read_exact(&mut flag)
        .map_err(|e| KmerSimError::from_chunk_read(e, "entry flag"))?;
    let count_class = flag[0] & 0x0f;
    let value_class = flag[0] >> 4;
    if count_class > 2 || value_class > 3 {
        return Err(KmerSimError::CorruptIndex(format!("bad entry flag byte {:#04x}", flag[0])));
    }
    let count = get_uint(reader, count_class)? as usize;
    values.clear();
    for _ in 0..count {
        values.push(get_uint(reader, value_class)?);
    }
    Ok(1 + CLASS_WIDTH[count_class as usize] + count * CLASS_WIDTH[value_class as usize])
} // end of decode_value_block

/// Reusable buffers for entry encoding and decoding, one per reader or writer.
#[derive(Default)]
pub struct EntryScratch {
    bytes: Vec<u8>,
    values: Vec<u64>,
}

impl EntryScratch {
    pub fn new() -> Self {
        EntryScratch::default()
    }
}

/// writes entry, returns number of bytes written
pub fn write_entry<W: Write>(writer: &mut W, entry: &IndexEntry, scratch: &mut EntryScratch) -> Result<usize> {
    scratch.bytes.clear();
    scratch.bytes.extend_from_slice(entry.key.get_packed());
    encode_value_block(&[entry.value], &mut scratch.bytes)?;
    writer.write_all(&scratch.bytes)?;
    Ok(scratch.bytes.len())
}

/// reads one entry with a key of kmer_size bases
pub fn read_entry<R: Read>(reader: &mut R, kmer_size: usize, scratch: &mut EntryScratch) -> Result<IndexEntry> {
    let mut packed = vec![0u8; packed_size(kmer_size)];
    reader
        .read_exact(&mut packed)
        .map_err(|e| KmerSimError::from_chunk_read(e, "entry key"))?;
    let key = KmerKey::from_packed(packed, kmer_size)?;
    decode_value_block(reader, &mut scratch.values)?;
    if scratch.values.len() != 1 {
        return Err(KmerSimError::CorruptIndex(format!(
            "sample entry {} has {} values, expected 1",
            key,
            scratch.values.len()
        )));
    }
    Ok(IndexEntry::new(key, scratch.values[0]))
} // end of read_entry

//====================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn flag_byte_classes() {
        let mut out = Vec::new();
        encode_value_block(&[7], &mut out).unwrap();
        assert_eq!(out, vec![0x00, 1, 7]);
        out.clear();
        encode_value_block(&[300, 2], &mut out).unwrap();
        assert_eq!(out, vec![0x10, 2, 0x01, 0x2c, 0x00, 0x02]);
        out.clear();
        encode_value_block(&[1u64 << 40], &mut out).unwrap();
        assert_eq!(out[0], 0x30);
        assert_eq!(out.len(), 1 + 1 + 8);
    }

    #[test]
    fn entry_read_back() {
        let mut scratch = EntryScratch::new();
        let mut buf = Vec::new();
        let entries = [
            IndexEntry::new(KmerKey::from_sequence(b"ACGTA").unwrap(), 1),
            IndexEntry::new(KmerKey::from_sequence(b"CCGTA").unwrap(), 70_000),
            IndexEntry::new(KmerKey::from_sequence(b"TTTTT").unwrap(), u64::MAX),
        ];
        for e in &entries {
            write_entry(&mut buf, e, &mut scratch).unwrap();
        }
        let mut cursor = Cursor::new(buf);
        for e in &entries {
            assert_eq!(&read_entry(&mut cursor, 5, &mut scratch).unwrap(), e);
        }
        // nothing left
        assert!(matches!(read_entry(&mut cursor, 5, &mut scratch), Err(KmerSimError::CorruptIndex(_))));
    }

    #[test]
    fn truncated_entry_is_corrupt() {
        let mut scratch = EntryScratch::new();
        let mut buf = Vec::new();
        write_entry(&mut buf, &IndexEntry::new(KmerKey::from_sequence(b"ACGT").unwrap(), 1000), &mut scratch).unwrap();
        buf.pop();
        let res = read_entry(&mut Cursor::new(buf), 4, &mut scratch);
        assert!(matches!(res, Err(KmerSimError::CorruptIndex(_))));
    }
} // end of mod tests
