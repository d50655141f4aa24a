//! On disk sorted index of one sample : chunk files, index of chunk indexes, table of contents.
//!
//! A sample directory contains :
//!  - chunk-00000.kmc, chunk-00001.kmc ... sorted chunk files
//!  - chunk.index : binary list of (chunk number, last key in chunk)
//!  - table.json : chunk file names and last keys, human readable
//!  - statistics.json : per sample weight statistics, see [crate::similarity::statistics]

pub mod builder;
pub mod chunk;
pub mod entry;
pub mod filter;
pub mod reader;
pub mod writer;

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KmerSimError, Result};
use crate::seq::{codec::packed_size, KmerKey};

pub use builder::SampleIndexBuilder;
pub use entry::IndexEntry;
pub use filter::{FilterAlgorithm, KmerFilterStats};
pub use reader::SampleIndexReader;
pub use writer::SampleIndexWriter;

pub const CHUNK_INDEX_NAME: &str = "chunk.index";
pub const TABLE_NAME: &str = "table.json";
const CHUNK_INDEX_MAGIC: &[u8; 4] = b"KMCI";
const CHUNK_INDEX_VERSION: u8 = 1;

/// name of chunk file number num
pub fn chunk_file_name(num: usize) -> String {
    format!("chunk-{:05}.kmc", num)
}

/// inverse of [chunk_file_name]
pub fn parse_chunk_file_name(name: &str) -> Option<usize> {
    name.strip_prefix("chunk-")?.strip_suffix(".kmc")?.parse::<usize>().ok()
}

/// Why a reader stopped returning entries. This is not an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamEnd {
    /// next key is beyond the upper bound of the partition
    PartitionBound,
    /// all chunks consumed
    EndOfIndex,
}

/// routes a key to its chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkIndexRecord {
    pub chunk_num: u32,
    pub last_key: KmerKey,
}

/// writes the index of chunk indexes
pub fn dump_chunk_index(dir: &Path, kmer_size: usize, records: &[ChunkIndexRecord]) -> Result<()> {
    let filepath = dir.join(CHUNK_INDEX_NAME);
    let file = OpenOptions::new().write(true).create_new(true).open(&filepath)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(CHUNK_INDEX_MAGIC)?;
    writer.write_all(&[CHUNK_INDEX_VERSION, kmer_size as u8, 0, 0])?;
    writer.write_all(&(records.len() as u32).to_be_bytes())?;
    for record in records {
        writer.write_all(&record.chunk_num.to_be_bytes())?;
        writer.write_all(record.last_key.get_packed())?;
    }
    writer.flush()?;
    log::debug!("dumped chunk index {:?}, nb chunks : {}", filepath, records.len());
    Ok(())
} // end of dump_chunk_index

/// reloads the index of chunk indexes, returns kmer size and records
pub fn reload_chunk_index(dir: &Path) -> Result<(usize, Vec<ChunkIndexRecord>)> {
    let filepath = dir.join(CHUNK_INDEX_NAME);
    let file = OpenOptions::new().read(true).open(&filepath)?;
    let mut reader = BufReader::new(file);
    let corrupt = |e: std::io::Error| KmerSimError::from_chunk_read(e, "chunk index");
    let mut header = [0u8; 12];
    reader.read_exact(&mut header).map_err(corrupt)?;
    if &header[0..4] != CHUNK_INDEX_MAGIC || header[4] != CHUNK_INDEX_VERSION {
        return Err(KmerSimError::CorruptIndex(format!("bad header in {:?}", filepath)));
    }
    let kmer_size = header[5] as usize;
    crate::seq::check_kmer_size(kmer_size).map_err(|_| KmerSimError::CorruptIndex(format!("bad kmer size in {:?}", filepath)))?;
    let nb_records = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
    let mut records = Vec::with_capacity(nb_records);
    for _ in 0..nb_records {
        let mut num = [0u8; 4];
        reader.read_exact(&mut num).map_err(corrupt)?;
        let mut packed = vec![0u8; packed_size(kmer_size)];
        reader.read_exact(&mut packed).map_err(corrupt)?;
        records.push(ChunkIndexRecord {
            chunk_num: u32::from_be_bytes(num),
            last_key: KmerKey::from_packed(packed, kmer_size)?,
        });
    }
    let mut extra = [0u8; 1];
    if reader.read(&mut extra)? != 0 {
        return Err(KmerSimError::CorruptIndex(format!("trailing bytes in {:?}", filepath)));
    }
    Ok((kmer_size, records))
} // end of reload_chunk_index

//=======================================================================================

/// one chunk in table of contents
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkTableRecord {
    pub data_file: String,
    pub last_kmer: String,
    pub nb_entries: u64,
}

/// Human readable table of contents of a sample index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexTable {
    pub name: String,
    pub kmer_size: usize,
    pub chunks: Vec<ChunkTableRecord>,
    pub last_keys: Vec<String>,
}

impl IndexTable {
    pub fn get_nb_entries(&self) -> u64 {
        self.chunks.iter().map(|c| c.nb_entries).sum()
    }

    pub fn dump_json(&self, dirpath: &Path) -> Result<()> {
        let filepath = dirpath.join(TABLE_NAME);
        log::debug!("dumping index table in json file : {:?}", filepath);
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(&filepath)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn reload_json(dirpath: &Path) -> Result<Self> {
        let filepath = dirpath.join(TABLE_NAME);
        let file = OpenOptions::new().read(true).open(&filepath)?;
        let table: IndexTable = serde_json::from_reader(BufReader::new(file))?;
        Ok(table)
    }
} // end of impl IndexTable

/// list of chunk files present in dir, sorted by chunk number
pub fn discover_chunk_files(dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(num) = entry.file_name().to_str().and_then(parse_chunk_file_name) {
            found.push((num, entry.path()));
        }
    }
    found.sort_unstable_by_key(|(num, _)| *num);
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_names() {
        assert_eq!(chunk_file_name(12), "chunk-00012.kmc");
        assert_eq!(parse_chunk_file_name("chunk-00012.kmc"), Some(12));
        assert_eq!(parse_chunk_file_name("chunk.index"), None);
        assert_eq!(parse_chunk_file_name("chunk-ab.kmc"), None);
    }

    #[test]
    fn chunk_index_reload() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            ChunkIndexRecord { chunk_num: 0, last_key: KmerKey::from_sequence(b"ACGTA").unwrap() },
            ChunkIndexRecord { chunk_num: 1, last_key: KmerKey::from_sequence(b"GGTTA").unwrap() },
        ];
        dump_chunk_index(dir.path(), 5, &records).unwrap();
        let (k, reloaded) = reload_chunk_index(dir.path()).unwrap();
        assert_eq!(k, 5);
        assert_eq!(reloaded, records);
        // write once
        assert!(dump_chunk_index(dir.path(), 5, &records).is_err());
    }
} // end of mod tests
