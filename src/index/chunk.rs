//! A chunk file : one sorted, immutable segment of a sample index.
//!
//! Layout :
//!  - header : magic "KMSC", format version, kmer size, 2 reserved bytes
//!  - entries in ascending key order (see [entry](super::entry))
//!  - sparse index : key and file offset of every SPARSE_STEP-th entry
//!  - footer : offset of sparse index (u64), number of sparse records (u32),
//!    number of entries (u64), magic "KMSE"
//!
//! The sparse index makes in-chunk seek a binary search followed by a scan of at most SPARSE_STEP entries.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{KmerSimError, Result};
use crate::seq::{codec::packed_size, KmerKey};

use super::entry::{read_entry, write_entry, EntryScratch, IndexEntry};

const CHUNK_MAGIC: &[u8; 4] = b"KMSC";
const CHUNK_END_MAGIC: &[u8; 4] = b"KMSE";
const CHUNK_VERSION: u8 = 1;
const HEADER_SIZE: u64 = 8;
const FOOTER_SIZE: u64 = 24;

/// one sparse index record every SPARSE_STEP entries
pub const SPARSE_STEP: u64 = 128;

/// What a finished chunk contains.
#[derive(Clone, Debug)]
pub struct ChunkSummary {
    pub path: PathBuf,
    pub nb_entries: u64,
    pub first_key: Option<KmerKey>,
    pub last_key: Option<KmerKey>,
}

/// Writes entries, in strictly ascending key order, into a new chunk file.
pub struct ChunkWriter {
    path: PathBuf,
    kmer_size: usize,
    writer: BufWriter<File>,
    offset: u64,
    nb_entries: u64,
    sparse: Vec<(KmerKey, u64)>,
    first_key: Option<KmerKey>,
    last_key: Option<KmerKey>,
    scratch: EntryScratch,
}

impl ChunkWriter {
    pub fn create(path: &Path, kmer_size: usize) -> Result<Self> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(CHUNK_MAGIC)?;
        writer.write_all(&[CHUNK_VERSION, kmer_size as u8, 0, 0])?;
        log::trace!("created chunk {:?}", path);
        Ok(ChunkWriter {
            path: path.to_path_buf(),
            kmer_size,
            writer,
            offset: HEADER_SIZE,
            nb_entries: 0,
            sparse: Vec::new(),
            first_key: None,
            last_key: None,
            scratch: EntryScratch::new(),
        })
    } // end of create

    pub fn get_nb_entries(&self) -> u64 {
        self.nb_entries
    }

    pub fn append(&mut self, entry: &IndexEntry) -> Result<()> {
        if entry.key.get_nb_base() != self.kmer_size {
            return Err(KmerSimError::CorruptIndex(format!(
                "key {} has not the chunk kmer size {}",
                entry.key, self.kmer_size
            )));
        }
        if let Some(last) = &self.last_key {
            if entry.key <= *last {
                return Err(KmerSimError::CorruptIndex(format!(
                    "key {} appended after {} in chunk {:?}",
                    entry.key, last, self.path
                )));
            }
        }
        if self.nb_entries % SPARSE_STEP == 0 {
            self.sparse.push((entry.key.clone(), self.offset));
        }
        let written = write_entry(&mut self.writer, entry, &mut self.scratch)?;
        self.offset += written as u64;
        self.nb_entries += 1;
        if self.first_key.is_none() {
            self.first_key = Some(entry.key.clone());
        }
        self.last_key = Some(entry.key.clone());
        Ok(())
    } // end of append

    /// writes sparse index and footer, flushes
    pub fn finish(mut self) -> Result<ChunkSummary> {
        let sparse_offset = self.offset;
        for (key, offset) in &self.sparse {
            self.writer.write_all(key.get_packed())?;
            self.writer.write_all(&offset.to_be_bytes())?;
        }
        self.writer.write_all(&sparse_offset.to_be_bytes())?;
        self.writer.write_all(&(self.sparse.len() as u32).to_be_bytes())?;
        self.writer.write_all(&self.nb_entries.to_be_bytes())?;
        self.writer.write_all(CHUNK_END_MAGIC)?;
        self.writer.flush()?;
        log::debug!("chunk {:?} closed, nb entries : {}", self.path, self.nb_entries);
        Ok(ChunkSummary {
            path: self.path,
            nb_entries: self.nb_entries,
            first_key: self.first_key,
            last_key: self.last_key,
        })
    } // end of finish
} // end of impl ChunkWriter

//=====================================================================================

/// Sequential and seekable reading of a chunk file.
pub struct ChunkReader {
    path: PathBuf,
    kmer_size: usize,
    reader: BufReader<File>,
    nb_entries: u64,
    sparse: Vec<(KmerKey, u64)>,
    // rank of next entry to decode from file
    next_rank: u64,
    // entry decoded by seek and not yet returned
    pending: Option<IndexEntry>,
    scratch: EntryScratch,
}

fn read_array<const N: usize, R: Read>(reader: &mut R, what: &str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| KmerSimError::from_chunk_read(e, what))?;
    Ok(buf)
}

impl ChunkReader {
    /// opens chunk, checks header and footer and loads the sparse index
    pub fn open(path: &Path, kmer_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let file_len = file.metadata()?.len();
        if file_len < HEADER_SIZE + FOOTER_SIZE {
            return Err(KmerSimError::CorruptIndex(format!("chunk {:?} truncated, length {}", path, file_len)));
        }
        let mut reader = BufReader::new(file);
        let header: [u8; 8] = read_array(&mut reader, "chunk header")?;
        if &header[0..4] != CHUNK_MAGIC || header[4] != CHUNK_VERSION {
            return Err(KmerSimError::CorruptIndex(format!("bad chunk header in {:?}", path)));
        }
        if header[5] as usize != kmer_size {
            return Err(KmerSimError::CorruptIndex(format!(
                "chunk {:?} has kmer size {}, expected {}",
                path, header[5], kmer_size
            )));
        }
        //
        reader.seek(SeekFrom::Start(file_len - FOOTER_SIZE))?;
        let sparse_offset = u64::from_be_bytes(read_array(&mut reader, "chunk footer")?);
        let nb_sparse = u32::from_be_bytes(read_array(&mut reader, "chunk footer")?) as u64;
        let nb_entries = u64::from_be_bytes(read_array(&mut reader, "chunk footer")?);
        let end_magic: [u8; 4] = read_array(&mut reader, "chunk footer")?;
        if &end_magic != CHUNK_END_MAGIC {
            return Err(KmerSimError::CorruptIndex(format!("bad chunk footer in {:?}", path)));
        }
        let sparse_record_size = packed_size(kmer_size) as u64 + 8;
        if sparse_offset < HEADER_SIZE
            || sparse_offset + nb_sparse * sparse_record_size + FOOTER_SIZE != file_len
            || nb_sparse != (nb_entries + SPARSE_STEP - 1) / SPARSE_STEP
        {
            return Err(KmerSimError::CorruptIndex(format!("inconsistent chunk footer in {:?}", path)));
        }
        //
        reader.seek(SeekFrom::Start(sparse_offset))?;
        let mut sparse = Vec::with_capacity(nb_sparse as usize);
        for _ in 0..nb_sparse {
            let mut packed = vec![0u8; packed_size(kmer_size)];
            reader
                .read_exact(&mut packed)
                .map_err(|e| KmerSimError::from_chunk_read(e, "sparse index"))?;
            let offset = u64::from_be_bytes(read_array(&mut reader, "sparse index")?);
            if offset >= sparse_offset {
                return Err(KmerSimError::CorruptIndex(format!("sparse offset out of range in {:?}", path)));
            }
            sparse.push((KmerKey::from_packed(packed, kmer_size)?, offset));
        }
        reader.seek(SeekFrom::Start(HEADER_SIZE))?;
        log::trace!("opened chunk {:?}, nb entries {}, nb sparse {}", path, nb_entries, nb_sparse);
        Ok(ChunkReader {
            path: path.to_path_buf(),
            kmer_size,
            reader,
            nb_entries,
            sparse,
            next_rank: 0,
            pending: None,
            scratch: EntryScratch::new(),
        })
    } // end of open

    pub fn get_nb_entries(&self) -> u64 {
        self.nb_entries
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    /// smallest key of the chunk, None for an empty chunk
    pub fn get_first_key(&self) -> Option<&KmerKey> {
        self.sparse.first().map(|(k, _)| k)
    }

    /// positions the reader on the first entry with key >= key. Returns true if that entry has exactly key.
    pub fn seek(&mut self, key: &KmerKey) -> Result<bool> {
        self.pending = None;
        // last sparse record with key <= sought key
        let block = self.sparse.partition_point(|(k, _)| k <= key).saturating_sub(1);
        match self.sparse.get(block) {
            Some((_, offset)) => {
                self.reader.seek(SeekFrom::Start(*offset))?;
                self.next_rank = block as u64 * SPARSE_STEP;
            }
            None => {
                self.next_rank = self.nb_entries;
                return Ok(false);
            }
        }
        while let Some(entry) = self.read_next()? {
            if entry.key >= *key {
                let exact = entry.key == *key;
                self.pending = Some(entry);
                return Ok(exact);
            }
        }
        Ok(false)
    } // end of seek

    fn read_next(&mut self) -> Result<Option<IndexEntry>> {
        if self.next_rank >= self.nb_entries {
            return Ok(None);
        }
        let entry = read_entry(&mut self.reader, self.kmer_size, &mut self.scratch)?;
        self.next_rank += 1;
        Ok(Some(entry))
    }

    pub fn next_entry(&mut self) -> Result<Option<IndexEntry>> {
        match self.pending.take() {
            Some(entry) => Ok(Some(entry)),
            None => self.read_next(),
        }
    }

    /// appends at most max_entries entries to buffer, returns the number appended
    pub fn fill_buffer(&mut self, buffer: &mut VecDeque<IndexEntry>, max_entries: usize) -> Result<usize> {
        let mut nb_read = 0;
        while nb_read < max_entries {
            match self.next_entry()? {
                Some(entry) => {
                    buffer.push_back(entry);
                    nb_read += 1;
                }
                None => break,
            }
        }
        Ok(nb_read)
    } // end of fill_buffer
} // end of impl ChunkReader

//=====================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn write_chunk(path: &Path, k: usize, ordinals: &[u64]) -> ChunkSummary {
        let mut writer = ChunkWriter::create(path, k).unwrap();
        for (i, ord) in ordinals.iter().enumerate() {
            writer.append(&IndexEntry::new(KmerKey::from_ordinal(*ord, k), i as u64 + 1)).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn chunk_sequential_read() {
        log_init_test();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk-00000.kmc");
        let ordinals: Vec<u64> = (0..1000u64).map(|i| 3 * i + 1).collect();
        let summary = write_chunk(&path, 8, &ordinals);
        assert_eq!(summary.nb_entries, 1000);
        assert_eq!(summary.last_key.unwrap().to_ordinal(), 2998);
        //
        let mut reader = ChunkReader::open(&path, 8).unwrap();
        assert_eq!(reader.get_nb_entries(), 1000);
        assert_eq!(reader.get_first_key().unwrap().to_ordinal(), 1);
        let mut nb = 0;
        while let Some(entry) = reader.next_entry().unwrap() {
            assert_eq!(entry.key.to_ordinal(), ordinals[nb]);
            assert_eq!(entry.value, nb as u64 + 1);
            nb += 1;
        }
        assert_eq!(nb, 1000);
    }

    #[test]
    fn chunk_seek() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk-00000.kmc");
        let ordinals: Vec<u64> = (0..700u64).map(|i| 2 * i + 10).collect();
        write_chunk(&path, 6, &ordinals);
        let mut reader = ChunkReader::open(&path, 6).unwrap();
        // exact
        assert!(reader.seek(&KmerKey::from_ordinal(500, 6)).unwrap());
        assert_eq!(reader.next_entry().unwrap().unwrap().key.to_ordinal(), 500);
        assert_eq!(reader.next_entry().unwrap().unwrap().key.to_ordinal(), 502);
        // between keys, going backward
        assert!(!reader.seek(&KmerKey::from_ordinal(257, 6)).unwrap());
        assert_eq!(reader.next_entry().unwrap().unwrap().key.to_ordinal(), 258);
        // before first
        assert!(!reader.seek(&KmerKey::from_ordinal(0, 6)).unwrap());
        assert_eq!(reader.next_entry().unwrap().unwrap().key.to_ordinal(), 10);
        // after last
        assert!(!reader.seek(&KmerKey::from_ordinal(4000, 6)).unwrap());
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn chunk_rejects_unordered_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk-00000.kmc");
        let mut writer = ChunkWriter::create(&path, 4).unwrap();
        writer.append(&IndexEntry::new(KmerKey::from_sequence(b"ACGT").unwrap(), 1)).unwrap();
        let res = writer.append(&IndexEntry::new(KmerKey::from_sequence(b"AAAA").unwrap(), 1));
        assert!(matches!(res, Err(KmerSimError::CorruptIndex(_))));
        let res = writer.append(&IndexEntry::new(KmerKey::from_sequence(b"ACGT").unwrap(), 1));
        assert!(matches!(res, Err(KmerSimError::CorruptIndex(_))));
    }

    #[test]
    fn truncated_chunk_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk-00000.kmc");
        let ordinals: Vec<u64> = (0..50u64).collect();
        write_chunk(&path, 5, &ordinals);
        let len = std::fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 10).unwrap();
        drop(file);
        assert!(matches!(ChunkReader::open(&path, 5), Err(KmerSimError::CorruptIndex(_))));
    }
} // end of mod tests
