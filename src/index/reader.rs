//! Bounded, buffered reading of a sample index.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::error::{KmerSimError, Result};
use crate::seq::KmerKey;

use super::chunk::ChunkReader;
use super::entry::IndexEntry;
use super::{chunk_file_name, discover_chunk_files, reload_chunk_index, ChunkIndexRecord, StreamEnd};

/// number of entries read ahead at each refill
pub const BUFFER_SIZE: usize = 100;

/// Reads a sample index in ascending key order, possibly restricted to a key range.
///
/// Only the index of chunk indexes is loaded at open, chunks are opened when a seek or the
/// sequential scan reaches them.
pub struct SampleIndexReader {
    dir: PathBuf,
    kmer_size: usize,
    records: Vec<ChunkIndexRecord>,
    // upper bound (included) of keys returned
    end_key: Option<KmerKey>,
    // rank and reader of the chunk being read
    current: Option<(usize, ChunkReader)>,
    buffer: VecDeque<IndexEntry>,
    // entries read past end_key, given back if the bound is moved up
    beyond_end: VecDeque<IndexEntry>,
    // last key pulled from chunks, to check ordering
    last_read: Option<KmerKey>,
    end_reason: Option<StreamEnd>,
}

impl SampleIndexReader {
    /// loads the chunk index records and checks them against the chunk files present in dir
    pub fn open(dir: &Path) -> Result<Self> {
        let (kmer_size, records) = reload_chunk_index(dir)?;
        let files = discover_chunk_files(dir)?;
        if files.len() != records.len() {
            return Err(KmerSimError::CorruptIndex(format!(
                "{:?} : chunk index has {} records but {} chunk files found",
                dir,
                records.len(),
                files.len()
            )));
        }
        for (rank, (record, (num, _))) in records.iter().zip(files.iter()).enumerate() {
            if record.chunk_num as usize != rank || *num != rank {
                return Err(KmerSimError::CorruptIndex(format!("{:?} : chunk {} missing or misnumbered", dir, rank)));
            }
        }
        if records.windows(2).any(|w| w[0].last_key >= w[1].last_key) {
            return Err(KmerSimError::CorruptIndex(format!("{:?} : chunk last keys not ascending", dir)));
        }
        log::debug!("opened index {:?}, kmer size {}, nb chunks {}", dir, kmer_size, records.len());
        Ok(SampleIndexReader {
            dir: dir.to_path_buf(),
            kmer_size,
            records,
            end_key: None,
            current: None,
            buffer: VecDeque::with_capacity(BUFFER_SIZE),
            beyond_end: VecDeque::new(),
            last_read: None,
            end_reason: None,
        })
    } // end of open

    /// opens and positions the reader on the partition [begin, end]
    pub fn open_range(dir: &Path, begin: &KmerKey, end: &KmerKey) -> Result<Self> {
        let mut reader = SampleIndexReader::open(dir)?;
        reader.set_end_key(Some(end.clone()));
        reader.seek(begin)?;
        Ok(reader)
    }

    pub fn get_kmer_size(&self) -> usize {
        self.kmer_size
    }

    pub fn get_nb_chunks(&self) -> usize {
        self.records.len()
    }

    pub fn get_dir(&self) -> &Path {
        &self.dir
    }

    /// upper bound (included) of returned keys, None for no bound.
    ///
    /// The bound can be lowered or raised at any time, reading resumes after the last entry returned.
    pub fn set_end_key(&mut self, end_key: Option<KmerKey>) {
        self.end_key = end_key;
        if self.end_reason == Some(StreamEnd::PartitionBound) {
            self.end_reason = if self.current.is_some() { None } else { Some(StreamEnd::EndOfIndex) };
        }
        self.buffer.append(&mut self.beyond_end);
        self.truncate_buffer();
    }

    /// why the reader stopped, None while entries may remain
    pub fn end_reason(&self) -> Option<StreamEnd> {
        self.end_reason
    }

    fn open_chunk(&mut self, rank: usize) -> Result<()> {
        let reuse = matches!(&self.current, Some((r, _)) if *r == rank);
        if !reuse {
            let path = self.dir.join(chunk_file_name(rank));
            let chunk = ChunkReader::open(&path, self.kmer_size)?;
            self.current = Some((rank, chunk));
        }
        Ok(())
    }

    /// positions on the first entry with key >= key. Returns true if key is present.
    pub fn seek(&mut self, key: &KmerKey) -> Result<bool> {
        self.buffer.clear();
        self.beyond_end.clear();
        self.last_read = None;
        self.end_reason = None;
        // first chunk whose last key is >= key
        let rank = self.records.partition_point(|r| r.last_key < *key);
        if rank >= self.records.len() {
            self.current = None;
            self.end_reason = Some(StreamEnd::EndOfIndex);
            return Ok(false);
        }
        self.open_chunk(rank)?;
        let exact = match self.current.as_mut() {
            Some((_, chunk)) => chunk.seek(key)?,
            None => false,
        };
        self.fill_buffer()?;
        log::trace!("seek {} in {:?}, chunk {}, exact {}", key, self.dir, rank, exact);
        Ok(exact)
    } // end of seek

    // keeps entries <= end_key in buffer, the others are set aside in front of beyond_end
    fn truncate_buffer(&mut self) {
        if let Some(end_key) = &self.end_key {
            let keep = self.buffer.partition_point(|e| e.key <= *end_key);
            if keep < self.buffer.len() {
                let mut tail = self.buffer.split_off(keep);
                tail.append(&mut self.beyond_end);
                self.beyond_end = tail;
                self.end_reason = Some(StreamEnd::PartitionBound);
            }
        }
    }

    // reads ahead up to BUFFER_SIZE entries, crossing to next chunk when current is exhausted
    fn fill_buffer(&mut self) -> Result<()> {
        if self.current.is_none() && self.end_reason.is_none() {
            if self.records.is_empty() {
                self.end_reason = Some(StreamEnd::EndOfIndex);
                return Ok(());
            }
            self.open_chunk(0)?;
        }
        let start = self.buffer.len();
        while self.end_reason.is_none() && self.buffer.len() - start < BUFFER_SIZE {
            let room = BUFFER_SIZE - (self.buffer.len() - start);
            let (rank, chunk) = match self.current.as_mut() {
                Some((rank, chunk)) => (*rank, chunk),
                None => break,
            };
            let nb_read = chunk.fill_buffer(&mut self.buffer, room)?;
            if nb_read == 0 {
                if rank + 1 < self.records.len() {
                    self.open_chunk(rank + 1)?;
                } else {
                    self.current = None;
                    self.end_reason = Some(StreamEnd::EndOfIndex);
                }
                continue;
            }
            // check order and chunk bound of what was just read
            let chunk_last = &self.records[rank].last_key;
            let new_len = self.buffer.len();
            for entry in self.buffer.range(new_len - nb_read..new_len) {
                if let Some(last) = &self.last_read {
                    if entry.key <= *last {
                        return Err(KmerSimError::CorruptIndex(format!(
                            "{:?} : key {} found after {}",
                            self.dir, entry.key, last
                        )));
                    }
                }
                if entry.key > *chunk_last {
                    return Err(KmerSimError::CorruptIndex(format!(
                        "{:?} : key {} beyond last key {} of chunk {}",
                        self.dir, entry.key, chunk_last, rank
                    )));
                }
                self.last_read = Some(entry.key.clone());
            }
            break;
        }
        // a refill can go past the partition
        self.truncate_buffer();
        Ok(())
    } // end of fill_buffer

    /// next entry in ascending key order, None at end of partition or of index
    pub fn next_entry(&mut self) -> Result<Option<IndexEntry>> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Ok(Some(entry));
            }
            if self.end_reason.is_some() {
                return Ok(None);
            }
            self.fill_buffer()?;
        }
    } // end of next_entry
} // end of impl SampleIndexReader

//=====================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::writer::SampleIndexWriter;

    fn build(dir: &Path, k: usize, ordinals: &[u64], max_per_chunk: u64) {
        let mut writer = SampleIndexWriter::create(dir, "sample", k, max_per_chunk).unwrap();
        for ord in ordinals {
            writer.append(KmerKey::from_ordinal(*ord, k), *ord % 13 + 1).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn sequential_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ordinals: Vec<u64> = (0..1234u64).map(|i| 5 * i + 3).collect();
        build(dir.path(), 7, &ordinals, 300);
        let mut reader = SampleIndexReader::open(dir.path()).unwrap();
        assert_eq!(reader.get_nb_chunks(), 5);
        let mut got = Vec::new();
        while let Some(entry) = reader.next_entry().unwrap() {
            got.push((entry.key.to_ordinal(), entry.value));
        }
        let expected: Vec<(u64, u64)> = ordinals.iter().map(|o| (*o, *o % 13 + 1)).collect();
        assert_eq!(got, expected);
        assert_eq!(reader.end_reason(), Some(StreamEnd::EndOfIndex));
    }

    #[test]
    fn seek_then_next_gives_smallest_key_above() {
        let dir = tempfile::tempdir().unwrap();
        let ordinals: Vec<u64> = (0..1000u64).map(|i| 4 * i).collect();
        build(dir.path(), 6, &ordinals, 128);
        let mut reader = SampleIndexReader::open(dir.path()).unwrap();
        for sought in [0u64, 1, 511, 512, 513, 2001, 3996] {
            let exact = reader.seek(&KmerKey::from_ordinal(sought, 6)).unwrap();
            assert_eq!(exact, sought % 4 == 0);
            let next = reader.next_entry().unwrap().unwrap();
            assert_eq!(next.key.to_ordinal(), (sought + 3) / 4 * 4);
        }
        // beyond last key
        assert!(!reader.seek(&KmerKey::from_ordinal(3997, 6)).unwrap());
        assert!(reader.next_entry().unwrap().is_none());
        assert_eq!(reader.end_reason(), Some(StreamEnd::EndOfIndex));
    }

    #[test]
    fn range_stops_at_partition_bound() {
        let dir = tempfile::tempdir().unwrap();
        let ordinals: Vec<u64> = (0..2000u64).collect();
        build(dir.path(), 6, &ordinals, 700);
        let begin = KmerKey::from_ordinal(650, 6);
        let end = KmerKey::from_ordinal(1460, 6);
        let mut reader = SampleIndexReader::open_range(dir.path(), &begin, &end).unwrap();
        let mut got = Vec::new();
        while let Some(entry) = reader.next_entry().unwrap() {
            got.push(entry.key.to_ordinal());
        }
        assert_eq!(got, (650..=1460u64).collect::<Vec<u64>>());
        assert_eq!(reader.end_reason(), Some(StreamEnd::PartitionBound));
    }

    #[test]
    fn end_bound_moves_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        let ordinals: Vec<u64> = (0..2000u64).collect();
        build(dir.path(), 6, &ordinals, 700);
        let key = |o: u64| KmerKey::from_ordinal(o, 6);
        let mut reader = SampleIndexReader::open_range(dir.path(), &key(650), &key(1000)).unwrap();
        let mut got = Vec::new();
        while let Some(entry) = reader.next_entry().unwrap() {
            got.push(entry.key.to_ordinal());
        }
        assert_eq!(reader.end_reason(), Some(StreamEnd::PartitionBound));
        // raised after entries past 1000 were already read ahead
        reader.set_end_key(Some(key(1460)));
        while let Some(entry) = reader.next_entry().unwrap() {
            got.push(entry.key.to_ordinal());
        }
        assert_eq!(got, (650..=1460u64).collect::<Vec<u64>>());
        // lowered below what is buffered, then removed
        assert_eq!(reader.next_entry().unwrap(), None);
        reader.set_end_key(Some(key(1200)));
        assert!(reader.next_entry().unwrap().is_none());
        reader.set_end_key(None);
        let rest: Vec<u64> = std::iter::from_fn(|| reader.next_entry().unwrap()).map(|e| e.key.to_ordinal()).collect();
        assert_eq!(rest, (1461..2000u64).collect::<Vec<u64>>());
        assert_eq!(reader.end_reason(), Some(StreamEnd::EndOfIndex));
    }

    #[test]
    fn empty_index() {
        let dir = tempfile::tempdir().unwrap();
        build(dir.path(), 5, &[], 10);
        let mut reader = SampleIndexReader::open(dir.path()).unwrap();
        assert!(reader.next_entry().unwrap().is_none());
        assert!(!reader.seek(&KmerKey::min_key(5)).unwrap());
        assert_eq!(reader.end_reason(), Some(StreamEnd::EndOfIndex));
    }

    #[test]
    fn missing_chunk_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let ordinals: Vec<u64> = (0..100u64).collect();
        build(dir.path(), 5, &ordinals, 30);
        std::fs::remove_file(dir.path().join(chunk_file_name(2))).unwrap();
        assert!(matches!(SampleIndexReader::open(dir.path()), Err(KmerSimError::CorruptIndex(_))));
    }
} // end of mod tests
