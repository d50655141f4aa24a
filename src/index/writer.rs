//! Write once creation of a sample index.

use std::path::{Path, PathBuf};

use crate::error::{KmerSimError, Result};
use crate::seq::{check_kmer_size, KmerKey};

use super::chunk::{ChunkSummary, ChunkWriter};
use super::entry::IndexEntry;
use super::{chunk_file_name, dump_chunk_index, ChunkIndexRecord, ChunkTableRecord, IndexTable, CHUNK_INDEX_NAME};

/// Writes the entries of one sample, in strictly ascending key order, into chunk files.
///
/// A new chunk is started when the current one reaches `max_entries_per_chunk` entries
/// or when [start_chunk](Self::start_chunk) is called (the builder does it at each partition change).
/// Empty chunks are never written.
pub struct SampleIndexWriter {
    dir: PathBuf,
    name: String,
    kmer_size: usize,
    max_entries_per_chunk: u64,
    current: Option<ChunkWriter>,
    summaries: Vec<ChunkSummary>,
    last_key: Option<KmerKey>,
}

impl SampleIndexWriter {
    /// fails if dir already holds an index
    pub fn create(dir: &Path, name: &str, kmer_size: usize, max_entries_per_chunk: u64) -> Result<Self> {
        check_kmer_size(kmer_size)?;
        if max_entries_per_chunk == 0 {
            return Err(KmerSimError::Config("max entries per chunk must be > 0".to_string()));
        }
        std::fs::create_dir_all(dir)?;
        if dir.join(CHUNK_INDEX_NAME).exists() {
            return Err(KmerSimError::Config(format!("an index already exists in {:?}", dir)));
        }
        log::debug!("creating index of sample {} in {:?}", name, dir);
        Ok(SampleIndexWriter {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            kmer_size,
            max_entries_per_chunk,
            current: None,
            summaries: Vec::new(),
            last_key: None,
        })
    } // end of create

    pub fn get_dir(&self) -> &Path {
        &self.dir
    }

    pub fn get_nb_chunks(&self) -> usize {
        self.summaries.len() + usize::from(self.current.is_some())
    }

    fn close_current(&mut self) -> Result<()> {
        if let Some(chunk) = self.current.take() {
            self.summaries.push(chunk.finish()?);
        }
        Ok(())
    }

    /// closes the current chunk, the next append opens a new one
    pub fn start_chunk(&mut self) -> Result<()> {
        self.close_current()
    }

    pub fn append(&mut self, key: KmerKey, value: u64) -> Result<()> {
        if let Some(last) = &self.last_key {
            if key <= *last {
                return Err(KmerSimError::CorruptIndex(format!(
                    "sample {} : key {} written after {}",
                    self.name, key, last
                )));
            }
        }
        let full = match &self.current {
            Some(chunk) => chunk.get_nb_entries() >= self.max_entries_per_chunk,
            None => true,
        };
        if full {
            self.close_current()?;
            let path = self.dir.join(chunk_file_name(self.summaries.len()));
            self.current = Some(ChunkWriter::create(&path, self.kmer_size)?);
        }
        let entry = IndexEntry::new(key, value);
        if let Some(chunk) = self.current.as_mut() {
            chunk.append(&entry)?;
        }
        self.last_key = Some(entry.key);
        Ok(())
    } // end of append

    /// closes last chunk, writes chunk index and table of contents
    pub fn finish(mut self) -> Result<IndexTable> {
        self.close_current()?;
        let mut records = Vec::with_capacity(self.summaries.len());
        let mut table_records = Vec::with_capacity(self.summaries.len());
        for (num, summary) in self.summaries.iter().enumerate() {
            let last_key = summary
                .last_key
                .clone()
                .ok_or_else(|| KmerSimError::CorruptIndex(format!("empty chunk {:?}", summary.path)))?;
            table_records.push(ChunkTableRecord {
                data_file: chunk_file_name(num),
                last_kmer: last_key.to_string(),
                nb_entries: summary.nb_entries,
            });
            records.push(ChunkIndexRecord { chunk_num: num as u32, last_key });
        }
        dump_chunk_index(&self.dir, self.kmer_size, &records)?;
        let table = IndexTable {
            name: self.name.clone(),
            kmer_size: self.kmer_size,
            last_keys: table_records.iter().map(|r| r.last_kmer.clone()).collect(),
            chunks: table_records,
        };
        table.dump_json(&self.dir)?;
        log::info!(
            "index of sample {} written, nb chunks : {}, nb entries : {}",
            self.name,
            table.chunks.len(),
            table.get_nb_entries()
        );
        Ok(table)
    } // end of finish
} // end of impl SampleIndexWriter

// end of mod tests
