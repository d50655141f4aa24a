//! Construction of the index of one sample from its reads.
//!
//! Canonical kmers are counted in one hash map per partition. At build time counts are filtered,
//! each partition is sorted and written as its own chunk(s), so chunk boundaries follow partition boundaries.

use std::path::Path;
use std::time::SystemTime;

use fxhash::FxHashMap;

use crate::error::{KmerSimError, Result};
use crate::partition::PartitionTable;
use crate::seq::{KmerKey, KmerWindows};
use crate::similarity::KmerStatistics;
use crate::utils::files::send_reads;
use crate::utils::parameters::IndexParams;

use super::filter::{KmerFilter, KmerFilterStats};
use super::writer::SampleIndexWriter;
use super::IndexTable;

/// number of read batches waiting in channel between file reader and counter
const CHANNEL_SIZE: usize = 16;

pub struct SampleIndexBuilder<'a> {
    name: String,
    params: &'a IndexParams,
    partitions: &'a PartitionTable,
    /// one map ordinal -> count per partition
    counts: Vec<FxHashMap<u64, u64>>,
    nb_reads: usize,
}

impl<'a> SampleIndexBuilder<'a> {
    pub fn new(name: &str, params: &'a IndexParams, partitions: &'a PartitionTable) -> Result<Self> {
        if partitions.get_kmer_size() != params.get_kmer_size() {
            return Err(KmerSimError::Config(format!(
                "partitions computed for kmer size {}, index asked for {}",
                partitions.get_kmer_size(),
                params.get_kmer_size()
            )));
        }
        let counts = (0..partitions.get_nb_partitions()).map(|_| FxHashMap::default()).collect();
        Ok(SampleIndexBuilder { name: name.to_string(), params, partitions, counts, nb_reads: 0 })
    }

    pub fn get_nb_reads(&self) -> usize {
        self.nb_reads
    }

    /// number of distinct kmers counted
    pub fn get_nb_kmers(&self) -> usize {
        self.counts.iter().map(|m| m.len()).sum()
    }

    /// counts the canonical kmers of a read, windows with non ACGT symbols are skipped
    pub fn add_read(&mut self, seq: &[u8]) {
        for ordinal in KmerWindows::new(seq, self.params.get_kmer_size()) {
            let partition = self.partitions.partition_index(ordinal);
            *self.counts[partition].entry(ordinal).or_insert(0) += 1;
        }
        self.nb_reads += 1;
    }

    /// counts all reads of a fasta/fastq file.
    /// Parsing runs in its own thread and sends batches of reads through a bounded channel.
    pub fn add_file(&mut self, path: &Path) -> Result<usize> {
        let start_t = SystemTime::now();
        let (sender, receiver) = crossbeam_channel::bounded::<Vec<Vec<u8>>>(CHANNEL_SIZE);
        let mut nb_received = 0;
        let nb_sent = std::thread::scope(|scope| {
            // producer
            let producer = scope.spawn(move || {
                let res = send_reads(path, &sender);
                drop(sender);
                res
            });
            // consumer
            for batch in receiver.iter() {
                for seq in &batch {
                    self.add_read(seq);
                }
                nb_received += batch.len();
            }
            producer
                .join()
                .map_err(|_| KmerSimError::Config(format!("reader thread of {:?} panicked", path)))?
        })?;
        log::debug!(
            "sample {} : file {:?}, nb reads sent {}, received {}, nb kmers {}, time(s) {}",
            self.name,
            path,
            nb_sent,
            nb_received,
            self.get_nb_kmers(),
            start_t.elapsed().map(|d| d.as_secs()).unwrap_or(0)
        );
        Ok(nb_received)
    } // end of add_file

    /// filters, sorts and writes counts in dir. Returns the index table and the sample statistics (also dumped in dir).
    pub fn build(self, dir: &Path) -> Result<(IndexTable, KmerStatistics)> {
        let kmer_size = self.params.get_kmer_size();
        let filter_stats = KmerFilterStats::from_frequencies(self.counts.iter().flat_map(|m| m.values().copied()));
        let filter = KmerFilter::new(self.params.get_filter(), &filter_stats);
        let mut writer = SampleIndexWriter::create(dir, &self.name, kmer_size, self.params.get_max_entries_per_chunk())?;
        let mut statistics = KmerStatistics::new(&self.name);
        for (rank, counts) in self.counts.into_iter().enumerate() {
            let mut entries: Vec<(u64, u64)> = counts.into_iter().filter(|(_, f)| filter.keep(*f)).collect();
            entries.sort_unstable_by_key(|(ordinal, _)| *ordinal);
            log::trace!("sample {} partition {} : {} entries", self.name, rank, entries.len());
            writer.start_chunk()?;
            for (ordinal, frequency) in entries {
                statistics.add(frequency);
                writer.append(KmerKey::from_ordinal(ordinal, kmer_size), frequency)?;
            }
        }
        let table = writer.finish()?;
        statistics.dump_json(dir)?;
        log::info!(
            "sample {} : {} distinct kmers counted, {} kept after filter {}",
            self.name,
            filter_stats.unique,
            statistics.unique_kmers,
            self.params.get_filter()
        );
        Ok((table, statistics))
    } // end of build
} // end of impl SampleIndexBuilder

//=====================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{FilterAlgorithm, SampleIndexReader};
    use crate::partition::{compute_equal_range_partitions, PartitionAlgorithm};
    use std::io::Write;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn read_all(dir: &Path) -> Vec<(String, u64)> {
        let mut reader = SampleIndexReader::open(dir).unwrap();
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().unwrap() {
            entries.push((entry.key.to_string(), entry.value));
        }
        entries
    }

    #[test]
    fn build_counts_canonical_kmers() {
        log_init_test();
        let params = IndexParams::new(3, 4).with_partition_algo(PartitionAlgorithm::EqualRange);
        let partitions = PartitionTable::new(compute_equal_range_partitions(3, 4).unwrap()).unwrap();
        let mut builder = SampleIndexBuilder::new("s0", &params, &partitions).unwrap();
        // AAA, AAT, ATT(->AAT), TTT(->AAA), then CCG after the N
        builder.add_read(b"AAATTTNCCG");
        assert_eq!(builder.get_nb_kmers(), 3);
        let dir = tempfile::tempdir().unwrap();
        let (table, stats) = builder.build(dir.path()).unwrap();
        assert_eq!(read_all(dir.path()), vec![("AAA".to_string(), 2), ("AAT".to_string(), 2), ("CCG".to_string(), 1)]);
        // AAA and AAT in partition 0, CCG (ordinal 22) in partition 1 : one chunk each
        assert_eq!(table.chunks.len(), 2);
        assert_eq!(stats.unique_kmers, 3);
        assert_eq!(stats.total_kmers, 5);
        assert!(dir.path().join(crate::similarity::STATISTICS_NAME).exists());
    }

    #[test]
    fn build_applies_filter() {
        let params = IndexParams::new(4, 2).with_filter(FilterAlgorithm::NotUnique);
        let partitions = PartitionTable::new(compute_equal_range_partitions(4, 2).unwrap()).unwrap();
        let mut builder = SampleIndexBuilder::new("s0", &params, &partitions).unwrap();
        builder.add_read(b"ACGAACGAT");
        let dir = tempfile::tempdir().unwrap();
        builder.build(dir.path()).unwrap();
        // ACGA is the only kmer seen twice
        let entries = read_all(dir.path());
        assert!(entries.iter().all(|(_, f)| *f >= 2));
        assert!(entries.contains(&("ACGA".to_string(), 2)));
    }

    #[test]
    fn build_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.fa");
        let mut f = std::fs::File::create(&path).unwrap();
        for i in 0..3000 {
            writeln!(f, ">r{}\nACGTTGCANNGGCCAATT", i).unwrap();
        }
        drop(f);
        let params = IndexParams::new(5, 3);
        let partitions = PartitionTable::new(compute_equal_range_partitions(5, 3).unwrap()).unwrap();
        let mut builder = SampleIndexBuilder::new("s", &params, &partitions).unwrap();
        assert_eq!(builder.add_file(&path).unwrap(), 3000);
        assert_eq!(builder.get_nb_reads(), 3000);
        let index_dir = dir.path().join("index");
        let (table, _) = builder.build(&index_dir).unwrap();
        let entries = read_all(&index_dir);
        assert_eq!(entries.len() as u64, table.get_nb_entries());
        assert!(entries.iter().all(|(_, f)| *f % 3000 == 0));
    }

    #[test]
    fn builder_checks_kmer_size() {
        let params = IndexParams::new(5, 3);
        let partitions = PartitionTable::new(compute_equal_range_partitions(4, 3).unwrap()).unwrap();
        assert!(SampleIndexBuilder::new("s", &params, &partitions).is_err());
    }
} // end of mod tests
