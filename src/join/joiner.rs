//! N-way merge join of sample indexes restricted to one partition.

use std::path::PathBuf;

use crate::error::Result;
use crate::index::{IndexEntry, SampleIndexReader};
use crate::partition::KmerRangePartition;
use crate::seq::{key_space_size, KmerKey};

/// A sorted source of entries, strictly ascending by key.
pub trait KmerStream {
    /// next entry, None at end of stream
    fn next_entry(&mut self) -> Result<Option<IndexEntry>>;
}

impl KmerStream for SampleIndexReader {
    fn next_entry(&mut self) -> Result<Option<IndexEntry>> {
        SampleIndexReader::next_entry(self)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinState {
    /// readers not yet primed
    Init,
    Stepping,
    /// all readers exhausted, or a reader failed
    Done,
}

/// One distinct key and the (sample rank, frequency) of samples containing it, by ascending sample rank.
/// Samples without the key do not appear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinedRow {
    pub key: KmerKey,
    pub values: Vec<(usize, u64)>,
}

impl JoinedRow {
    /// frequency of sample rank, 0 if absent
    pub fn get_frequency(&self, sample: usize) -> u64 {
        self.values.iter().find(|(s, _)| *s == sample).map(|(_, f)| *f).unwrap_or(0)
    }
}

/// Streams joined rows in ascending key order from one stream per sample.
pub struct KmerJoiner<R: KmerStream> {
    readers: Vec<R>,
    // current entry of each reader, None when exhausted
    heads: Vec<Option<IndexEntry>>,
    state: JoinState,
    kmer_size: usize,
    last_ordinal: Option<u64>,
    nb_rows: u64,
}

impl KmerJoiner<SampleIndexReader> {
    /// opens one reader per sample directory, bounded to partition
    pub fn open(dirs: &[PathBuf], partition: &KmerRangePartition) -> Result<Self> {
        let begin = partition.get_begin_key();
        let end = partition.get_end_key();
        let mut readers = Vec::with_capacity(dirs.len());
        for dir in dirs {
            readers.push(SampleIndexReader::open_range(dir, &begin, &end)?);
        }
        log::debug!(
            "joiner opened {} readers on partition {} [{}, {}]",
            readers.len(),
            partition.get_index(),
            begin,
            end
        );
        Ok(KmerJoiner::new(readers, partition.get_kmer_size()))
    }
} // end of impl KmerJoiner<SampleIndexReader>

impl<R: KmerStream> KmerJoiner<R> {
    /// readers must be positioned at the start of the range to join. The sample rank of a reader is its rank in readers.
    pub fn new(readers: Vec<R>, kmer_size: usize) -> Self {
        let nb_readers = readers.len();
        KmerJoiner {
            readers,
            heads: vec![None; nb_readers],
            state: JoinState::Init,
            kmer_size,
            last_ordinal: None,
            nb_rows: 0,
        }
    }

    pub fn get_state(&self) -> JoinState {
        self.state
    }

    pub fn get_nb_samples(&self) -> usize {
        self.readers.len()
    }

    /// number of rows emitted so far
    pub fn get_nb_rows(&self) -> u64 {
        self.nb_rows
    }

    /// position of the last emitted key in the key space [0, 4^k), as a fraction
    pub fn progress(&self) -> f64 {
        match (self.state, self.last_ordinal) {
            (JoinState::Done, _) => 1.,
            (_, None) => 0.,
            (_, Some(ordinal)) => ordinal as f64 / key_space_size(self.kmer_size) as f64,
        }
    }

    fn advance(&mut self, rank: usize) -> Result<()> {
        match self.readers[rank].next_entry() {
            Ok(entry) => {
                self.heads[rank] = entry;
                Ok(())
            }
            Err(e) => {
                log::error!("joiner : reader {} failed : {}", rank, e);
                self.state = JoinState::Done;
                Err(e)
            }
        }
    }

    fn prime(&mut self) -> Result<()> {
        for rank in 0..self.readers.len() {
            self.advance(rank)?;
        }
        self.state = JoinState::Stepping;
        Ok(())
    }

    /// next joined row, None when all readers are exhausted. A reader error ends the join.
    pub fn step_next(&mut self) -> Result<Option<JoinedRow>> {
        if self.state == JoinState::Init {
            self.prime()?;
        }
        if self.state == JoinState::Done {
            return Ok(None);
        }
        // ranks of readers holding the minimal key, strict less than restarts the group
        let mut min_ranks: Vec<usize> = Vec::new();
        let mut min_key: Option<&KmerKey> = None;
        for (rank, head) in self.heads.iter().enumerate() {
            if let Some(entry) = head {
                match min_key {
                    Some(current) if entry.key > *current => {}
                    Some(current) if entry.key == *current => min_ranks.push(rank),
                    _ => {
                        min_key = Some(&entry.key);
                        min_ranks.clear();
                        min_ranks.push(rank);
                    }
                }
            }
        }
        let key = match min_key {
            Some(key) => key.clone(),
            None => {
                self.state = JoinState::Done;
                log::debug!("joiner done, nb rows : {}", self.nb_rows);
                return Ok(None);
            }
        };
        let mut values = Vec::with_capacity(min_ranks.len());
        for rank in min_ranks {
            if let Some(entry) = self.heads[rank].take() {
                values.push((rank, entry.value));
            }
            self.advance(rank)?;
        }
        self.last_ordinal = Some(key.to_ordinal());
        self.nb_rows += 1;
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("joined row {} : {:?}", key, values);
        }
        Ok(Some(JoinedRow { key, values }))
    } // end of step_next
} // end of impl KmerJoiner

impl<R: KmerStream> Iterator for KmerJoiner<R> {
    type Item = Result<JoinedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step_next().transpose()
    }
}

//=====================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KmerSimError;
    use crate::index::SampleIndexWriter;
    use crate::partition::compute_equal_range_partitions;
    use std::path::Path;

    fn build(dir: &Path, entries: &[(&str, u64)]) {
        let k = entries.first().map(|(s, _)| s.len()).unwrap_or(4);
        let mut writer = SampleIndexWriter::create(dir, "s", k, 1000).unwrap();
        for (kmer, freq) in entries {
            writer.append(KmerKey::from_sequence(kmer.as_bytes()).unwrap(), *freq).unwrap();
        }
        writer.finish().unwrap();
    }

    fn key(s: &str) -> KmerKey {
        KmerKey::from_sequence(s.as_bytes()).unwrap()
    }

    #[test]
    fn three_sample_join() {
        let root = tempfile::tempdir().unwrap();
        let dirs: Vec<PathBuf> = (0..3).map(|i| root.path().join(format!("s{}", i))).collect();
        build(&dirs[0], &[("AAAA", 5)]);
        build(&dirs[1], &[("AAAA", 3), ("AACG", 2)]);
        build(&dirs[2], &[("AACG", 7)]);
        let partition = compute_equal_range_partitions(4, 1).unwrap().remove(0);
        let mut joiner = KmerJoiner::open(&dirs, &partition).unwrap();
        assert_eq!(joiner.get_state(), JoinState::Init);
        assert_eq!(joiner.progress(), 0.);
        let rows: Vec<JoinedRow> = joiner.by_ref().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(
            rows,
            vec![
                JoinedRow { key: key("AAAA"), values: vec![(0, 5), (1, 3)] },
                JoinedRow { key: key("AACG"), values: vec![(1, 2), (2, 7)] },
            ]
        );
        assert_eq!(joiner.get_state(), JoinState::Done);
        assert_eq!(joiner.progress(), 1.);
        assert_eq!(rows[1].get_frequency(2), 7);
        assert_eq!(rows[1].get_frequency(0), 0);
    }

    #[test]
    fn join_respects_partition() {
        let root = tempfile::tempdir().unwrap();
        let dirs: Vec<PathBuf> = (0..2).map(|i| root.path().join(format!("s{}", i))).collect();
        build(&dirs[0], &[("AAAA", 1), ("CCCC", 2), ("GGGA", 3)]);
        build(&dirs[1], &[("ACCC", 4), ("CCCC", 5), ("TTTA", 6)]);
        let partitions = compute_equal_range_partitions(4, 4).unwrap();
        let mut all_keys = Vec::new();
        for partition in &partitions {
            let joiner = KmerJoiner::open(&dirs, partition).unwrap();
            for row in joiner {
                let row = row.unwrap();
                assert!(partition.contains(row.key.to_ordinal()));
                all_keys.push(row.key.to_string());
            }
        }
        assert_eq!(all_keys, vec!["AAAA", "ACCC", "CCCC", "GGGA", "TTTA"]);
    }

    #[test]
    fn partitions_cut_inside_chunks() {
        // small chunks, none of the partition bounds falls on a chunk cut
        let k = 6;
        let root = tempfile::tempdir().unwrap();
        let dirs: Vec<PathBuf> = (0..2).map(|i| root.path().join(format!("s{}", i))).collect();
        let space = key_space_size(k) as u64;
        // 7 entries per chunk : sample 0 chunks cover 21 ordinals, sample 1 chunks 35
        let steps = [3u64, 5];
        for (dir, step) in dirs.iter().zip(steps.iter()) {
            let mut writer = SampleIndexWriter::create(dir, "s", k, 7).unwrap();
            for ord in (0..space).filter(|o| o % step == 0) {
                writer.append(KmerKey::from_ordinal(ord, k), ord % 11 + 1).unwrap();
            }
            writer.finish().unwrap();
        }
        let partitions = compute_equal_range_partitions(k, 5).unwrap();
        let mut got = Vec::new();
        for partition in &partitions {
            assert_ne!((partition.get_end() + 1) % 21, 0);
            assert_ne!((partition.get_end() + 1) % 35, 0);
            let mut joiner = KmerJoiner::open(&dirs, partition).unwrap();
            while let Some(row) = joiner.step_next().unwrap() {
                assert!(partition.contains(row.key.to_ordinal()));
                got.push((row.key.to_ordinal(), row.values));
            }
        }
        let expected: Vec<(u64, Vec<(usize, u64)>)> = (0..space)
            .filter(|o| o % 3 == 0 || o % 5 == 0)
            .map(|o| {
                let values = steps.iter().enumerate().filter(|(_, s)| o % **s == 0).map(|(rank, _)| (rank, o % 11 + 1)).collect();
                (o, values)
            })
            .collect();
        assert_eq!(got.len(), expected.len());
        assert_eq!(got, expected);
    }

    /// a stream failing after some entries
    struct FailingStream {
        entries: Vec<IndexEntry>,
    }

    impl KmerStream for FailingStream {
        fn next_entry(&mut self) -> Result<Option<IndexEntry>> {
            if self.entries.is_empty() {
                Err(KmerSimError::CorruptIndex("truncated".to_string()))
            } else {
                Ok(Some(self.entries.remove(0)))
            }
        }
    }

    #[test]
    fn reader_failure_ends_join() {
        let streams = vec![
            FailingStream { entries: vec![IndexEntry::new(key("AAAA"), 1), IndexEntry::new(key("CCCC"), 1)] },
            FailingStream { entries: vec![IndexEntry::new(key("AAAC"), 1), IndexEntry::new(key("GGGG"), 1)] },
        ];
        let mut joiner = KmerJoiner::new(streams, 4);
        assert_eq!(joiner.step_next().unwrap().unwrap().key, key("AAAA"));
        assert_eq!(joiner.step_next().unwrap().unwrap().key, key("AAAC"));
        // reader 0 fails when advancing past CCCC, the row is not emitted
        assert!(matches!(joiner.step_next(), Err(KmerSimError::CorruptIndex(_))));
        assert_eq!(joiner.get_state(), JoinState::Done);
        assert!(joiner.step_next().unwrap().is_none());
        assert!(joiner.next().is_none());
    }
} // end of mod tests
