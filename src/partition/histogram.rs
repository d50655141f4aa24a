//! Histogram of kmer prefixes, sampled from reads, used to balance partitions.
//!
//! Each canonical kmer is reduced to its first SAMPLING_CHARS bases (all bases when k is smaller).
//! A prefix stands for the range of kmers [prefix + A...A, prefix + T...T] of the key space.

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{KmerSimError, Result};
use crate::seq::{check_kmer_size, KmerKey, KmerWindows};

/// number of bases kept from each kmer
pub const SAMPLING_CHARS: usize = 6;

pub const HISTOGRAM_NAME: &str = "histogram.json";

/// a prefix and its count, as dumped in json
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmerHistogramRecord {
    pub kmer: String,
    pub frequency: u64,
}

#[derive(Serialize, Deserialize)]
struct HistogramDump {
    name: String,
    kmer_size: usize,
    records: Vec<KmerHistogramRecord>,
}

pub struct KmerHistogram {
    name: String,
    kmer_size: usize,
    sampling_len: usize,
    /// prefix ordinal -> count
    counts: FxHashMap<u64, u64>,
    total: u64,
}

impl KmerHistogram {
    pub fn new(name: &str, kmer_size: usize) -> Result<Self> {
        check_kmer_size(kmer_size)?;
        Ok(KmerHistogram {
            name: name.to_string(),
            kmer_size,
            sampling_len: kmer_size.min(SAMPLING_CHARS),
            counts: FxHashMap::default(),
            total: 0,
        })
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_kmer_size(&self) -> usize {
        self.kmer_size
    }

    pub fn get_sampling_len(&self) -> usize {
        self.sampling_len
    }

    /// total number of kmers sampled
    pub fn get_total(&self) -> u64 {
        self.total
    }

    pub fn get_nb_records(&self) -> usize {
        self.counts.len()
    }

    pub fn add(&mut self, prefix_ordinal: u64, frequency: u64) {
        *self.counts.entry(prefix_ordinal).or_insert(0) += frequency;
        self.total += frequency;
    }

    /// counts the canonical kmers of a read
    pub fn take_sample(&mut self, seq: &[u8]) {
        let shift = 2 * (self.kmer_size - self.sampling_len);
        let windows = KmerWindows::new(seq, self.kmer_size);
        for ordinal in windows {
            self.add(ordinal >> shift, 1);
        }
    }

    /// adds the counts of other. Both must have the same kmer size.
    pub fn merge(&mut self, other: &KmerHistogram) -> Result<()> {
        if other.kmer_size != self.kmer_size {
            return Err(KmerSimError::Config(format!(
                "cannot merge histograms of kmer size {} and {}",
                self.kmer_size, other.kmer_size
            )));
        }
        for (prefix, count) in &other.counts {
            self.add(*prefix, *count);
        }
        Ok(())
    }

    /// (prefix ordinal, count) sorted by ascending prefix
    pub fn sorted_buckets(&self) -> Vec<(u64, u64)> {
        let mut buckets: Vec<(u64, u64)> = self.counts.iter().map(|(p, c)| (*p, *c)).collect();
        buckets.sort_unstable();
        buckets
    }

    pub fn sorted_records(&self) -> Vec<KmerHistogramRecord> {
        self.sorted_buckets()
            .into_iter()
            .map(|(prefix, frequency)| KmerHistogramRecord {
                kmer: KmerKey::from_ordinal(prefix, self.sampling_len).to_string(),
                frequency,
            })
            .collect()
    }

    /// first and last kmer ordinal covered by a prefix
    pub fn bucket_range(&self, prefix_ordinal: u64) -> (u64, u64) {
        let shift = 2 * (self.kmer_size - self.sampling_len);
        let begin = ((prefix_ordinal as u128) << shift) as u64;
        let end = ((((prefix_ordinal as u128) + 1) << shift) - 1) as u64;
        (begin, end)
    }

    /// sampled mass falling in [begin, end], a bucket partly covered contributes proportionally
    pub fn estimated_mass(&self, begin: u64, end: u64) -> f64 {
        let mut mass = 0.;
        for (prefix, count) in &self.counts {
            let (b_begin, b_end) = self.bucket_range(*prefix);
            let lo = b_begin.max(begin);
            let hi = b_end.min(end);
            if lo > hi {
                continue;
            }
            let covered = (hi - lo) as f64 + 1.;
            let width = (b_end - b_begin) as f64 + 1.;
            mass += *count as f64 * covered / width;
        }
        mass
    } // end of estimated_mass

    pub fn dump_json(&self, dirpath: &Path) -> Result<()> {
        let filepath = dirpath.join(HISTOGRAM_NAME);
        log::info!("dumping histogram in json file : {:?}, nb records : {}", filepath, self.counts.len());
        let dump = HistogramDump {
            name: self.name.clone(),
            kmer_size: self.kmer_size,
            records: self.sorted_records(),
        };
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(&filepath)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &dump)?;
        writer.flush()?;
        Ok(())
    } // end of dump_json

    pub fn reload_json(dirpath: &Path) -> Result<Self> {
        let filepath = dirpath.join(HISTOGRAM_NAME);
        let file = OpenOptions::new().read(true).open(&filepath)?;
        let dump: HistogramDump = serde_json::from_reader(BufReader::new(file))?;
        let mut histogram = KmerHistogram::new(&dump.name, dump.kmer_size)?;
        for record in dump.records {
            if record.kmer.len() != histogram.sampling_len {
                return Err(KmerSimError::Config(format!("bad histogram record {}", record.kmer)));
            }
            let prefix = KmerKey::from_sequence(record.kmer.as_bytes())?.to_ordinal();
            histogram.add(prefix, record.frequency);
        }
        log::info!("reloaded histogram {}, total : {}", histogram.name, histogram.total);
        Ok(histogram)
    } // end of reload_json
} // end of impl KmerHistogram

//=====================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_sampling() {
        let mut histo = KmerHistogram::new("h", 8).unwrap();
        // AAAAAAAA twice, then AAAAAAAC
        histo.take_sample(b"AAAAAAAAAC");
        assert_eq!(histo.get_total(), 3);
        let records = histo.sorted_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], KmerHistogramRecord { kmer: "AAAAAA".to_string(), frequency: 3 });
        assert_eq!(histo.bucket_range(0), (0, 15));
        assert_eq!(histo.bucket_range(1), (16, 31));
    }

    #[test]
    fn short_kmers_use_whole_kmer() {
        let mut histo = KmerHistogram::new("h", 4).unwrap();
        histo.take_sample(b"TTTTG");
        // TTTT -> AAAA, TTTG -> CAAA
        let records = histo.sorted_records();
        assert_eq!(records[0].kmer, "AAAA");
        assert_eq!(records[1].kmer, "CAAA");
        assert_eq!(histo.bucket_range(5), (5, 5));
    }

    #[test]
    fn merge_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut h1 = KmerHistogram::new("all", 7).unwrap();
        h1.take_sample(b"ACGTTGCATGCAAGT");
        let mut h2 = KmerHistogram::new("s2", 7).unwrap();
        h2.take_sample(b"GGGCCCATATAT");
        let total = h1.get_total() + h2.get_total();
        h1.merge(&h2).unwrap();
        assert_eq!(h1.get_total(), total);
        h1.dump_json(dir.path()).unwrap();
        let reloaded = KmerHistogram::reload_json(dir.path()).unwrap();
        assert_eq!(reloaded.get_total(), total);
        assert_eq!(reloaded.sorted_buckets(), h1.sorted_buckets());
        //
        let bad = KmerHistogram::new("k5", 5).unwrap();
        assert!(h1.merge(&bad).is_err());
    }

    #[test]
    fn mass_interpolation() {
        let mut histo = KmerHistogram::new("h", 8).unwrap();
        histo.add(0, 16);
        histo.add(2, 4);
        // bucket 0 covers 0..=15, bucket 2 covers 32..=47
        assert!((histo.estimated_mass(0, 7) - 8.).abs() < 1.0e-9);
        assert!((histo.estimated_mass(8, 39) - 10.).abs() < 1.0e-9);
        assert!((histo.estimated_mass(0, u64::MAX) - 20.).abs() < 1.0e-9);
    }
} // end of mod tests
