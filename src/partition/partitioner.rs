//! Division of the kmer key space [0, 4^k) into contiguous partitions.
//!
//! Partitions are given by their first and last ordinal (both included).
//! All partitioning functions return partitions in ascending order, contiguous
//! (`p[i].end + 1 == p[i+1].begin`), non empty, and covering the whole key space.

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KmerSimError, Result};
use crate::seq::{check_kmer_size, key_space_size, max_ordinal, KmerKey};

use super::histogram::KmerHistogram;

pub const PARTITIONS_NAME: &str = "partitions.json";

/// A contiguous range [begin, end] of the key space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KmerRangePartition {
    kmer_size: usize,
    nb_partitions: usize,
    index: usize,
    begin: u64,
    end: u64,
    /// approximate sampled mass (histogram partitions) or relative width
    weight: f64,
}

impl KmerRangePartition {
    pub fn get_index(&self) -> usize {
        self.index
    }

    pub fn get_nb_partitions(&self) -> usize {
        self.nb_partitions
    }

    pub fn get_kmer_size(&self) -> usize {
        self.kmer_size
    }

    pub fn get_begin(&self) -> u64 {
        self.begin
    }

    pub fn get_end(&self) -> u64 {
        self.end
    }

    pub fn get_weight(&self) -> f64 {
        self.weight
    }

    /// number of keys in partition
    pub fn width(&self) -> u128 {
        (self.end - self.begin) as u128 + 1
    }

    pub fn get_begin_key(&self) -> KmerKey {
        KmerKey::from_ordinal(self.begin, self.kmer_size)
    }

    pub fn get_end_key(&self) -> KmerKey {
        KmerKey::from_ordinal(self.end, self.kmer_size)
    }

    pub fn contains(&self, ordinal: u64) -> bool {
        ordinal >= self.begin && ordinal <= self.end
    }
} // end of impl KmerRangePartition

fn check_partition_args(kmer_size: usize, nb_partitions: usize) -> Result<()> {
    check_kmer_size(kmer_size)?;
    if nb_partitions == 0 {
        return Err(KmerSimError::Config("number of partitions must be > 0".to_string()));
    }
    if nb_partitions as u128 > key_space_size(kmer_size) {
        return Err(KmerSimError::Config(format!(
            "{} partitions asked for only {} kmers of size {}",
            nb_partitions,
            key_space_size(kmer_size),
            kmer_size
        )));
    }
    Ok(())
}

/// Turns proposed partition ends into partitions.
///
/// Each end is clamped so that ends strictly increase and every following partition keeps at least one key.
/// The last partition always ends on the all T kmer. Weights are computed by `weight_of(begin, end)`.
fn partitions_from_ends<F>(kmer_size: usize, nb_partitions: usize, proposed: &[u64], weight_of: F) -> Vec<KmerRangePartition>
where
    F: Fn(u64, u64) -> f64,
{
    let max = max_ordinal(kmer_size) as u128;
    let mut partitions = Vec::with_capacity(nb_partitions);
    let mut begin: u128 = 0;
    for index in 0..nb_partitions {
        // room left for the partitions after this one
        let upper = max - (nb_partitions - 1 - index) as u128;
        let end = if index == nb_partitions - 1 {
            max
        } else {
            let wanted = proposed.get(index).map(|e| *e as u128).unwrap_or(begin);
            wanted.max(begin).min(upper)
        };
        partitions.push(KmerRangePartition {
            kmer_size,
            nb_partitions,
            index,
            begin: begin as u64,
            end: end as u64,
            weight: weight_of(begin as u64, end as u64),
        });
        begin = end + 1;
    }
    partitions
} // end of partitions_from_ends

/// P ranges of width 4^k / P, the first 4^k % P ones being one key wider.
pub fn compute_equal_range_partitions(kmer_size: usize, nb_partitions: usize) -> Result<Vec<KmerRangePartition>> {
    check_partition_args(kmer_size, nb_partitions)?;
    let space = key_space_size(kmer_size);
    let base = space / nb_partitions as u128;
    let remain = space % nb_partitions as u128;
    let mut ends = Vec::with_capacity(nb_partitions);
    let mut end: u128 = 0;
    for i in 0..nb_partitions as u128 {
        let width = base + u128::from(i < remain);
        end += width;
        ends.push((end - 1) as u64);
    }
    let partitions = partitions_from_ends(kmer_size, nb_partitions, &ends, |b, e| {
        ((e - b) as f64 + 1.) / space as f64
    });
    log::debug!("computed {} equal range partitions for kmer size {}", nb_partitions, kmer_size);
    Ok(partitions)
} // end of compute_equal_range_partitions

/// Partitions holding approximately the same sampled mass.
///
/// The histogram buckets are walked in ascending order, accumulating counts. The i-th cut is placed where the
/// accumulated mass reaches (i+1) * total / P. When the cut falls inside a bucket, its position is interpolated
/// linearly over the bucket key range (floor of the fractional position). Cuts are then made strictly
/// increasing. If rounding leaves some cuts unplaced, the remaining key range is split in equal ranges.
/// An empty histogram gives equal range partitions.
pub fn compute_histogram_partitions(
    kmer_size: usize,
    nb_partitions: usize,
    histogram: &KmerHistogram,
) -> Result<Vec<KmerRangePartition>> {
    check_partition_args(kmer_size, nb_partitions)?;
    if histogram.get_kmer_size() != kmer_size {
        return Err(KmerSimError::Config(format!(
            "histogram has kmer size {}, partitioning asked for {}",
            histogram.get_kmer_size(),
            kmer_size
        )));
    }
    let total = histogram.get_total();
    if total == 0 {
        log::warn!("empty histogram, using equal range partitions");
        return compute_equal_range_partitions(kmer_size, nb_partitions);
    }
    let target = total as f64 / nb_partitions as f64;
    let mut ends: Vec<u64> = Vec::with_capacity(nb_partitions);
    let mut accumulated = 0.;
    for (prefix, count) in histogram.sorted_buckets() {
        let (b_begin, b_end) = histogram.bucket_range(prefix);
        let b_width = (b_end - b_begin) as u128 + 1;
        let count = count as f64;
        // all cuts falling in this bucket
        while ends.len() < nb_partitions - 1 {
            let threshold = (ends.len() + 1) as f64 * target;
            if threshold > accumulated + count {
                break;
            }
            let fraction = ((threshold - accumulated) / count).clamp(0., 1.);
            let offset = ((b_width as f64) * fraction).floor() as u128;
            let end = (b_begin as u128 + offset).saturating_sub(1).max(b_begin as u128);
            ends.push(end.min(b_end as u128) as u64);
        }
        accumulated += count;
        if ends.len() >= nb_partitions - 1 {
            break;
        }
    }
    // split what remains equally between unplaced cuts
    if ends.len() < nb_partitions - 1 {
        let missing = (nb_partitions - 1 - ends.len()) as u128;
        let start = ends.last().map(|e| *e as u128 + 1).unwrap_or(0);
        let span = key_space_size(kmer_size) - start;
        log::debug!("histogram partitions : {} cuts split equally over remaining range", missing);
        for j in 1..=missing {
            ends.push((start + span * j / (missing + 1)).saturating_sub(1) as u64);
        }
    }
    let partitions = partitions_from_ends(kmer_size, nb_partitions, &ends, |b, e| histogram.estimated_mass(b, e));
    if log::log_enabled!(log::Level::Debug) {
        for p in &partitions {
            log::debug!("partition {} : [{}, {}], weight {:.3e}", p.index, p.begin, p.end, p.weight);
        }
    }
    Ok(partitions)
} // end of compute_histogram_partitions

/// Partitions of equal area under a density decreasing linearly from the first to the last key.
///
/// Partition j ends at fraction 1 - sqrt((P-1-j)/P) of the key space, so partitions are
/// narrow at the low end of the key space where canonical kmers concentrate.
pub fn compute_equal_area_partitions(kmer_size: usize, nb_partitions: usize) -> Result<Vec<KmerRangePartition>> {
    check_partition_args(kmer_size, nb_partitions)?;
    let space = key_space_size(kmer_size) as f64;
    let p = nb_partitions as f64;
    let ends: Vec<u64> = (0..nb_partitions)
        .map(|j| {
            let fraction = 1. - ((p - 1. - j as f64) / p).sqrt();
            let end = (space * fraction).floor() - 1.;
            // saturating float to int conversion
            end.max(0.) as u64
        })
        .collect();
    let partitions = partitions_from_ends(kmer_size, nb_partitions, &ends, |_, _| 1. / p);
    Ok(partitions)
} // end of compute_equal_area_partitions

//=====================================================================================

/// The partitions of a computation, answering which partition a key belongs to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartitionTable {
    partitions: Vec<KmerRangePartition>,
}

impl PartitionTable {
    /// checks partitions share one valid kmer size and are numbered, ascending, contiguous and exhaustive
    pub fn new(partitions: Vec<KmerRangePartition>) -> Result<Self> {
        let first = partitions
            .first()
            .ok_or_else(|| KmerSimError::Config("no partition".to_string()))?;
        let kmer_size = first.kmer_size;
        check_kmer_size(kmer_size)?;
        let bad = |msg: String| Err(KmerSimError::Config(format!("bad partition table : {}", msg)));
        for (rank, p) in partitions.iter().enumerate() {
            if p.kmer_size != kmer_size {
                return bad(format!("partition {} has kmer size {}, first has {}", rank, p.kmer_size, kmer_size));
            }
            if p.index != rank || p.nb_partitions != partitions.len() {
                return bad(format!("partition {} numbered {} of {}", rank, p.index, p.nb_partitions));
            }
            if p.begin > p.end {
                return bad(format!("partition {} is empty", rank));
            }
        }
        if first.begin != 0 {
            return bad(format!("first partition begins at {}", first.begin));
        }
        for (i, w) in partitions.windows(2).enumerate() {
            if w[0].end >= w[1].begin || w[0].end + 1 != w[1].begin || w[1].begin > w[1].end {
                return bad(format!("partitions {} and {} are not contiguous", i, i + 1));
            }
        }
        let last = &partitions[partitions.len() - 1];
        if last.end != max_ordinal(kmer_size) {
            return bad(format!("last partition ends at {}", last.end));
        }
        Ok(PartitionTable { partitions })
    } // end of new

    pub fn get_partitions(&self) -> &[KmerRangePartition] {
        &self.partitions
    }

    pub fn get_nb_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn get_kmer_size(&self) -> usize {
        self.partitions[0].kmer_size
    }

    /// index of the partition containing ordinal, binary search over partition ends
    pub fn partition_index(&self, ordinal: u64) -> usize {
        self.partitions.partition_point(|p| p.end < ordinal).min(self.partitions.len() - 1)
    }

    pub fn partition_index_of_key(&self, key: &KmerKey) -> usize {
        self.partition_index(key.to_ordinal())
    }

    pub fn dump_json(&self, dirpath: &Path) -> Result<()> {
        let filepath = dirpath.join(PARTITIONS_NAME);
        log::info!("dumping partitions in json file : {:?}", filepath);
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(&filepath)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn reload_json(dirpath: &Path) -> Result<Self> {
        let filepath = dirpath.join(PARTITIONS_NAME);
        let file = OpenOptions::new().read(true).open(&filepath)?;
        let table: PartitionTable = serde_json::from_reader(BufReader::new(file))?;
        // re-check what was read
        PartitionTable::new(table.partitions)
    }
} // end of impl PartitionTable

//=====================================================================================

// end of mod tests
