//! Whole computations : index construction for a set of samples, then similarity matrix from the indexes.
//!
//! Index root layout :
//!  - parameters.json, samples.json, partitions.json, histogram.json (histogram partitioning only)
//!  - sample-00000/, sample-00001/ ... one sample index each, see [crate::index]

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{anyhow, Context};
use cpu_time::ProcessTime;
use rayon::prelude::*;

use crate::error::Result;
use crate::index::{SampleIndexBuilder, CHUNK_INDEX_NAME};
use crate::join::KmerJoiner;
use crate::partition::histogram::HISTOGRAM_NAME;
use crate::partition::partitioner::PARTITIONS_NAME;
use crate::partition::{
    compute_equal_area_partitions, compute_equal_range_partitions, compute_histogram_partitions, KmerHistogram,
    KmerRangePartition, PartitionAlgorithm, PartitionTable,
};
use crate::similarity::{KmerStatistics, Scorer, SimilarityMatrix};
use crate::utils::files::for_each_read;
use crate::utils::parameters::{IndexParams, SimilarityParams, PARAMETERS_NAME};
use crate::utils::sampledict::{SampleDict, SAMPLES_NAME};

/// a progress line is logged every PROGRESS_STEP joined rows
const PROGRESS_STEP: u64 = 1_000_000;

/// samples the first reads of every file into one merged histogram
pub fn build_histogram(files: &[PathBuf], params: &IndexParams) -> Result<KmerHistogram> {
    let kmer_size = params.get_kmer_size();
    let max_reads = params.get_histogram_reads();
    let histograms: Vec<KmerHistogram> = files
        .par_iter()
        .map(|path| {
            let mut histogram = KmerHistogram::new(&path.to_string_lossy(), kmer_size)?;
            for_each_read(path, Some(max_reads), |seq| histogram.take_sample(seq))?;
            Ok(histogram)
        })
        .collect::<Result<Vec<KmerHistogram>>>()?;
    let mut merged = KmerHistogram::new("samples", kmer_size)?;
    for histogram in &histograms {
        merged.merge(histogram)?;
    }
    log::info!("histogram of {} samples, nb kmers sampled : {}", files.len(), merged.get_total());
    Ok(merged)
} // end of build_histogram

/// partitions of the key space according to params
pub fn compute_partitions(files: &[PathBuf], params: &IndexParams, root: &Path) -> Result<PartitionTable> {
    let kmer_size = params.get_kmer_size();
    let nb_partitions = params.get_nb_partitions();
    let partitions = match params.get_partition_algo() {
        PartitionAlgorithm::EqualRange => compute_equal_range_partitions(kmer_size, nb_partitions)?,
        PartitionAlgorithm::EqualArea => compute_equal_area_partitions(kmer_size, nb_partitions)?,
        PartitionAlgorithm::Histogram => {
            let histogram = build_histogram(files, params)?;
            histogram.dump_json(root)?;
            compute_histogram_partitions(kmer_size, nb_partitions, &histogram)?
        }
    };
    log::info!("computed {} partitions with algorithm {}", partitions.len(), params.get_partition_algo());
    PartitionTable::new(partitions)
}

// an index root is written once. Checked before anything is written in root.
fn check_index_root_free(root: &Path) -> anyhow::Result<()> {
    let root_files = [PARAMETERS_NAME, SAMPLES_NAME, PARTITIONS_NAME, HISTOGRAM_NAME];
    if let Some(found) = root_files.iter().map(|name| root.join(name)).find(|p| p.exists()) {
        return Err(anyhow!("an index already exists in {:?}, found {:?}", root, found));
    }
    let first_index = SampleDict::sample_dir(root, 0).join(CHUNK_INDEX_NAME);
    if first_index.exists() {
        return Err(anyhow!("an index already exists in {:?}, found {:?}", root, first_index));
    }
    Ok(())
}

/// builds the index of every file (one file = one sample) under root, which must not already hold an index.
pub fn build_indexes(files: &[PathBuf], root: &Path, params: &IndexParams) -> anyhow::Result<SampleDict> {
    params.check()?;
    if files.is_empty() {
        return Err(anyhow!("no sample file to index"));
    }
    check_index_root_free(root)?;
    let start_t = SystemTime::now();
    let cpu_start = ProcessTime::now();
    std::fs::create_dir_all(root).with_context(|| format!("cannot create index root {:?}", root))?;
    //
    let samples = SampleDict::from_files(files);
    let partitions = compute_partitions(files, params, root).context("partition computation failed")?;
    partitions.dump_json(root)?;
    //
    files
        .par_iter()
        .enumerate()
        .map(|(rank, path)| -> anyhow::Result<()> {
            let name = samples.get(rank).map(|s| s.get_name().to_string()).unwrap_or_default();
            let mut builder = SampleIndexBuilder::new(&name, params, &partitions)?;
            builder.add_file(path).with_context(|| format!("reading sample file {:?}", path))?;
            let dir = SampleDict::sample_dir(root, rank);
            builder.build(&dir).with_context(|| format!("writing index of sample {} in {:?}", name, dir))?;
            Ok(())
        })
        .collect::<anyhow::Result<Vec<()>>>()?;
    //
    params.dump_json(root)?;
    samples.dump(root)?;
    let cpu_time = cpu_start.elapsed().as_secs();
    let elapsed_t = start_t.elapsed().map(|d| d.as_secs()).unwrap_or(0);
    log::info!(
        "indexed {} samples in {:?}, system time(s) : {}, cpu time(s) : {}",
        samples.get_nb_samples(),
        root,
        elapsed_t,
        cpu_time
    );
    Ok(samples)
} // end of build_indexes

/// joins the sample indexes on one partition and accumulates the rows in a new partial matrix
pub fn join_partition(dirs: &[PathBuf], partition: &KmerRangePartition, scorer: &Scorer) -> Result<SimilarityMatrix> {
    let mut matrix = SimilarityMatrix::new(dirs.len());
    let mut joiner = KmerJoiner::open(dirs, partition)?;
    let mut weights = Vec::with_capacity(dirs.len());
    while let Some(row) = joiner.step_next()? {
        scorer.contribute_row(&mut matrix, &row, &mut weights)?;
        if joiner.get_nb_rows() % PROGRESS_STEP == 0 {
            log::debug!(
                "partition {} : {} rows joined, progress {:.3}",
                partition.get_index(),
                joiner.get_nb_rows(),
                joiner.progress()
            );
        }
    }
    log::debug!("partition {} done, {} rows joined", partition.get_index(), joiner.get_nb_rows());
    Ok(matrix)
} // end of join_partition

/// computes the score matrix of all samples indexed under root and writes it in output.
///
/// Partitions are processed in parallel, partial matrices summed once all are done.
/// Any failure aborts the computation and no output file is written.
pub fn compute_similarity(root: &Path, sim_params: &SimilarityParams, output: &Path) -> anyhow::Result<SimilarityMatrix> {
    let start_t = SystemTime::now();
    let cpu_start = ProcessTime::now();
    //
    let index_params = IndexParams::reload_json(root).context("cannot reload index parameters")?;
    let samples = SampleDict::reload(root).context("cannot reload sample dictionary")?;
    let partitions = PartitionTable::reload_json(root).context("cannot reload partitions")?;
    if partitions.get_kmer_size() != index_params.get_kmer_size() {
        return Err(anyhow!("partitions and index parameters disagree on kmer size"));
    }
    let dirs = samples.sample_dirs(root);
    let statistics = dirs
        .iter()
        .map(|d| KmerStatistics::reload_json(d).with_context(|| format!("cannot reload statistics in {:?}", d)))
        .collect::<anyhow::Result<Vec<KmerStatistics>>>()?;
    let mut scorer = Scorer::new(sim_params.get_score(), sim_params.get_weight());
    scorer.set_params_from_statistics(&statistics)?;
    log::info!(
        "similarity of {} samples, score {}, weight {}, nb partitions {}",
        samples.get_nb_samples(),
        sim_params.get_score(),
        sim_params.get_weight(),
        partitions.get_nb_partitions()
    );
    //
    let partials = partitions
        .get_partitions()
        .par_iter()
        .map(|partition| {
            join_partition(&dirs, partition, &scorer)
                .with_context(|| format!("join of partition {} failed", partition.get_index()))
        })
        .collect::<anyhow::Result<Vec<SimilarityMatrix>>>()?;
    //
    let mut matrix = SimilarityMatrix::new(samples.get_nb_samples());
    for partial in &partials {
        matrix.merge(partial)?;
    }
    matrix.finalize(&scorer)?;
    // the matrix file is the last thing written, its existence means success
    sim_params.dump_json(root).context("cannot dump similarity parameters")?;
    matrix.write_tsv(output).with_context(|| format!("cannot write matrix in {:?}", output))?;
    //
    let cpu_time = cpu_start.elapsed().as_secs();
    let elapsed_t = start_t.elapsed().map(|d| d.as_secs()).unwrap_or(0);
    log::info!("similarity computed, system time(s) : {}, cpu time(s) : {}", elapsed_t, cpu_time);
    Ok(matrix)
} // end of compute_similarity
