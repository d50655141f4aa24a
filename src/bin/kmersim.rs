//! kmersim : pairwise similarity of sequence samples from their kmer frequencies.
//!
//! Usage :
//!
//! kmersim \[--threads n\] index --list samples.txt --kmer 21 --partitions 16 --out indexdir \[--partition-algo histogram\] \[--filter none\] \[--chunk-entries n\]
//!
//!  - list is a text file giving one fasta/fastq file (possibly compressed) per line, each file is a sample.
//!  - partition-algo is one of range, area, histogram. Default is histogram.
//!  - filter is one of none, notunique, stddev, stddev2. Default is none.
//!
//! kmersim \[--threads n\] similarity --index indexdir --output matrix.tsv \[--weight log\] \[--score cosine\]
//!
//!  - weight is one of boolean, natural, logarithm.
//!  - score is one of cosine, braycurtis, jensenshannon.
//!
//! The output has one line row\tcol\tscore per pair of samples, samples being numbered as in indexdir/samples.json.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use chrono::Local;
use clap::{Arg, ArgAction, ArgMatches, Command};
use env_logger::Builder;
use rayon::ThreadPoolBuilder;

use kmersim::index::FilterAlgorithm;
use kmersim::partition::PartitionAlgorithm;
use kmersim::pipeline::{build_indexes, compute_similarity};
use kmersim::utils::files::read_sample_list;
use kmersim::utils::parameters::{IndexParams, SimilarityParams, DEFAULT_CHUNK_ENTRIES};

pub fn init_log() -> u64 {
    Builder::from_default_env().init();
    println!("\n ************** initializing logger *****************\n");
    1
}

fn parse_index_cmd(matches: &ArgMatches) -> anyhow::Result<()> {
    let listfile = matches.get_one::<String>("list").ok_or_else(|| anyhow!("index : --list is required"))?;
    let root = matches.get_one::<String>("out").ok_or_else(|| anyhow!("index : --out is required"))?;
    let kmer_size = *matches.get_one::<usize>("kmer_size").ok_or_else(|| anyhow!("index : --kmer is required"))?;
    let nb_partitions = *matches.get_one::<usize>("partitions").unwrap_or(&1);
    let chunk_entries = *matches.get_one::<u64>("chunk_entries").unwrap_or(&DEFAULT_CHUNK_ENTRIES);
    // algorithm names are checked before any file is read
    let partition_algo: PartitionAlgorithm = matches
        .get_one::<String>("partition_algo")
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(PartitionAlgorithm::Histogram);
    let filter: FilterAlgorithm = matches
        .get_one::<String>("filter")
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(FilterAlgorithm::None);
    let params = IndexParams::new(kmer_size, nb_partitions)
        .with_max_entries_per_chunk(chunk_entries)
        .with_partition_algo(partition_algo)
        .with_filter(filter);
    params.check()?;
    log::info!("index parameters : {:?}", params);
    //
    let files = read_sample_list(Path::new(listfile)).with_context(|| format!("cannot read sample list {}", listfile))?;
    let samples = build_indexes(&files, &PathBuf::from(root), &params)?;
    println!("indexed {} samples in {}", samples.get_nb_samples(), root);
    Ok(())
} // end of parse_index_cmd

fn parse_similarity_cmd(matches: &ArgMatches) -> anyhow::Result<()> {
    let root = matches.get_one::<String>("index").ok_or_else(|| anyhow!("similarity : --index is required"))?;
    let output = matches.get_one::<String>("output").ok_or_else(|| anyhow!("similarity : --output is required"))?;
    let weight = matches.get_one::<String>("weight").map(|s| s.as_str()).unwrap_or("logarithm");
    let score = matches.get_one::<String>("score").map(|s| s.as_str()).unwrap_or("cosine");
    let params = SimilarityParams::from_names(weight, score)?;
    log::info!("similarity parameters : {:?}", params);
    //
    let matrix = compute_similarity(Path::new(root), &params, Path::new(output))?;
    println!("similarity matrix of {} samples written in {}", matrix.get_nb_samples(), output);
    Ok(())
} // end of parse_similarity_cmd

fn main() -> anyhow::Result<()> {
    let _ = init_log();
    //
    let index_cmd = Command::new("index")
        .about("Build the sorted kmer index of each sample of a list of fasta/fastq files")
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .value_name("LIST")
                .help("text file giving one sample file per line")
                .required(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("kmer_size")
                .short('k')
                .long("kmer")
                .help("kmer size, at most 32")
                .required(true)
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("partitions")
                .short('p')
                .long("partitions")
                .help("number of partitions of the kmer space")
                .default_value("1")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("out")
                .short('o')
                .long("out")
                .value_name("INDEXDIR")
                .help("directory where indexes are written")
                .required(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("partition_algo")
                .long("partition-algo")
                .help("range, area or histogram")
                .default_value("histogram")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("filter")
                .long("filter")
                .help("none, notunique, stddev or stddev2")
                .default_value("none")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("chunk_entries")
                .long("chunk-entries")
                .help("maximum number of entries in a chunk file")
                .value_parser(clap::value_parser!(u64))
                .action(ArgAction::Set),
        );
    //
    let similarity_cmd = Command::new("similarity")
        .about("Join sample indexes and write the pairwise similarity matrix")
        .arg(
            Arg::new("index")
                .short('i')
                .long("index")
                .value_name("INDEXDIR")
                .help("directory given as --out to the index command")
                .required(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("weight")
                .short('w')
                .long("weight")
                .help("boolean, natural or logarithm")
                .default_value("logarithm")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("score")
                .short('s')
                .long("score")
                .help("cosine, braycurtis or jensenshannon")
                .default_value("cosine")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("output matrix file")
                .required(true)
                .action(ArgAction::Set),
        );
    //
    let matches = Command::new("kmersim")
        .version("0.1.0")
        .about("Pairwise similarity of sequence samples from their kmer frequencies")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("THREADS")
                .help("Number of threads to use in parallel, defaults to number of cpus")
                .global(true)
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set),
        )
        .subcommand(index_cmd)
        .subcommand(similarity_cmd)
        .get_matches();
    //
    let threads = matches.get_one::<usize>("threads").copied().unwrap_or_else(num_cpus::get);
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("cannot build thread pool")?;
    log::info!("start at {}, nb threads : {}", Local::now().format("%Y-%m-%d %H:%M:%S"), threads);
    //
    let res = match matches.subcommand() {
        Some(("index", sub)) => parse_index_cmd(sub),
        Some(("similarity", sub)) => parse_similarity_cmd(sub),
        _ => Err(anyhow!("unknown subcommand")),
    };
    log::info!("end at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    res
} // end of main
