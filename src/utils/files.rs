//! Sample files : list reading and fasta/fastq parsing with needletail.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;

use crate::error::{KmerSimError, Result};

/// suffixes stripped from a file name to get a sample name
const SEQ_SUFFIXES: [&str; 10] = [".gz", ".bz2", ".xz", ".zst", ".fasta", ".fna", ".fa", ".fastq", ".fq", ".fas"];

/// number of reads sent at once to the kmer counter
pub const READ_BATCH_SIZE: usize = 1000;

/// reads a text file listing sample files, one per line. Empty lines and lines beginning with # are skipped.
pub fn read_sample_list(listfile: &Path) -> Result<Vec<PathBuf>> {
    let file = OpenOptions::new().read(true).open(listfile)?;
    let mut files = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        files.push(PathBuf::from(line));
    }
    log::info!("read {} sample files from list {:?}", files.len(), listfile);
    Ok(files)
} // end of read_sample_list

/// file name without directory and sequence file suffixes
pub fn sample_name(path: &Path) -> String {
    let mut name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    loop {
        match SEQ_SUFFIXES.iter().find(|s| name.ends_with(*s)) {
            Some(suffix) if name.len() > suffix.len() => {
                name.truncate(name.len() - suffix.len());
            }
            _ => break,
        }
    }
    name
}

fn parse_error(path: &Path, err: needletail::errors::ParseError) -> KmerSimError {
    KmerSimError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("parsing {:?} : {}", path, err),
    ))
}

/// calls f on each read of a fasta/fastq file (possibly compressed), stops after max_reads reads if given.
/// Returns the number of reads processed.
pub fn for_each_read<F>(path: &Path, max_reads: Option<usize>, mut f: F) -> Result<usize>
where
    F: FnMut(&[u8]),
{
    log::trace!("processing file {:?}", path);
    let mut reader = needletail::parse_fastx_file(path).map_err(|e| parse_error(path, e))?;
    let mut nb_reads = 0;
    while let Some(record) = reader.next() {
        if max_reads.map_or(false, |max| nb_reads >= max) {
            break;
        }
        let record = record.map_err(|e| parse_error(path, e))?;
        f(&record.seq());
        nb_reads += 1;
    }
    Ok(nb_reads)
} // end of for_each_read

/// sends the reads of a file in batches of READ_BATCH_SIZE. Returns the number of reads sent.
/// A closed channel stops reading.
pub fn send_reads(path: &Path, sender: &Sender<Vec<Vec<u8>>>) -> Result<usize> {
    let mut batch = Vec::with_capacity(READ_BATCH_SIZE);
    let mut closed = false;
    let nb_reads = for_each_read(path, None, |seq| {
        if closed {
            return;
        }
        batch.push(seq.to_vec());
        if batch.len() >= READ_BATCH_SIZE {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(READ_BATCH_SIZE));
            closed = sender.send(full).is_err();
        }
    })?;
    if !batch.is_empty() && !closed {
        closed = sender.send(batch).is_err();
    }
    if closed {
        log::warn!("reader of {:?} : receiver closed before end of file", path);
    }
    Ok(nb_reads)
} // end of send_reads

// end of mod tests
