/// Reference classification and splice-site usage normalization
///
/// Every matrix row is classified against the `ReferenceIndex`, and every
/// (junction, sample) cell gets a usage ratio: its count divided by the
/// sample's total over the junctions sharing the same splice site. Junctions
/// never cross chromosomes, so the matrix is processed one chromosome block
/// at a time, several blocks in parallel, with results written in matrix
/// order.
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::Path;

use log::{info, warn};
use rayon::prelude::*;

use crate::combine::MatrixRow;
use crate::error::Error;
use crate::io::matrix::{ChromosomeBlock, MatrixReader};
use crate::io::OutputFile;
use crate::junction::{JunctionKey, Strand};
use crate::params::{NormContext, NormEmit, Parameters};
use crate::reference::ReferenceIndex;
use crate::stats::NormalizeSummary;

pub const NORMALIZED_HEADER: &str = "chrom\tstart\tend\tstrand\tsample_id\traw_count\tannotation_status\tgene_id\tnormalized_ratio";

/// Relationship of a junction to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnnotationStatus {
    Annotated,
    /// Known donor, unannotated acceptor
    NovelAcceptor,
    /// Known acceptor, unannotated donor
    NovelDonor,
    Novel,
    UnknownChromosome,
}

impl AnnotationStatus {
    pub const ALL: [Self; 5] = [
        Self::Annotated,
        Self::NovelAcceptor,
        Self::NovelDonor,
        Self::Novel,
        Self::UnknownChromosome,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Annotated => "ANNOTATED",
            Self::NovelAcceptor => "NOVEL_ACCEPTOR",
            Self::NovelDonor => "NOVEL_DONOR",
            Self::Novel => "NOVEL",
            Self::UnknownChromosome => "UNKNOWN_CHROMOSOME",
        }
    }
}

impl fmt::Display for AnnotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized usage ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    Value(f64),
    /// The splice site has no reads in this sample
    Undefined,
}

impl Ratio {
    pub fn new(count: u64, denominator: u64) -> Self {
        if denominator == 0 {
            Self::Undefined
        } else {
            Self::Value(count as f64 / denominator as f64)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, Self::Undefined)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.3}"),
            Self::Undefined => f.write_str("undefined"),
        }
    }
}

/// One output cell.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord<'a> {
    pub key: &'a JunctionKey,
    pub sample_id: &'a str,
    pub raw_count: u64,
    pub status: AnnotationStatus,
    pub gene_id: Option<&'a str>,
    pub ratio: Ratio,
}

/// A classified matrix row with one ratio per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub key: JunctionKey,
    pub status: AnnotationStatus,
    pub gene_id: Option<String>,
    pub counts: Vec<u64>,
    pub ratios: Vec<Ratio>,
}

impl NormalizedRow {
    /// The row's cells, in sample column order.
    pub fn records<'a>(
        &'a self,
        sample_ids: &'a [String],
    ) -> impl Iterator<Item = NormalizedRecord<'a>> + 'a {
        sample_ids
            .iter()
            .zip(self.counts.iter().zip(&self.ratios))
            .map(move |(sample_id, (&raw_count, &ratio))| NormalizedRecord {
                key: &self.key,
                sample_id: sample_id.as_str(),
                raw_count,
                status: self.status,
                gene_id: self.gene_id.as_deref(),
                ratio,
            })
    }
}

/// Output policy for the normalized file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub context: NormContext,
    pub emit: NormEmit,
    /// Drop ANNOTATED junctions from the output
    pub novel_only: bool,
    /// Chromosome blocks normalized concurrently
    pub batch_size: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            context: NormContext::Donor,
            emit: NormEmit::All,
            novel_only: false,
            batch_size: 1,
        }
    }
}

impl NormalizeOptions {
    pub fn from_params(params: &Parameters) -> Self {
        Self {
            context: params.norm_context,
            emit: params.norm_emit,
            novel_only: params.out_novel_only,
            batch_size: params.run_thread_n.max(1),
        }
    }

    fn emits(&self, record: &NormalizedRecord<'_>) -> bool {
        if self.novel_only && record.status == AnnotationStatus::Annotated {
            return false;
        }
        match self.emit {
            NormEmit::All => true,
            NormEmit::NonZero => record.raw_count > 0,
        }
    }
}

/// Classify one junction against the reference.
///
/// Returns the status and, for annotated junctions, the gene id.
pub fn classify<'a>(
    key: &JunctionKey,
    index: &'a ReferenceIndex,
) -> (AnnotationStatus, Option<&'a str>) {
    if !index.has_chromosome(&key.chrom) {
        return (AnnotationStatus::UnknownChromosome, None);
    }
    if let Some(entry) = index.lookup(key) {
        return (AnnotationStatus::Annotated, Some(entry.gene_id.as_str()));
    }
    if index.lookup_donor(&key.chrom, key.strand, key.donor()) {
        return (AnnotationStatus::NovelAcceptor, None);
    }
    if index.lookup_acceptor(&key.chrom, key.strand, key.acceptor()) {
        return (AnnotationStatus::NovelDonor, None);
    }
    (AnnotationStatus::Novel, None)
}

/// Per-sample read totals at each splice site of one chromosome.
struct SiteTotals {
    donors: HashMap<(Strand, u64), Vec<u64>>,
    acceptors: HashMap<(Strand, u64), Vec<u64>>,
}

impl SiteTotals {
    fn from_rows(rows: &[MatrixRow]) -> Self {
        let mut totals = Self {
            donors: HashMap::new(),
            acceptors: HashMap::new(),
        };
        for row in rows {
            let n = row.counts.len();
            let donor = totals
                .donors
                .entry((row.key.strand, row.key.donor()))
                .or_insert_with(|| vec![0; n]);
            for (sum, &count) in donor.iter_mut().zip(&row.counts) {
                *sum += count;
            }
            let acceptor = totals
                .acceptors
                .entry((row.key.strand, row.key.acceptor()))
                .or_insert_with(|| vec![0; n]);
            for (sum, &count) in acceptor.iter_mut().zip(&row.counts) {
                *sum += count;
            }
        }
        totals
    }

    fn denominator(&self, key: &JunctionKey, sample: usize, context: NormContext) -> u64 {
        let site = |map: &HashMap<(Strand, u64), Vec<u64>>, pos: u64| {
            map.get(&(key.strand, pos))
                .and_then(|sums| sums.get(sample))
                .copied()
                .unwrap_or(0)
        };
        match context {
            NormContext::Donor => site(&self.donors, key.donor()),
            NormContext::Acceptor => site(&self.acceptors, key.acceptor()),
            NormContext::SpliceSiteMax => {
                site(&self.donors, key.donor()).max(site(&self.acceptors, key.acceptor()))
            }
        }
    }
}

/// Classify and normalize all rows of one chromosome.
pub fn normalize_rows(
    rows: Vec<MatrixRow>,
    index: &ReferenceIndex,
    context: NormContext,
) -> Vec<NormalizedRow> {
    let totals = SiteTotals::from_rows(&rows);

    rows.into_iter()
        .map(|row| {
            let (status, gene_id) = classify(&row.key, index);
            let ratios = row
                .counts
                .iter()
                .enumerate()
                .map(|(sample, &count)| {
                    Ratio::new(count, totals.denominator(&row.key, sample, context))
                })
                .collect();
            NormalizedRow {
                status,
                gene_id: gene_id.map(str::to_string),
                ratios,
                key: row.key,
                counts: row.counts,
            }
        })
        .collect()
}

/// One normalized chromosome block: its rendered output lines and the
/// statistics of the rows and records in it.
struct NormalizedBlock {
    chrom: String,
    lines: Vec<u8>,
    summary: NormalizeSummary,
}

fn normalize_block(
    block: ChromosomeBlock,
    index: &ReferenceIndex,
    sample_ids: &[String],
    options: NormalizeOptions,
) -> std::io::Result<NormalizedBlock> {
    let mut summary = NormalizeSummary::default();
    if !index.has_chromosome(&block.chrom) {
        summary.unknown_chromosomes.insert(block.chrom.clone());
    }

    let mut lines = Vec::new();
    for row in normalize_rows(block.rows, index, options.context) {
        summary.record_junction(row.status);
        for record in row.records(sample_ids) {
            if !options.emits(&record) {
                continue;
            }
            write_record(&mut lines, &record)?;
            summary.records += 1;
            if record.ratio.is_undefined() {
                summary.undefined_ratios += 1;
            }
        }
    }

    Ok(NormalizedBlock {
        chrom: block.chrom,
        lines,
        summary,
    })
}

fn write_record<W: Write>(writer: &mut W, record: &NormalizedRecord<'_>) -> std::io::Result<()> {
    writeln!(
        writer,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        record.key.chrom,
        record.key.start,
        record.key.end,
        record.key.strand,
        record.sample_id,
        record.raw_count,
        record.status,
        record.gene_id.unwrap_or(""),
        record.ratio
    )
}

/// Normalize the matrix file at `matrix_path` into `output`.
///
/// Any structural problem in the matrix aborts the run and leaves no output.
pub fn normalize_matrix(
    matrix_path: &Path,
    index: &ReferenceIndex,
    output: &Path,
    options: NormalizeOptions,
) -> Result<NormalizeSummary, Error> {
    let mut reader = MatrixReader::open(matrix_path)?;
    let sample_ids = reader.sample_ids().to_vec();
    info!(
        "Normalizing {} ({} samples, normContext {}, normEmit {})",
        matrix_path.display(),
        sample_ids.len(),
        options.context,
        options.emit
    );

    let mut out = OutputFile::create(output)?;
    writeln!(out, "{NORMALIZED_HEADER}").map_err(|e| Error::io(e, output))?;
    let mut summary = NormalizeSummary::default();

    loop {
        let batch = reader.read_batch(options.batch_size.max(1))?;
        if batch.is_empty() {
            break;
        }

        let blocks = batch
            .into_par_iter()
            .map(|block| normalize_block(block, index, &sample_ids, options))
            .collect::<std::io::Result<Vec<NormalizedBlock>>>()
            .map_err(|e| Error::io(e, output))?;

        for block in blocks {
            if block.summary.unknown_chromosomes.contains(&block.chrom)
                && !summary.unknown_chromosomes.contains(&block.chrom)
            {
                warn!(
                    "Chromosome {} is not in the reference; its junctions are {}",
                    block.chrom,
                    AnnotationStatus::UnknownChromosome
                );
            }

            out.write_all(&block.lines).map_err(|e| Error::io(e, output))?;
            summary.merge(block.summary);
        }
    }

    out.commit()?;
    info!(
        "Wrote {} normalized records to {}",
        summary.records,
        output.display()
    );

    Ok(summary)
}
