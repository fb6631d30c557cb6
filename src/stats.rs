/// Per-stage run statistics and reporting
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use log::info;

use crate::normalize::AnnotationStatus;

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// Statistics for reformatting one sample file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReformatSummary {
    pub sample_id: String,
    /// Canonical file written
    pub output: PathBuf,
    /// Data lines seen (blank and comment lines excluded)
    pub lines_read: u64,
    /// Records written to the canonical file
    pub records: u64,
    /// Lines that failed validation and were skipped
    pub skipped: u64,
    pub unique_reads: u64,
    pub multi_reads: u64,
}

impl ReformatSummary {
    pub fn new(sample_id: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            sample_id: sample_id.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn print_summary(&self) {
        info!("=== Reformat Summary: {} ===", self.sample_id);
        info!("Input junction lines: {}", self.lines_read);
        info!(
            "Junctions written: {} ({:.2}%)",
            self.records,
            percent(self.records, self.lines_read)
        );
        if self.skipped > 0 {
            info!(
                "Malformed lines skipped: {} ({:.2}%)",
                self.skipped,
                percent(self.skipped, self.lines_read)
            );
        }
        info!("Unique reads: {}", self.unique_reads);
        info!("Multi-mapping reads: {}", self.multi_reads);
        info!("Output: {}", self.output.display());
    }
}

/// Statistics for one cohort matrix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombineSummary {
    pub sample_ids: Vec<String>,
    /// Distinct junctions (matrix rows)
    pub rows: u64,
    /// Reads per sample column
    pub sample_totals: Vec<u64>,
    /// Junctions with a non-zero count per sample column
    pub sample_junctions: Vec<u64>,
    /// Rows supported by every sample
    pub shared_rows: u64,
}

impl CombineSummary {
    pub fn new(sample_ids: Vec<String>) -> Self {
        let n = sample_ids.len();
        Self {
            sample_ids,
            rows: 0,
            sample_totals: vec![0; n],
            sample_junctions: vec![0; n],
            shared_rows: 0,
        }
    }

    pub fn record_row(&mut self, counts: &[u64]) {
        self.rows += 1;
        let mut present = 0;
        for (i, &count) in counts.iter().enumerate() {
            self.sample_totals[i] += count;
            if count > 0 {
                self.sample_junctions[i] += 1;
                present += 1;
            }
        }
        if present == counts.len() {
            self.shared_rows += 1;
        }
    }

    pub fn print_summary(&self) {
        info!("=== Combine Summary ===");
        info!("Samples: {}", self.sample_ids.len());
        info!("Distinct junctions: {}", self.rows);
        info!(
            "Junctions in every sample: {} ({:.2}%)",
            self.shared_rows,
            percent(self.shared_rows, self.rows)
        );
        for (i, id) in self.sample_ids.iter().enumerate() {
            info!(
                "  {}: {} reads over {} junctions ({:.2}% of rows)",
                id,
                self.sample_totals[i],
                self.sample_junctions[i],
                percent(self.sample_junctions[i], self.rows)
            );
        }
    }
}

/// Statistics for the normalized output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeSummary {
    /// Matrix rows classified
    pub junctions: u64,
    /// Junctions per annotation status
    pub status_counts: BTreeMap<AnnotationStatus, u64>,
    /// Records written to the output
    pub records: u64,
    /// Written records whose ratio is undefined
    pub undefined_ratios: u64,
    /// Chromosomes present in the matrix but absent from the reference
    pub unknown_chromosomes: BTreeSet<String>,
}

impl NormalizeSummary {
    pub fn record_junction(&mut self, status: AnnotationStatus) {
        self.junctions += 1;
        *self.status_counts.entry(status).or_insert(0) += 1;
    }

    pub fn status_count(&self, status: AnnotationStatus) -> u64 {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Fold in the statistics of the next chromosome block.
    pub fn merge(&mut self, other: NormalizeSummary) {
        self.junctions += other.junctions;
        for (status, count) in other.status_counts {
            *self.status_counts.entry(status).or_insert(0) += count;
        }
        self.records += other.records;
        self.undefined_ratios += other.undefined_ratios;
        self.unknown_chromosomes.extend(other.unknown_chromosomes);
    }

    pub fn print_summary(&self) {
        if self.junctions == 0 {
            info!("No junctions normalized");
            return;
        }

        info!("=== Normalize Summary ===");
        info!("Junctions classified: {}", self.junctions);
        for status in AnnotationStatus::ALL {
            let count = self.status_count(status);
            if count > 0 {
                info!(
                    "  {}: {} ({:.2}%)",
                    status,
                    count,
                    percent(count, self.junctions)
                );
            }
        }
        info!("Records written: {}", self.records);
        info!(
            "Undefined ratios: {} ({:.2}%)",
            self.undefined_ratios,
            percent(self.undefined_ratios, self.records)
        );
        if !self.unknown_chromosomes.is_empty() {
            let names: Vec<&str> = self.unknown_chromosomes.iter().map(String::as_str).collect();
            info!("Chromosomes missing from reference: {}", names.join(", "));
        }
    }
}
