/// Reference splice junction annotation
///
/// This module handles:
/// - Building a junction index from a transcript model (GTF or junction table)
/// - Exact junction lookup (annotated vs novel)
/// - Donor/acceptor site lookup for partially annotated junctions
///
/// The index is immutable once built and is shared by reference between
/// normalization workers.
pub mod gtf;
pub mod table;

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::Error;
use crate::junction::{JunctionKey, Strand};
use crate::params::{Parameters, ReferenceFormat};

/// A junction of the transcript model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceJunctionEntry {
    pub key: JunctionKey,
    pub gene_id: String,
    pub transcript_ids: BTreeSet<String>,
}

/// How reference and query chromosome names and coordinates are matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceOptions {
    /// Compare chromosome names ignoring a leading "chr"
    pub strip_chr_prefix: bool,
    /// Register exact-match keys shifted by one base as well
    pub flank_tolerance: bool,
}

impl ReferenceOptions {
    pub fn from_params(params: &Parameters) -> Self {
        Self {
            strip_chr_prefix: params.reference_strip_chr,
            flank_tolerance: params.reference_flank_tolerance,
        }
    }
}

/// Known splice sites of one chromosome, one set per strand slot.
#[derive(Debug, Default)]
struct ChromSites {
    donors: [HashSet<u64>; 3],
    acceptors: [HashSet<u64>; 3],
}

/// Read-only junction index built from a transcript model.
#[derive(Debug)]
pub struct ReferenceIndex {
    /// Map: (chrom, intron_start, intron_end, strand) → entry
    junctions: HashMap<JunctionKey, ReferenceJunctionEntry>,
    /// Map: chrom → known donor/acceptor positions
    sites: HashMap<String, ChromSites>,
    /// Every chromosome the transcript model mentions, with or without junctions
    chromosomes: HashSet<String>,
    options: ReferenceOptions,
}

impl ReferenceIndex {
    /// Create an empty index (every chromosome unknown).
    pub fn empty() -> Self {
        ReferenceIndexBuilder::new(ReferenceOptions::default()).build()
    }

    /// Build the index from the reference configured in `params`.
    pub fn from_params(params: &Parameters) -> Result<Self, Error> {
        let path = params
            .reference_file
            .as_deref()
            .ok_or_else(|| Error::Parameter("--referenceFile is required".into()))?;
        let options = ReferenceOptions::from_params(params);

        match params.reference_format {
            ReferenceFormat::Gtf => gtf::load_gtf(path, options),
            ReferenceFormat::JunctionTable => {
                let columns = table::TableColumns {
                    chrom: params.reference_chrom_col,
                    start: params.reference_start_col,
                    end: params.reference_end_col,
                    strand: params.reference_strand_col(),
                    gene: params.reference_gene_col(),
                    transcript: params.reference_transcript_col(),
                };
                table::load_junction_table(path, &columns, options)
            }
        }
    }

    fn chrom_name<'a>(&self, chrom: &'a str) -> &'a str {
        canonical_chrom(chrom, self.options)
    }

    /// Exact junction lookup.
    pub fn lookup(&self, key: &JunctionKey) -> Option<&ReferenceJunctionEntry> {
        let name = self.chrom_name(&key.chrom);
        if name.len() == key.chrom.len() {
            self.junctions.get(key)
        } else {
            let stripped = JunctionKey::new(name, key.start, key.end, key.strand);
            self.junctions.get(&stripped)
        }
    }

    /// Is `position` a known donor site on this chromosome and strand?
    pub fn lookup_donor(&self, chrom: &str, strand: Strand, position: u64) -> bool {
        self.sites
            .get(self.chrom_name(chrom))
            .is_some_and(|sites| sites.donors[strand.index()].contains(&position))
    }

    /// Is `position` a known acceptor site on this chromosome and strand?
    pub fn lookup_acceptor(&self, chrom: &str, strand: Strand, position: u64) -> bool {
        self.sites
            .get(self.chrom_name(chrom))
            .is_some_and(|sites| sites.acceptors[strand.index()].contains(&position))
    }

    /// Does the transcript model mention this chromosome at all?
    pub fn has_chromosome(&self, chrom: &str) -> bool {
        self.chromosomes.contains(self.chrom_name(chrom))
    }

    /// Number of exact-match keys (including flank variants)
    pub fn len(&self) -> usize {
        self.junctions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.junctions.is_empty()
    }

    pub fn n_chromosomes(&self) -> usize {
        self.chromosomes.len()
    }
}

fn canonical_chrom(chrom: &str, options: ReferenceOptions) -> &str {
    if options.strip_chr_prefix {
        chrom.strip_prefix("chr").unwrap_or(chrom)
    } else {
        chrom
    }
}

/// Accumulates reference junctions; `build` freezes them into an index.
#[derive(Debug)]
pub struct ReferenceIndexBuilder {
    options: ReferenceOptions,
    entries: HashMap<JunctionKey, ReferenceJunctionEntry>,
    chromosomes: HashSet<String>,
}

impl ReferenceIndexBuilder {
    pub fn new(options: ReferenceOptions) -> Self {
        Self {
            options,
            entries: HashMap::new(),
            chromosomes: HashSet::new(),
        }
    }

    /// Record a chromosome of the transcript model even if it carries no
    /// junction (single-exon transcripts only, e.g. chrM).
    pub fn add_chromosome(&mut self, chrom: &str) {
        let chrom = canonical_chrom(chrom, self.options);
        if !self.chromosomes.contains(chrom) {
            self.chromosomes.insert(chrom.to_string());
        }
    }

    /// Add one junction of one transcript.
    ///
    /// Repeated keys merge their transcript sets. When two genes share a
    /// junction the smaller gene id is kept so the result does not depend on
    /// input order.
    pub fn add(&mut self, key: JunctionKey, gene_id: &str, transcript_id: Option<&str>) {
        let chrom = canonical_chrom(&key.chrom, self.options);
        let key = if chrom.len() == key.chrom.len() {
            key
        } else {
            JunctionKey::new(chrom, key.start, key.end, key.strand)
        };
        if !self.chromosomes.contains(&key.chrom) {
            self.chromosomes.insert(key.chrom.clone());
        }

        let entry = self
            .entries
            .entry(key)
            .or_insert_with_key(|key| ReferenceJunctionEntry {
                key: key.clone(),
                gene_id: gene_id.to_string(),
                transcript_ids: BTreeSet::new(),
            });

        if gene_id < entry.gene_id.as_str() {
            log::debug!(
                "Junction {} shared by genes {} and {}",
                entry.key,
                entry.gene_id,
                gene_id
            );
            entry.gene_id = gene_id.to_string();
        }
        if let Some(transcript_id) = transcript_id {
            entry.transcript_ids.insert(transcript_id.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> ReferenceIndex {
        let mut sites: HashMap<String, ChromSites> = HashMap::new();
        for key in self.entries.keys() {
            let chrom_sites = sites.entry(key.chrom.clone()).or_default();
            chrom_sites.donors[key.strand.index()].insert(key.donor());
            chrom_sites.acceptors[key.strand.index()].insert(key.acceptor());
        }

        let junctions = if self.options.flank_tolerance {
            with_flank_variants(self.entries)
        } else {
            self.entries
        };

        ReferenceIndex {
            junctions,
            sites,
            chromosomes: self.chromosomes,
            options: self.options,
        }
    }
}

/// Add off-by-one variants of every junction: both ends shifted -1 or +1,
/// the outer (start-1, end+1) and the inner (start+1, end-1) interval.
/// Exact entries always win over a variant of a neighbouring junction.
fn with_flank_variants(
    entries: HashMap<JunctionKey, ReferenceJunctionEntry>,
) -> HashMap<JunctionKey, ReferenceJunctionEntry> {
    const SHIFTS: [(i64, i64); 4] = [(-1, -1), (1, 1), (-1, 1), (1, -1)];

    let mut variants: Vec<(JunctionKey, ReferenceJunctionEntry)> = Vec::new();
    for (key, entry) in &entries {
        for (ds, de) in SHIFTS {
            let (Some(start), Some(end)) = (
                key.start.checked_add_signed(ds),
                key.end.checked_add_signed(de),
            ) else {
                continue;
            };
            if start == 0 || start > end {
                continue;
            }
            variants.push((JunctionKey::new(key.chrom.clone(), start, end, key.strand), entry.clone()));
        }
    }
    // Deterministic winner when two junctions produce the same variant
    variants.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.key.cmp(&b.1.key)));

    let mut junctions = entries;
    for (key, entry) in variants {
        junctions.entry(key).or_insert(entry);
    }
    junctions
}
