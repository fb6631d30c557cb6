use std::path::PathBuf;

use clap::Parser;

// ---------------------------------------------------------------------------
// Run mode enum
// ---------------------------------------------------------------------------

/// `--runMode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Reformat,
    Combine,
    Normalize,
    Pipeline,
}

impl std::str::FromStr for RunMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reformat" => Ok(Self::Reformat),
            "combine" => Ok(Self::Combine),
            "normalize" => Ok(Self::Normalize),
            "pipeline" => Ok(Self::Pipeline),
            _ => Err(format!(
                "unknown runMode '{s}'; expected 'reformat', 'combine', 'normalize' or 'pipeline'"
            )),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reformat => write!(f, "reformat"),
            Self::Combine => write!(f, "combine"),
            Self::Normalize => write!(f, "normalize"),
            Self::Pipeline => write!(f, "pipeline"),
        }
    }
}

// ---------------------------------------------------------------------------
// Matrix cell count
// ---------------------------------------------------------------------------

/// Which aligner read counts make up a matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountMode {
    /// Uniquely mapping reads only
    #[default]
    Unique,
    /// Unique plus multi-mapping reads
    UniqueAndMulti,
}

impl std::str::FromStr for CountMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unique" => Ok(Self::Unique),
            "UniqueAndMulti" => Ok(Self::UniqueAndMulti),
            _ => Err(format!("unknown countMode value: '{s}'")),
        }
    }
}

impl std::fmt::Display for CountMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unique => write!(f, "Unique"),
            Self::UniqueAndMulti => write!(f, "UniqueAndMulti"),
        }
    }
}

// ---------------------------------------------------------------------------
// Reference format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceFormat {
    #[default]
    Gtf,
    JunctionTable,
}

impl std::str::FromStr for ReferenceFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GTF" => Ok(Self::Gtf),
            "JunctionTable" => Ok(Self::JunctionTable),
            _ => Err(format!("unknown referenceFormat value: '{s}'")),
        }
    }
}

impl std::fmt::Display for ReferenceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gtf => write!(f, "GTF"),
            Self::JunctionTable => write!(f, "JunctionTable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization policy
// ---------------------------------------------------------------------------

/// Which competing junctions form the denominator of a usage ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormContext {
    /// Junctions sharing the donor site
    #[default]
    Donor,
    /// Junctions sharing the acceptor site
    Acceptor,
    /// The larger of the donor and acceptor totals
    SpliceSiteMax,
}

impl std::str::FromStr for NormContext {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Donor" => Ok(Self::Donor),
            "Acceptor" => Ok(Self::Acceptor),
            "SpliceSiteMax" => Ok(Self::SpliceSiteMax),
            _ => Err(format!("unknown normContext value: '{s}'")),
        }
    }
}

impl std::fmt::Display for NormContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Donor => write!(f, "Donor"),
            Self::Acceptor => write!(f, "Acceptor"),
            Self::SpliceSiteMax => write!(f, "SpliceSiteMax"),
        }
    }
}

/// Which matrix cells produce a normalized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormEmit {
    #[default]
    All,
    NonZero,
}

impl std::str::FromStr for NormEmit {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "All" => Ok(Self::All),
            "NonZero" => Ok(Self::NonZero),
            _ => Err(format!("unknown normEmit value: '{s}'")),
        }
    }
}

impl std::fmt::Display for NormEmit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::NonZero => write!(f, "NonZero"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters struct
// ---------------------------------------------------------------------------

/// sjcohort command-line parameters, using STAR-style `--camelCase` names.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sjcohort",
    about = "Cohort splice junction matrix and reference-based normalization",
    version
)]
pub struct Parameters {
    // ── Run ─────────────────────────────────────────────────────────────
    /// Run mode: reformat, combine, normalize or pipeline
    #[arg(long = "runMode", default_value = "pipeline")]
    pub run_mode: RunMode,

    /// Number of threads
    #[arg(long = "runThreadN", default_value_t = 1)]
    pub run_thread_n: usize,

    // ── Input ───────────────────────────────────────────────────────────
    /// Junction files: raw SJ.out.tab (reformat, pipeline) or canonical (combine)
    #[arg(long = "sjFilesIn", num_args = 1..)]
    pub sj_files_in: Vec<PathBuf>,

    /// Sample ids, one per --sjFilesIn entry (default: derived from file names)
    #[arg(long = "sampleIds", num_args = 1..)]
    pub sample_ids: Vec<String>,

    /// Combined junction matrix (normalize)
    #[arg(long = "matrixFileIn")]
    pub matrix_file_in: Option<PathBuf>,

    /// Cohort identifier used to name the matrix and normalized outputs
    #[arg(long = "cohortId", default_value = "cohort")]
    pub cohort_id: String,

    // ── Output ──────────────────────────────────────────────────────────
    /// Output file name prefix (including path)
    #[arg(long = "outFileNamePrefix", default_value = "./")]
    pub out_file_name_prefix: PathBuf,

    /// Drop ANNOTATED junctions from the normalized output
    #[arg(long = "outNovelOnly")]
    pub out_novel_only: bool,

    // ── Combine ─────────────────────────────────────────────────────────
    /// Matrix cell count: Unique or UniqueAndMulti
    #[arg(long = "countMode", default_value = "Unique")]
    pub count_mode: CountMode,

    // ── Reference ───────────────────────────────────────────────────────
    /// Transcript model reference (GTF or junction table)
    #[arg(long = "referenceFile")]
    pub reference_file: Option<PathBuf>,

    /// Reference format: GTF or JunctionTable
    #[arg(long = "referenceFormat", default_value = "GTF")]
    pub reference_format: ReferenceFormat,

    /// Junction table: chromosome column (0-based)
    #[arg(long = "referenceChromCol", default_value_t = 0)]
    pub reference_chrom_col: usize,

    /// Junction table: intron start column (0-based)
    #[arg(long = "referenceStartCol", default_value_t = 1)]
    pub reference_start_col: usize,

    /// Junction table: intron end column (0-based)
    #[arg(long = "referenceEndCol", default_value_t = 2)]
    pub reference_end_col: usize,

    /// Junction table: strand column (0-based, -1 = none)
    #[arg(long = "referenceStrandCol", default_value_t = 3, allow_negative_numbers = true)]
    pub reference_strand_col: i32,

    /// Junction table: gene id column (0-based, -1 = none)
    #[arg(long = "referenceGeneCol", default_value_t = 4, allow_negative_numbers = true)]
    pub reference_gene_col: i32,

    /// Junction table: transcript id column (0-based, -1 = none)
    #[arg(long = "referenceTranscriptCol", default_value_t = 5, allow_negative_numbers = true)]
    pub reference_transcript_col: i32,

    /// Match chromosome names ignoring a leading "chr"
    #[arg(long = "referenceStripChr")]
    pub reference_strip_chr: bool,

    /// Also accept reference junctions shifted by one base
    #[arg(long = "referenceFlankTolerance")]
    pub reference_flank_tolerance: bool,

    // ── Normalization ───────────────────────────────────────────────────
    /// Ratio denominator: Donor, Acceptor or SpliceSiteMax
    #[arg(long = "normContext", default_value = "Donor")]
    pub norm_context: NormContext,

    /// Emit all matrix cells or only non-zero ones: All or NonZero
    #[arg(long = "normEmit", default_value = "All")]
    pub norm_emit: NormEmit,
}

impl Parameters {
    /// Output path for a file name, STAR-style (prefix is concatenated as text).
    pub fn output_path(&self, name: &str) -> PathBuf {
        let mut path = self.out_file_name_prefix.clone().into_os_string();
        path.push(name);
        PathBuf::from(path)
    }

    pub fn matrix_output_path(&self) -> PathBuf {
        self.output_path(&format!("{}.SJ.matrix.tsv", self.cohort_id))
    }

    pub fn normalized_output_path(&self) -> PathBuf {
        self.output_path(&format!("{}.SJ.normalized.tsv", self.cohort_id))
    }

    pub fn canonical_output_path(&self, sample_id: &str) -> PathBuf {
        self.output_path(&format!("{sample_id}.SJ.canonical.tsv"))
    }

    /// Optional table column: negative values disable it.
    fn optional_col(col: i32) -> Option<usize> {
        usize::try_from(col).ok()
    }

    pub fn reference_strand_col(&self) -> Option<usize> {
        Self::optional_col(self.reference_strand_col)
    }

    pub fn reference_gene_col(&self) -> Option<usize> {
        Self::optional_col(self.reference_gene_col)
    }

    pub fn reference_transcript_col(&self) -> Option<usize> {
        Self::optional_col(self.reference_transcript_col)
    }

    /// Validate parameter combinations that clap alone cannot enforce.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        use crate::error::Error;

        // Thread count must be at least 1
        if self.run_thread_n == 0 {
            return Err(Error::Parameter("--runThreadN must be >= 1".into()));
        }

        let needs_sj_files = matches!(
            self.run_mode,
            RunMode::Reformat | RunMode::Combine | RunMode::Pipeline
        );
        if needs_sj_files && self.sj_files_in.is_empty() {
            return Err(Error::EmptyInputSet);
        }

        if !self.sample_ids.is_empty() && self.sample_ids.len() != self.sj_files_in.len() {
            return Err(Error::Parameter(format!(
                "--sampleIds has {} entries but --sjFilesIn has {}",
                self.sample_ids.len(),
                self.sj_files_in.len()
            )));
        }

        for sample_id in &self.sample_ids {
            validate_sample_id(sample_id)?;
        }

        if self.run_mode == RunMode::Normalize && self.matrix_file_in.is_none() {
            return Err(Error::Parameter(
                "--matrixFileIn is required when --runMode normalize".into(),
            ));
        }

        let needs_reference = matches!(self.run_mode, RunMode::Normalize | RunMode::Pipeline);
        if needs_reference && self.reference_file.is_none() {
            return Err(Error::Parameter(format!(
                "--referenceFile is required when --runMode {}",
                self.run_mode
            )));
        }

        if self.cohort_id.is_empty() || self.cohort_id.contains('/') {
            return Err(Error::Parameter(format!(
                "--cohortId '{}' is not a valid file name component",
                self.cohort_id
            )));
        }

        Ok(())
    }
}

/// Sample ids become matrix header columns and output file names, so they
/// must be non-empty and free of tabs, line breaks and path separators.
pub fn validate_sample_id(sample_id: &str) -> Result<(), crate::error::Error> {
    if sample_id.is_empty() {
        return Err(crate::error::Error::Parameter("sample id must not be empty".into()));
    }
    if let Some(c) = sample_id
        .chars()
        .find(|c| matches!(c, '\t' | '\n' | '\r' | '/'))
    {
        return Err(crate::error::Error::Parameter(format!(
            "sample id {:?} contains forbidden character {:?}",
            sample_id, c
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
