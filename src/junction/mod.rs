/// Splice junction identity and value types
///
/// Coordinates follow the STAR SJ.out.tab convention: 1-based, inclusive
/// intron start and end. A junction's identity is its `JunctionKey`; every
/// other field of a `JunctionRecord` is a per-sample observation.
use std::fmt;

use crate::params::CountMode;

/// Strand of a junction.
///
/// Variant order is the byte order of the text tokens (`+` < `-` < `.`),
/// so sorting keys and sorting their text agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strand {
    Plus,
    Minus,
    Undefined,
}

impl Strand {
    /// STAR strand code: 0=undefined, 1=+, 2=-
    pub fn from_star_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Undefined),
            1 => Some(Self::Plus),
            2 => Some(Self::Minus),
            _ => None,
        }
    }

    pub fn star_code(self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::Plus => 1,
            Self::Minus => 2,
        }
    }

    /// Parse the text token used in canonical and matrix files.
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Self::Plus),
            "-" => Some(Self::Minus),
            "." => Some(Self::Undefined),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Undefined => ".",
        }
    }

    /// Slot used by per-strand lookup tables.
    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Plus => 0,
            Self::Minus => 1,
            Self::Undefined => 2,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Intron motif as reported by the aligner.
///
/// STAR convention:
/// 0 = non-canonical
/// 1 = GT/AG
/// 2 = CT/AC
/// 3 = GC/AG
/// 4 = CT/GC
/// 5 = AT/AC
/// 6 = GT/AT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motif {
    NonCanonical,
    GtAg,
    CtAc,
    GcAg,
    CtGc,
    AtAc,
    GtAt,
}

impl Motif {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NonCanonical),
            1 => Some(Self::GtAg),
            2 => Some(Self::CtAc),
            3 => Some(Self::GcAg),
            4 => Some(Self::CtGc),
            5 => Some(Self::AtAc),
            6 => Some(Self::GtAt),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::NonCanonical => 0,
            Self::GtAg => 1,
            Self::CtAc => 2,
            Self::GcAg => 3,
            Self::CtGc => 4,
            Self::AtAc => 5,
            Self::GtAt => 6,
        }
    }
}

/// Identity of a splice event: (chromosome, intron start, intron end, strand).
///
/// Ordering is (chromosome as a case-sensitive byte string, start, end,
/// strand). It is not genome-order-aware: `chr10` sorts before `chr2`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JunctionKey {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
}

impl JunctionKey {
    pub fn new(chrom: impl Into<String>, start: u64, end: u64, strand: Strand) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
            strand,
        }
    }

    /// 5' intron boundary. On the minus strand this is the higher coordinate;
    /// junctions without a strand are treated as plus.
    #[inline]
    pub fn donor(&self) -> u64 {
        match self.strand {
            Strand::Minus => self.end,
            Strand::Plus | Strand::Undefined => self.start,
        }
    }

    /// 3' intron boundary.
    #[inline]
    pub fn acceptor(&self) -> u64 {
        match self.strand {
            Strand::Minus => self.start,
            Strand::Plus | Strand::Undefined => self.end,
        }
    }
}

impl fmt::Display for JunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}:{}", self.chrom, self.start, self.end, self.strand)
    }
}

/// One sample's observation of a junction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionRecord {
    pub key: JunctionKey,
    pub motif: Motif,
    /// Annotation flag reported by the aligner (its own sjdb), not the
    /// cohort reference classification.
    pub annotated: bool,
    pub unique_reads: u32,
    pub multi_reads: u32,
    pub max_overhang: u32,
    pub sample_id: String,
}

impl JunctionRecord {
    /// Read count contributed to the cohort matrix.
    #[inline]
    pub fn count(&self, mode: CountMode) -> u64 {
        match mode {
            CountMode::Unique => u64::from(self.unique_reads),
            CountMode::UniqueAndMulti => {
                u64::from(self.unique_reads) + u64::from(self.multi_reads)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strand_codes() {
        assert_eq!(Strand::from_star_code(0), Some(Strand::Undefined));
        assert_eq!(Strand::from_star_code(1), Some(Strand::Plus));
        assert_eq!(Strand::from_star_code(2), Some(Strand::Minus));
        assert_eq!(Strand::from_star_code(5), None);
        for strand in [Strand::Plus, Strand::Minus, Strand::Undefined] {
            assert_eq!(Strand::from_star_code(strand.star_code()), Some(strand));
            assert_eq!(Strand::from_symbol(strand.symbol()), Some(strand));
        }
    }

    #[test]
    fn test_strand_order_matches_symbol_order() {
        let mut strands = vec![Strand::Undefined, Strand::Minus, Strand::Plus];
        strands.sort();
        let mut symbols: Vec<&str> = strands.iter().map(|s| s.symbol()).collect();
        let sorted_by_enum = symbols.clone();
        symbols.sort();
        assert_eq!(symbols, sorted_by_enum);
    }

    #[test]
    fn test_motif_codes() {
        for code in 0..=6u8 {
            assert_eq!(Motif::from_code(code).unwrap().code(), code);
        }
        assert_eq!(Motif::from_code(7), None);
        assert_eq!(Motif::from_code(1), Some(Motif::GtAg));
    }

    #[test]
    fn test_key_ordering_is_lexicographic() {
        let a = JunctionKey::new("chr10", 500, 600, Strand::Plus);
        let b = JunctionKey::new("chr2", 100, 200, Strand::Plus);
        assert!(a < b); // "chr10" < "chr2" bytewise

        let c = JunctionKey::new("chr1", 100, 200, Strand::Plus);
        let d = JunctionKey::new("chr1", 100, 250, Strand::Plus);
        let e = JunctionKey::new("chr1", 100, 250, Strand::Minus);
        assert!(c < d);
        assert!(d < e);

        // Case-sensitive
        let upper = JunctionKey::new("Chr1", 100, 200, Strand::Plus);
        assert!(upper < c);
    }

    #[test]
    fn test_donor_acceptor_strand_aware() {
        let plus = JunctionKey::new("chr1", 100, 200, Strand::Plus);
        assert_eq!(plus.donor(), 100);
        assert_eq!(plus.acceptor(), 200);

        let minus = JunctionKey::new("chr1", 100, 200, Strand::Minus);
        assert_eq!(minus.donor(), 200);
        assert_eq!(minus.acceptor(), 100);

        let undefined = JunctionKey::new("chr1", 100, 200, Strand::Undefined);
        assert_eq!(undefined.donor(), 100);
    }

    #[test]
    fn test_key_display() {
        let key = JunctionKey::new("chr1", 100, 200, Strand::Minus);
        assert_eq!(key.to_string(), "chr1:100-200:-");
    }

    #[test]
    fn test_record_count_modes() {
        let record = JunctionRecord {
            key: JunctionKey::new("chr1", 100, 200, Strand::Plus),
            motif: Motif::GtAg,
            annotated: false,
            unique_reads: 7,
            multi_reads: 3,
            max_overhang: 40,
            sample_id: "A".to_string(),
        };
        assert_eq!(record.count(CountMode::Unique), 7);
        assert_eq!(record.count(CountMode::UniqueAndMulti), 10);
    }
}
