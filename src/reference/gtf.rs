/// GTF transcript model loading
///
/// Supports standard GTF format (tab-separated, 9 columns):
/// 1. seqname (chromosome)
/// 2. source (ignored)
/// 3. feature (only "exon" is used)
/// 4. start (1-based inclusive)
/// 5. end (1-based inclusive)
/// 6. score (ignored)
/// 7. strand (+, -, .)
/// 8. frame (ignored)
/// 9. attributes (semicolon-separated key-value pairs)
use crate::error::Error;
use crate::io::LineReader;
use crate::junction::{JunctionKey, Strand};
use crate::reference::{ReferenceIndex, ReferenceIndexBuilder, ReferenceOptions};
use std::collections::HashMap;
use std::path::Path;

/// GTF exon record
#[derive(Debug, Clone)]
pub struct GtfExon {
    pub seqname: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub gene_id: String,
    pub transcript_id: String,
}

/// Build a reference index from the exons of a GTF file (plain or gzipped).
pub fn load_gtf(path: &Path, options: ReferenceOptions) -> Result<ReferenceIndex, Error> {
    log::info!("Loading GTF annotations from: {}", path.display());

    let exons = parse_gtf(path)?;
    log::debug!("Parsed {} exon features from GTF", exons.len());

    let mut builder = ReferenceIndexBuilder::new(options);
    let n_introns = add_transcript_junctions(exons, &mut builder);
    log::info!(
        "Extracted {} annotated junctions ({} distinct) from GTF",
        n_introns,
        builder.len()
    );

    Ok(builder.build())
}

/// Parse GTF file and extract exon features
pub fn parse_gtf(path: &Path) -> Result<Vec<GtfExon>, Error> {
    let mut lines = LineReader::open(path)?;
    let mut exons = Vec::new();

    while let Some((line_num, line)) = lines.next_line()? {
        // Skip comments and empty lines
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_gtf_line(line) {
            Ok(Some(exon)) => exons.push(exon),
            Ok(None) => {}
            Err(GtfLineError::MissingTranscriptId) => {
                return Err(Error::Reference(format!(
                    "{}:{}: exon missing transcript_id attribute",
                    path.display(),
                    line_num
                )));
            }
            Err(GtfLineError::Malformed(reason)) => {
                log::warn!("Skipping malformed GTF line {}: {}", line_num, reason);
            }
        }
    }

    Ok(exons)
}

#[derive(Debug)]
enum GtfLineError {
    /// Skipped with a warning
    Malformed(String),
    /// Fatal: the exon cannot be assigned to a transcript
    MissingTranscriptId,
}

/// Parse a single GTF line; non-exon features yield `None`.
fn parse_gtf_line(line: &str) -> Result<Option<GtfExon>, GtfLineError> {
    let fields: Vec<&str> = line.split('\t').collect();

    if fields.len() < 9 {
        return Err(GtfLineError::Malformed(format!(
            "GTF line has {} fields, expected 9",
            fields.len()
        )));
    }

    if !fields[2].eq_ignore_ascii_case("exon") {
        return Ok(None);
    }

    let start = fields[3]
        .parse::<u64>()
        .map_err(|e| GtfLineError::Malformed(format!("Invalid start position: {}", e)))?;
    let end = fields[4]
        .parse::<u64>()
        .map_err(|e| GtfLineError::Malformed(format!("Invalid end position: {}", e)))?;
    let strand = match fields[6] {
        "+" => Strand::Plus,
        "-" => Strand::Minus,
        _ => Strand::Undefined,
    };

    let mut attributes = parse_attributes(fields[8]);
    let transcript_id = attributes
        .remove("transcript_id")
        .ok_or(GtfLineError::MissingTranscriptId)?;
    let gene_id = attributes.remove("gene_id").unwrap_or_default();

    Ok(Some(GtfExon {
        seqname: fields[0].to_string(),
        start,
        end,
        strand,
        gene_id,
        transcript_id,
    }))
}

/// Parse GTF attributes field
///
/// Format: key1 "value1"; key2 "value2";
fn parse_attributes(attr_str: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();

    for pair in attr_str.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        // Split on first space to separate key and value
        let Some((key, value)) = pair.split_once(' ') else {
            continue; // Skip malformed attributes
        };

        attributes.insert(
            key.trim().to_string(),
            value.trim().trim_matches('"').to_string(),
        );
    }

    attributes
}

/// Group exons by transcript, sort by position and register the intron
/// between every pair of consecutive exons. Returns the number of introns
/// added (before deduplication).
pub fn add_transcript_junctions(exons: Vec<GtfExon>, builder: &mut ReferenceIndexBuilder) -> usize {
    let mut transcripts: HashMap<String, Vec<GtfExon>> = HashMap::new();
    for exon in exons {
        builder.add_chromosome(&exon.seqname);
        transcripts
            .entry(exon.transcript_id.clone())
            .or_default()
            .push(exon);
    }

    let mut added = 0;
    for (transcript_id, mut exons) in transcripts {
        if exons.len() < 2 {
            // Single-exon transcript, no junctions
            continue;
        }

        exons.sort_by_key(|e| e.start);
        let chrom = exons[0].seqname.clone();
        let strand = exons[0].strand;
        let gene_id = exons[0].gene_id.clone();

        if exons.iter().any(|e| e.seqname != chrom) {
            log::warn!(
                "Skipping transcript {} spanning several chromosomes",
                transcript_id
            );
            continue;
        }

        for pair in exons.windows(2) {
            // Intron coordinates (1-based, STAR convention)
            let intron_start = pair[0].end + 1;
            let intron_end = pair[1].start.saturating_sub(1);

            if intron_end < intron_start {
                log::warn!(
                    "Invalid junction coordinates {}:{}-{} in transcript {} (possibly overlapping exons)",
                    chrom,
                    intron_start,
                    intron_end,
                    transcript_id
                );
                continue;
            }

            builder.add(
                JunctionKey::new(chrom.as_str(), intron_start, intron_end, strand),
                &gene_id,
                Some(&transcript_id),
            );
            added += 1;
        }
    }

    added
}
