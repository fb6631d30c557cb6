/// Canonical per-sample junction files
///
/// One `JunctionRecord` per line after a header, sorted ascending by
/// (chromosome, start, end, strand). Strand is written as `+`, `-` or `.`.
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::io::LineReader;
use crate::junction::{JunctionKey, JunctionRecord, Motif, Strand};

pub const CANONICAL_HEADER: &str = "chrom\tstart\tend\tstrand\tmotif\tannotated_flag\tunique_reads\tmulti_reads\tmax_overhang\tsample_id";

const CANONICAL_COLUMNS: usize = 10;

pub fn write_header<W: Write>(writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "{CANONICAL_HEADER}")
}

pub fn write_record<W: Write>(writer: &mut W, record: &JunctionRecord) -> std::io::Result<()> {
    writeln!(
        writer,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        record.key.chrom,
        record.key.start,
        record.key.end,
        record.key.strand,
        record.motif.code(),
        if record.annotated { 1 } else { 0 },
        record.unique_reads,
        record.multi_reads,
        record.max_overhang,
        record.sample_id
    )
}

/// Streaming reader over a canonical file.
///
/// Canonical files are produced by the reformatter, so any deviation from
/// the format is a fatal `MalformedCanonical` rather than a skipped line.
pub struct CanonicalReader {
    path: PathBuf,
    lines: LineReader,
}

impl CanonicalReader {
    pub fn open(path: &Path) -> Result<Self, Error> {
        Ok(Self {
            path: path.to_path_buf(),
            lines: LineReader::open(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next record and the line it came from, or `None` at end of file.
    pub fn next_record(&mut self) -> Result<Option<(usize, JunctionRecord)>, Error> {
        loop {
            let Some((line_num, line)) = self.lines.next_line()? else {
                return Ok(None);
            };
            if line.is_empty() || line == CANONICAL_HEADER {
                continue;
            }
            let record = parse_canonical_line(line)
                .map_err(|reason| Error::MalformedCanonical {
                    path: self.path.clone(),
                    line: line_num,
                    reason,
                })?;
            return Ok(Some((line_num, record)));
        }
    }

    /// Read the remaining records into memory.
    pub fn read_all(mut self) -> Result<Vec<JunctionRecord>, Error> {
        let mut records = Vec::new();
        while let Some((_, record)) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

fn parse_canonical_line(line: &str) -> Result<JunctionRecord, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != CANONICAL_COLUMNS {
        return Err(format!(
            "{} fields, expected {}",
            fields.len(),
            CANONICAL_COLUMNS
        ));
    }

    fn num<T: std::str::FromStr>(field: &str, name: &str) -> Result<T, String> {
        field
            .parse::<T>()
            .map_err(|_| format!("invalid {name} '{field}'"))
    }

    let strand =
        Strand::from_symbol(fields[3]).ok_or_else(|| format!("invalid strand '{}'", fields[3]))?;
    let motif = Motif::from_code(num(fields[4], "motif")?)
        .ok_or_else(|| format!("invalid motif '{}'", fields[4]))?;
    let annotated = match fields[5] {
        "0" => false,
        "1" => true,
        other => return Err(format!("invalid annotated_flag '{other}'")),
    };

    Ok(JunctionRecord {
        key: JunctionKey::new(
            fields[0],
            num(fields[1], "start")?,
            num(fields[2], "end")?,
            strand,
        ),
        motif,
        annotated,
        unique_reads: num(fields[6], "unique_reads")?,
        multi_reads: num(fields[7], "multi_reads")?,
        max_overhang: num(fields[8], "max_overhang")?,
        sample_id: fields[9].to_string(),
    })
}
