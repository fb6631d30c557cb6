/// Cohort junction matrix files
///
/// Header: `chrom  start  end  strand  <sample ids...>` (tab-separated).
/// One row per distinct junction, sorted like the canonical files, with an
/// integer count for every sample (0 when the sample lacks the junction).
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::combine::MatrixRow;
use crate::error::Error;
use crate::io::{LineReader, OutputFile};
use crate::junction::{JunctionKey, Strand};

const KEY_COLUMNS: [&str; 4] = ["chrom", "start", "end", "strand"];

pub struct MatrixWriter {
    out: OutputFile,
    n_samples: usize,
    rows: u64,
}

impl MatrixWriter {
    pub fn create(path: &Path, sample_ids: &[String]) -> Result<Self, Error> {
        let mut out = OutputFile::create(path)?;
        let header: Vec<&str> = KEY_COLUMNS
            .iter()
            .copied()
            .chain(sample_ids.iter().map(String::as_str))
            .collect();
        writeln!(out, "{}", header.join("\t")).map_err(|e| Error::io(e, path))?;

        Ok(Self {
            out,
            n_samples: sample_ids.len(),
            rows: 0,
        })
    }

    pub fn write_row(&mut self, key: &JunctionKey, counts: &[u64]) -> Result<(), Error> {
        debug_assert_eq!(counts.len(), self.n_samples);
        let result = (|| {
            write!(
                self.out,
                "{}\t{}\t{}\t{}",
                key.chrom, key.start, key.end, key.strand
            )?;
            for count in counts {
                write!(self.out, "\t{count}")?;
            }
            writeln!(self.out)
        })();
        result.map_err(|e| Error::io(e, self.out.path()))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn commit(self) -> Result<(), Error> {
        self.out.commit()
    }
}

/// All matrix rows of one chromosome.
#[derive(Debug, Clone)]
pub struct ChromosomeBlock {
    pub chrom: String,
    pub rows: Vec<MatrixRow>,
}

/// Streaming matrix reader.
///
/// The matrix is trusted structured input: a row with the wrong column count
/// is a `StructuralMismatch`, anything else unparseable or out of order is a
/// `MalformedMatrix`. Both abort the caller.
pub struct MatrixReader {
    path: PathBuf,
    lines: LineReader,
    sample_ids: Vec<String>,
    previous: Option<JunctionKey>,
    pending: Option<MatrixRow>,
}

impl MatrixReader {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut lines = LineReader::open(path)?;
        let malformed = |line: usize, reason: &str| Error::MalformedMatrix {
            path: path.to_path_buf(),
            line,
            reason: reason.to_string(),
        };

        let sample_ids = match lines.next_line()? {
            Some((line_num, header)) => {
                let fields: Vec<&str> = header.split('\t').collect();
                if fields.len() < KEY_COLUMNS.len() || fields[..KEY_COLUMNS.len()] != KEY_COLUMNS {
                    return Err(malformed(
                        line_num,
                        "header must start with chrom, start, end, strand",
                    ));
                }
                fields[KEY_COLUMNS.len()..]
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }
            None => return Err(malformed(0, "empty file, missing header")),
        };

        Ok(Self {
            path: path.to_path_buf(),
            lines,
            sample_ids,
            previous: None,
            pending: None,
        })
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Next row, or `None` at end of file.
    pub fn next_row(&mut self) -> Result<Option<MatrixRow>, Error> {
        if let Some(row) = self.pending.take() {
            return Ok(Some(row));
        }

        let expected = KEY_COLUMNS.len() + self.sample_ids.len();
        let (line_num, row) = loop {
            let Some((line_num, line)) = self.lines.next_line()? else {
                return Ok(None);
            };
            if line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != expected {
                return Err(Error::StructuralMismatch {
                    path: self.path.clone(),
                    line: line_num,
                    expected,
                    found: fields.len(),
                });
            }
            let row = parse_row(&fields).map_err(|reason| Error::MalformedMatrix {
                path: self.path.clone(),
                line: line_num,
                reason,
            })?;
            break (line_num, row);
        };

        if let Some(previous) = &self.previous {
            if row.key <= *previous {
                return Err(Error::MalformedMatrix {
                    path: self.path.clone(),
                    line: line_num,
                    reason: format!("row {} is not after {}", row.key, previous),
                });
            }
        }
        self.previous = Some(row.key.clone());

        Ok(Some(row))
    }

    /// All rows of the next chromosome. Rows of a chromosome are contiguous
    /// because the matrix is sorted with chromosome as the leading key.
    pub fn next_chromosome(&mut self) -> Result<Option<ChromosomeBlock>, Error> {
        let Some(first) = self.next_row()? else {
            return Ok(None);
        };
        let chrom = first.key.chrom.clone();
        let mut rows = vec![first];

        while let Some(row) = self.next_row()? {
            if row.key.chrom != chrom {
                self.pending = Some(row);
                break;
            }
            rows.push(row);
        }

        Ok(Some(ChromosomeBlock { chrom, rows }))
    }

    /// Read up to `batch_size` chromosome blocks for parallel processing.
    pub fn read_batch(&mut self, batch_size: usize) -> Result<Vec<ChromosomeBlock>, Error> {
        let mut batch = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            match self.next_chromosome()? {
                Some(block) => batch.push(block),
                None => break,
            }
        }
        Ok(batch)
    }
}

fn parse_row(fields: &[&str]) -> Result<MatrixRow, String> {
    let coord = |idx: usize| -> Result<u64, String> {
        fields[idx]
            .parse::<u64>()
            .map_err(|_| format!("invalid {} '{}'", KEY_COLUMNS[idx], fields[idx]))
    };

    let strand =
        Strand::from_symbol(fields[3]).ok_or_else(|| format!("invalid strand '{}'", fields[3]))?;
    let key = JunctionKey::new(fields[0], coord(1)?, coord(2)?, strand);

    let counts = fields[KEY_COLUMNS.len()..]
        .iter()
        .map(|f| {
            f.parse::<u64>()
                .map_err(|_| format!("invalid count '{f}' for {key}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MatrixRow { key, counts })
}
