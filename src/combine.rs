/// Cross-sample combination of canonical junction files into one matrix
///
/// Every canonical file is sorted by `JunctionKey`, so the cohort matrix is a
/// k-way merge: one cursor per sample, a min-heap of the cursors' current
/// keys, and one emitted row per distinct key. Only one record per sample is
/// resident at a time.
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Error;
use crate::io::canonical::CanonicalReader;
use crate::io::matrix::MatrixWriter;
use crate::junction::JunctionKey;
use crate::params::{validate_sample_id, CountMode};
use crate::stats::CombineSummary;

/// One canonical input and the column it fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleInput {
    pub sample_id: String,
    pub path: PathBuf,
}

impl SampleInput {
    pub fn new(sample_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            sample_id: sample_id.into(),
            path: path.into(),
        }
    }
}

/// One matrix row: a junction and its count in every sample column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub key: JunctionKey,
    pub counts: Vec<u64>,
}

/// In-memory cohort matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedMatrix {
    pub sample_ids: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

impl CombinedMatrix {
    /// Merge canonical inputs without writing a file.
    pub fn from_samples(inputs: &[SampleInput], mode: CountMode) -> Result<Self, Error> {
        let mut rows = Vec::new();
        merge_samples(inputs, mode, |key, counts| {
            rows.push(MatrixRow {
                key: key.clone(),
                counts: counts.to_vec(),
            });
            Ok(())
        })?;

        Ok(Self {
            sample_ids: inputs.iter().map(|i| i.sample_id.clone()).collect(),
            rows,
        })
    }
}

/// Combine canonical per-sample files into a matrix file at `output`.
///
/// Fails with `EmptyInputSet` before touching `output` when there are no
/// inputs. The matrix only appears at `output` once fully written.
pub fn combine_samples(
    inputs: &[SampleInput],
    output: &Path,
    mode: CountMode,
) -> Result<CombineSummary, Error> {
    validate_inputs(inputs)?;

    let sample_ids: Vec<String> = inputs.iter().map(|i| i.sample_id.clone()).collect();
    info!(
        "Combining {} samples into {} (countMode {})",
        inputs.len(),
        output.display(),
        mode
    );

    let mut writer = MatrixWriter::create(output, &sample_ids)?;
    let mut summary = CombineSummary::new(sample_ids);

    merge_samples(inputs, mode, |key, counts| {
        summary.record_row(counts);
        writer.write_row(key, counts)
    })?;

    writer.commit()?;
    info!("Wrote {} junction rows to {}", summary.rows, output.display());

    Ok(summary)
}

fn validate_inputs(inputs: &[SampleInput]) -> Result<(), Error> {
    if inputs.is_empty() {
        return Err(Error::EmptyInputSet);
    }

    let mut seen = HashSet::new();
    for input in inputs {
        validate_sample_id(&input.sample_id)?;
        if !seen.insert(input.sample_id.as_str()) {
            return Err(Error::Parameter(format!(
                "sample id '{}' is used for more than one input",
                input.sample_id
            )));
        }
    }
    Ok(())
}

/// Heap entry: a cursor's current key. Ties break on the input position so
/// pops are deterministic.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct HeadKey {
    key: JunctionKey,
    source: usize,
}

/// Per-sample read cursor.
struct Cursor {
    reader: CanonicalReader,
    /// Count of the record whose key sits in the heap
    count: u64,
}

impl Cursor {
    /// Advance to the next record and push its key, checking that the file
    /// is strictly ascending.
    fn advance(
        &mut self,
        source: usize,
        previous: Option<&JunctionKey>,
        mode: CountMode,
        heap: &mut BinaryHeap<Reverse<HeadKey>>,
    ) -> Result<(), Error> {
        let Some((line, record)) = self.reader.next_record()? else {
            return Ok(());
        };

        if let Some(previous) = previous {
            if record.key <= *previous {
                return Err(Error::UnsortedInput {
                    path: self.reader.path().to_path_buf(),
                    line,
                    key: record.key,
                    previous: previous.clone(),
                });
            }
        }

        self.count = record.count(mode);
        heap.push(Reverse(HeadKey {
            key: record.key,
            source,
        }));
        Ok(())
    }
}

/// k-way merge over canonical inputs. `emit` receives each distinct key once,
/// in ascending order, with one count per input (0 where absent).
pub fn merge_samples<F>(inputs: &[SampleInput], mode: CountMode, mut emit: F) -> Result<(), Error>
where
    F: FnMut(&JunctionKey, &[u64]) -> Result<(), Error>,
{
    validate_inputs(inputs)?;

    let mut cursors = inputs
        .iter()
        .map(|input| {
            debug!("Opening {} for sample {}", input.path.display(), input.sample_id);
            Ok(Cursor {
                reader: CanonicalReader::open(&input.path)?,
                count: 0,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let mut heap = BinaryHeap::with_capacity(cursors.len());
    for (source, cursor) in cursors.iter_mut().enumerate() {
        cursor.advance(source, None, mode, &mut heap)?;
    }

    let mut counts = vec![0u64; cursors.len()];
    let mut matched = Vec::with_capacity(cursors.len());

    while let Some(Reverse(head)) = heap.pop() {
        counts.fill(0);
        matched.clear();

        counts[head.source] = cursors[head.source].count;
        matched.push(head.source);
        while let Some(Reverse(next)) = heap.peek() {
            if next.key != head.key {
                break;
            }
            counts[next.source] = cursors[next.source].count;
            matched.push(next.source);
            heap.pop();
        }

        emit(&head.key, &counts)?;

        // Only the cursors positioned at this key move on
        for &source in &matched {
            cursors[source].advance(source, Some(&head.key), mode, &mut heap)?;
        }
    }

    Ok(())
}
