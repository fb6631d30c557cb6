/// Per-sample reformatting of raw SJ.out.tab files into canonical files
///
/// A raw file is parsed line by line. Lines that fail validation are skipped
/// and counted; they never abort the sample. The surviving records are sorted
/// by `JunctionKey` and written atomically with a header. A key appearing
/// twice in one sample is fatal.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::error::Error;
use crate::io::canonical;
use crate::io::sj_tab::parse_sj_line;
use crate::io::{LineReader, OutputFile};
use crate::junction::JunctionRecord;
use crate::params::validate_sample_id;
use crate::stats::ReformatSummary;

/// File name endings stripped when deriving a sample id from a path.
const SAMPLE_SUFFIXES: [&str; 5] = [".SJ.canonical.tsv", ".SJ.out.tab", ".tab", ".tsv", ".txt"];

/// One sample to reformat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReformatJob {
    pub sample_id: String,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Derive a sample id from a junction file name.
///
/// `sampleA.SJ.out.tab.gz` → `sampleA`
pub fn sample_id_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut id = name.as_str();
    for gz in [".gz", ".gzip"] {
        if let Some(stripped) = id.strip_suffix(gz) {
            id = stripped;
            break;
        }
    }
    for suffix in SAMPLE_SUFFIXES {
        if let Some(stripped) = id.strip_suffix(suffix) {
            if !stripped.is_empty() {
                id = stripped;
            }
            break;
        }
    }
    id.to_string()
}

/// Reformat one raw junction file into a canonical file at `output`.
pub fn reformat_sample(
    input: &Path,
    sample_id: &str,
    output: &Path,
) -> Result<ReformatSummary, Error> {
    debug!("Reformatting {} as sample {}", input.display(), sample_id);

    let mut summary = ReformatSummary::new(sample_id, output);
    let mut records: Vec<(usize, JunctionRecord)> = Vec::new();
    let mut lines = LineReader::open(input)?;

    while let Some((line_num, line)) = lines.next_line()? {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        summary.lines_read += 1;

        match parse_sj_line(line, line_num, sample_id) {
            Ok(record) => records.push((line_num, record)),
            Err(e) => {
                debug!("{}: skipping {}", input.display(), e);
                summary.skipped += 1;
            }
        }
    }

    if summary.skipped > 0 {
        warn!(
            "Sample {}: skipped {} malformed line(s) in {}",
            sample_id,
            summary.skipped,
            input.display()
        );
    }

    // Stable sort keeps line order within equal keys for the duplicate report
    records.sort_by(|a, b| a.1.key.cmp(&b.1.key));
    if let Some(pair) = records.windows(2).find(|w| w[0].1.key == w[1].1.key) {
        return Err(Error::DuplicateJunctionInSample {
            sample: sample_id.to_string(),
            key: pair[0].1.key.clone(),
            first_line: pair[0].0,
            second_line: pair[1].0,
            path: input.to_path_buf(),
        });
    }

    let mut out = OutputFile::create(output)?;
    let written = (|| -> std::io::Result<()> {
        canonical::write_header(&mut out)?;
        for (_, record) in &records {
            canonical::write_record(&mut out, record)?;
        }
        Ok(())
    })();
    written.map_err(|e| Error::io(e, output))?;
    out.commit()?;

    for (_, record) in &records {
        summary.unique_reads += u64::from(record.unique_reads);
        summary.multi_reads += u64::from(record.multi_reads);
    }
    summary.records = records.len() as u64;

    Ok(summary)
}

/// Reformat many samples in parallel on the current rayon pool.
///
/// Summaries come back in job order. Every job runs to completion; if any
/// fail, the error of the earliest failing job is returned.
pub fn reformat_samples(jobs: &[ReformatJob]) -> Result<Vec<ReformatSummary>, Error> {
    let mut seen = HashSet::new();
    for job in jobs {
        validate_sample_id(&job.sample_id)?;
        if !seen.insert(job.sample_id.as_str()) {
            return Err(Error::Parameter(format!(
                "sample id '{}' is used for more than one input",
                job.sample_id
            )));
        }
    }

    info!(
        "Reformatting {} sample(s) using {} thread(s)",
        jobs.len(),
        rayon::current_num_threads()
    );

    let results: Vec<Result<ReformatSummary, Error>> = jobs
        .par_iter()
        .map(|job| reformat_sample(&job.input, &job.sample_id, &job.output))
        .collect();

    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::canonical::{CanonicalReader, CANONICAL_HEADER};
    use crate::io::sj_tab::format_sj_line;
    use crate::junction::{JunctionKey, Strand};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_raw(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_sample_id_from_path() {
        assert_eq!(sample_id_from_path(Path::new("data/sampleA.SJ.out.tab")), "sampleA");
        assert_eq!(sample_id_from_path(Path::new("sampleB.SJ.out.tab.gz")), "sampleB");
        assert_eq!(sample_id_from_path(Path::new("/x/S3.tsv")), "S3");
        assert_eq!(sample_id_from_path(Path::new("S4.SJ.canonical.tsv")), "S4");
        assert_eq!(sample_id_from_path(Path::new("plain")), "plain");
        assert_eq!(sample_id_from_path(Path::new(".tab")), ".tab");
    }

    #[test]
    fn test_reformat_sorts_and_writes_header() {
        let raw = write_raw(&[
            "chr2\t500\t900\t2\t2\t0\t4\t1\t30",
            "chr1\t300\t400\t1\t1\t1\t7\t0\t40",
            "chr1\t100\t200\t0\t0\t0\t2\t3\t12",
        ]);
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("S1.SJ.canonical.tsv");

        let summary = reformat_sample(raw.path(), "S1", &output).unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.unique_reads, 13);
        assert_eq!(summary.multi_reads, 4);

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], CANONICAL_HEADER);
        assert_eq!(lines[1], "chr1\t100\t200\t.\t0\t0\t2\t3\t12\tS1");
        assert_eq!(lines[2], "chr1\t300\t400\t+\t1\t1\t7\t0\t40\tS1");
        assert_eq!(lines[3], "chr2\t500\t900\t-\t2\t0\t4\t1\t30\tS1");
    }

    #[test]
    fn test_invalid_strand_line_is_skipped() {
        let raw = write_raw(&[
            "chr1\t100\t200\t1\t1\t0\t10\t0\t25",
            "chr1\t150\t250\t5\t1\t0\t10\t0\t25",
            "chr1\t300\t400\t2\t2\t0\t3\t0\t25",
        ]);
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("S.SJ.canonical.tsv");

        let summary = reformat_sample(raw.path(), "S", &output).unwrap();
        assert_eq!(summary.lines_read, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.records, 2);

        let records = CanonicalReader::open(&output).unwrap().read_all().unwrap();
        let starts: Vec<u64> = records.iter().map(|r| r.key.start).collect();
        assert_eq!(starts, vec![100, 300]);
    }

    #[test]
    fn test_blank_and_comment_lines_not_counted() {
        let raw = write_raw(&["# STAR junctions", "", "chr1\t100\t200\t1\t1\t0\t1\t0\t5"]);
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("S.SJ.canonical.tsv");

        let summary = reformat_sample(raw.path(), "S", &output).unwrap();
        assert_eq!(summary.lines_read, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.records, 1);
    }

    #[test]
    fn test_every_validation_failure_is_skipped() {
        let raw = write_raw(&[
            "chr1\t100\t200\t1\t1\t0\t10\t0",    // 8 fields
            "chr1\tabc\t200\t1\t1\t0\t10\t0\t25", // non-numeric
            "chr1\t0\t200\t1\t1\t0\t10\t0\t25",   // start < 1
            "chr1\t300\t200\t1\t1\t0\t10\t0\t25", // start > end
            "chr1\t100\t200\t1\t7\t0\t10\t0\t25", // motif > 6
            "chr1\t100\t200\t1\t1\t2\t10\t0\t25", // flag not 0/1
            "chr1\t100\t200\t1\t1\t0\t10\t0\t25",
        ]);
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("S.SJ.canonical.tsv");

        let summary = reformat_sample(raw.path(), "S", &output).unwrap();
        assert_eq!(summary.skipped, 6);
        assert_eq!(summary.records, 1);
    }

    #[test]
    fn test_duplicate_key_is_fatal_and_leaves_no_output() {
        let raw = write_raw(&[
            "chr1\t100\t200\t1\t1\t0\t10\t0\t25",
            "chr1\t500\t600\t1\t1\t0\t1\t0\t25",
            "chr1\t100\t200\t1\t1\t0\t4\t0\t25",
        ]);
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("S.SJ.canonical.tsv");

        match reformat_sample(raw.path(), "S", &output).unwrap_err() {
            Error::DuplicateJunctionInSample {
                sample,
                key,
                first_line,
                second_line,
                ..
            } => {
                assert_eq!(sample, "S");
                assert_eq!(key, JunctionKey::new("chr1", 100, 200, Strand::Plus));
                assert_eq!(first_line, 1);
                assert_eq!(second_line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_same_coordinates_other_strand_is_not_duplicate() {
        let raw = write_raw(&[
            "chr1\t100\t200\t1\t1\t0\t10\t0\t25",
            "chr1\t100\t200\t2\t2\t0\t4\t0\t25",
        ]);
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("S.SJ.canonical.tsv");
        assert_eq!(reformat_sample(raw.path(), "S", &output).unwrap().records, 2);
    }

    #[test]
    fn test_round_trip_preserves_keys_and_counts() {
        let raw_lines = [
            "chr1\t14830\t14969\t2\t2\t1\t117\t4\t38",
            "chr1\t15039\t15795\t2\t2\t1\t86\t12\t38",
            "chrX\t9000\t9100\t0\t0\t0\t1\t0\t9",
        ];
        let raw = write_raw(&raw_lines);
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("S.SJ.canonical.tsv");
        reformat_sample(raw.path(), "S", &output).unwrap();

        let records = CanonicalReader::open(&output).unwrap().read_all().unwrap();
        let reformatted: Vec<String> = records.iter().map(format_sj_line).collect();
        assert_eq!(reformatted, raw_lines);
    }

    #[test]
    fn test_rerun_replaces_previous_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("S.SJ.canonical.tsv");

        let first = write_raw(&["chr1\t100\t200\t1\t1\t0\t10\t0\t25"]);
        reformat_sample(first.path(), "S", &output).unwrap();
        let second = write_raw(&["chr9\t1\t2\t1\t1\t0\t1\t0\t1"]);
        reformat_sample(second.path(), "S", &output).unwrap();

        let records = CanonicalReader::open(&output).unwrap().read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key.chrom, "chr9");
    }

    #[test]
    fn test_reformat_samples_keeps_job_order() {
        let dir = TempDir::new().unwrap();
        let raws: Vec<NamedTempFile> = (1..=4)
            .map(|n| {
                let line = format!("chr1\t100\t200\t1\t1\t0\t{n}\t0\t25");
                write_raw(&[line.as_str()])
            })
            .collect();
        let jobs: Vec<ReformatJob> = raws
            .iter()
            .enumerate()
            .map(|(i, raw)| ReformatJob {
                sample_id: format!("S{i}"),
                input: raw.path().to_path_buf(),
                output: dir.path().join(format!("S{i}.SJ.canonical.tsv")),
            })
            .collect();

        let summaries = reformat_samples(&jobs).unwrap();
        let ids: Vec<&str> = summaries.iter().map(|s| s.sample_id.as_str()).collect();
        assert_eq!(ids, vec!["S0", "S1", "S2", "S3"]);
        assert_eq!(summaries[3].unique_reads, 4);
    }

    #[test]
    fn test_reformat_samples_rejects_duplicate_ids() {
        let raw = write_raw(&["chr1\t100\t200\t1\t1\t0\t1\t0\t25"]);
        let dir = TempDir::new().unwrap();
        let job = ReformatJob {
            sample_id: "S".into(),
            input: raw.path().to_path_buf(),
            output: dir.path().join("S.SJ.canonical.tsv"),
        };
        let err = reformat_samples(&[job.clone(), job]).unwrap_err();
        assert!(matches!(err, Error::Parameter(_)));
    }

    #[test]
    fn test_reformat_samples_rejects_bad_id() {
        let raw = write_raw(&["chr1\t100\t200\t1\t1\t0\t1\t0\t25"]);
        let dir = TempDir::new().unwrap();
        for bad in ["../S", "S\t1", ""] {
            let job = ReformatJob {
                sample_id: bad.into(),
                input: raw.path().to_path_buf(),
                output: dir.path().join("S.SJ.canonical.tsv"),
            };
            let err = reformat_samples(&[job]).unwrap_err();
            assert!(matches!(err, Error::Parameter(_)), "id {:?} accepted", bad);
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_reformat_samples_reports_earliest_failure() {
        let dup_lines = [
            "chr1\t100\t200\t1\t1\t0\t1\t0\t25",
            "chr1\t100\t200\t1\t1\t0\t2\t0\t25",
        ];
        let good = write_raw(&["chr1\t100\t200\t1\t1\t0\t1\t0\t25"]);
        let bad: Vec<NamedTempFile> = (0..6).map(|_| write_raw(&dup_lines)).collect();
        let dir = TempDir::new().unwrap();

        let mut jobs = vec![ReformatJob {
            sample_id: "ok".into(),
            input: good.path().to_path_buf(),
            output: dir.path().join("ok.SJ.canonical.tsv"),
        }];
        jobs.extend(bad.iter().enumerate().map(|(i, raw)| ReformatJob {
            sample_id: format!("bad{i}"),
            input: raw.path().to_path_buf(),
            output: dir.path().join(format!("bad{i}.SJ.canonical.tsv")),
        }));

        for _ in 0..5 {
            match reformat_samples(&jobs).unwrap_err() {
                Error::DuplicateJunctionInSample { sample, .. } => assert_eq!(sample, "bad0"),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_gzip_input() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let raw = tempfile::Builder::new().suffix(".SJ.out.tab.gz").tempfile().unwrap();
        let mut encoder = GzEncoder::new(raw.as_file(), Compression::default());
        writeln!(encoder, "chr1\t100\t200\t1\t1\t0\t10\t0\t25").unwrap();
        encoder.finish().unwrap();

        let dir = TempDir::new().unwrap();
        let output = dir.path().join("S.SJ.canonical.tsv");
        let summary = reformat_sample(raw.path(), "S", &output).unwrap();
        assert_eq!(summary.records, 1);
    }
}
