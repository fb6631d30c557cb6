/// Tab-separated junction table loading
///
/// Each row describes one annotated intron. Column positions are
/// configurable (0-based); strand, gene and transcript columns are optional.
/// Lines starting with `#` are comments, and a first row whose start column
/// is not numeric is treated as a header.
use crate::error::Error;
use crate::io::LineReader;
use crate::junction::{JunctionKey, Strand};
use crate::reference::{ReferenceIndex, ReferenceIndexBuilder, ReferenceOptions};
use std::path::Path;

/// 0-based column positions of a junction table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumns {
    pub chrom: usize,
    pub start: usize,
    pub end: usize,
    pub strand: Option<usize>,
    pub gene: Option<usize>,
    pub transcript: Option<usize>,
}

impl Default for TableColumns {
    fn default() -> Self {
        Self {
            chrom: 0,
            start: 1,
            end: 2,
            strand: Some(3),
            gene: None,
            transcript: None,
        }
    }
}

impl TableColumns {
    /// Gene and transcript columns may be missing from short rows.
    fn min_fields(&self) -> usize {
        [self.chrom, self.start, self.end]
            .into_iter()
            .chain(self.strand)
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Build a reference index from a junction table (plain or gzipped).
pub fn load_junction_table(
    path: &Path,
    columns: &TableColumns,
    options: ReferenceOptions,
) -> Result<ReferenceIndex, Error> {
    log::info!("Loading reference junction table from: {}", path.display());

    let mut lines = LineReader::open(path)?;
    let mut builder = ReferenceIndexBuilder::new(options);
    let mut n_rows = 0usize;
    let mut seen_data = false;

    while let Some((line_num, line)) = lines.next_line()? {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if !seen_data
            && fields
                .get(columns.start)
                .is_some_and(|f| f.parse::<u64>().is_err())
        {
            log::debug!("Skipping junction table header at line {}", line_num);
            seen_data = true;
            continue;
        }
        seen_data = true;

        let (key, gene_id, transcript_id) =
            parse_table_row(&fields, columns).map_err(|reason| {
                Error::Reference(format!("{}:{}: {}", path.display(), line_num, reason))
            })?;
        builder.add(key, gene_id, transcript_id);
        n_rows += 1;
    }

    log::info!(
        "Loaded {} junction table rows ({} distinct junctions)",
        n_rows,
        builder.len()
    );

    Ok(builder.build())
}

fn parse_table_row<'a>(
    fields: &[&'a str],
    columns: &TableColumns,
) -> Result<(JunctionKey, &'a str, Option<&'a str>), String> {
    if fields.len() < columns.min_fields() {
        return Err(format!(
            "{} fields, expected at least {}",
            fields.len(),
            columns.min_fields()
        ));
    }

    let chrom = fields[columns.chrom];
    if chrom.is_empty() {
        return Err("empty chromosome".to_string());
    }
    let start = fields[columns.start]
        .parse::<u64>()
        .map_err(|_| format!("invalid start '{}'", fields[columns.start]))?;
    let end = fields[columns.end]
        .parse::<u64>()
        .map_err(|_| format!("invalid end '{}'", fields[columns.end]))?;
    if start == 0 || start > end {
        return Err(format!("invalid interval {}-{}", start, end));
    }

    let strand = match columns.strand {
        Some(col) => parse_strand(fields[col])
            .ok_or_else(|| format!("invalid strand '{}'", fields[col]))?,
        None => Strand::Undefined,
    };
    let gene_id = columns
        .gene
        .and_then(|col| fields.get(col).copied())
        .unwrap_or("");
    let transcript_id = columns
        .transcript
        .and_then(|col| fields.get(col).copied())
        .filter(|t| !t.is_empty());

    Ok((JunctionKey::new(chrom, start, end, strand), gene_id, transcript_id))
}

/// Accepts both symbolic and SJ.out.tab numeric strand codes.
fn parse_strand(field: &str) -> Option<Strand> {
    Strand::from_symbol(field).or_else(|| {
        field
            .parse::<u8>()
            .ok()
            .and_then(Strand::from_star_code)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_table(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_with_header_and_comments() {
        let file = write_table(
            "# reference introns\n\
             chrom\tstart\tend\tstrand\tgene\n\
             chr1\t100\t200\t+\tG1\n\
             chr1\t300\t400\t2\tG2\n\
             chr2\t5\t50\t.\tG3\n",
        );
        let columns = TableColumns {
            gene: Some(4),
            ..TableColumns::default()
        };
        let index =
            load_junction_table(file.path(), &columns, ReferenceOptions::default()).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(
            index
                .lookup(&JunctionKey::new("chr1", 300, 400, Strand::Minus))
                .unwrap()
                .gene_id,
            "G2"
        );
        assert!(index
            .lookup(&JunctionKey::new("chr2", 5, 50, Strand::Undefined))
            .is_some());
        assert_eq!(index.n_chromosomes(), 2);
    }

    #[test]
    fn test_custom_columns_without_strand() {
        let file = write_table("G1\tT1\tchr1\t100\t200\nG1\tT2\tchr1\t100\t200\n");
        let columns = TableColumns {
            chrom: 2,
            start: 3,
            end: 4,
            strand: None,
            gene: Some(0),
            transcript: Some(1),
        };
        let index =
            load_junction_table(file.path(), &columns, ReferenceOptions::default()).unwrap();

        let entry = index
            .lookup(&JunctionKey::new("chr1", 100, 200, Strand::Undefined))
            .unwrap();
        assert_eq!(entry.gene_id, "G1");
        assert_eq!(entry.transcript_ids.len(), 2);
    }

    #[test]
    fn test_missing_gene_column_defaults_to_empty() {
        let file = write_table("chr1\t100\t200\t+\n");
        let columns = TableColumns {
            gene: Some(4),
            transcript: Some(5),
            ..TableColumns::default()
        };
        let index =
            load_junction_table(file.path(), &columns, ReferenceOptions::default()).unwrap();
        let entry = index
            .lookup(&JunctionKey::new("chr1", 100, 200, Strand::Plus))
            .unwrap();
        assert_eq!(entry.gene_id, "");
        assert!(entry.transcript_ids.is_empty());
    }

    #[test]
    fn test_malformed_row_is_error() {
        let file = write_table("chr1\t100\t200\t+\nchr1\t100\t200\n");
        let err = load_junction_table(
            file.path(),
            &TableColumns::default(),
            ReferenceOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Reference(_)));
        assert!(err.to_string().contains(":2:"));

        let file = write_table("chr1\t300\t200\t+\n");
        assert!(load_junction_table(
            file.path(),
            &TableColumns::default(),
            ReferenceOptions::default()
        )
        .is_err());

        let file = write_table("chr1\t100\t200\t?\n");
        assert!(load_junction_table(
            file.path(),
            &TableColumns::default(),
            ReferenceOptions::default()
        )
        .is_err());
    }

    #[test]
    fn test_parse_strand_codes() {
        assert_eq!(parse_strand("+"), Some(Strand::Plus));
        assert_eq!(parse_strand("1"), Some(Strand::Plus));
        assert_eq!(parse_strand("-"), Some(Strand::Minus));
        assert_eq!(parse_strand("2"), Some(Strand::Minus));
        assert_eq!(parse_strand("."), Some(Strand::Undefined));
        assert_eq!(parse_strand("0"), Some(Strand::Undefined));
        assert_eq!(parse_strand("3"), None);
    }
}
