/// STAR splice junction table (SJ.out.tab)
///
/// Format (9 tab-separated columns):
/// 1. chromosome
/// 2. intron start (1-based)
/// 3. intron end (1-based)
/// 4. strand (0=undefined, 1=+, 2=-)
/// 5. motif (0=non-canonical, 1=GT/AG, 2=CT/AC, 3=GC/AG, 4=CT/GC, 5=AT/AC, 6=GT/AT)
/// 6. annotated (0=no, 1=yes)
/// 7. unique-mapping reads
/// 8. multi-mapping reads
/// 9. maximum overhang
use crate::error::Error;
use crate::junction::{JunctionKey, JunctionRecord, Motif, Strand};

const SJ_TAB_COLUMNS: usize = 9;

/// Parse one SJ.out.tab line into a record for `sample_id`.
///
/// Every failure is a `MalformedRecord` carrying the line number; the caller
/// decides whether to skip or abort.
pub fn parse_sj_line(line: &str, line_num: usize, sample_id: &str) -> Result<JunctionRecord, Error> {
    let malformed = |reason: String| Error::MalformedRecord {
        line: line_num,
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != SJ_TAB_COLUMNS {
        return Err(malformed(format!(
            "{} fields, expected {}",
            fields.len(),
            SJ_TAB_COLUMNS
        )));
    }

    let chrom = fields[0].trim();
    if chrom.is_empty() {
        return Err(malformed("empty chromosome".to_string()));
    }

    let number = |idx: usize, name: &str| -> Result<u64, Error> {
        fields[idx]
            .trim()
            .parse::<u64>()
            .map_err(|e| malformed(format!("invalid {} '{}': {}", name, fields[idx], e)))
    };

    let start = number(1, "intron start")?;
    let end = number(2, "intron end")?;
    if start == 0 {
        return Err(malformed("intron start must be >= 1".to_string()));
    }
    if start > end {
        return Err(malformed(format!("intron start {start} > intron end {end}")));
    }

    let strand = u8::try_from(number(3, "strand")?)
        .ok()
        .and_then(Strand::from_star_code)
        .ok_or_else(|| malformed(format!("invalid strand code '{}'", fields[3])))?;

    let motif = u8::try_from(number(4, "motif")?)
        .ok()
        .and_then(Motif::from_code)
        .ok_or_else(|| malformed(format!("invalid motif code '{}'", fields[4])))?;

    let annotated = match number(5, "annotation flag")? {
        0 => false,
        1 => true,
        other => return Err(malformed(format!("invalid annotation flag '{other}'"))),
    };

    let count = |idx: usize, name: &str| -> Result<u32, Error> {
        u32::try_from(number(idx, name)?)
            .map_err(|_| malformed(format!("{} '{}' out of range", name, fields[idx])))
    };

    Ok(JunctionRecord {
        key: JunctionKey::new(chrom, start, end, strand),
        motif,
        annotated,
        unique_reads: count(6, "unique read count")?,
        multi_reads: count(7, "multi-mapping read count")?,
        max_overhang: count(8, "max overhang")?,
        sample_id: sample_id.to_string(),
    })
}

/// Render a record back into SJ.out.tab form.
pub fn format_sj_line(record: &JunctionRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        record.key.chrom,
        record.key.start,
        record.key.end,
        record.key.strand.star_code(),
        record.motif.code(),
        if record.annotated { 1 } else { 0 },
        record.unique_reads,
        record.multi_reads,
        record.max_overhang
    )
}
