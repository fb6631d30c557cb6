/// File I/O for the three junction file formats
///
/// - `sj_tab`: raw STAR SJ.out.tab lines (reformatter input)
/// - `canonical`: sorted per-sample junction records (reformatter output, combiner input)
/// - `matrix`: cohort junction matrix (combiner output, normalizer input)
///
/// Inputs are read plain or gzip-compressed (by extension). Outputs are
/// written to a temporary file next to the destination and renamed into
/// place on `commit`, so a failed run never leaves a truncated file behind.
pub mod canonical;
pub mod matrix;
pub mod sj_tab;

use crate::error::Error;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Open a text file (plain or gzip compressed) for buffered reading.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>, Error> {
    // Auto-detect compression by file extension
    let path_str = path.to_string_lossy();
    let is_gzipped = path_str.ends_with(".gz") || path_str.ends_with(".gzip");

    let file = File::open(path).map_err(|e| Error::io(e, path))?;

    if is_gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Line-at-a-time reader that tracks 1-based line numbers.
pub struct LineReader {
    path: PathBuf,
    inner: Box<dyn BufRead + Send>,
    buf: String,
    line_num: usize,
}

impl LineReader {
    pub fn open(path: &Path) -> Result<Self, Error> {
        Ok(Self {
            path: path.to_path_buf(),
            inner: open_input(path)?,
            buf: String::new(),
            line_num: 0,
        })
    }

    /// Next line (without its terminator) and its line number, or `None` at
    /// end of input.
    pub fn next_line(&mut self) -> Result<Option<(usize, &str)>, Error> {
        self.buf.clear();
        let n = self
            .inner
            .read_line(&mut self.buf)
            .map_err(|e| Error::io(e, &self.path))?;
        if n == 0 {
            return Ok(None);
        }
        self.line_num += 1;
        let line = self.buf.trim_end_matches(|c| c == '\n' || c == '\r');
        Ok(Some((self.line_num, line)))
    }
}

/// Buffered output that only appears at its destination once committed.
pub struct OutputFile {
    path: PathBuf,
    writer: BufWriter<NamedTempFile>,
}

impl OutputFile {
    /// Create the temporary file in the destination's directory (creating the
    /// directory if needed) so the final rename stays on one filesystem.
    pub fn create(path: &Path) -> Result<Self, Error> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| Error::io(e, dir))?;
        let tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(e, path))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(tmp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and atomically move the file into place, replacing any previous
    /// output from an earlier run.
    pub fn commit(self) -> Result<(), Error> {
        let path = self.path;
        let tmp = self
            .writer
            .into_inner()
            .map_err(|e| Error::io(e.into_error(), &path))?;
        tmp.persist(&path).map_err(|e| Error::io(e.error, &path))?;
        Ok(())
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
