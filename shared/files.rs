use crate::error::MergeError;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const WRITE_BUFFER_CAPACITY: usize = 1 << 20;

/// A trait that abstracts sequential, line-oriented access to text data such as
/// association runs and model matrices, regardless of compression.
pub trait TextSource {
    /// The next line without its terminator, or `None` at end of stream.
    fn next_line(&mut self) -> Result<Option<&str>, MergeError>;

    /// 1-based number of the line most recently returned.
    fn line_number(&self) -> usize;

    fn path(&self) -> &Path;
}

/// The writing counterpart of [`TextSource`].
pub trait TextSink {
    fn write_line(&mut self, line: &str) -> Result<(), MergeError>;

    /// Flushes buffered bytes and any compression trailer. Dropping a sink
    /// without finishing releases the handle but may leave a truncated file.
    fn finish(self: Box<Self>) -> Result<(), MergeError>;
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

pub fn open_text_source(path: &Path) -> Result<Box<dyn TextSource>, MergeError> {
    let file = File::open(path).map_err(|e| MergeError::io(path, e))?;
    let inner: Box<dyn Read> = if is_gzip_path(path) {
        debug!("Opening {} as gzip", path.display());
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(LocalTextSource {
        reader: BufReader::new(inner),
        line: String::with_capacity(1024),
        line_number: 0,
        path: path.to_path_buf(),
    }))
}

pub fn create_text_sink(path: &Path) -> Result<Box<dyn TextSink>, MergeError> {
    let file = File::create(path).map_err(|e| MergeError::io(path, e))?;
    let writer = BufWriter::with_capacity(WRITE_BUFFER_CAPACITY, file);
    if is_gzip_path(path) {
        Ok(Box::new(GzipTextSink {
            encoder: GzEncoder::new(writer, Compression::default()),
            path: path.to_path_buf(),
        }))
    } else {
        Ok(Box::new(PlainTextSink {
            writer,
            path: path.to_path_buf(),
        }))
    }
}

struct LocalTextSource {
    reader: BufReader<Box<dyn Read>>,
    line: String,
    line_number: usize,
    path: PathBuf,
}

impl TextSource for LocalTextSource {
    fn next_line(&mut self) -> Result<Option<&str>, MergeError> {
        self.line.clear();
        let bytes_read = self
            .reader
            .read_line(&mut self.line)
            .map_err(|e| MergeError::io(&self.path, e))?;
        if bytes_read == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        if self.line.ends_with('\n') {
            self.line.pop();
        }
        if self.line.ends_with('\r') {
            self.line.pop();
        }
        Ok(Some(&self.line))
    }

    fn line_number(&self) -> usize {
        self.line_number
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

struct PlainTextSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl TextSink for PlainTextSink {
    fn write_line(&mut self, line: &str) -> Result<(), MergeError> {
        writeln!(self.writer, "{line}").map_err(|e| MergeError::io(&self.path, e))
    }

    fn finish(mut self: Box<Self>) -> Result<(), MergeError> {
        self.writer
            .flush()
            .map_err(|e| MergeError::io(&self.path, e))
    }
}

struct GzipTextSink {
    encoder: GzEncoder<BufWriter<File>>,
    path: PathBuf,
}

impl TextSink for GzipTextSink {
    fn write_line(&mut self, line: &str) -> Result<(), MergeError> {
        writeln!(self.encoder, "{line}").map_err(|e| MergeError::io(&self.path, e))
    }

    fn finish(self: Box<Self>) -> Result<(), MergeError> {
        let GzipTextSink { encoder, path } = *self;
        let mut writer = encoder.finish().map_err(|e| MergeError::io(&path, e))?;
        writer.flush().map_err(|e| MergeError::io(&path, e))
    }
}

/// Returns the next line that carries data, skipping whitespace-only lines.
pub fn next_data_line(source: &mut dyn TextSource) -> Result<Option<String>, MergeError> {
    while let Some(line) = source.next_line()? {
        if !line.trim().is_empty() {
            return Ok(Some(line.to_string()));
        }
    }
    Ok(None)
}
