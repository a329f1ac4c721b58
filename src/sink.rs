use crate::{Error, Limits};
use csv::{StringRecord, WriterBuilder};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    rc::Rc,
};

/// Encodes records into the exact bytes that will land on disk.
///
/// Knowing each row's size up front lets a [Sink] track its file size without
/// flushing or re-reading file metadata after every row.
pub(crate) struct RowEncoder {
    builder: WriterBuilder,
    buf: Vec<u8>,
}

impl RowEncoder {
    pub fn new(delimiter: u8) -> Self {
        let mut builder = WriterBuilder::new();
        builder
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(false);

        Self {
            builder,
            buf: Vec::with_capacity(1024),
        }
    }

    /// Encodes `record` and returns the bytes, valid until the next call.
    pub fn encode(&mut self, record: &StringRecord) -> Result<&[u8], Error> {
        self.buf.clear();
        {
            let mut writer = self.builder.from_writer(&mut self.buf);
            writer.write_record(record)?;
            writer.flush()?;
        }
        Ok(&self.buf)
    }
}

/// How the files of a sink are named.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SinkNaming {
    /// `{prefix}_{part}.csv`
    Sequential,

    /// `{prefix}_{key}_{part}.csv`
    Keyed,

    /// `{prefix}_{key}.csv`, for sinks that never roll over.
    KeyedSingle,

    /// `{prefix}_other.csv`
    Overflow,
}

impl SinkNaming {
    fn file_name(self, prefix: &str, key: &str, part: u32) -> String {
        match self {
            SinkNaming::Sequential => format!("{prefix}_{part}.csv"),
            SinkNaming::Keyed => format!("{prefix}_{key}_{part}.csv"),
            SinkNaming::KeyedSingle => format!("{prefix}_{key}.csv"),
            SinkNaming::Overflow => format!("{prefix}_other.csv"),
        }
    }
}

/// An output file that has been written and closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedFile {
    pub path: PathBuf,

    /// The group key, or an empty string for ungrouped output.
    pub key: String,

    /// One-based part number within the key.
    pub part: u32,

    /// Data rows written, excluding the header.
    pub rows: u64,

    /// Bytes written, including the header.
    pub bytes: u64,
}

/// Shared, per-run settings every sink needs to open a file.
pub(crate) struct SinkContext {
    pub output_dir: PathBuf,
    pub prefix: String,
    pub header: Vec<u8>,
}

/// A single open output file and its counters.
struct SinkFile {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes: u64,
    rows: u64,
}

impl SinkFile {
    fn create(path: PathBuf, header: &[u8]) -> Result<Self, Error> {
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(header)?;

        Ok(Self {
            path,
            writer,
            bytes: header.len() as u64,
            rows: 0,
        })
    }

    fn write_row(&mut self, row: &[u8]) -> Result<(), Error> {
        self.writer.write_all(row)?;
        self.bytes += row.len() as u64;
        self.rows += 1;
        Ok(())
    }

    fn close(self, key: &str, part: u32) -> Result<CompletedFile, Error> {
        let SinkFile {
            path,
            writer,
            bytes,
            rows,
        } = self;

        // into_inner flushes; the file handle is released when `file` drops.
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        drop(file);

        Ok(CompletedFile {
            path,
            key: key.to_owned(),
            part,
            rows,
            bytes,
        })
    }
}

/// The output of one group key: a sequence of part files, at most one open at a time.
pub(crate) struct Sink {
    key: String,

    /// The one-based number of the part currently open, or of the next one to open.
    part: u32,

    limits: Limits,

    naming: SinkNaming,

    current_file: Option<SinkFile>,

    context: Rc<SinkContext>,
}

impl Sink {
    pub fn new(key: String, naming: SinkNaming, limits: Limits, context: Rc<SinkContext>) -> Self {
        Self {
            key,
            part: 1,
            limits,
            naming,
            current_file: None,
            context,
        }
    }

    fn path(&self) -> PathBuf {
        let name = self
            .naming
            .file_name(&self.context.prefix, &self.key, self.part);
        self.context.output_dir.join(name)
    }

    /// Writes one encoded row, opening a new part (header first) if none is open.
    ///
    /// Limits are checked after the row is written. When one trips, the file
    /// is closed and returned; the next row opens the following part.
    pub fn write_row(&mut self, row: &[u8]) -> Result<Option<CompletedFile>, Error> {
        if self.current_file.is_none() {
            self.current_file = Some(SinkFile::create(self.path(), &self.context.header)?);
        }

        if let Some(file) = self.current_file.as_mut() {
            file.write_row(row)?;

            if self.limits.is_breached(file.bytes, file.rows) {
                return self.close_current();
            }
        }

        Ok(None)
    }

    /// Closes the open part, if any.
    pub fn finish(&mut self) -> Result<Option<CompletedFile>, Error> {
        self.close_current()
    }

    fn close_current(&mut self) -> Result<Option<CompletedFile>, Error> {
        match self.current_file.take() {
            Some(file) => {
                let completed = file.close(&self.key, self.part)?;
                self.part += 1;
                Ok(Some(completed))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn context(dir: &TempDir, header: &str) -> Rc<SinkContext> {
        Rc::new(SinkContext {
            output_dir: dir.path().to_owned(),
            prefix: "split".to_owned(),
            header: header.as_bytes().to_vec(),
        })
    }

    #[test]
    fn encoder_quotes_only_when_needed() {
        let mut encoder = RowEncoder::new(b',');
        let row = StringRecord::from(vec!["1", "a,b", "plain"]);
        assert_eq!(encoder.encode(&row).unwrap(), b"1,\"a,b\",plain\n");

        let mut tabs = RowEncoder::new(b'\t');
        assert_eq!(tabs.encode(&row).unwrap(), b"1\ta,b\tplain\n");
    }

    #[test]
    fn rolls_over_after_row_limit() {
        let dir = TempDir::new().unwrap();
        let limits = Limits {
            max_bytes: None,
            max_rows: Some(2),
        };
        let mut sink = Sink::new(
            "txt".to_owned(),
            SinkNaming::Keyed,
            limits,
            context(&dir, "id\n"),
        );

        assert_eq!(sink.write_row(b"1\n").unwrap(), None);
        let first = sink.write_row(b"2\n").unwrap().expect("first part closed");
        assert_eq!(first.part, 1);
        assert_eq!(first.rows, 2);
        assert_eq!(first.bytes, 7);
        assert_eq!(first.path, dir.path().join("split_txt_1.csv"));

        assert_eq!(sink.write_row(b"3\n").unwrap(), None);
        let second = sink.finish().unwrap().expect("second part open");
        assert_eq!(second.path, dir.path().join("split_txt_2.csv"));
        assert_eq!(sink.finish().unwrap(), None);

        assert_eq!(fs::read_to_string(&first.path).unwrap(), "id\n1\n2\n");
        assert_eq!(fs::read_to_string(&second.path).unwrap(), "id\n3\n");
    }

    #[test]
    fn no_empty_trailing_part() {
        let dir = TempDir::new().unwrap();
        let limits = Limits {
            max_bytes: None,
            max_rows: Some(1),
        };
        let mut sink = Sink::new(
            String::new(),
            SinkNaming::Sequential,
            limits,
            context(&dir, "h\n"),
        );

        assert!(sink.write_row(b"x\n").unwrap().is_some());
        assert_eq!(sink.finish().unwrap(), None);
        assert!(!dir.path().join("split_2.csv").exists());
    }

    #[test]
    fn size_counts_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let limits = Limits {
            max_bytes: Some(10),
            max_rows: None,
        };
        let mut sink = Sink::new(
            String::new(),
            SinkNaming::Sequential,
            limits,
            context(&dir, "abc\n"),
        );

        assert_eq!(sink.write_row(b"12\n").unwrap(), None);
        let done = sink.write_row(b"3456\n").unwrap().expect("limit reached");
        assert_eq!(done.bytes, 12);
        assert_eq!(fs::metadata(&done.path).unwrap().len(), 12);
    }
}
