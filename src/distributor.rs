use crate::{
    key,
    sink::{CompletedFile, RowEncoder, Sink, SinkContext, SinkNaming},
    AllowList, Error, Limits, SplitConfig,
};
use csv::StringRecord;
use std::{
    collections::{hash_map::Entry, HashMap},
    io::Read,
    path::{Path, PathBuf},
    rc::Rc,
};

const OVERFLOW_KEY: &str = "other";

/// Totals for a completed split.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitSummary {
    /// Data rows read from the input, excluding the header.
    pub rows_read: u64,

    /// Rows whose key was not in the allow-list.
    pub rows_overflowed: u64,

    /// Every file written, in the order it was closed.
    pub files: Vec<CompletedFile>,
}

/// Which sink a row goes to.
enum Routing {
    /// Every row goes to one stream of numbered files.
    Sequential,

    /// Rows are keyed by the sanitized value of a column.
    Grouped { column: usize },

    /// Rows are keyed by the extension in a column; keys outside the list overflow.
    Filtered {
        column: usize,
        allow_list: AllowList,
        naming: SinkNaming,
    },
}

/// Routes the rows of one input to output files.
///
/// Each row goes to exactly one file. Files are opened lazily, start with the
/// input header, and are closed when a limit trips or when [finish] is called.
///
/// [finish]: RowDistributor::finish
pub struct RowDistributor<F>
where
    F: FnMut(&CompletedFile) -> Result<(), Error>,
{
    routing: Routing,

    limits: Limits,

    context: Rc<SinkContext>,

    encoder: RowEncoder,

    /// The single stream used when rows aren't grouped.
    sequential: Sink,

    /// A mapping of group keys to the sinks that output to files
    handles: HashMap<String, Sink>,

    /// Rows rejected by the allow-list.
    overflow: Sink,

    /// Called as soon as each output file is closed; an error stops the run.
    on_file_completion: F,

    summary: SplitSummary,
}

impl<F> std::fmt::Debug for RowDistributor<F>
where
    F: FnMut(&CompletedFile) -> Result<(), Error>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowDistributor")
            .field("output_dir", &self.context.output_dir)
            .field("limits", &self.limits)
            .field("open_groups", &self.handles.len())
            .field("rows_read", &self.summary.rows_read)
            .finish()
    }
}

impl<F> RowDistributor<F>
where
    F: FnMut(&CompletedFile) -> Result<(), Error>,
{
    /// Creates a distributor writing into `output_dir`, which must already exist.
    ///
    /// `header` is re-encoded with the output delimiter and written at the top
    /// of every output file, so unneeded quotes are dropped and the line ends
    /// with `\n`.
    pub fn new<P: Into<PathBuf>>(
        config: &SplitConfig,
        output_dir: P,
        header: &StringRecord,
        on_file_completion: F,
    ) -> Result<Self, Error> {
        config.validate()?;

        let mut encoder = RowEncoder::new(config.delimiter);
        let context = Rc::new(SinkContext {
            output_dir: output_dir.into(),
            prefix: config.prefix.clone(),
            header: encoder.encode(header)?.to_vec(),
        });

        let routing = match (config.group_column, &config.allow_list) {
            (None, _) => Routing::Sequential,
            (Some(column), None) => Routing::Grouped { column },
            (Some(column), Some(allow_list)) => Routing::Filtered {
                column,
                allow_list: allow_list.clone(),
                naming: if config.limits.is_unbounded() {
                    SinkNaming::KeyedSingle
                } else {
                    SinkNaming::Keyed
                },
            },
        };

        Ok(Self {
            routing,
            limits: config.limits,
            sequential: Sink::new(
                String::new(),
                SinkNaming::Sequential,
                config.limits,
                context.clone(),
            ),
            overflow: Sink::new(
                OVERFLOW_KEY.to_owned(),
                SinkNaming::Overflow,
                Limits::default(),
                context.clone(),
            ),
            handles: HashMap::new(),
            context,
            encoder,
            on_file_completion,
            summary: SplitSummary::default(),
        })
    }

    /// Routes one data row to its output file.
    pub fn write_record(&mut self, record: &StringRecord) -> Result<(), Error> {
        self.summary.rows_read += 1;
        let line = record
            .position()
            .map_or(self.summary.rows_read + 1, |p| p.line());

        let completed = match &self.routing {
            Routing::Sequential => {
                let row = self.encoder.encode(record)?;
                self.sequential.write_row(row)?
            }
            Routing::Grouped { column } => {
                let key = key::raw_key(record, *column, line)?;
                let sink = sink_for(
                    &mut self.handles,
                    key,
                    SinkNaming::Keyed,
                    self.limits,
                    &self.context,
                );
                sink.write_row(self.encoder.encode(record)?)?
            }
            Routing::Filtered {
                column,
                allow_list,
                naming,
            } => {
                let key = key::extension_key(record, *column);
                if allow_list.contains(&key) {
                    let key = key::sanitize(&key);
                    // `{prefix}_other.csv` belongs to the overflow file.
                    let naming = match naming {
                        SinkNaming::KeyedSingle if key == OVERFLOW_KEY => SinkNaming::Keyed,
                        naming => *naming,
                    };
                    let sink = sink_for(
                        &mut self.handles,
                        key,
                        naming,
                        self.limits,
                        &self.context,
                    );
                    sink.write_row(self.encoder.encode(record)?)?
                } else {
                    self.summary.rows_overflowed += 1;
                    self.overflow.write_row(self.encoder.encode(record)?)?
                }
            }
        };

        if let Some(file) = completed {
            self.complete(file)?;
        }

        Ok(())
    }

    /// Routes every remaining row of `reader`.
    ///
    /// Unlike a lenient reader, a row that can't be parsed stops the run.
    pub fn process_csv<R: Read>(&mut self, reader: &mut csv::Reader<R>) -> Result<u64, Error> {
        let mut record = StringRecord::new();
        let mut written = 0;

        while reader.read_record(&mut record)? {
            self.write_record(&record)?;
            written += 1;
        }

        Ok(written)
    }

    /// Closes every open file and returns the totals for the run.
    ///
    /// Grouped files are closed in key order and the overflow file last.
    pub fn finish(mut self) -> Result<SplitSummary, Error> {
        if let Some(file) = self.sequential.finish()? {
            self.complete(file)?;
        }

        let mut keys: Vec<String> = self.handles.keys().cloned().collect();
        keys.sort();
        for key in keys {
            let closed = match self.handles.get_mut(&key) {
                Some(sink) => sink.finish()?,
                None => None,
            };
            if let Some(file) = closed {
                self.complete(file)?;
            }
        }

        if let Some(file) = self.overflow.finish()? {
            self.complete(file)?;
        }

        tracing::info!(
            rows = self.summary.rows_read,
            overflowed = self.summary.rows_overflowed,
            files = self.summary.files.len(),
            "Split complete"
        );

        Ok(self.summary)
    }

    fn complete(&mut self, file: CompletedFile) -> Result<(), Error> {
        tracing::debug!(
            path = %file.path.display(),
            key = %file.key,
            part = file.part,
            rows = file.rows,
            bytes = file.bytes,
            "Completed file"
        );
        (self.on_file_completion)(&file)?;
        self.summary.files.push(file);
        Ok(())
    }
}

fn sink_for<'a>(
    handles: &'a mut HashMap<String, Sink>,
    key: String,
    naming: SinkNaming,
    limits: Limits,
    context: &Rc<SinkContext>,
) -> &'a mut Sink {
    match handles.entry(key) {
        Entry::Occupied(e) => e.into_mut(),
        Entry::Vacant(e) => {
            let sink = Sink::new(e.key().clone(), naming, limits, context.clone());
            e.insert(sink)
        }
    }
}

/// Splits delimited data from `reader` into files under `output_dir`.
///
/// The first row is taken as the header. `output_dir` must already exist.
/// `on_file_completion` is called for each file as soon as it is closed, so
/// callers see the files written so far even if a later row fails. An error
/// returned from it aborts the split.
pub fn split_reader<R, F>(
    reader: R,
    output_dir: &Path,
    config: &SplitConfig,
    on_file_completion: F,
) -> Result<SplitSummary, Error>
where
    R: Read,
    F: FnMut(&CompletedFile) -> Result<(), Error>,
{
    config.validate()?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header = reader.headers()?.clone();
    if header.is_empty() {
        return Err(Error::MissingHeader);
    }

    let mut distributor = RowDistributor::new(config, output_dir, &header, on_file_completion)?;
    distributor.process_csv(&mut reader)?;
    distributor.finish()
}
