use crate::{
    distributor::{split_reader, SplitSummary},
    inspect::inspect_reader,
    run_log::{self, RunLog},
    Error, SplitConfig,
};
use chrono::Local;
use std::{
    fs::{self, File},
    io::BufReader,
    path::PathBuf,
};

/// One invocation of the splitter: an input file, where its pieces go, and how to cut it.
#[derive(Clone, Debug)]
pub struct SplitJob {
    pub input: PathBuf,

    pub output_dir: PathBuf,

    pub config: SplitConfig,

    /// Overrides the default, timestamped log file in `output_dir`.
    pub log_path: Option<PathBuf>,

    /// When set, only this many rows are inspected and no split files are written.
    pub inspect: Option<usize>,
}

impl SplitJob {
    pub fn new<I, O>(input: I, output_dir: O, config: SplitConfig) -> Self
    where
        I: Into<PathBuf>,
        O: Into<PathBuf>,
    {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            config,
            log_path: None,
            inspect: None,
        }
    }

    pub fn with_log_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn with_inspect(mut self, rows: usize) -> Self {
        self.inspect = Some(rows);
        self
    }
}

/// What a finished run produced.
#[derive(Clone, Debug)]
pub struct SplitOutcome {
    pub log_path: PathBuf,

    /// Empty for an inspection run.
    pub summary: SplitSummary,
}

/// Runs `job` from start to finish.
///
/// Configuration and the input path are checked before anything is written.
/// After that, every failure is recorded in the run log before it is
/// returned, and the log always gets an end time.
pub fn run(job: &SplitJob) -> Result<SplitOutcome, Error> {
    let started = Local::now();
    tracing::info!(input = %job.input.display(), "Start time: {started}");

    if let Err(e) = preflight(job) {
        if let Some(path) = &job.log_path {
            run_log::append_line(path, &format!("Error: {e}"))?;
        }
        return Err(e);
    }

    fs::create_dir_all(&job.output_dir)?;

    let path = run_log::log_path(&job.output_dir, job.log_path.as_deref(), started);
    let mut log = RunLog::create(path, started)?;

    let result = split_or_inspect(job, &mut log);

    let logged = match &result {
        Err(e) => log.error(e),
        Ok(_) => Ok(()),
    };
    let finished = log.finish();
    tracing::info!("End time: {}", Local::now());

    // The split's own error wins over a failure to record it.
    let summary = result?;
    logged?;
    let log_path = finished?;

    Ok(SplitOutcome { log_path, summary })
}

fn preflight(job: &SplitJob) -> Result<(), Error> {
    job.config.validate()?;

    if !job.input.is_file() {
        return Err(Error::InputNotFound(job.input.clone()));
    }

    Ok(())
}

fn split_or_inspect(job: &SplitJob, log: &mut RunLog) -> Result<SplitSummary, Error> {
    let input = BufReader::new(File::open(&job.input)?);

    if let Some(rows) = job.inspect {
        inspect_reader(input, &job.config, rows, log)?;
        return Ok(SplitSummary::default());
    }

    split_reader(input, &job.output_dir, &job.config, |file| {
        log.file_created(file)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn input_must_be_a_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let job = SplitJob::new(dir.path(), &out, SplitConfig::new().with_max_rows(1));

        assert!(matches!(run(&job), Err(Error::InputNotFound(_))));
        assert!(!out.exists());
    }

    #[test]
    fn preflight_errors_go_to_an_explicit_log() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("errors.log");
        let job = SplitJob::new(dir.path().join("nope.csv"), dir.path(), SplitConfig::new())
            .with_log_path(&log);

        assert!(matches!(run(&job), Err(Error::NoCriterionSpecified)));
        let text = fs::read_to_string(log).unwrap();
        assert!(text.starts_with("Error: either a size limit"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_log_writes_stop_the_split() {
        let full = std::path::Path::new("/dev/full");
        if !full.exists() {
            return;
        }

        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.csv");
        let rows: String = (0..500).map(|i| format!("{i},row{i}\n")).collect();
        fs::write(&input, format!("id,name\n{rows}")).unwrap();

        let job = SplitJob::new(&input, dir.path().join("out"), SplitConfig::new().with_max_rows(1));
        fs::create_dir_all(&job.output_dir).unwrap();
        let mut log = RunLog::create(full.to_owned(), Local::now()).unwrap();

        // Enough "Created file" lines to spill the log's buffer onto the full device.
        let result = split_or_inspect(&job, &mut log);

        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!job.output_dir.join("split_500.csv").exists());
    }
}
