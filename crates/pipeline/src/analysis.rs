//! External document-analysis process.
//!
//! [`YomitokuRunner`] spawns the analysis tool once per input file, merges
//! its stdout and stderr into one line stream, and reports the exit code.
//! The child is spawned with `kill_on_drop(true)`, so dropping the run
//! future (timeout, shutdown) always kills it.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use yomi_core::job::AnalysisConfig;

use crate::error::PipelineError;

/// One invocation of the analysis tool.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisInvocation<'a> {
    pub input: &'a Path,
    pub results_dir: &'a Path,
    pub config: &'a AnalysisConfig,
}

/// How an analysis process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

impl AnalysisOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs the analysis tool for a single file.
#[async_trait]
pub trait AnalysisRunner: Send + Sync {
    /// Run to completion, calling `on_line` for every output line in order.
    ///
    /// A non-zero exit is reported through [`AnalysisOutcome`], not as an
    /// error. Errors mean the process could not be run or supervised.
    async fn run(
        &self,
        invocation: AnalysisInvocation<'_>,
        on_line: &mut (dyn FnMut(String) + Send),
    ) -> Result<AnalysisOutcome, PipelineError>;
}

/// Command-line arguments for one analysis invocation.
///
/// `<input> -f <format> -o <results_dir> -d <device>` followed by one flag
/// per enabled option.
pub fn build_args(invocation: AnalysisInvocation<'_>) -> Vec<OsString> {
    let config = invocation.config;
    let mut args: Vec<OsString> = vec![
        invocation.input.as_os_str().to_owned(),
        "-f".into(),
        config.format.as_arg().into(),
        "-o".into(),
        invocation.results_dir.as_os_str().to_owned(),
        "-d".into(),
        config.device.as_arg().into(),
    ];

    let flags = [
        (config.visualize, "-v"),
        (config.lite, "-l"),
        (config.figure, "--figure"),
        (config.figure_letter, "--figure_letter"),
        (config.ignore_line_break, "--ignore_line_break"),
        (config.combine, "--combine"),
        (config.ignore_meta, "--ignore_meta"),
    ];
    args.extend(
        flags
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, flag)| OsString::from(flag)),
    );
    args
}

/// Spawns the `yomitoku` CLI (or a compatible binary).
pub struct YomitokuRunner {
    binary: String,
    timeout: Duration,
}

impl YomitokuRunner {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl AnalysisRunner for YomitokuRunner {
    async fn run(
        &self,
        invocation: AnalysisInvocation<'_>,
        on_line: &mut (dyn FnMut(String) + Send),
    ) -> Result<AnalysisOutcome, PipelineError> {
        let args = build_args(invocation);
        tracing::debug!(binary = %self.binary, ?args, "Spawning analysis process");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PipelineError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let started = Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let readers = [
            spawn_line_reader(child.stdout.take(), tx.clone()),
            spawn_line_reader(child.stderr.take(), tx),
        ];

        // Lines are drained until both pipes close, then the exit status is
        // collected.
        let supervise = async {
            while let Some(line) = rx.recv().await {
                on_line(line);
            }
            child.wait().await
        };

        let result = tokio::time::timeout(self.timeout, supervise).await;
        match result {
            Ok(Ok(status)) => Ok(AnalysisOutcome {
                exit_code: status.code(),
                elapsed: started.elapsed(),
            }),
            Ok(Err(e)) => {
                let _ = child.kill().await;
                Err(PipelineError::Io(e))
            }
            Err(_) => {
                let _ = child.kill().await;
                for reader in readers {
                    reader.abort();
                }
                Err(PipelineError::ChildProcessFailure {
                    file: display_name(invocation.input),
                    detail: format!("timed out after {}s", self.timeout.as_secs()),
                })
            }
        }
    }
}

/// Forward every line of `stream` to `tx`. Invalid UTF-8 is replaced.
fn spawn_line_reader<R>(stream: Option<R>, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(stream) = stream else { return };
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\r', '\n']);
                    if !line.is_empty() && tx.send(line.to_string()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read analysis output");
                    break;
                }
            }
        }
    })
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
