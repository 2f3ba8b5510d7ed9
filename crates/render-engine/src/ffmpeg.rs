//! The ffmpeg process boundary.
//!
//! Every render step is described as an [`FfmpegInvocation`] and executed by
//! a [`Transcoder`]. The production implementation, [`FfmpegCli`], spawns
//! ffmpeg with `-progress pipe:1`, turns its `key=value` progress stream into
//! fractions, and returns the captured stderr when the process fails.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Instant;

use podreel_common::config::ToolPaths;
use podreel_common::error::{PodreelError, PodreelResult};

use crate::graph::FilterGraph;
use crate::progress::CancelToken;

/// Where an input stream comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    File(PathBuf),
    /// A libavfilter source graph (`color=...`, `anullsrc=...`).
    Lavfi(String),
}

/// One `-i` input and the options placed before it.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub options: Vec<String>,
    pub source: InputSource,
}

impl InputSpec {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            options: Vec::new(),
            source: InputSource::File(path.into()),
        }
    }

    pub fn lavfi(graph: impl Into<String>) -> Self {
        Self {
            options: Vec::new(),
            source: InputSource::Lavfi(graph.into()),
        }
    }

    /// Silent stereo 44.1 kHz audio.
    pub fn silence() -> Self {
        Self::lavfi("anullsrc=channel_layout=stereo:sample_rate=44100")
    }

    pub fn option(mut self, flag: &str, value: impl ToString) -> Self {
        self.options.push(flag.to_string());
        self.options.push(value.to_string());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            InputSource::File(path) => Some(path),
            InputSource::Lavfi(_) => None,
        }
    }
}

/// A complete ffmpeg command.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInvocation {
    /// Short step name used in logs and errors (`speech`, `concat`, ...).
    pub label: String,
    pub inputs: Vec<InputSpec>,
    pub filter_graph: Option<FilterGraph>,
    /// Everything between the inputs and the output path.
    pub output_args: Vec<String>,
    pub output: PathBuf,
    /// Expected output length, used to turn `out_time` into a fraction.
    pub expected_duration_secs: f64,
}

impl FfmpegInvocation {
    pub fn new(label: impl Into<String>, output: impl Into<PathBuf>, expected_secs: f64) -> Self {
        Self {
            label: label.into(),
            inputs: Vec::new(),
            filter_graph: None,
            output_args: Vec::new(),
            output: output.into(),
            expected_duration_secs: expected_secs,
        }
    }

    pub fn input(mut self, input: InputSpec) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn graph(mut self, graph: FilterGraph) -> Self {
        self.filter_graph = Some(graph);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.output_args
            .extend(args.into_iter().map(|arg| arg.to_string()));
        self
    }

    /// Full argument vector, without the program name.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-nostdin",
            "-loglevel",
            "error",
            "-progress",
            "pipe:1",
            "-nostats",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            match &input.source {
                InputSource::File(path) => {
                    args.push("-i".into());
                    args.push(path.to_string_lossy().into_owned());
                }
                InputSource::Lavfi(graph) => {
                    args.extend(["-f".into(), "lavfi".into(), "-i".into(), graph.clone()]);
                }
            }
        }

        if let Some(graph) = self.filter_graph.as_ref().filter(|g| !g.is_empty()) {
            args.push("-filter_complex".into());
            args.push(graph.to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }

    /// Whether any argument contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.to_args().iter().any(|arg| arg.contains(needle))
    }
}

/// Runs transcoder commands.
pub trait Transcoder: Send + Sync {
    /// Execute `invocation`, calling `on_progress` with fractions in `[0, 1]`.
    fn run(
        &self,
        invocation: &FfmpegInvocation,
        on_progress: &mut dyn FnMut(f64),
    ) -> PodreelResult<()>;

    /// Copy a single clip to `to` without re-encoding.
    fn copy_file(&self, from: &Path, to: &Path) -> PodreelResult<()> {
        std::fs::copy(from, to)?;
        Ok(())
    }
}

/// Reads media metadata.
pub trait MediaProbe: Send + Sync {
    /// Container duration in seconds.
    fn duration_secs(&self, path: &Path) -> Option<f64>;

    /// Whether the file carries at least one audio stream.
    fn has_audio_stream(&self, path: &Path) -> bool;
}

/// [`Transcoder`] and [`MediaProbe`] backed by the ffmpeg command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegCli {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    cancel: CancelToken,
}

impl FfmpegCli {
    pub fn new(tools: &ToolPaths) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone(),
            ffprobe: tools.ffprobe.clone(),
            cancel: CancelToken::new(),
        }
    }

    /// Poll `cancel` while a process runs and kill it once set.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn probe(&self, args: &[&str], path: &Path) -> Option<String> {
        let output = Command::new(&self.ffprobe)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8(output.stdout).ok()
    }
}

impl Transcoder for FfmpegCli {
    fn run(
        &self,
        invocation: &FfmpegInvocation,
        on_progress: &mut dyn FnMut(f64),
    ) -> PodreelResult<()> {
        self.cancel.check()?;

        let args = invocation.to_args();
        tracing::debug!(step = %invocation.label, args = ?args, "Running ffmpeg");
        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PodreelError::render(format!(
                    "Failed to start {}: {e}",
                    self.ffmpeg.display()
                ))
            })?;

        let start = Instant::now();
        tracing::debug!(
            step = %invocation.label,
            pid = child.id(),
            output = %invocation.output.display(),
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PodreelError::render("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PodreelError::render("Failed to capture ffmpeg stderr"))?;

        // ffmpeg blocks once the stderr pipe is full, so drain it on its own thread.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut state = ProgressState::default();
        let mut last_out_time = 0.0f64;
        let mut last_advance = Instant::now();
        let mut cancelled = false;

        loop {
            line.clear();
            let bytes = match reader.read_line(&mut line) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(step = %invocation.label, error = %e, "Lost ffmpeg progress stream");
                    stop_child(&mut child);
                    let _ = stderr_task.join();
                    return Err(PodreelError::render(format!(
                        "Failed reading ffmpeg progress: {e}"
                    )));
                }
            };
            if bytes == 0 {
                break;
            }

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            state.update(key, value);
            if key != "progress" {
                continue;
            }

            if self.cancel.is_cancelled() {
                tracing::info!(step = %invocation.label, "Cancelling ffmpeg");
                if let Err(e) = child.kill() {
                    tracing::warn!(error = %e, "Failed to kill ffmpeg");
                }
                cancelled = true;
                break;
            }

            if state.out_time_secs > last_out_time + 0.001 {
                last_out_time = state.out_time_secs;
                last_advance = Instant::now();
            }
            on_progress(state.fraction(invocation.expected_duration_secs));

            if last_advance.elapsed().as_secs() >= 10 {
                tracing::warn!(
                    step = %invocation.label,
                    out_time_secs = state.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_advance = Instant::now();
            }
        }

        let status = child
            .wait()
            .map_err(|e| PodreelError::render(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if cancelled {
            return Err(PodreelError::Cancelled);
        }
        if !status.success() {
            return Err(PodreelError::transcode(
                &invocation.label,
                status,
                stderr_output.trim(),
            ));
        }

        on_progress(1.0);
        tracing::debug!(
            step = %invocation.label,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ffmpeg finished"
        );
        Ok(())
    }
}

impl MediaProbe for FfmpegCli {
    fn duration_secs(&self, path: &Path) -> Option<f64> {
        let raw = self.probe(
            &[
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ],
            path,
        )?;
        parse_duration(&raw)
    }

    fn has_audio_stream(&self, path: &Path) -> bool {
        self.probe(
            &[
                "-v",
                "error",
                "-select_streams",
                "a",
                "-show_entries",
                "stream=index",
                "-of",
                "csv=p=0",
            ],
            path,
        )
        .is_some_and(|raw| !raw.trim().is_empty())
    }
}

/// Kill `child` and reap it so no zombie outlives an aborted step.
fn stop_child(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::warn!(error = %e, "Failed to kill ffmpeg");
    }
    if let Err(e) = child.wait() {
        tracing::warn!(error = %e, "Failed to wait on ffmpeg");
    }
}

fn parse_duration(raw: &str) -> Option<f64> {
    let secs = raw.lines().next()?.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs >= 0.0).then_some(secs)
}

/// Whether `binary` can be found on `PATH` (or exists, for explicit paths).
pub fn command_exists(binary: &Path) -> bool {
    if binary.components().count() > 1 {
        return binary.is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {} >/dev/null 2>&1", binary.display()))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Whether `ffmpeg` was built with the lavfi sources the renderer needs.
pub fn lavfi_available(ffmpeg: &Path) -> bool {
    Command::new(ffmpeg)
        .args([
            "-hide_banner",
            "-nostdin",
            "-loglevel",
            "error",
            "-f",
            "lavfi",
            "-i",
            "anullsrc=channel_layout=stereo:sample_rate=44100",
            "-f",
            "lavfi",
            "-i",
            "color=c=black:s=64x64:d=0.1",
            "-t",
            "0.1",
            "-f",
            "null",
            "-",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, expected_duration_secs: f64) -> f64 {
        if self.complete {
            return 1.0;
        }
        if expected_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Filter, FilterChain};

    #[test]
    fn test_invocation_args_order() {
        let mut graph = FilterGraph::new();
        graph.push(FilterChain::link("0:v", "v").then(Filter::new("null")));
        let invocation = FfmpegInvocation::new("speech", "/tmp/out.mkv", 2.0)
            .input(InputSpec::file("/tmp/a.wav"))
            .input(InputSpec::file("/tmp/bg.mp4").option("-stream_loop", -1))
            .input(InputSpec::silence())
            .graph(graph)
            .args(["-map", "[v]"]);
        let args = invocation.to_args();

        assert_eq!(args[0], "-y");
        let i = args.iter().position(|a| a == "-stream_loop").unwrap();
        assert_eq!(&args[i..i + 4], ["-stream_loop", "-1", "-i", "/tmp/bg.mp4"]);
        let lavfi = args.iter().position(|a| a == "lavfi").unwrap();
        assert_eq!(
            args[lavfi + 2],
            "anullsrc=channel_layout=stereo:sample_rate=44100"
        );
        let fc = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(args[fc + 1], "[0:v]null[v]");
        assert_eq!(args.last().unwrap(), "/tmp/out.mkv");
        assert!(invocation.mentions("null[v]"));
    }

    #[test]
    fn test_empty_graph_is_omitted() {
        let invocation =
            FfmpegInvocation::new("gap", "/tmp/o.mkv", 1.0).graph(FilterGraph::new());
        assert!(!invocation.to_args().contains(&"-filter_complex".to_string()));
    }

    #[test]
    fn test_progress_state_parsing() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "1500000");
        assert!((state.fraction(3.0) - 0.5).abs() < 1e-9);
        state.update("out_time_ms", "6000000");
        assert_eq!(state.fraction(3.0), 1.0);
        state.update("out_time_ms", "N/A");
        assert_eq!(state.out_time_secs, 6.0);
        state.update("progress", "end");
        assert_eq!(state.fraction(0.0), 1.0);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12.500000\n"), Some(12.5));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_child_kills_and_reaps() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let started = Instant::now();
        stop_child(&mut child);
        assert!(started.elapsed().as_secs() < 10);
        let status = child.try_wait().unwrap().expect("child should be reaped");
        assert!(!status.success());
    }

    #[test]
    fn test_command_exists_for_missing_explicit_path() {
        assert!(!command_exists(Path::new("/definitely/not/here/ffmpeg")));
    }
}
