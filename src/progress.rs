//! Scan progress reporting.
//!
//! Progress goes to **stderr** so stdout stays parseable when `--json` is used.

use std::io::Write;

/// A single progress event emitted while scanning a repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanProgressEvent {
    /// Walking the repository tree. Total unknown.
    Discovering { repository: String },
    /// `n` of `total` candidate files analyzed.
    Extracting {
        repository: String,
        n: u64,
        total: u64,
    },
    /// Scan finished with this many components.
    Done { repository: String, components: u64 },
}

pub trait ScanProgressReporter: Send + Sync {
    fn report(&self, event: ScanProgressEvent);
}

/// Human-friendly lines: `scan acme/billing  extracting  120 / 1,024 files`.
pub struct StderrProgress;

impl ScanProgressReporter for StderrProgress {
    fn report(&self, event: ScanProgressEvent) {
        let line = match &event {
            ScanProgressEvent::Discovering { repository } => {
                format!("scan {}  discovering...\n", repository)
            }
            ScanProgressEvent::Extracting {
                repository,
                n,
                total,
            } => format!(
                "scan {}  extracting  {} / {} files\n",
                repository,
                format_number(*n),
                format_number(*total)
            ),
            ScanProgressEvent::Done {
                repository,
                components,
            } => format!(
                "scan {}  done  {} components\n",
                repository,
                format_number(*components)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// One JSON object per line on stderr.
pub struct JsonProgress;

impl ScanProgressReporter for JsonProgress {
    fn report(&self, event: ScanProgressEvent) {
        let obj = match &event {
            ScanProgressEvent::Discovering { repository } => serde_json::json!({
                "event": "progress",
                "repository": repository,
                "phase": "discovering"
            }),
            ScanProgressEvent::Extracting {
                repository,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "repository": repository,
                "phase": "extracting",
                "n": n,
                "total": total
            }),
            ScanProgressEvent::Done {
                repository,
                components,
            } => serde_json::json!({
                "event": "done",
                "repository": repository,
                "components": components
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

pub struct NoProgress;

impl ScanProgressReporter for NoProgress {
    fn report(&self, _event: ScanProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ScanProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(12_345), "12,345");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
