//! Bundle export/import progress reporting.
//!
//! The engine never touches UI state: it emits [`BundleProgress`] events to
//! an injected [`ProgressReporter`]. The CLI picks a stderr reporter (human
//! or JSON) so stdout stays parseable; embedding applications can forward
//! events over a channel with [`ChannelProgress`].

use serde::Serialize;
use std::io::Write;
use tokio::sync::mpsc::UnboundedSender;

/// Phase of a bundle operation.
///
/// Import walks `Validating → Documents → Groupings → Profiles → Recording →
/// Complete`, or jumps from `Validating` to `Failed` when the manifest is
/// rejected. Export uses `Packaging`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundlePhase {
    Validating,
    Packaging,
    Documents,
    Groupings,
    Profiles,
    Recording,
    Complete,
    Failed,
}

impl BundlePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundlePhase::Validating => "validating",
            BundlePhase::Packaging => "packaging",
            BundlePhase::Documents => "documents",
            BundlePhase::Groupings => "groupings",
            BundlePhase::Profiles => "profiles",
            BundlePhase::Recording => "recording",
            BundlePhase::Complete => "complete",
            BundlePhase::Failed => "failed",
        }
    }
}

/// A single progress event: `current` of `total` items done in `phase`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BundleProgress {
    pub phase: BundlePhase,
    pub current: u64,
    pub total: u64,
    pub label: String,
}

impl BundleProgress {
    pub fn new(phase: BundlePhase, current: u64, total: u64, label: impl Into<String>) -> Self {
        Self {
            phase,
            current,
            total,
            label: label.into(),
        }
    }
}

/// Receives progress events from the bundle engine.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: BundleProgress);
}

/// Human-friendly progress on stderr: "bundle  documents  1,234 / 5,000  report.pdf".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: BundleProgress) {
        let line = if event.total == 0 {
            format!("bundle  {}  {}\n", event.phase.as_str(), event.label)
        } else {
            format!(
                "bundle  {}  {} / {}  {}\n",
                event.phase.as_str(),
                format_number(event.current),
                format_number(event.total),
                event.label
            )
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: BundleProgress) {
        let obj = serde_json::json!({
            "event": "progress",
            "phase": event.phase,
            "n": event.current,
            "total": event.total,
            "label": event.label,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: BundleProgress) {}
}

/// Forwards events to an async consumer. A dropped receiver is ignored.
pub struct ChannelProgress {
    tx: UnboundedSender<BundleProgress>,
}

impl ChannelProgress {
    pub fn new(tx: UnboundedSender<BundleProgress>) -> Self {
        Self { tx }
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, event: BundleProgress) {
        let _ = self.tx.send(event);
    }
}

/// Thousands separators: 1234567 -> "1,234,567".
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let lead = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.char_indices() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
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
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
        assert_eq!(format_number(12_345), "12,345");
        assert_eq!(format_number(100_000), "100,000");
    }

    #[test]
    fn progress_mode_parse() {
        assert_eq!(ProgressMode::parse("json"), Some(ProgressMode::Json));
        assert_eq!(ProgressMode::parse("off"), Some(ProgressMode::Off));
        assert_eq!(ProgressMode::parse("loud"), None);
    }

    #[tokio::test]
    async fn channel_reporter_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let reporter = ChannelProgress::new(tx);
        reporter.report(BundleProgress::new(BundlePhase::Documents, 1, 3, "a.pdf"));
        reporter.report(BundleProgress::new(BundlePhase::Complete, 0, 0, "done"));
        drop(reporter);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.phase, BundlePhase::Documents);
        assert_eq!((first.current, first.total), (1, 3));
        assert_eq!(rx.recv().await.unwrap().phase, BundlePhase::Complete);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn phase_serializes_snake_case() {
        let json = serde_json::to_string(&BundlePhase::Recording).unwrap();
        assert_eq!(json, "\"recording\"");
    }
}
