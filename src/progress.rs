use std::io::{self, Write};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;

use crate::domain::ModelId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { total: usize },
    Skipped { id: ModelId },
    Retrying { id: ModelId, attempt: u32, delay: Duration },
    Harvested { id: ModelId, archive: bool },
    Finished,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct TerminalProgress {
    bar: ProgressBar,
    visible: bool,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
        bar.set_style(
            ProgressStyle::with_template(
                "{percent:>3}%|{bar:40.cyan/blue}| {pos}/{len} [{elapsed_precise}<{eta_precise}] {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉ "),
        );
        Self { bar, visible: true }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            visible: false,
        }
    }

    pub fn log_writer(&self) -> BarLogWriter {
        BarLogWriter {
            bar: self.bar.clone(),
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total } => {
                if self.visible {
                    self.bar.set_draw_target(ProgressDrawTarget::stderr());
                }
                self.bar.set_length(total as u64);
                self.bar.reset_elapsed();
            }
            ProgressEvent::Skipped { .. } => self.bar.inc(1),
            ProgressEvent::Retrying { id, attempt, delay } => {
                self.bar.set_message(format!(
                    "model {id}: retry {attempt} in {}s",
                    delay.as_secs()
                ));
            }
            ProgressEvent::Harvested { id, .. } => {
                self.bar.set_message(format!("model {id}"));
                self.bar.inc(1);
            }
            ProgressEvent::Finished => self.bar.finish_and_clear(),
        }
    }
}

// Log lines share stderr with the bar; each write clears the bar and redraws it after.
#[derive(Clone)]
pub struct BarLogWriter {
    bar: ProgressBar,
}

impl Write for BarLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bar
            .suspend(|| io::stderr().lock().write_all(buf))
            .map(|()| buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.bar.suspend(|| io::stderr().lock().flush())
    }
}

impl<'a> MakeWriter<'a> for BarLogWriter {
    type Writer = BarLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
