//! Interactive session host loop and transcript recording.
//!
//! [`Shell`] is the thin I/O wrapper around a [`CommandDispatcher`]: it prints
//! the prompt, reads one line, hands it to the dispatcher and stops once the
//! line source is exhausted.
//!
//! # Main Components
//!
//! - [`Shell`] - Prompt/read/dispatch loop over any `BufRead` source
//! - [`TranscriptRecorder`] - In-memory event log of a session, exportable as JSONL
//! - [`TranscriptReplayer`] - Re-runs a recorded transcript against a fresh device

use std::io::{self, BufRead, Write};

use log::{debug, info, trace};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::device::{DeviceState, Mode};
use crate::dispatcher::CommandDispatcher;
use crate::error::CliError;
use crate::grammar::CommandKind;

pub use recording::{
    NormalizeOptions, RecordLevel, ReplayContext, ReplayReport, SessionEvent, SessionRecordEntry,
    TranscriptRecorder, TranscriptReplayer, transcript_schema,
};

/// Counters collected over one run of the shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ShellSummary {
    /// Lines read from the source, including blank ones.
    pub lines: usize,
    /// Lines that matched a rule.
    pub matched: usize,
    /// Lines answered with `Invalid command`.
    pub rejected: usize,
}

/// Prompt/read/dispatch loop.
pub struct Shell<R, W: Write> {
    reader: R,
    dispatcher: CommandDispatcher<W>,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    pub fn new(reader: R, dispatcher: CommandDispatcher<W>) -> Self {
        Self { reader, dispatcher }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<W> {
        &self.dispatcher
    }

    pub fn into_dispatcher(self) -> CommandDispatcher<W> {
        self.dispatcher
    }

    /// Runs until the line source is exhausted.
    ///
    /// Input that is not valid UTF-8 is decoded lossily and dispatched like
    /// any other line.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Io` if reading input or writing the prompt fails.
    pub fn run(&mut self) -> Result<ShellSummary, CliError> {
        info!("Shell started at prompt '{}'", self.dispatcher.current_prompt());
        let mut summary = ShellSummary::default();
        let mut buf = Vec::new();

        loop {
            self.write_prompt()?;

            buf.clear();
            if self.reader.read_until(b'\n', &mut buf)? == 0 {
                debug!("Line source exhausted after {} lines", summary.lines);
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            trace!("Read line: {:?}", line);

            summary.lines += 1;
            if self.dispatcher.process_line(line.trim()) {
                summary.matched += 1;
            } else {
                summary.rejected += 1;
            }
        }

        // Terminate the dangling prompt line.
        writeln!(self.dispatcher.sink_mut())?;
        self.dispatcher.sink_mut().flush()?;

        if let Some(recorder) = self.dispatcher.recorder() {
            recorder.record_event(SessionEvent::InputExhausted {
                lines: summary.lines,
            });
        }

        info!(
            "Shell stopped: {} lines, {} matched, {} rejected",
            summary.lines, summary.matched, summary.rejected
        );
        Ok(summary)
    }

    fn write_prompt(&mut self) -> io::Result<()> {
        let prompt = self.dispatcher.current_prompt();
        let sink = self.dispatcher.sink_mut();
        sink.write_all(prompt.as_bytes())?;
        sink.flush()
    }
}

mod recording;
