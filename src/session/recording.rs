use super::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Transcript recording granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub enum RecordLevel {
    /// Disable recording.
    Off,
    /// Record session boundaries and processed commands only.
    CommandsOnly,
    /// Also record every mode transition.
    #[default]
    Full,
}

/// A single recorded session event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SessionRecordEntry {
    pub ts_ms: u128,
    pub event: SessionEvent,
}

/// Options for normalizing JSONL transcripts into stable fixtures.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// Keep mode-changed events.
    pub keep_mode_changes: bool,
    /// Keep the end-of-input marker.
    pub keep_input_exhausted: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            keep_mode_changes: false,
            keep_input_exhausted: true,
        }
    }
}

/// Supported recorded event types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        hostname: String,
        mode: Mode,
        prompt: String,
    },
    CommandProcessed {
        line: String,
        mode_before: Mode,
        mode_after: Mode,
        prompt_before: String,
        prompt_after: String,
        matched: bool,
        #[serde(default)]
        command: Option<CommandKind>,
        #[serde(default)]
        output: Option<String>,
    },
    ModeChanged {
        from: Mode,
        to: Mode,
    },
    InputExhausted {
        lines: usize,
    },
}

/// In-memory transcript recorder.
///
/// Clones share the same event log, so a handle kept by the caller sees
/// everything the dispatcher records.
#[derive(Debug, Clone)]
pub struct TranscriptRecorder {
    level: RecordLevel,
    entries: Rc<RefCell<Vec<SessionRecordEntry>>>,
}

impl TranscriptRecorder {
    /// Create a recorder with the given level.
    pub fn new(level: RecordLevel) -> Self {
        Self {
            level,
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Current recording level.
    pub fn level(&self) -> RecordLevel {
        self.level
    }

    /// Record an event unless recording is off.
    pub fn record_event(&self, event: SessionEvent) {
        if self.level == RecordLevel::Off {
            return;
        }
        self.entries.borrow_mut().push(SessionRecordEntry {
            ts_ms: now_ms(),
            event,
        });
    }

    /// Record a mode transition when running at full level.
    pub fn record_mode_change(&self, from: Mode, to: Mode) {
        if self.level != RecordLevel::Full {
            return;
        }
        self.record_event(SessionEvent::ModeChanged { from, to });
    }

    /// Snapshot all records.
    pub fn entries(&self) -> Vec<SessionRecordEntry> {
        self.entries.borrow().clone()
    }

    /// Clears all recorded events.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Export records as JSONL.
    pub fn to_jsonl(&self) -> Result<String, CliError> {
        let entries = self.entries.borrow();
        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            let line = serde_json::to_string(entry)
                .map_err(|e| CliError::RecordError(format!("encode error: {e}")))?;
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }

    /// Restore a recorder from JSONL lines. Blank lines are skipped.
    pub fn from_jsonl(jsonl: &str) -> Result<Self, CliError> {
        let mut parsed = Vec::new();
        for (idx, line) in jsonl.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: SessionRecordEntry = serde_json::from_str(line).map_err(|e| {
                CliError::RecordError(format!("decode error on line {}: {e}", idx + 1))
            })?;
            parsed.push(entry);
        }

        Ok(Self {
            level: RecordLevel::Full,
            entries: Rc::new(RefCell::new(parsed)),
        })
    }

    /// Normalize JSONL transcript content into a stable fixture representation.
    ///
    /// Events are sorted by timestamp, keeping recording order for ties.
    pub fn normalize_jsonl(jsonl: &str, options: NormalizeOptions) -> Result<String, CliError> {
        let mut indexed = Self::from_jsonl(jsonl)?
            .entries()
            .into_iter()
            .enumerate()
            .collect::<Vec<_>>();

        indexed
            .sort_by(|(idx_a, a), (idx_b, b)| a.ts_ms.cmp(&b.ts_ms).then_with(|| idx_a.cmp(idx_b)));

        let filtered = indexed
            .into_iter()
            .filter_map(|(_, entry)| match &entry.event {
                SessionEvent::ModeChanged { .. } if !options.keep_mode_changes => None,
                SessionEvent::InputExhausted { .. } if !options.keep_input_exhausted => None,
                _ => Some(entry),
            })
            .collect::<Vec<_>>();

        let normalized = TranscriptRecorder {
            level: RecordLevel::Full,
            entries: Rc::new(RefCell::new(filtered)),
        };
        normalized.to_jsonl()
    }
}

impl Default for TranscriptRecorder {
    fn default() -> Self {
        Self::new(RecordLevel::Full)
    }
}

/// JSON schema describing one transcript line.
pub fn transcript_schema() -> schemars::Schema {
    schemars::schema_for!(SessionRecordEntry)
}

/// Starting point of a recorded session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayContext {
    pub hostname: String,
    pub mode: Mode,
    pub prompt: String,
}

/// Summary of a successful replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// Number of command lines re-executed.
    pub commands: usize,
    /// Prompt of the replayed device after the last command.
    pub final_prompt: String,
    /// Device state after the last command.
    pub final_state: DeviceState,
}

/// Offline replayer that re-runs a transcript against a fresh device.
#[derive(Debug, Clone)]
pub struct TranscriptReplayer {
    entries: Vec<SessionRecordEntry>,
}

impl TranscriptReplayer {
    /// Build a replayer from a recorder snapshot.
    pub fn from_recorder(recorder: &TranscriptRecorder) -> Self {
        Self {
            entries: recorder.entries(),
        }
    }

    /// Build a replayer from JSONL transcript data.
    pub fn from_jsonl(jsonl: &str) -> Result<Self, CliError> {
        let recorder = TranscriptRecorder::from_jsonl(jsonl)?;
        Ok(Self::from_recorder(&recorder))
    }

    /// Returns the session start context if present in the transcript.
    pub fn initial_context(&self) -> Option<ReplayContext> {
        self.entries.iter().find_map(|entry| match &entry.event {
            SessionEvent::SessionStarted {
                hostname,
                mode,
                prompt,
            } => Some(ReplayContext {
                hostname: hostname.clone(),
                mode: *mode,
                prompt: prompt.clone(),
            }),
            _ => None,
        })
    }

    /// Recorded command lines, in order.
    pub fn lines(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.event {
                SessionEvent::CommandProcessed { line, .. } => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Re-executes every recorded command and checks it behaves as recorded.
    ///
    /// # Errors
    ///
    /// Returns `CliError::ReplayMismatchError` at the first command whose
    /// matched flag, output or resulting prompt differs from the transcript.
    pub fn verify(&self) -> Result<ReplayReport, CliError> {
        let state = match self.initial_context() {
            Some(ctx) => {
                let state = DeviceState::with_hostname(&ctx.hostname)?;
                if state.prompt() != ctx.prompt || state.mode() != ctx.mode {
                    return Err(CliError::ReplayMismatchError(format!(
                        "cannot start from prompt '{}' in {} mode",
                        ctx.prompt, ctx.mode
                    )));
                }
                state
            }
            None => DeviceState::new(),
        };

        let mut dispatcher = CommandDispatcher::with_state(state, io::sink());
        let mut commands = 0;
        for entry in &self.entries {
            let SessionEvent::CommandProcessed {
                line,
                prompt_after,
                matched,
                output,
                ..
            } = &entry.event
            else {
                continue;
            };

            commands += 1;
            let reply = dispatcher.execute(line);
            trace!("Replayed '{}' -> {:?}", line, reply);

            if reply.matched() != *matched {
                return Err(CliError::ReplayMismatchError(format!(
                    "command #{commands} '{line}': recorded matched={matched}, replayed matched={}",
                    reply.matched()
                )));
            }
            if &reply.output != output {
                return Err(CliError::ReplayMismatchError(format!(
                    "command #{commands} '{line}': recorded output {output:?}, replayed {:?}",
                    reply.output
                )));
            }
            let prompt = dispatcher.current_prompt();
            if &prompt != prompt_after {
                return Err(CliError::ReplayMismatchError(format!(
                    "command #{commands} '{line}': recorded prompt '{prompt_after}', \
                     replayed '{prompt}'"
                )));
            }
        }

        debug!("Replayed {} commands without divergence", commands);
        Ok(ReplayReport {
            commands,
            final_prompt: dispatcher.current_prompt(),
            final_state: dispatcher.state().clone(),
        })
    }
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
