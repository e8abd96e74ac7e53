//! Line-oriented command dispatch.
//!
//! [`CommandDispatcher`] owns the device state and an output sink. Each input
//! line is tokenized, matched against the active mode's grammar and, on a
//! match, handed to the action for the matched [`CommandKind`]. Neither
//! unmatched lines nor failed validation ever surface as errors to the caller;
//! they are printed to the sink and the session carries on.

use std::io::{self, Write};
use std::net::IpAddr;

use log::{debug, trace, warn};

use crate::config::IP_ADDRESS_USAGE;
use crate::device::DeviceState;
use crate::error::CliError;
use crate::grammar::{self, CommandKind};
use crate::session::{SessionEvent, TranscriptRecorder};

/// Result of dispatching a single line, before anything is printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Kind of the matched rule, `None` if no rule matched.
    pub command: Option<CommandKind>,
    /// Text to print, without a trailing line terminator.
    pub output: Option<String>,
}

impl Reply {
    pub fn matched(&self) -> bool {
        self.command.is_some()
    }
}

/// Simulated device shell: device state plus the sink it prints to.
pub struct CommandDispatcher<W: Write = io::Stdout> {
    state: DeviceState,
    sink: W,
    recorder: Option<TranscriptRecorder>,
}

impl<W: Write> CommandDispatcher<W> {
    /// Creates a dispatcher for a factory-default device.
    pub fn new(sink: W) -> Self {
        Self::with_state(DeviceState::new(), sink)
    }

    pub fn with_state(state: DeviceState, sink: W) -> Self {
        Self {
            state,
            sink,
            recorder: None,
        }
    }

    /// Attaches a transcript recorder and records the session start.
    pub fn with_recorder(mut self, recorder: TranscriptRecorder) -> Self {
        recorder.record_event(SessionEvent::SessionStarted {
            hostname: self.state.hostname().to_string(),
            mode: self.state.mode(),
            prompt: self.state.prompt(),
        });
        self.recorder = Some(recorder);
        self
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn recorder(&self) -> Option<&TranscriptRecorder> {
        self.recorder.as_ref()
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Prompt for the current hostname and mode.
    pub fn current_prompt(&self) -> String {
        self.state.prompt()
    }

    /// Dispatches one line and prints any resulting message.
    ///
    /// Returns true if a rule matched, even when the matched command then
    /// rejected its arguments. Returns false and prints `Invalid command`
    /// otherwise.
    pub fn process_line(&mut self, raw_line: &str) -> bool {
        let reply = self.execute(raw_line);
        if let Some(output) = &reply.output
            && let Err(err) = writeln!(self.sink, "{output}")
        {
            warn!("Failed to write command output: {}", err);
        }
        reply.matched()
    }

    /// Dispatches one line without printing.
    pub fn execute(&mut self, raw_line: &str) -> Reply {
        let tokens = raw_line.split_whitespace().collect::<Vec<_>>();
        trace!("Tokenized line: {:?}", tokens);

        let mode_before = self.state.mode();
        let prompt_before = self.state.prompt();

        let reply = match grammar::match_line(mode_before, &tokens) {
            Some(rule) => {
                debug!("Matched {:?} in {} mode", rule.kind, mode_before);
                let output = match self.apply(rule.kind, &tokens) {
                    Ok(output) => output,
                    Err(err) => {
                        debug!("{:?} rejected its arguments: {}", rule.kind, err);
                        Some(err.to_string())
                    }
                };
                Reply {
                    command: Some(rule.kind),
                    output,
                }
            }
            None => {
                debug!("No rule in {} mode matches '{}'", mode_before, tokens.join(" "));
                Reply {
                    command: None,
                    output: Some(CliError::InvalidCommand.to_string()),
                }
            }
        };

        if let Some(recorder) = &self.recorder {
            let mode_after = self.state.mode();
            if mode_after != mode_before {
                recorder.record_mode_change(mode_before, mode_after);
            }
            recorder.record_event(SessionEvent::CommandProcessed {
                line: raw_line.to_string(),
                mode_before,
                mode_after,
                prompt_before,
                prompt_after: self.state.prompt(),
                matched: reply.matched(),
                command: reply.command,
                output: reply.output.clone(),
            });
        }

        reply
    }

    fn apply(&mut self, kind: CommandKind, tokens: &[&str]) -> Result<Option<String>, CliError> {
        match kind {
            CommandKind::Enable => self.state.enable(),
            CommandKind::Exit => self.state.exit(),
            CommandKind::End => self.state.end(),
            CommandKind::ConfigureTerminal => self.state.configure_terminal(),
            CommandKind::Hostname => {
                let name = tokens
                    .get(1)
                    .ok_or_else(|| CliError::MissingArgument("hostname <name>".to_string()))?;
                self.state.set_hostname(name);
            }
            CommandKind::IpAddress => {
                let (address, netmask) = parse_ip_address_args(tokens)?;
                self.state.set_ip_address(address, netmask);
            }
            CommandKind::Show => {
                if tokens.get(1) == Some(&"ip") {
                    return Ok(Some(self.state.show_ip()));
                }
            }
        }
        Ok(None)
    }
}

impl Default for CommandDispatcher<io::Stdout> {
    fn default() -> Self {
        Self::new(io::stdout())
    }
}

/// Validates the tokens of `ip address <addr> [<mask>]`.
///
/// Both fields must parse as IP address literals. Returns the address and the
/// optional mask exactly as typed.
pub fn parse_ip_address_args<'a>(
    tokens: &[&'a str],
) -> Result<(&'a str, Option<&'a str>), CliError> {
    let address = *tokens
        .get(2)
        .ok_or_else(|| CliError::MissingArgument(IP_ADDRESS_USAGE.to_string()))?;
    let netmask = tokens.get(3).copied();

    for field in std::iter::once(address).chain(netmask) {
        if field.parse::<IpAddr>().is_err() {
            return Err(CliError::InvalidFormat(IP_ADDRESS_USAGE.to_string()));
        }
    }
    Ok((address, netmask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Mode;

    fn dispatcher() -> CommandDispatcher<Vec<u8>> {
        CommandDispatcher::new(Vec::new())
    }

    fn printed(dispatcher: &CommandDispatcher<Vec<u8>>) -> String {
        String::from_utf8_lossy(dispatcher.sink()).into_owned()
    }

    fn run_all(dispatcher: &mut CommandDispatcher<Vec<u8>>, lines: &[&str]) {
        for line in lines {
            assert!(dispatcher.process_line(line), "'{line}' should match");
        }
    }

    #[test]
    fn unmatched_line_prints_invalid_command() {
        let mut d = dispatcher();
        assert!(!d.process_line("configure terminal"));
        assert_eq!(printed(&d), "Invalid command\n");
        assert_eq!(d.state().mode(), Mode::User);
    }

    #[test]
    fn commands_outside_their_mode_are_rejected() {
        let cases: [(&[&str], &str); 6] = [
            (&[], "exit"),
            (&[], "hostname R1"),
            (&[], "ip address 10.0.0.1"),
            (&["enable"], "enable"),
            (&["enable"], "ip address 10.0.0.1"),
            (&["enable", "conf t"], "show ip"),
        ];
        for (setup, line) in cases {
            let mut d = dispatcher();
            run_all(&mut d, setup);
            let mode = d.state().mode();
            let reply = d.execute(line);
            assert!(!reply.matched(), "'{line}' should not match in {mode} mode");
            assert_eq!(reply.output.as_deref(), Some("Invalid command"));
            assert_eq!(d.state().mode(), mode);
        }
    }

    #[test]
    fn whitespace_is_squeezed_before_matching() {
        let mut d = dispatcher();
        assert!(d.process_line("   enable   "));
        assert!(d.process_line("conf \t  t"));
        assert_eq!(d.state().mode(), Mode::Config);
        assert_eq!(printed(&d), "");
    }

    #[test]
    fn ip_address_round_trips_through_show_ip() {
        let mut d = dispatcher();
        run_all(
            &mut d,
            &[
                "enable",
                "configure terminal",
                "ip address 10.0.0.1 255.255.255.0",
                "exit",
                "show ip",
            ],
        );
        assert_eq!(printed(&d), "IP Address: 10.0.0.1\nSubnet: 255.255.255.0\n");
    }

    #[test]
    fn address_without_mask_clears_mask() {
        let mut d = dispatcher();
        run_all(
            &mut d,
            &[
                "enable",
                "configure terminal",
                "ip address 192.168.1.1",
                "exit",
                "exit",
            ],
        );
        assert_eq!(d.state().mode(), Mode::User);
        assert_eq!(d.state().ip_address(), Some("192.168.1.1"));
        assert_eq!(d.state().netmask(), None);
    }

    #[test]
    fn out_of_range_address_keeps_previous_state() {
        let mut d = dispatcher();
        run_all(&mut d, &["en", "conf t", "ip address 10.0.0.1 255.0.0.0"]);

        assert!(d.process_line("ip address 999.999.999.999"));
        assert!(d.process_line("ip address 10.0.0.2 255.255.255.256"));
        assert_eq!(
            printed(&d),
            "Invalid format. Use: ip address <ip address> [<subnet mask>]\n\
             Invalid format. Use: ip address <ip address> [<subnet mask>]\n"
        );
        assert_eq!(d.state().ip_address(), Some("10.0.0.1"));
        assert_eq!(d.state().netmask(), Some("255.0.0.0"));
    }

    #[test]
    fn hostname_updates_prompt() {
        let mut d = dispatcher();
        run_all(&mut d, &["enable", "hostname R2D2"]);
        assert_eq!(d.current_prompt(), "R2D2# ");

        assert!(!d.process_line("hostname R2-D2"));
        assert_eq!(d.state().hostname(), "R2D2");
        assert_eq!(printed(&d), "Invalid command\n");
    }

    #[test]
    fn show_other_word_matches_silently() {
        let mut d = dispatcher();
        let reply = d.execute("show weather");
        assert!(reply.matched());
        assert_eq!(reply.command, Some(CommandKind::Show));
        assert_eq!(reply.output, None);
    }

    #[test]
    fn show_ip_before_configuration_prints_placeholders() {
        let mut d = dispatcher();
        assert!(d.process_line("sh ip"));
        assert_eq!(printed(&d), "IP Address: none\nSubnet: none\n");
    }

    #[test]
    fn end_is_idempotent_from_every_mode() {
        let setups: [&[&str]; 3] = [&[], &["en"], &["en", "conf t"]];
        for setup in setups {
            let mut d = dispatcher();
            run_all(&mut d, setup);
            for _ in 0..3 {
                assert!(d.process_line("end"));
                assert_eq!(d.state().mode(), Mode::User);
            }
        }
    }

    #[test]
    fn prompts_track_mode() {
        let mut d = dispatcher();
        assert_eq!(d.current_prompt(), "Router> ");
        d.process_line("en");
        assert_eq!(d.current_prompt(), "Router# ");
        d.process_line("conf t");
        assert_eq!(d.current_prompt(), "Router(config)# ");
    }

    #[test]
    fn ip_address_args_report_missing_and_malformed_fields() {
        assert!(matches!(
            parse_ip_address_args(&["ip", "address"]),
            Err(CliError::MissingArgument(_))
        ));
        assert!(matches!(
            parse_ip_address_args(&["ip", "address", "1.2.3"]),
            Err(CliError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_ip_address_args(&["ip", "address", "10.0.0.1", "01.0.0.0"]),
            Err(CliError::InvalidFormat(_))
        ));
        assert_eq!(
            parse_ip_address_args(&["ip", "address", "10.0.0.1"]).expect("valid"),
            ("10.0.0.1", None)
        );
    }

    #[test]
    fn hostname_action_reports_missing_name() {
        let mut d = dispatcher();
        d.process_line("en");
        let err = d
            .apply(CommandKind::Hostname, &["hostname"])
            .expect_err("missing name");
        assert!(matches!(err, CliError::MissingArgument(_)));
        assert_eq!(d.state().hostname(), "Router");
    }
}
