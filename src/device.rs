//! Simulated device state and its mode state machine.
//!
//! The device is always in exactly one [`Mode`]. Transitions are driven by the
//! actions the dispatcher runs; this module only knows how each action mutates
//! the state, not which input lines trigger it.

use std::fmt;

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{
    CONFIG_PROMPT_SUFFIX, DEFAULT_HOSTNAME, ENABLE_PROMPT_SUFFIX, UNSET_PLACEHOLDER,
    USER_PROMPT_SUFFIX,
};
use crate::error::CliError;
use crate::grammar::ArgClass;

/// Privilege level of the simulated shell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// User EXEC mode (`Router> `).
    #[default]
    User,
    /// Privileged EXEC mode (`Router# `).
    Enable,
    /// Global configuration mode (`Router(config)# `).
    Config,
}

impl Mode {
    /// All modes, in privilege order.
    pub const ALL: [Mode; 3] = [Mode::User, Mode::Enable, Mode::Config];

    /// Prompt suffix printed after the hostname.
    pub fn prompt_suffix(self) -> &'static str {
        match self {
            Mode::User => USER_PROMPT_SUFFIX,
            Mode::Enable => ENABLE_PROMPT_SUFFIX,
            Mode::Config => CONFIG_PROMPT_SUFFIX,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::User => "user",
            Mode::Enable => "enable",
            Mode::Config => "config",
        };
        f.write_str(name)
    }
}

/// In-memory configuration of the simulated device.
///
/// A netmask is only ever stored together with an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceState {
    hostname: String,
    mode: Mode,
    ip_address: Option<String>,
    netmask: Option<String>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            mode: Mode::User,
            ip_address: None,
            netmask: None,
        }
    }
}

impl DeviceState {
    /// Creates a factory-default device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a device booted with the given hostname.
    ///
    /// # Errors
    ///
    /// Returns `CliError::InvalidHostname` unless the name is non-empty ASCII
    /// alphanumeric, the same rule the `hostname` command enforces.
    pub fn with_hostname(hostname: &str) -> Result<Self, CliError> {
        if !ArgClass::Name.accepts(hostname) {
            return Err(CliError::InvalidHostname(hostname.to_string()));
        }
        Ok(Self {
            hostname: hostname.to_string(),
            ..Self::default()
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn netmask(&self) -> Option<&str> {
        self.netmask.as_deref()
    }

    /// Scratch state parked in `mode`, used to probe transitions.
    pub(crate) fn in_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Renders the prompt for the current hostname and mode.
    pub fn prompt(&self) -> String {
        format!("{}{}", self.hostname, self.mode.prompt_suffix())
    }

    /// Enters privileged mode. Has no guard on the current mode.
    pub fn enable(&mut self) {
        self.switch_mode(Mode::Enable);
    }

    /// Leaves the current mode by one level. User mode has no parent.
    pub fn exit(&mut self) {
        match self.mode {
            Mode::Config => self.switch_mode(Mode::Enable),
            Mode::Enable => self.switch_mode(Mode::User),
            Mode::User => {}
        }
    }

    /// Returns to user mode from anywhere.
    pub fn end(&mut self) {
        self.switch_mode(Mode::User);
    }

    pub fn configure_terminal(&mut self) {
        self.switch_mode(Mode::Config);
    }

    /// Overwrites the hostname. The caller has already checked the name.
    pub fn set_hostname(&mut self, hostname: &str) {
        debug!("Hostname changed: '{}' -> '{}'", self.hostname, hostname);
        self.hostname = hostname.to_string();
    }

    /// Sets the interface address, replacing any previous mask.
    pub fn set_ip_address(&mut self, address: &str, netmask: Option<&str>) {
        debug!("IP address set: {} mask {:?}", address, netmask);
        self.ip_address = Some(address.to_string());
        self.netmask = netmask.map(str::to_string);
    }

    /// Text printed by `show ip`.
    pub fn show_ip(&self) -> String {
        format!(
            "IP Address: {}\nSubnet: {}",
            self.ip_address().unwrap_or(UNSET_PLACEHOLDER),
            self.netmask().unwrap_or(UNSET_PLACEHOLDER)
        )
    }

    fn switch_mode(&mut self, to: Mode) {
        if self.mode != to {
            debug!("Mode transition: {} -> {}", self.mode, to);
        }
        self.mode = to;
    }
}
