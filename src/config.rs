//! Crate-wide constants for the simulated device.
//!
//! These mirror the factory defaults of a freshly booted router and the
//! fixed strings the shell prints.

/// Hostname of a device that has not been configured yet.
pub const DEFAULT_HOSTNAME: &str = "Router";

/// Text printed by `show ip` for an address or mask that has not been set.
pub const UNSET_PLACEHOLDER: &str = "none";

/// Usage line appended to `ip address` validation errors.
pub const IP_ADDRESS_USAGE: &str = "ip address <ip address> [<subnet mask>]";

/// Prompt suffix for user EXEC mode.
pub const USER_PROMPT_SUFFIX: &str = "> ";

/// Prompt suffix for privileged EXEC mode.
pub const ENABLE_PROMPT_SUFFIX: &str = "# ";

/// Prompt suffix for global configuration mode.
pub const CONFIG_PROMPT_SUFFIX: &str = "(config)# ";
