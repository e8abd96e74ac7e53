//! Per-mode command grammars.
//!
//! Every mode owns an ordered list of [`Rule`]s. A rule is a sequence of
//! syntax elements matched token by token against a whitespace-split input
//! line: keywords accept any abbreviation down to a minimum prefix length,
//! arguments accept tokens of a fixed character class. The first rule of the
//! active mode that consumes the whole line wins.

use std::collections::{HashSet, VecDeque};

use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::device::{DeviceState, Mode};

static NAME_ARG: Lazy<Regex> = Lazy::new(|| match Regex::new(r"^[a-zA-Z0-9]+$") {
    Ok(re) => re,
    Err(err) => panic!("invalid NAME_ARG regex: {err}"),
});

static WORD_ARG: Lazy<Regex> = Lazy::new(|| match Regex::new(r"^[a-z]+$") {
    Ok(re) => re,
    Err(err) => panic!("invalid WORD_ARG regex: {err}"),
});

static IPV4_ARG: Lazy<Regex> = Lazy::new(|| {
    match Regex::new(r"^[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}$") {
        Ok(re) => re,
        Err(err) => panic!("invalid IPV4_ARG regex: {err}"),
    }
});

/// A keyword accepted in full or abbreviated down to `min_len` characters.
///
/// Matching is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keyword {
    word: &'static str,
    min_len: usize,
}

impl Keyword {
    pub const fn abbreviated(word: &'static str, min_len: usize) -> Self {
        Self { word, min_len }
    }

    /// A keyword that must be typed in full.
    pub const fn exact(word: &'static str) -> Self {
        Self {
            word,
            min_len: word.len(),
        }
    }

    pub fn word(&self) -> &'static str {
        self.word
    }

    pub fn accepts(&self, token: &str) -> bool {
        token.len() >= self.min_len && self.word.starts_with(token)
    }

    /// All abbreviations this keyword accepts, shortest first.
    pub fn abbreviations(&self) -> impl Iterator<Item = &'static str> + '_ {
        (self.min_len..=self.word.len()).map(|len| &self.word[..len])
    }

    fn overlaps(&self, other: &Keyword) -> bool {
        let common = self
            .word
            .bytes()
            .zip(other.word.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        common >= self.min_len.max(other.min_len)
    }
}

/// Character class of a captured argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgClass {
    /// ASCII letters and digits (`[a-zA-Z0-9]+`).
    Name,
    /// Lowercase ASCII letters (`[a-z]+`).
    Word,
    /// Dotted quad of one to three digit groups. Range checks happen later.
    Ipv4,
}

impl ArgClass {
    pub fn accepts(self, token: &str) -> bool {
        match self {
            ArgClass::Name => NAME_ARG.is_match(token),
            ArgClass::Word => WORD_ARG.is_match(token),
            ArgClass::Ipv4 => IPV4_ARG.is_match(token),
        }
    }

    fn placeholder(self) -> &'static str {
        match self {
            ArgClass::Name => "<name>",
            ArgClass::Word => "<word>",
            ArgClass::Ipv4 => "<ipv4>",
        }
    }

    fn overlaps(self, other: ArgClass) -> bool {
        match (self, other) {
            (ArgClass::Ipv4, ArgClass::Ipv4) => true,
            (ArgClass::Ipv4, _) | (_, ArgClass::Ipv4) => false,
            _ => true,
        }
    }
}

/// One position in a rule's syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Keyword(Keyword),
    Arg(ArgClass),
    /// Trailing argument that may be omitted.
    OptionalArg(ArgClass),
}

impl Element {
    fn accepts(&self, token: &str) -> bool {
        match self {
            Element::Keyword(keyword) => keyword.accepts(token),
            Element::Arg(class) | Element::OptionalArg(class) => class.accepts(token),
        }
    }

    fn overlaps(&self, other: &Element) -> bool {
        match (self.class(), other.class()) {
            (Some(a), Some(b)) => a.overlaps(b),
            _ => match (self, other) {
                (Element::Keyword(a), Element::Keyword(b)) => a.overlaps(b),
                (Element::Keyword(keyword), arg) | (arg, Element::Keyword(keyword)) => {
                    keyword.abbreviations().any(|abbr| arg.accepts(abbr))
                }
                _ => false,
            },
        }
    }

    fn class(&self) -> Option<ArgClass> {
        match self {
            Element::Keyword(_) => None,
            Element::Arg(class) | Element::OptionalArg(class) => Some(*class),
        }
    }
}

/// Closed set of commands the simulator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Enable,
    Exit,
    End,
    Hostname,
    ConfigureTerminal,
    IpAddress,
    Show,
}

impl CommandKind {
    /// Mode reached by running this command from `from`.
    ///
    /// Commands that do not change mode return `from`.
    pub fn next_mode(self, from: Mode) -> Mode {
        let mut probe = DeviceState::in_mode(from);
        match self {
            CommandKind::Enable => probe.enable(),
            CommandKind::Exit => probe.exit(),
            CommandKind::End => probe.end(),
            CommandKind::ConfigureTerminal => probe.configure_terminal(),
            CommandKind::Hostname | CommandKind::IpAddress | CommandKind::Show => {}
        }
        probe.mode()
    }
}

/// A command recognizer bound to the kind of action it triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub kind: CommandKind,
    syntax: &'static [Element],
}

impl Rule {
    /// Returns true if the rule consumes every token of the line.
    pub fn matches(&self, tokens: &[&str]) -> bool {
        let mut rest = tokens;
        for element in self.syntax {
            match (element, rest.split_first()) {
                (Element::OptionalArg(_), None) => {}
                (Element::OptionalArg(class), Some((token, tail))) => {
                    if class.accepts(token) {
                        rest = tail;
                    }
                }
                (_, Some((token, tail))) if element.accepts(token) => rest = tail,
                _ => return false,
            }
        }
        rest.is_empty()
    }

    /// Minimum and maximum number of tokens the rule accepts.
    pub fn arity(&self) -> (usize, usize) {
        let optional = self
            .syntax
            .iter()
            .filter(|element| matches!(element, Element::OptionalArg(_)))
            .count();
        (self.syntax.len() - optional, self.syntax.len())
    }

    /// Human-readable syntax, e.g. `ip address <ipv4> [<ipv4>]`.
    pub fn usage(&self) -> String {
        self.syntax
            .iter()
            .map(|element| match element {
                Element::Keyword(keyword) => keyword.word().to_string(),
                Element::Arg(class) => class.placeholder().to_string(),
                Element::OptionalArg(class) => format!("[{}]", class.placeholder()),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Returns true if some input line satisfies both rules.
    fn overlaps(&self, other: &Rule) -> bool {
        let (min_a, max_a) = self.arity();
        let (min_b, max_b) = other.arity();
        (min_a.max(min_b)..=max_a.min(max_b)).any(|len| {
            (0..len).all(|i| self.syntax[i].overlaps(&other.syntax[i]))
        })
    }
}

const ENABLE: Rule = Rule {
    kind: CommandKind::Enable,
    syntax: &[Element::Keyword(Keyword::abbreviated("enable", 2))],
};

const EXIT: Rule = Rule {
    kind: CommandKind::Exit,
    syntax: &[Element::Keyword(Keyword::abbreviated("exit", 2))],
};

const END: Rule = Rule {
    kind: CommandKind::End,
    syntax: &[Element::Keyword(Keyword::exact("end"))],
};

const HOSTNAME: Rule = Rule {
    kind: CommandKind::Hostname,
    syntax: &[
        Element::Keyword(Keyword::abbreviated("hostname", 4)),
        Element::Arg(ArgClass::Name),
    ],
};

const CONFIGURE_TERMINAL: Rule = Rule {
    kind: CommandKind::ConfigureTerminal,
    syntax: &[
        Element::Keyword(Keyword::abbreviated("configure", 4)),
        Element::Keyword(Keyword::abbreviated("terminal", 1)),
    ],
};

const IP_ADDRESS: Rule = Rule {
    kind: CommandKind::IpAddress,
    syntax: &[
        Element::Keyword(Keyword::exact("ip")),
        Element::Keyword(Keyword::exact("address")),
        Element::Arg(ArgClass::Ipv4),
        Element::OptionalArg(ArgClass::Ipv4),
    ],
};

const SHOW: Rule = Rule {
    kind: CommandKind::Show,
    syntax: &[
        Element::Keyword(Keyword::abbreviated("show", 2)),
        Element::Arg(ArgClass::Word),
    ],
};

static USER_RULES: [Rule; 3] = [ENABLE, SHOW, END];
static ENABLE_RULES: [Rule; 5] = [EXIT, HOSTNAME, CONFIGURE_TERMINAL, SHOW, END];
static CONFIG_RULES: [Rule; 3] = [EXIT, IP_ADDRESS, END];

/// Ordered rule list active in `mode`.
pub fn rules_for(mode: Mode) -> &'static [Rule] {
    match mode {
        Mode::User => &USER_RULES,
        Mode::Enable => &ENABLE_RULES,
        Mode::Config => &CONFIG_RULES,
    }
}

/// Finds the first rule of `mode` that matches the whole token list.
pub fn match_line(mode: Mode, tokens: &[&str]) -> Option<&'static Rule> {
    rules_for(mode).iter().find(|rule| {
        let matched = rule.matches(tokens);
        trace!("Rule {:?} in {} mode matched={}", rule.kind, mode, matched);
        matched
    })
}

/// Consistency report for a set of per-mode grammars.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct GrammarDiagnostics {
    /// Rule pairs within one mode that can match the same line, as
    /// `mode: usage | usage`.
    pub ambiguous_rules: Vec<String>,
    /// Modes that no sequence of commands reaches from user mode.
    pub unreachable_modes: Vec<Mode>,
    /// Modes with no command leading to a different mode.
    pub dead_end_modes: Vec<Mode>,
}

impl GrammarDiagnostics {
    pub fn has_issues(&self) -> bool {
        !self.ambiguous_rules.is_empty()
            || !self.unreachable_modes.is_empty()
            || !self.dead_end_modes.is_empty()
    }
}

/// Checks the built-in grammar.
pub fn diagnose() -> GrammarDiagnostics {
    let tables = Mode::ALL.map(|mode| (mode, rules_for(mode)));
    diagnose_tables(&tables)
}

fn diagnose_tables(tables: &[(Mode, &[Rule])]) -> GrammarDiagnostics {
    let mut ambiguous_rules = Vec::new();
    for (mode, rules) in tables {
        for (i, a) in rules.iter().enumerate() {
            for b in &rules[i + 1..] {
                if a.overlaps(b) {
                    ambiguous_rules.push(format!("{mode}: {} | {}", a.usage(), b.usage()));
                }
            }
        }
    }

    let successors = |mode: Mode| -> Vec<Mode> {
        tables
            .iter()
            .filter(|(m, _)| *m == mode)
            .flat_map(|(_, rules)| rules.iter())
            .map(|rule| rule.kind.next_mode(mode))
            .filter(|next| *next != mode)
            .collect()
    };

    let mut reachable = HashSet::new();
    let mut queue = VecDeque::new();
    reachable.insert(Mode::User);
    queue.push_back(Mode::User);
    while let Some(mode) = queue.pop_front() {
        for next in successors(mode) {
            if reachable.insert(next) {
                queue.push_back(next);
            }
        }
    }

    let declared = tables.iter().map(|(mode, _)| *mode).collect::<Vec<_>>();
    let unreachable_modes = declared
        .iter()
        .copied()
        .filter(|mode| !reachable.contains(mode))
        .collect();
    let dead_end_modes = declared
        .iter()
        .copied()
        .filter(|mode| successors(*mode).is_empty())
        .collect();

    GrammarDiagnostics {
        ambiguous_rules,
        unreachable_modes,
        dead_end_modes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(mode: Mode, line: &str) -> Option<CommandKind> {
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        match_line(mode, &tokens).map(|rule| rule.kind)
    }

    #[test]
    fn keyword_accepts_every_abbreviation_down_to_minimum() {
        let keyword = Keyword::abbreviated("configure", 4);
        for abbr in ["conf", "confi", "config", "configu", "configur", "configure"] {
            assert!(keyword.accepts(abbr), "{abbr} should be accepted");
        }
        assert!(!keyword.accepts("con"));
        assert!(!keyword.accepts("configures"));
        assert!(!keyword.accepts("CONF"));
        assert_eq!(keyword.abbreviations().count(), 6);
    }

    #[test]
    fn user_mode_recognizes_enable_show_and_end() {
        assert_eq!(kind_of(Mode::User, "en"), Some(CommandKind::Enable));
        assert_eq!(kind_of(Mode::User, "enable"), Some(CommandKind::Enable));
        assert_eq!(kind_of(Mode::User, "sh ip"), Some(CommandKind::Show));
        assert_eq!(kind_of(Mode::User, "end"), Some(CommandKind::End));
        assert_eq!(kind_of(Mode::User, "e"), None);
        assert_eq!(kind_of(Mode::User, "exit"), None);
    }

    #[test]
    fn enable_mode_recognizes_its_command_set() {
        assert_eq!(kind_of(Mode::Enable, "ex"), Some(CommandKind::Exit));
        assert_eq!(kind_of(Mode::Enable, "host R1"), Some(CommandKind::Hostname));
        assert_eq!(
            kind_of(Mode::Enable, "conf t"),
            Some(CommandKind::ConfigureTerminal)
        );
        assert_eq!(
            kind_of(Mode::Enable, "configure terminal"),
            Some(CommandKind::ConfigureTerminal)
        );
        assert_eq!(kind_of(Mode::Enable, "show version"), Some(CommandKind::Show));
        assert_eq!(kind_of(Mode::Enable, "enable"), None);
        assert_eq!(kind_of(Mode::Enable, "ip address 10.0.0.1"), None);
    }

    #[test]
    fn config_mode_recognizes_ip_address_with_optional_mask() {
        assert_eq!(
            kind_of(Mode::Config, "ip address 10.0.0.1"),
            Some(CommandKind::IpAddress)
        );
        assert_eq!(
            kind_of(Mode::Config, "ip address 10.0.0.1 255.0.0.0"),
            Some(CommandKind::IpAddress)
        );
        assert_eq!(kind_of(Mode::Config, "ip address"), None);
        assert_eq!(kind_of(Mode::Config, "ip addr 10.0.0.1"), None);
        assert_eq!(kind_of(Mode::Config, "ip address 10.0.0.1 mask"), None);
        assert_eq!(
            kind_of(Mode::Config, "ip address 10.0.0.1 255.0.0.0 extra"),
            None
        );
        assert_eq!(kind_of(Mode::Config, "show ip"), None);
    }

    #[test]
    fn hostname_argument_is_alphanumeric_only() {
        assert_eq!(kind_of(Mode::Enable, "hostname R2D2"), Some(CommandKind::Hostname));
        assert_eq!(kind_of(Mode::Enable, "hostname R2-D2"), None);
        assert_eq!(kind_of(Mode::Enable, "hostname"), None);
        assert_eq!(kind_of(Mode::Enable, "hos R1"), None);
    }

    #[test]
    fn show_argument_is_a_single_lowercase_word() {
        assert_eq!(kind_of(Mode::User, "show weather"), Some(CommandKind::Show));
        assert_eq!(kind_of(Mode::User, "show IP"), None);
        assert_eq!(kind_of(Mode::User, "show ip route"), None);
        assert_eq!(kind_of(Mode::User, "show"), None);
    }

    #[test]
    fn empty_line_matches_nothing() {
        for mode in Mode::ALL {
            assert_eq!(kind_of(mode, ""), None);
        }
    }

    #[test]
    fn rule_usage_and_arity_describe_syntax() {
        assert_eq!(IP_ADDRESS.usage(), "ip address <ipv4> [<ipv4>]");
        assert_eq!(IP_ADDRESS.arity(), (3, 4));
        assert_eq!(HOSTNAME.usage(), "hostname <name>");
        assert_eq!(END.arity(), (1, 1));
    }

    #[test]
    fn next_mode_follows_transition_table() {
        assert_eq!(CommandKind::Enable.next_mode(Mode::User), Mode::Enable);
        assert_eq!(
            CommandKind::ConfigureTerminal.next_mode(Mode::Enable),
            Mode::Config
        );
        assert_eq!(CommandKind::Exit.next_mode(Mode::Config), Mode::Enable);
        assert_eq!(CommandKind::Exit.next_mode(Mode::Enable), Mode::User);
        assert_eq!(CommandKind::End.next_mode(Mode::Config), Mode::User);
        assert_eq!(CommandKind::Show.next_mode(Mode::Enable), Mode::Enable);
    }

    #[test]
    fn builtin_grammar_diagnostics_are_clean() {
        let report = diagnose();
        assert!(!report.has_issues(), "{report:?}");
    }

    #[test]
    fn diagnostics_detect_overlapping_rules() {
        const SHUTDOWN: Rule = Rule {
            kind: CommandKind::Show,
            syntax: &[Element::Keyword(Keyword::abbreviated("shutdown", 2))],
        };
        const SHELL: Rule = Rule {
            kind: CommandKind::End,
            syntax: &[Element::Keyword(Keyword::abbreviated("shell", 2))],
        };
        const ANY_WORD: Rule = Rule {
            kind: CommandKind::Exit,
            syntax: &[Element::Arg(ArgClass::Word)],
        };
        let user: &[Rule] = &[SHUTDOWN, SHELL, ENABLE];
        let enable: &[Rule] = &[ANY_WORD, EXIT];
        let config: &[Rule] = &[END];

        let report = diagnose_tables(&[
            (Mode::User, user),
            (Mode::Enable, enable),
            (Mode::Config, config),
        ]);

        assert_eq!(
            report.ambiguous_rules,
            vec![
                "user: shutdown | shell".to_string(),
                "enable: <word> | exit".to_string(),
            ]
        );
    }

    #[test]
    fn diagnostics_detect_unreachable_and_dead_end_modes() {
        let user: &[Rule] = &[ENABLE];
        let enable: &[Rule] = &[SHOW];
        let config: &[Rule] = &[EXIT];

        let report = diagnose_tables(&[
            (Mode::User, user),
            (Mode::Enable, enable),
            (Mode::Config, config),
        ]);

        assert_eq!(report.unreachable_modes, vec![Mode::Config]);
        assert_eq!(report.dead_end_modes, vec![Mode::Enable]);
        assert!(report.has_issues());
    }
}
