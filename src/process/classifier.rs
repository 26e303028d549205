//! Process classification into named groups.
//!
//! A [`Rule`] pairs a conjunction of matchers with a name template. A
//! [`RuleSet`] evaluates its rules in configuration order and the first rule
//! that matches names the group. Processes matched by no rule are not
//! reported at all.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::process::matcher::{
    AllMatcher, CmdlineMatcher, CommMatcher, ExeMatcher, Matcher, MatcherKind, ProcessIdentity,
};
use crate::process::template::{NameTemplate, TemplateError, TemplateParams};

/// Errors raised while turning a rule list into a [`RuleSet`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no process_names rules configured")]
    NoRules,

    #[error("no top-level 'process_names' key")]
    MissingProcessNames,

    #[error("'process_names' is not a list")]
    NotAList,

    #[error("unable to parse process_names entry {index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: RuleError,
    },

    #[error("error parsing rules document: {0}")]
    Parse(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors for a single rule entry.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("no matchers provided, expected at least one of comm, exe, cmdline")]
    NoMatchers,

    #[error("bad cmdline regex {pattern:?}: {source}")]
    BadRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("bad name template {template:?}: {source}")]
    BadTemplate {
        template: String,
        #[source]
        source: TemplateError,
    },

    #[error("invalid entry: {0}")]
    Invalid(String),
}

/// Declarative form of one rule, as found under `process_names`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    /// Group name template; `{{.ExeBase}}` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Exact command names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comm: Option<Vec<String>>,
    /// Executable basenames or full paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exe: Option<Vec<String>>,
    /// Regular expressions over the space-joined command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmdline: Option<Vec<String>>,
}

/// Anything that can decide whether a process is wanted and what it is called.
pub trait MatchNamer {
    /// Returns the group name, or `None` when the process is not wanted.
    fn match_and_name(&self, identity: &ProcessIdentity) -> Option<String>;
}

/// One compiled classification rule.
#[derive(Debug, Clone)]
pub struct Rule {
    matcher: AllMatcher,
    template: NameTemplate,
    entry: RuleEntry,
}

impl Rule {
    pub fn new(matcher: AllMatcher, template: NameTemplate) -> Self {
        Self {
            matcher,
            template,
            entry: RuleEntry::default(),
        }
    }

    /// Compiles a declarative entry.
    pub fn from_entry(entry: &RuleEntry) -> Result<Self, RuleError> {
        let mut matchers = Vec::new();

        if let Some(comm) = &entry.comm {
            matchers.push(MatcherKind::Comm(CommMatcher::new(comm.iter().cloned())));
        }
        if let Some(exe) = &entry.exe {
            matchers.push(MatcherKind::Exe(ExeMatcher::new(exe)));
        }
        if let Some(cmdline) = &entry.cmdline {
            let regexes = cmdline
                .iter()
                .map(|pattern| {
                    regex::Regex::new(pattern).map_err(|source| RuleError::BadRegex {
                        pattern: pattern.clone(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let m = CmdlineMatcher::from_regexes(regexes);
            matchers.push(MatcherKind::Cmdline(m));
        }

        let matcher = AllMatcher::new(matchers).ok_or(RuleError::NoMatchers)?;

        let template = match entry.name.as_deref() {
            None | Some("") => NameTemplate::default(),
            Some(t) => NameTemplate::parse(t).map_err(|source| RuleError::BadTemplate {
                template: t.to_string(),
                source,
            })?,
        };

        Ok(Self {
            matcher,
            template,
            entry: entry.clone(),
        })
    }

    pub fn template(&self) -> &NameTemplate {
        &self.template
    }

    /// The entry this rule was compiled from (empty for hand-built rules).
    pub fn entry(&self) -> &RuleEntry {
        &self.entry
    }
}

impl MatchNamer for Rule {
    fn match_and_name(&self, identity: &ProcessIdentity) -> Option<String> {
        let captures = self.matcher.matches(identity)?;
        Some(self.template.render(&TemplateParams::new(identity, captures)))
    }
}

/// Ordered, first-match-wins rule list.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

/// Top-level shape of a standalone rules document.
#[derive(Deserialize)]
struct RulesDocument {
    process_names: Option<serde_yaml::Value>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Compiles entries in order, failing on the first invalid one.
    pub fn from_entries(entries: &[RuleEntry]) -> Result<Self, ConfigError> {
        let rules = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                Rule::from_entry(entry).map_err(|source| ConfigError::Entry { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Parses a standalone YAML document with a top-level `process_names` list.
    pub fn parse_document(content: &str) -> Result<Self, ConfigError> {
        let entries = parse_rule_entries(content)?;
        Self::from_entries(&entries)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl MatchNamer for RuleSet {
    fn match_and_name(&self, identity: &ProcessIdentity) -> Option<String> {
        self.rules.iter().find_map(|r| r.match_and_name(identity))
    }
}

/// Extracts the `process_names` entries of a YAML rules document, reporting
/// shape errors with the index of the offending entry.
pub fn parse_rule_entries(content: &str) -> Result<Vec<RuleEntry>, ConfigError> {
    let doc: RulesDocument =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let list = match doc.process_names.ok_or(ConfigError::MissingProcessNames)? {
        serde_yaml::Value::Sequence(items) => items,
        _ => return Err(ConfigError::NotAList),
    };

    list.into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_yaml::from_value::<RuleEntry>(item).map_err(|e| ConfigError::Entry {
                index,
                source: RuleError::Invalid(e.to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, cmdline: &[&str]) -> ProcessIdentity {
        ProcessIdentity::new(name, cmdline.iter().map(|s| s.to_string()).collect())
    }

    fn entry(name: Option<&str>, comm: &[&str], exe: &[&str], cmdline: &[&str]) -> RuleEntry {
        let list = |v: &[&str]| -> Option<Vec<String>> {
            (!v.is_empty()).then(|| v.iter().map(|s| s.to_string()).collect())
        };
        RuleEntry {
            name: name.map(str::to_string),
            comm: list(comm),
            exe: list(exe),
            cmdline: list(cmdline),
        }
    }

    // -------------------------------------------------------------------------
    // Rule
    // -------------------------------------------------------------------------

    #[test]
    fn test_rule_without_matchers_is_rejected() {
        let err = Rule::from_entry(&entry(Some("x"), &[], &[], &[])).unwrap_err();
        assert!(matches!(err, RuleError::NoMatchers));
    }

    #[test]
    fn test_rule_bad_regex_names_pattern() {
        let err = Rule::from_entry(&entry(None, &[], &[], &["ok", "(bad"])).unwrap_err();
        match err {
            RuleError::BadRegex { pattern, .. } => assert_eq!(pattern, "(bad"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rule_bad_template() {
        let err = Rule::from_entry(&entry(Some("{{.Nope}}"), &["a"], &[], &[])).unwrap_err();
        assert!(matches!(err, RuleError::BadTemplate { .. }));
    }

    #[test]
    fn test_rule_comm_and_cmdline_is_a_conjunction() {
        let rule = Rule::from_entry(&entry(None, &["java"], &[], &["kafka"])).unwrap();
        assert!(rule.match_and_name(&ident("java", &["/usr/bin/java", "kafka"])).is_some());
        assert!(rule.match_and_name(&ident("java", &["/usr/bin/java"])).is_none());
        assert!(rule.match_and_name(&ident("python", &["kafka"])).is_none());
    }

    #[test]
    fn test_rule_default_name_is_exe_base() {
        let rule = Rule::from_entry(&entry(None, &[], &["server"], &[])).unwrap();
        assert_eq!(
            rule.match_and_name(&ident("srv", &["/opt/app/bin/server", "-x"])),
            Some("server".to_string())
        );
    }

    #[test]
    fn test_rule_empty_name_uses_default_template() {
        let rule = Rule::from_entry(&entry(Some(""), &["bash"], &[], &[])).unwrap();
        assert_eq!(rule.template().as_str(), "{{.ExeBase}}");
    }

    #[test]
    fn test_rule_renders_captures() {
        let rule = Rule::from_entry(&entry(
            Some("{{.Comm}}-{{.Matches.role}}"),
            &[],
            &[],
            &["^worker", r"--role=(?P<role>\w+)"],
        ))
        .unwrap();
        assert_eq!(
            rule.match_and_name(&ident("proc", &["worker", "--role=ingest"])),
            Some("proc-ingest".to_string())
        );
        assert_eq!(rule.match_and_name(&ident("proc", &["worker"])), None);
    }

    // -------------------------------------------------------------------------
    // RuleSet
    // -------------------------------------------------------------------------

    #[test]
    fn test_rule_set_first_match_wins() {
        let rules = RuleSet::from_entries(&[
            entry(Some("first"), &["foo"], &[], &[]),
            entry(Some("second"), &[], &["foo"], &[]),
        ])
        .unwrap();

        assert_eq!(
            rules.match_and_name(&ident("foo", &["/usr/bin/foo"])),
            Some("first".to_string())
        );
        assert_eq!(
            rules.match_and_name(&ident("bar", &["/usr/bin/foo"])),
            Some("second".to_string())
        );
        assert_eq!(rules.match_and_name(&ident("bar", &["/usr/bin/bar"])), None);
    }

    #[test]
    fn test_rule_set_reports_entry_index() {
        let err = RuleSet::from_entries(&[
            entry(None, &["ok"], &[], &[]),
            entry(None, &[], &[], &[]),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Entry { index: 1, .. }));
        assert!(err.to_string().contains("entry 1"));
    }

    // -------------------------------------------------------------------------
    // Rules documents
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_document() {
        let yaml = r#"
process_names:
  - name: "{{.Comm}}"
    comm: [bash, zsh]
  - exe: [/usr/sbin/sshd]
  - name: "worker-{{.Matches.role}}"
    cmdline: ['--role=(?P<role>\w+)']
"#;
        let rules = RuleSet::parse_document(yaml).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.rules()[1].entry().exe.as_deref(), Some(&["/usr/sbin/sshd".to_string()][..]));
        assert_eq!(
            rules.match_and_name(&ident("python", &["python", "--role=etl"])),
            Some("worker-etl".to_string())
        );
    }

    #[test]
    fn test_parse_document_shape_errors() {
        assert!(matches!(
            RuleSet::parse_document("other: []"),
            Err(ConfigError::MissingProcessNames)
        ));
        assert!(matches!(
            RuleSet::parse_document("process_names: {comm: [a]}"),
            Err(ConfigError::NotAList)
        ));
        assert!(matches!(
            RuleSet::parse_document("process_names:\n  - comm: [a]\n  - comm: 7\n"),
            Err(ConfigError::Entry { index: 1, .. })
        ));
        assert!(matches!(
            RuleSet::parse_document("process_names:\n  - pid: [1]\n"),
            Err(ConfigError::Entry { index: 0, .. })
        ));
        assert!(matches!(
            RuleSet::parse_document("process_names:\n  - just-a-string\n"),
            Err(ConfigError::Entry { index: 0, .. })
        ));
        assert!(matches!(
            RuleSet::parse_document("- a\n- b\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
