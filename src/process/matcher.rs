//! Matcher primitives used by classification rules.
//!
//! Each matcher inspects a [`ProcessIdentity`] and either rejects it or accepts
//! it, optionally producing named captures for the group name template.
//! Matchers configured on one rule are combined with [`AllMatcher`].

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use regex::Regex;
use std::path::Path;

/// Named captures produced by a successful match.
pub type Captures = HashMap<String, String>;

/// Classification input: the short command name and the argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub name: String,
    pub cmdline: Vec<String>,
}

impl ProcessIdentity {
    pub fn new(name: impl Into<String>, cmdline: Vec<String>) -> Self {
        Self {
            name: name.into(),
            cmdline,
        }
    }
}

/// Returns the final path component, or the input itself if there is none.
pub(crate) fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
}

/// A predicate over a process identity.
///
/// `None` means no match. `Some` carries the captures (possibly empty).
pub trait Matcher {
    fn matches(&self, identity: &ProcessIdentity) -> Option<Captures>;
}

/// Matches when the process name is one of the configured command names.
#[derive(Debug, Clone)]
pub struct CommMatcher {
    comms: HashSet<String>,
}

impl CommMatcher {
    pub fn new<I, S>(comms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            comms: comms.into_iter().map(Into::into).collect(),
        }
    }
}

impl Matcher for CommMatcher {
    fn matches(&self, identity: &ProcessIdentity) -> Option<Captures> {
        self.comms
            .contains(identity.name.as_str())
            .then(Captures::new)
    }
}

/// Matches on the executable (first command line token).
///
/// Entries containing `/` pin a full path; bare entries match the basename
/// in any directory.
#[derive(Debug, Clone)]
pub struct ExeMatcher {
    /// basename -> required full path (None = any directory)
    exes: HashMap<String, Option<String>>,
}

impl ExeMatcher {
    pub fn new<I, S>(exes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let exes = exes
            .into_iter()
            .map(|e| {
                let e = e.as_ref();
                if e.contains('/') {
                    (basename(e).to_string(), Some(e.to_string()))
                } else {
                    (e.to_string(), None)
                }
            })
            .collect();
        Self { exes }
    }
}

impl Matcher for ExeMatcher {
    fn matches(&self, identity: &ProcessIdentity) -> Option<Captures> {
        let exe = identity.cmdline.first()?;
        match self.exes.get(basename(exe))? {
            None => Some(Captures::new()),
            Some(full) if full == exe => Some(Captures::new()),
            Some(_) => None,
        }
    }
}

/// Matches when every configured regex finds a match in the space-joined
/// command line. Named groups from all regexes are collected; a later regex
/// overwrites an earlier group of the same name.
#[derive(Debug, Clone)]
pub struct CmdlineMatcher {
    regexes: Vec<Regex>,
}

impl CmdlineMatcher {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let regexes = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { regexes })
    }

    pub fn from_regexes(regexes: Vec<Regex>) -> Self {
        Self { regexes }
    }
}

impl Matcher for CmdlineMatcher {
    fn matches(&self, identity: &ProcessIdentity) -> Option<Captures> {
        let haystack = identity.cmdline.join(" ");
        let mut captures = Captures::new();

        for regex in &self.regexes {
            let caps = regex.captures(&haystack)?;
            for name in regex.capture_names().flatten() {
                if let Some(m) = caps.name(name) {
                    captures.insert(name.to_string(), m.as_str().to_string());
                }
            }
        }
        Some(captures)
    }
}

/// The closed set of matcher variants a rule can be built from.
#[derive(Debug, Clone)]
pub enum MatcherKind {
    Comm(CommMatcher),
    Exe(ExeMatcher),
    Cmdline(CmdlineMatcher),
}

impl Matcher for MatcherKind {
    fn matches(&self, identity: &ProcessIdentity) -> Option<Captures> {
        match self {
            MatcherKind::Comm(m) => m.matches(identity),
            MatcherKind::Exe(m) => m.matches(identity),
            MatcherKind::Cmdline(m) => m.matches(identity),
        }
    }
}

/// Conjunction of matchers: all must match, captures are merged in order.
#[derive(Debug, Clone)]
pub struct AllMatcher<M = MatcherKind> {
    matchers: Vec<M>,
}

impl<M: Matcher> AllMatcher<M> {
    /// Returns `None` for an empty matcher list.
    pub fn new(matchers: Vec<M>) -> Option<Self> {
        if matchers.is_empty() {
            return None;
        }
        Some(Self { matchers })
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl<M: Matcher> Matcher for AllMatcher<M> {
    fn matches(&self, identity: &ProcessIdentity) -> Option<Captures> {
        let mut merged = Captures::new();
        for matcher in &self.matchers {
            merged.extend(matcher.matches(identity)?);
        }
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, cmdline: &[&str]) -> ProcessIdentity {
        ProcessIdentity::new(name, cmdline.iter().map(|s| s.to_string()).collect())
    }

    // -------------------------------------------------------------------------
    // CommMatcher
    // -------------------------------------------------------------------------

    #[test]
    fn test_comm_matcher_membership() {
        let m = CommMatcher::new(["bash", "zsh"]);
        assert!(m.matches(&ident("bash", &[])).is_some());
        assert!(m.matches(&ident("zsh", &["/bin/zsh"])).is_some());
        assert!(m.matches(&ident("fish", &["/bin/bash"])).is_none());
    }

    #[test]
    fn test_comm_matcher_has_no_captures() {
        let m = CommMatcher::new(["bash"]);
        assert!(m.matches(&ident("bash", &[])).unwrap().is_empty());
    }

    // -------------------------------------------------------------------------
    // ExeMatcher
    // -------------------------------------------------------------------------

    #[test]
    fn test_exe_matcher_full_path_is_pinned() {
        let m = ExeMatcher::new(["/usr/bin/foo"]);
        assert!(m.matches(&ident("foo", &["/usr/bin/foo"])).is_some());
        assert!(m.matches(&ident("foo", &["/opt/foo"])).is_none());
        assert!(m.matches(&ident("foo", &["foo"])).is_none());
    }

    #[test]
    fn test_exe_matcher_bare_name_matches_any_directory() {
        let m = ExeMatcher::new(["foo"]);
        assert!(m.matches(&ident("x", &["/usr/bin/foo", "-v"])).is_some());
        assert!(m.matches(&ident("x", &["/opt/foo"])).is_some());
        assert!(m.matches(&ident("x", &["foo"])).is_some());
        assert!(m.matches(&ident("x", &["/opt/foobar"])).is_none());
    }

    #[test]
    fn test_exe_matcher_empty_cmdline_never_matches() {
        let m = ExeMatcher::new(["foo"]);
        assert!(m.matches(&ident("foo", &[])).is_none());
    }

    // -------------------------------------------------------------------------
    // CmdlineMatcher
    // -------------------------------------------------------------------------

    #[test]
    fn test_cmdline_matcher_requires_all_patterns() {
        let m = CmdlineMatcher::new(["^worker", r"--role=(?P<role>\w+)"]).unwrap();

        let caps = m.matches(&ident("w", &["worker", "--role=ingest"])).unwrap();
        assert_eq!(caps.get("role").map(String::as_str), Some("ingest"));

        assert!(m.matches(&ident("w", &["worker"])).is_none());
    }

    #[test]
    fn test_cmdline_matcher_later_pattern_overwrites_capture() {
        let m = CmdlineMatcher::new([r"(?P<v>a+)", r"(?P<v>b+)"]).unwrap();
        let caps = m.matches(&ident("x", &["aaa", "bb"])).unwrap();
        assert_eq!(caps.get("v").map(String::as_str), Some("bb"));
    }

    #[test]
    fn test_cmdline_matcher_ignores_unnamed_groups() {
        let m = CmdlineMatcher::new([r"(\d+)-(?P<tag>\w+)"]).unwrap();
        let caps = m.matches(&ident("x", &["run", "42-blue"])).unwrap();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps["tag"], "blue");
    }

    #[test]
    fn test_cmdline_matcher_unmatched_optional_group_is_absent() {
        let m = CmdlineMatcher::new([r"^srv(?: --port=(?P<port>\d+))?"]).unwrap();
        let caps = m.matches(&ident("srv", &["srv"])).unwrap();
        assert!(!caps.contains_key("port"));
    }

    #[test]
    fn test_cmdline_matcher_rejects_bad_regex() {
        assert!(CmdlineMatcher::new(["(unclosed"]).is_err());
    }

    // -------------------------------------------------------------------------
    // AllMatcher
    // -------------------------------------------------------------------------

    #[test]
    fn test_all_matcher_rejects_empty_list() {
        assert!(AllMatcher::<MatcherKind>::new(Vec::new()).is_none());
    }

    #[test]
    fn test_all_matcher_is_a_conjunction() {
        let m = AllMatcher::new(vec![
            MatcherKind::Comm(CommMatcher::new(["java"])),
            MatcherKind::Cmdline(CmdlineMatcher::new(["kafka"]).unwrap()),
        ])
        .unwrap();

        assert!(m.matches(&ident("java", &["java", "kafka.Kafka"])).is_some());
        assert!(m.matches(&ident("java", &["java", "zookeeper"])).is_none());
        assert!(m.matches(&ident("python", &["java", "kafka.Kafka"])).is_none());
    }

    #[test]
    fn test_all_matcher_merges_captures() {
        let m = AllMatcher::new(vec![
            MatcherKind::Cmdline(CmdlineMatcher::new([r"--a=(?P<a>\w+)"]).unwrap()),
            MatcherKind::Cmdline(CmdlineMatcher::new([r"--b=(?P<b>\w+)"]).unwrap()),
        ])
        .unwrap();

        let caps = m.matches(&ident("x", &["x", "--a=1", "--b=2"])).unwrap();
        assert_eq!(caps["a"], "1");
        assert_eq!(caps["b"], "2");
    }
}
