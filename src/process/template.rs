//! Group name templates.
//!
//! A template is literal text with `{{.Field}}` actions, compiled once at
//! configuration time. The field set is closed:
//!
//! - `{{.Comm}}`: process name
//! - `{{.ExeBase}}`: basename of the executable (first cmdline token)
//! - `{{.ExeFull}}`: executable as given on the command line
//! - `{{.Matches.<name>}}`: named capture from a `cmdline` regex
//!
//! `ExeBase` and `ExeFull` fall back to `Comm` when the command line is empty.

use std::fmt;
use thiserror::Error;

use crate::process::matcher::{basename, Captures, ProcessIdentity};

/// Template used when a rule does not configure a name.
pub const DEFAULT_TEMPLATE: &str = "{{.ExeBase}}";

/// Errors raised while compiling a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed action starting at byte {0}")]
    Unclosed(usize),

    #[error("empty action at byte {0}")]
    EmptyAction(usize),

    #[error("unknown field {0:?}, expected .Comm, .ExeBase, .ExeFull or .Matches.<name>")]
    UnknownField(String),

    #[error(".Matches needs a capture name, e.g. .Matches.role")]
    MissingMatchKey,
}

/// The values a template can reference.
#[derive(Debug, Clone)]
pub struct TemplateParams {
    pub comm: String,
    pub exe_base: String,
    pub exe_full: String,
    pub matches: Captures,
}

impl TemplateParams {
    pub fn new(identity: &ProcessIdentity, matches: Captures) -> Self {
        let (exe_base, exe_full) = match identity.cmdline.first() {
            Some(exe) => (basename(exe).to_string(), exe.clone()),
            None => (identity.name.clone(), identity.name.clone()),
        };
        Self {
            comm: identity.name.clone(),
            exe_base,
            exe_full,
            matches,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Comm,
    ExeBase,
    ExeFull,
    Match(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A compiled name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl Default for NameTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
            segments: vec![Segment::Field(Field::ExeBase)],
        }
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl NameTemplate {
    /// Compiles a template string.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let action_start = offset + open;
            let after_open = &rest[open + 2..];
            let close = after_open
                .find("}}")
                .ok_or(TemplateError::Unclosed(action_start))?;

            let action = after_open[..close].trim();
            if action.is_empty() {
                return Err(TemplateError::EmptyAction(action_start));
            }
            segments.push(Segment::Field(parse_field(action)?));

            let consumed = open + 2 + close + 2;
            rest = &rest[consumed..];
            offset += consumed;
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Renders the template. A capture name that did not match renders empty.
    pub fn render(&self, params: &TemplateParams) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Field(Field::Comm) => out.push_str(&params.comm),
                Segment::Field(Field::ExeBase) => out.push_str(&params.exe_base),
                Segment::Field(Field::ExeFull) => out.push_str(&params.exe_full),
                Segment::Field(Field::Match(key)) => {
                    if let Some(v) = params.matches.get(key) {
                        out.push_str(v);
                    }
                }
            }
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn parse_field(action: &str) -> Result<Field, TemplateError> {
    match action {
        ".Comm" => Ok(Field::Comm),
        ".ExeBase" => Ok(Field::ExeBase),
        ".ExeFull" => Ok(Field::ExeFull),
        ".Matches" | ".Matches." => Err(TemplateError::MissingMatchKey),
        other => match other.strip_prefix(".Matches.") {
            Some(key) if is_identifier(key) => Ok(Field::Match(key.to_string())),
            _ => Err(TemplateError::UnknownField(other.to_string())),
        },
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(name: &str, cmdline: &[&str], matches: &[(&str, &str)]) -> TemplateParams {
        let identity = ProcessIdentity::new(name, cmdline.iter().map(|s| s.to_string()).collect());
        let matches = matches
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TemplateParams::new(&identity, matches)
    }

    // -------------------------------------------------------------------------
    // TemplateParams
    // -------------------------------------------------------------------------

    #[test]
    fn test_params_derive_exe_fields_from_cmdline() {
        let p = params("server", &["/opt/app/bin/server", "-x"], &[]);
        assert_eq!(p.comm, "server");
        assert_eq!(p.exe_full, "/opt/app/bin/server");
        assert_eq!(p.exe_base, "server");
    }

    #[test]
    fn test_params_fall_back_to_comm_without_cmdline() {
        let p = params("kworker/0:1", &[], &[]);
        assert_eq!(p.exe_full, "kworker/0:1");
        assert_eq!(p.exe_base, "kworker/0:1");
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    #[test]
    fn test_default_template_renders_exe_base() {
        let t = NameTemplate::default();
        assert_eq!(t.as_str(), DEFAULT_TEMPLATE);
        assert_eq!(t.render(&params("srv", &["/opt/app/bin/server", "-x"], &[])), "server");
        assert_eq!(NameTemplate::parse(DEFAULT_TEMPLATE).unwrap(), t);
    }

    #[test]
    fn test_template_with_comm_and_capture() {
        let t = NameTemplate::parse("{{.Comm}}-{{.Matches.role}}").unwrap();
        assert_eq!(t.render(&params("proc", &["proc"], &[("role", "ingest")])), "proc-ingest");
    }

    #[test]
    fn test_template_tolerates_whitespace_and_literals() {
        let t = NameTemplate::parse("app: {{ .ExeFull }} ({{.Comm}})").unwrap();
        assert_eq!(t.render(&params("a", &["/bin/a"], &[])), "app: /bin/a (a)");
    }

    #[test]
    fn test_missing_capture_renders_empty() {
        let t = NameTemplate::parse("x{{.Matches.nope}}y").unwrap();
        assert_eq!(t.render(&params("a", &[], &[])), "xy");
    }

    #[test]
    fn test_plain_literal_template() {
        let t = NameTemplate::parse("databases").unwrap();
        assert_eq!(t.render(&params("pg", &["postgres"], &[])), "databases");
    }

    // -------------------------------------------------------------------------
    // Compilation errors
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_errors() {
        assert_eq!(NameTemplate::parse("a{{.Comm"), Err(TemplateError::Unclosed(1)));
        assert_eq!(NameTemplate::parse("{{ }}"), Err(TemplateError::EmptyAction(0)));
        assert_eq!(
            NameTemplate::parse("{{.Pid}}"),
            Err(TemplateError::UnknownField(".Pid".into()))
        );
        assert_eq!(NameTemplate::parse("{{.Matches}}"), Err(TemplateError::MissingMatchKey));
        assert!(matches!(
            NameTemplate::parse("{{.Matches.a-b}}"),
            Err(TemplateError::UnknownField(_))
        ));
    }
}
