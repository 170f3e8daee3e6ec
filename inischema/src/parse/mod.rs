// Line-oriented parse engine - builds a typed document against a schema

use crate::document::{IniFile, IniSect, SectionBody};
use crate::error::{Error, Result};
use crate::schema::FileSchema;
use crate::validation;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// What a warning sink tells the engine after seeing an advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkAction {
    Continue,
    /// Escalate the current condition to a fatal error with the same message.
    Stop,
}

/// Caller-supplied receiver for non-fatal diagnostics.
pub type WarningSink<'a> = dyn FnMut(&str) -> SinkAction + 'a;

/// Route an advisory to the sink; without one it goes to the log.
pub(crate) fn emit_warning(
    sink: &mut Option<&mut WarningSink<'_>>,
    message: &str,
) -> SinkAction {
    match sink {
        Some(f) => f(message),
        None => {
            log::warn!("{message}");
            SinkAction::Continue
        }
    }
}

/// Parse a complete source string against a schema.
///
/// All-or-nothing: any fatal condition aborts the parse, the partial
/// document is torn down, and the error carries the one human-readable
/// message (prefixed with `source_name` and the 1-based line number where
/// that applies).
pub fn parse_str<'s>(
    schema: &'s FileSchema,
    source: &str,
    source_name: &str,
    mut warning_sink: Option<&mut WarningSink<'_>>,
) -> Result<IniFile<'s>> {
    let mut parser = Parser::new(schema, source_name);
    for line in source.lines() {
        parser.feed_line(line, &mut warning_sink)?;
    }
    parser.finish(&mut warning_sink)
}

/// Parse from a buffered line source.
pub fn parse_reader<'s, R: BufRead>(
    schema: &'s FileSchema,
    mut reader: R,
    source_name: &str,
    mut warning_sink: Option<&mut WarningSink<'_>>,
) -> Result<IniFile<'s>> {
    let mut parser = Parser::new(schema, source_name);
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        parser.feed_line(&line, &mut warning_sink)?;
    }
    parser.finish(&mut warning_sink)
}

/// Open and parse a file; the path becomes the source name in diagnostics.
pub fn parse_file<'s>(
    schema: &'s FileSchema,
    path: impl AsRef<Path>,
    warning_sink: Option<&mut WarningSink<'_>>,
) -> Result<IniFile<'s>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    parse_reader(
        schema,
        BufReader::new(file),
        &path.display().to_string(),
        warning_sink,
    )
}

/// Which document node option lines currently land in.
enum Current {
    None,
    Plain(String),
    /// Title and instance ID under a multiple section.
    Instance(String, String),
}

struct Parser<'s> {
    schema: &'s FileSchema,
    file: IniFile<'s>,
    source_name: String,
    line_num: u32,
    current: Current,
}

impl<'s> Parser<'s> {
    fn new(schema: &'s FileSchema, source_name: &str) -> Self {
        Parser {
            schema,
            file: IniFile::new(schema),
            source_name: source_name.to_string(),
            line_num: 0,
            current: Current::None,
        }
    }

    fn feed_line(
        &mut self,
        raw: &str,
        warn: &mut Option<&mut WarningSink<'_>>,
    ) -> Result<()> {
        self.line_num += 1;
        let line = raw.trim();
        match line.chars().next() {
            None | Some(';') | Some('#') => Ok(()),
            Some('[') => self.section_line(line, warn),
            Some(_) => self.option_line(line, warn),
        }
    }

    fn section_line(
        &mut self,
        line: &str,
        warn: &mut Option<&mut WarningSink<'_>>,
    ) -> Result<()> {
        let inner = &line[1..];
        let Some(close) = inner.find(']') else {
            return Err(Error::Parse(format!(
                "{}:{}: Missing closing bracket (']')",
                self.source_name, self.line_num
            )));
        };
        let header = inner[..close].trim();
        let remainder = &inner[close + 1..];

        let entered = match header.split_once(':') {
            None => self.enter_plain(header)?,
            Some((title, id)) => self.enter_instance(title.trim(), id.trim())?,
        };

        // Validate the section being left before switching to the new one.
        self.leave_current()?;
        self.current = entered;

        self.check_remainder(remainder, warn)
    }

    /// Resolve a `[Title]` header. The document node is found or created;
    /// reopening a plain section appends to it.
    fn enter_plain(&mut self, title: &str) -> Result<Current> {
        let Some(sect_schema) = self.schema.section(title) else {
            return Err(Error::Parse(format!(
                "{}:{}: Unknown section title [{}]",
                self.source_name, self.line_num, title
            )));
        };
        if sect_schema.flags().multiple {
            return Err(Error::Parse(format!(
                "{}:{}: Missing ID for section [{}]",
                self.source_name, self.line_num, title
            )));
        }

        self.file
            .ensure_section(sect_schema)
            .map_err(|e| prefix_line(e, &self.source_name, self.line_num))?;
        Ok(Current::Plain(title.to_string()))
    }

    /// Resolve a `[Title:ID]` header. The wrapper node is found or created;
    /// the instance itself is always fresh, so a repeated ID is fatal.
    fn enter_instance(&mut self, title: &str, id: &str) -> Result<Current> {
        let Some(sect_schema) = self.schema.section(title) else {
            return Err(Error::Parse(format!(
                "{}:{}: Unknown section title [{}:*]",
                self.source_name, self.line_num, title
            )));
        };
        if !sect_schema.flags().multiple {
            return Err(Error::Parse(format!(
                "{}:{}: Unexpected ID for section [{}:{}]",
                self.source_name, self.line_num, title, id
            )));
        }

        let wrapper = self
            .file
            .ensure_section(sect_schema)
            .map_err(|e| prefix_line(e, &self.source_name, self.line_num))?;
        wrapper
            .add_instance(sect_schema, id.to_string())
            .map_err(|e| prefix_line(e, &self.source_name, self.line_num))?;
        Ok(Current::Instance(title.to_string(), id.to_string()))
    }

    fn option_line(
        &mut self,
        line: &str,
        warn: &mut Option<&mut WarningSink<'_>>,
    ) -> Result<()> {
        if matches!(self.current, Current::None) {
            return Err(Error::Parse(format!(
                "{}:{}: Value outside any section",
                self.source_name, self.line_num
            )));
        }
        let Some((name_part, value_part)) = line.split_once('=') else {
            return Err(Error::Parse(format!(
                "{}:{}: Expected equal sign ('=')",
                self.source_name, self.line_num
            )));
        };
        let name = name_part.trim();
        let value_text = value_part.trim();

        let Some(sect) = current_sect_mut(&mut self.file, &self.current) else {
            return Err(Error::Parse(format!(
                "{}:{}: Value outside any section",
                self.source_name, self.line_num
            )));
        };
        let Some(opt_schema) = sect.schema().option(name) else {
            return Err(Error::Parse(format!(
                "{}:{}: Unknown option [{}]:{}",
                self.source_name,
                self.line_num,
                sect.name(),
                name
            )));
        };

        let parsed = match opt_schema.ty().parse(value_text) {
            Err(msg) => {
                return Err(Error::Value(format!(
                    "{}:{}: Failed to parse {}: {}",
                    self.source_name,
                    self.line_num,
                    opt_schema.ty().name(),
                    msg
                )));
            }
            Ok(parsed) => parsed,
        };

        if let Some(advisory) = &parsed.advisory {
            let message = format!(
                "{}:{}: {}",
                self.source_name, self.line_num, advisory
            );
            if emit_warning(warn, &message) == SinkAction::Stop {
                return Err(Error::Value(message));
            }
        }

        if let Err(e) = sect.add_value(opt_schema, parsed.value) {
            return Err(prefix_line(e, &self.source_name, self.line_num));
        }

        self.check_remainder(parsed.rest, warn)
    }

    /// Report non-comment text trailing a value or header. Only runs when a
    /// sink is configured, and only that sink's Stop makes it fatal.
    fn check_remainder(
        &self,
        rest: &str,
        warn: &mut Option<&mut WarningSink<'_>>,
    ) -> Result<()> {
        if warn.is_none() {
            return Ok(());
        }
        let rest = rest.trim();
        if rest.is_empty() || rest.starts_with(';') || rest.starts_with('#') {
            return Ok(());
        }
        let message = format!(
            "{}:{}: Unexpected extra characters",
            self.source_name, self.line_num
        );
        match emit_warning(warn, &message) {
            SinkAction::Stop => Err(Error::Parse(message)),
            SinkAction::Continue => Ok(()),
        }
    }

    /// End-of-section validation, run once when control leaves a concrete
    /// section or instance: not-empty enforcement, then default
    /// materialization and required-option checks.
    fn leave_current(&mut self) -> Result<()> {
        let Some(sect) = current_sect_mut(&mut self.file, &self.current) else {
            return Ok(());
        };
        if sect.schema().flags().not_empty && sect.is_empty() {
            return Err(Error::Parse(format!(
                "{}:{}: Invalid empty section: {}",
                self.source_name,
                self.line_num,
                sect.label()
            )));
        }
        apply_missing_options(sect, &self.source_name, self.line_num)
    }

    fn finish(
        mut self,
        warn: &mut Option<&mut WarningSink<'_>>,
    ) -> Result<IniFile<'s>> {
        self.leave_current()?;
        self.current = Current::None;

        // Schema-wide walk, independent of which sections were seen.
        for (name, sect_schema) in self.schema.sections() {
            let flags = sect_schema.flags();
            if !flags.required && !flags.create_if_absent {
                continue;
            }
            if self.file.section(name).is_some() {
                continue;
            }
            if flags.create_if_absent {
                let sect = self
                    .file
                    .ensure_section(sect_schema)
                    .map_err(|e| prefix_line(e, &self.source_name, self.line_num))?;
                apply_missing_options(sect, &self.source_name, self.line_num)?;
            } else {
                let label = if flags.multiple {
                    format!("[{name}:*]")
                } else {
                    format!("[{name}]")
                };
                return Err(Error::Parse(format!(
                    "{}: Missing section {}",
                    self.source_name, label
                )));
            }
        }

        log::debug!("{}: parsed {} lines", self.source_name, self.line_num);

        validation::validate(&self.file, &self.source_name, warn)?;
        Ok(self.file)
    }
}

fn current_sect_mut<'a, 's>(
    file: &'a mut IniFile<'s>,
    current: &Current,
) -> Option<&'a mut IniSect<'s>> {
    match current {
        Current::None => None,
        Current::Plain(name) => file.section_mut(name),
        Current::Instance(title, id) => file.section_mut(title)?.instance_mut(id),
    }
}

/// Materialize defaults and enforce required options for one concrete
/// section. Wrapper nodes of multiple sections are skipped; each instance
/// is checked on its own when control leaves it.
fn apply_missing_options(
    sect: &mut IniSect<'_>,
    source_name: &str,
    line_num: u32,
) -> Result<()> {
    if matches!(sect.body(), SectionBody::Instances(_)) {
        return Ok(());
    }
    let schema = sect.schema();
    for (name, opt_schema) in schema.options() {
        if !opt_schema.required() && opt_schema.default_value().is_none() {
            continue;
        }
        if sect.value(name).is_some() {
            continue;
        }
        match opt_schema.default_value() {
            Some(default) => {
                let value = default.clone();
                sect.add_value(opt_schema, value)
                    .map_err(|e| prefix_line(e, source_name, line_num))?;
            }
            None => {
                return Err(Error::Parse(format!(
                    "{}:{}: Section {} missing required option: {}",
                    source_name,
                    line_num,
                    sect.label(),
                    name
                )));
            }
        }
    }
    Ok(())
}

/// Fold the source name and line number into a document-level message.
fn prefix_line(err: Error, source_name: &str, line_num: u32) -> Error {
    match err {
        Error::Parse(msg) => Error::Parse(format!("{source_name}:{line_num}: {msg}")),
        Error::Value(msg) => Error::Value(format!("{source_name}:{line_num}: {msg}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{HookOutcome, OptionDecl, SectionDecl, SectionFlags};
    use crate::value::types;
    use crate::value::{OptionType, Parsed, Value};
    use std::io::Write as _;

    /// The server/host/port schema from the round-trip scenarios.
    fn server_schema() -> FileSchema {
        let mut schema = FileSchema::new();
        let sect = schema
            .add_section("server", SectionFlags { required: true, ..Default::default() })
            .unwrap();
        sect.add_option(OptionDecl::new("host", &types::STRING).required())
            .unwrap();
        sect.add_option(
            OptionDecl::new("port", &types::INT).default_value(Value::Int(80)),
        )
        .unwrap();
        schema
    }

    fn collect_sink(collected: &mut Vec<String>) -> impl FnMut(&str) -> SinkAction + '_ {
        |msg: &str| {
            collected.push(msg.to_string());
            SinkAction::Continue
        }
    }

    #[test]
    fn test_scenario_full() {
        let schema = server_schema();
        let file = parse_str(
            &schema,
            "[server]\nhost = example.com\nport = 8080\n",
            "test.ini",
            None,
        )
        .unwrap();

        let server = file.section("server").unwrap();
        assert_eq!(
            server.value("host").unwrap().value().as_str(),
            Some("example.com")
        );
        assert_eq!(server.value("port").unwrap().value().as_int(), Some(8080));
    }

    #[test]
    fn test_scenario_default_materialized() {
        let schema = server_schema();
        let file = parse_str(
            &schema,
            "[server]\nhost = example.com\n",
            "test.ini",
            None,
        )
        .unwrap();

        let server = file.section("server").unwrap();
        assert_eq!(server.value("port").unwrap().value().as_int(), Some(80));
    }

    #[test]
    fn test_scenario_missing_required_option() {
        let schema = server_schema();
        let err = parse_str(&schema, "[server]\n", "test.ini", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: test.ini:1: Section [server] missing required option: host"
        );
    }

    #[test]
    fn test_missing_required_section() {
        let schema = server_schema();
        let err = parse_str(&schema, "; nothing here\n", "test.ini", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: test.ini: Missing section [server]"
        );
    }

    #[test]
    fn test_create_if_absent_with_defaults() {
        let mut schema = FileSchema::new();
        let sect = schema
            .add_section(
                "limits",
                SectionFlags { required: true, create_if_absent: true, ..Default::default() },
            )
            .unwrap();
        sect.add_option(
            OptionDecl::new("max_clients", &types::INT).default_value(Value::Int(64)),
        )
        .unwrap();

        let file = parse_str(&schema, "", "test.ini", None).unwrap();
        let limits = file.section("limits").unwrap();
        assert_eq!(
            limits.value("max_clients").unwrap().value().as_int(),
            Some(64)
        );
    }

    #[test]
    fn test_create_if_absent_requires_defaults_for_required_options() {
        let mut schema = FileSchema::new();
        let sect = schema
            .add_section(
                "limits",
                SectionFlags { create_if_absent: true, ..Default::default() },
            )
            .unwrap();
        sect.add_option(OptionDecl::new("quota", &types::INT).required())
            .unwrap();

        let err = parse_str(&schema, "", "test.ini", None).unwrap_err();
        assert!(
            err.to_string()
                .contains("Section [limits] missing required option: quota"),
            "{err}"
        );
    }

    #[test]
    fn test_structural_errors() {
        let schema = server_schema();

        let err = parse_str(&schema, "[mystery]\n", "t.ini", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:1: Unknown section title [mystery]"
        );

        let err = parse_str(&schema, "[server\n", "t.ini", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:1: Missing closing bracket (']')"
        );

        let err = parse_str(&schema, "[server]\nhost example.com\n", "t.ini", None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:2: Expected equal sign ('=')"
        );

        let err = parse_str(&schema, "host = example.com\n", "t.ini", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:1: Value outside any section"
        );

        let err = parse_str(&schema, "[server]\nproto = tcp\n", "t.ini", None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:2: Unknown option [server]:proto"
        );
    }

    #[test]
    fn test_value_parse_error_carries_type_name_and_line() {
        let schema = server_schema();
        let err = parse_str(
            &schema,
            "[server]\nhost = h\nport = fish\n",
            "conf.ini",
            None,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Value error: conf.ini:3: Failed to parse integer: \
             Failed to parse 'fish' as an integer"
        );
    }

    #[test]
    fn test_duplicate_value_fatal() {
        let schema = server_schema();
        let err = parse_str(
            &schema,
            "[server]\nhost = a\nhost = b\n",
            "t.ini",
            None,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:3: Duplicate value [server]:host"
        );
    }

    #[test]
    fn test_comments_blanks_and_inline_comments() {
        let schema = server_schema();
        let source = "\n; leading comment\n# another\n[server]  ; trailing\n\
                      host = example.com ; inline\nport = 8080 # inline\n";
        let file = parse_str(&schema, source, "t.ini", None).unwrap();
        let server = file.section("server").unwrap();
        assert_eq!(
            server.value("host").unwrap().value().as_str(),
            Some("example.com")
        );
        assert_eq!(server.value("port").unwrap().value().as_int(), Some(8080));
    }

    #[test]
    fn test_quoted_value_keeps_delimiters() {
        let schema = server_schema();
        let file = parse_str(
            &schema,
            "[server]\nhost = 'a; b # c'\n",
            "t.ini",
            None,
        )
        .unwrap();
        assert_eq!(
            file.section("server").unwrap().value("host").unwrap().value().as_str(),
            Some("a; b # c")
        );
    }

    #[test]
    fn test_value_may_contain_equals() {
        let mut schema = FileSchema::new();
        schema
            .add_section("s", SectionFlags::default())
            .unwrap()
            .add_option(OptionDecl::new("expr", &types::STRING))
            .unwrap();
        let file = parse_str(&schema, "[s]\nexpr = a=b\n", "t.ini", None).unwrap();
        assert_eq!(
            file.section("s").unwrap().value("expr").unwrap().value().as_str(),
            Some("a=b")
        );
    }

    fn listener_schema() -> FileSchema {
        let mut schema = FileSchema::new();
        let sect = schema
            .add_section("listener", SectionFlags { multiple: true, ..Default::default() })
            .unwrap();
        sect.add_option(OptionDecl::new("bind", &types::STRING).required())
            .unwrap();
        sect.add_option(
            OptionDecl::new("backlog", &types::INT).default_value(Value::Int(128)),
        )
        .unwrap();
        schema
    }

    #[test]
    fn test_instances_keyed_and_independent() {
        let schema = listener_schema();
        let source = "[listener:web]\nbind = 0.0.0.0:80\n\
                      [listener:admin]\nbind = 127.0.0.1:81\nbacklog = 4\n";
        let file = parse_str(&schema, source, "t.ini", None).unwrap();

        let wrapper = file.section("listener").unwrap();
        let web = wrapper.instance("web").unwrap();
        let admin = wrapper.instance("admin").unwrap();

        // Defaults are validated and materialized per instance.
        assert_eq!(web.value("backlog").unwrap().value().as_int(), Some(128));
        assert_eq!(admin.value("backlog").unwrap().value().as_int(), Some(4));
        assert_eq!(
            web.value("bind").unwrap().value().as_str(),
            Some("0.0.0.0:80")
        );
    }

    #[test]
    fn test_instance_missing_required_is_per_instance() {
        let schema = listener_schema();
        let err = parse_str(
            &schema,
            "[listener:web]\nbind = x\n[listener:bad]\n",
            "t.ini",
            None,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:3: Section [listener:bad] missing required option: bind"
        );
    }

    #[test]
    fn test_duplicate_instance_id_fatal() {
        let schema = listener_schema();
        let err = parse_str(
            &schema,
            "[listener:web]\nbind = a\n[listener:web]\n",
            "t.ini",
            None,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:3: Duplicate section [listener:web]"
        );
    }

    #[test]
    fn test_id_mismatches_are_fatal() {
        let schema = listener_schema();
        let err = parse_str(&schema, "[listener]\n", "t.ini", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:1: Missing ID for section [listener]"
        );

        let schema = server_schema();
        let err = parse_str(&schema, "[server:one]\n", "t.ini", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:1: Unexpected ID for section [server:one]"
        );

        let schema = listener_schema();
        let err = parse_str(&schema, "[mystery:one]\n", "t.ini", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:1: Unknown section title [mystery:*]"
        );
    }

    fn not_empty_schema() -> FileSchema {
        let mut schema = FileSchema::new();
        let sect = schema
            .add_section("data", SectionFlags { not_empty: true, ..Default::default() })
            .unwrap();
        sect.add_option(OptionDecl::new("x", &types::INT)).unwrap();
        schema
            .add_section("other", SectionFlags::default())
            .unwrap()
            .add_option(OptionDecl::new("y", &types::INT))
            .unwrap();
        schema
    }

    #[test]
    fn test_not_empty_fails_at_next_header() {
        let schema = not_empty_schema();
        let err = parse_str(&schema, "[data]\n[other]\ny = 1\n", "t.ini", None)
            .unwrap_err();
        // Reported when the next header is reached, with that line number.
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:2: Invalid empty section: [data]"
        );
    }

    #[test]
    fn test_not_empty_fails_at_eof() {
        let schema = not_empty_schema();
        let err = parse_str(&schema, "[data]\n", "t.ini", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:1: Invalid empty section: [data]"
        );
    }

    #[test]
    fn test_not_empty_satisfied() {
        let schema = not_empty_schema();
        let file = parse_str(&schema, "[data]\nx = 1\n[other]\ny = 2\n", "t.ini", None)
            .unwrap();
        assert_eq!(
            file.section("data").unwrap().value("x").unwrap().value().as_int(),
            Some(1)
        );
    }

    #[test]
    fn test_reopening_plain_section_merges() {
        let mut schema = FileSchema::new();
        let sect = schema.add_section("s", SectionFlags::default()).unwrap();
        sect.add_option(OptionDecl::new("a", &types::INT)).unwrap();
        sect.add_option(OptionDecl::new("b", &types::INT)).unwrap();

        let file = parse_str(
            &schema,
            "[s]\na = 1\n[s]\nb = 2\n",
            "t.ini",
            None,
        )
        .unwrap();
        let s = file.section("s").unwrap();
        assert_eq!(s.value("a").unwrap().value().as_int(), Some(1));
        assert_eq!(s.value("b").unwrap().value().as_int(), Some(2));

        // The same option set twice across reopenings is still a duplicate.
        let err = parse_str(&schema, "[s]\na = 1\n[s]\na = 2\n", "t.ini", None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:4: Duplicate value [s]:a"
        );
    }

    #[test]
    fn test_remainder_warning_through_sink() {
        let schema = server_schema();
        let mut seen = Vec::new();
        {
            let mut sink = collect_sink(&mut seen);
            parse_str(
                &schema,
                "[server]\nhost = 'h' trailing junk\n",
                "t.ini",
                Some(&mut sink),
            )
            .unwrap();
        }
        assert_eq!(seen, vec!["t.ini:2: Unexpected extra characters".to_string()]);
    }

    #[test]
    fn test_remainder_ignored_without_sink() {
        let schema = server_schema();
        parse_str(&schema, "[server]\nhost = 'h' junk\n", "t.ini", None).unwrap();
    }

    #[test]
    fn test_sink_stop_escalates_remainder() {
        let schema = server_schema();
        let mut sink = |_: &str| SinkAction::Stop;
        let err = parse_str(
            &schema,
            "[server]\nhost = 'h' junk\n",
            "t.ini",
            Some(&mut sink),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error: t.ini:2: Unexpected extra characters"
        );
    }

    /// Integer type that always attaches an advisory, for sink routing tests.
    struct FussyIntType;

    impl OptionType for FussyIntType {
        fn name(&self) -> &'static str {
            "fussy integer"
        }

        fn parse<'a>(&self, input: &'a str) -> std::result::Result<Parsed<'a>, String> {
            let mut parsed = types::INT.parse(input)?;
            parsed.advisory = Some("deprecated option syntax".to_string());
            Ok(parsed)
        }

        fn format(&self, value: &Value) -> std::result::Result<String, String> {
            types::INT.format(value)
        }

        fn accepts(&self, value: &Value) -> bool {
            types::INT.accepts(value)
        }
    }

    static FUSSY_INT: FussyIntType = FussyIntType;

    fn fussy_schema() -> FileSchema {
        let mut schema = FileSchema::new();
        schema
            .add_section("s", SectionFlags::default())
            .unwrap()
            .add_option(OptionDecl::new("n", &FUSSY_INT))
            .unwrap();
        schema
    }

    #[test]
    fn test_value_advisory_routed_to_sink() {
        let schema = fussy_schema();
        let mut seen = Vec::new();
        {
            let mut sink = collect_sink(&mut seen);
            let file = parse_str(&schema, "[s]\nn = 5\n", "t.ini", Some(&mut sink)).unwrap();
            assert_eq!(
                file.section("s").unwrap().value("n").unwrap().value().as_int(),
                Some(5)
            );
        }
        assert_eq!(seen, vec!["t.ini:2: deprecated option syntax".to_string()]);
    }

    #[test]
    fn test_value_advisory_stop_is_fatal() {
        let schema = fussy_schema();
        let mut sink = |_: &str| SinkAction::Stop;
        let err = parse_str(&schema, "[s]\nn = 5\n", "t.ini", Some(&mut sink)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Value error: t.ini:2: deprecated option syntax"
        );
    }

    #[test]
    fn test_list_option() {
        let mut schema = FileSchema::new();
        schema
            .add_section("s", SectionFlags::default())
            .unwrap()
            .add_option(OptionDecl::new("ports", &types::INT_LIST))
            .unwrap();
        let file = parse_str(&schema, "[s]\nports = 80, 443, 8080 ; open\n", "t.ini", None)
            .unwrap();
        assert_eq!(
            file.section("s").unwrap().value("ports").unwrap().value().as_int_list(),
            Some(&[80, 443, 8080][..])
        );
    }

    #[test]
    fn test_parse_reader() {
        let schema = server_schema();
        let source: &[u8] = b"[server]\r\nhost = example.com\r\n";
        let file = parse_reader(&schema, source, "stream", None).unwrap();
        assert_eq!(
            file.section("server").unwrap().value("host").unwrap().value().as_str(),
            Some("example.com")
        );
    }

    #[test]
    fn test_parse_file_round_trip() {
        let schema = server_schema();
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"[server]\nhost = example.com\nport = 8080\n")
            .unwrap();

        let file = parse_file(&schema, tmp.path(), None).unwrap();
        assert_eq!(
            file.section("server").unwrap().value("port").unwrap().value().as_int(),
            Some(8080)
        );
    }

    #[test]
    fn test_parse_file_missing_is_io_error() {
        let schema = server_schema();
        let err = parse_file(&schema, "/no/such/file.ini", None).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_batch_declared_schema_end_to_end() {
        let mut schema = FileSchema::new();
        schema
            .add_sections(vec![
                SectionDecl::new(
                    "server",
                    SectionFlags { required: true, ..Default::default() },
                )
                .option(OptionDecl::new("host", &types::STRING).required())
                .option(OptionDecl::new("port", &types::INT).default_value(Value::Int(80))),
                SectionDecl::new(
                    "listener",
                    SectionFlags { multiple: true, ..Default::default() },
                )
                .option(OptionDecl::new("bind", &types::STRING).required()),
            ])
            .unwrap();

        let source = "[server]\nhost = h\n[listener:a]\nbind = x\n";
        let file = parse_str(&schema, source, "t.ini", None).unwrap();
        assert_eq!(
            file.section("server").unwrap().value("port").unwrap().value().as_int(),
            Some(80)
        );
        assert!(file.section("listener").unwrap().instance("a").is_some());
    }

    #[test]
    fn test_post_parse_hook_runs_after_eof_defaults() {
        // The hook sees materialized defaults even though the option never
        // appeared in the source.
        let mut schema = FileSchema::new();
        let sect = schema.add_section("s", SectionFlags::default()).unwrap();
        sect.add_option(
            OptionDecl::new("limit", &types::INT)
                .default_value(Value::Int(10))
                .post_parse(|value, _sect, _file| {
                    let limit = value.value().as_int().unwrap_or(0);
                    if limit > 0 {
                        Ok(HookOutcome::Done)
                    } else {
                        Err("limit must be positive".to_string())
                    }
                }),
        )
        .unwrap();

        let file = parse_str(&schema, "[s]\n", "t.ini", None).unwrap();
        let value = file.section("s").unwrap().value("limit").unwrap();
        assert!(value.post_parse_done());
    }
}
