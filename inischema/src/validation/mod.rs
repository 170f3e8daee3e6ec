// Post-parse validation - fixpoint walk over dependent value hooks

use crate::document::{IniFile, IniSect, IniValue, SectionBody};
use crate::error::{Error, Result};
use crate::parse::{emit_warning, SinkAction, WarningSink};
use crate::schema::HookOutcome;

/// What one full walk over the document observed.
#[derive(Default)]
struct Pass {
    succeeded: bool,
    deferred: bool,
}

/// Run every pending post-parse hook to fixpoint.
///
/// Hooks may depend on each other's completion regardless of declaration
/// order: the whole document is rewalked while passes keep making progress.
/// A pass that leaves deferrals without a single success is a livelock and
/// fails. A hard cap of pending-hook count + 1 passes bounds the loop
/// besides the no-progress check; the success path never reaches it, since
/// each productive pass completes at least one hook.
pub fn validate(
    file: &IniFile<'_>,
    source_name: &str,
    warning_sink: &mut Option<&mut WarningSink<'_>>,
) -> Result<()> {
    let pending = count_pending(file);
    if pending == 0 {
        return Ok(());
    }

    for pass_num in 0..=pending {
        let mut pass = Pass::default();
        run_pass(file, source_name, warning_sink, &mut pass)?;
        log::debug!(
            "{source_name}: post-parse pass {} (succeeded={}, deferred={})",
            pass_num + 1,
            pass.succeeded,
            pass.deferred
        );
        if !pass.deferred {
            return Ok(());
        }
        if !pass.succeeded {
            break;
        }
    }

    Err(Error::PostParse(format!(
        "Infinite loop processing file: {source_name}"
    )))
}

/// Hooks not yet run, across sections and instances.
fn count_pending(file: &IniFile<'_>) -> usize {
    let mut pending = 0;
    for (_, sect) in file.sections() {
        match sect.body() {
            SectionBody::Values(values) => {
                pending += values
                    .iter()
                    .filter(|(_, v)| !v.post_parse_done() && v.schema().hook().is_some())
                    .count();
            }
            SectionBody::Instances(instances) => {
                for (_, inst) in instances.iter() {
                    if let SectionBody::Values(values) = inst.body() {
                        pending += values
                            .iter()
                            .filter(|(_, v)| !v.post_parse_done() && v.schema().hook().is_some())
                            .count();
                    }
                }
            }
        }
    }
    pending
}

fn run_pass(
    file: &IniFile<'_>,
    source_name: &str,
    warning_sink: &mut Option<&mut WarningSink<'_>>,
    pass: &mut Pass,
) -> Result<()> {
    for (_, sect) in file.sections() {
        match sect.body() {
            SectionBody::Values(values) => {
                for (_, value) in values.iter() {
                    check_value(value, sect, file, source_name, warning_sink, pass)?;
                }
            }
            SectionBody::Instances(instances) => {
                for (_, inst) in instances.iter() {
                    if let SectionBody::Values(values) = inst.body() {
                        for (_, value) in values.iter() {
                            check_value(value, inst, file, source_name, warning_sink, pass)?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_value(
    value: &IniValue<'_>,
    sect: &IniSect<'_>,
    file: &IniFile<'_>,
    source_name: &str,
    warning_sink: &mut Option<&mut WarningSink<'_>>,
    pass: &mut Pass,
) -> Result<()> {
    if value.post_parse_done() {
        return Ok(());
    }
    let Some(hook) = value.schema().hook() else {
        return Ok(());
    };

    match hook(value, sect, file) {
        Err(msg) => Err(Error::PostParse(format!(
            "{}: {}:{}: {}",
            source_name,
            sect.label(),
            value.name(),
            msg
        ))),
        Ok(HookOutcome::Done) => {
            value.mark_done();
            pass.succeeded = true;
            Ok(())
        }
        Ok(HookOutcome::Warn(advisory)) => {
            let message = format!(
                "{}: {}:{}: {}",
                source_name,
                sect.label(),
                value.name(),
                advisory
            );
            if emit_warning(warning_sink, &message) == SinkAction::Stop {
                return Err(Error::PostParse(message));
            }
            value.mark_done();
            pass.succeeded = true;
            Ok(())
        }
        Ok(HookOutcome::Defer) => {
            pass.deferred = true;
            Ok(())
        }
    }
}
