//! Command signature recognizer.
//!
//! `classify` turns one canonical command string into a [`Signature`]:
//! category, known-command id, and typed parameters. The command string stays
//! authoritative; signatures are always derived, never stored.

pub mod builder;
pub mod category;
pub mod params;
pub mod rules;

use serde::Serialize;

pub use builder::{
    BuildError, build, build_optimized, expand_tray_range, expand_tray_range_with_backup,
    expand_whole_tray, expand_whole_tray_with_backup, optimize_command,
};
pub use category::CommandCategory;
pub use params::{
    ParamShape, Parameters, TrayParams, TraySlot, normalize_active, normalize_active_str,
};

use params::{parse_amount, parse_tray_args};
use rules::{CommandDef, bare_lower, category_for, lookup};

/// Derived classification of a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signature {
    pub category: CommandCategory,
    pub command_id: Option<&'static str>,
    pub parameters: Parameters,
}

/// Split a command into (implicit `+` flag, name, argument tokens).
fn split_command(command: &str) -> (bool, &str, Vec<&str>) {
    let trimmed = command.trim();
    let implicit = trimmed.starts_with('+');
    let body = trimmed.trim_start_matches('+');
    let mut it = body.split_whitespace();
    let name = it.next().unwrap_or("");
    (implicit, name, it.collect())
}

/// Text after the command name, with inner spacing kept as written.
fn rest_after_name<'a>(command: &'a str, name: &str) -> &'a str {
    let body = command.trim().trim_start_matches('+').trim_start();
    body.get(name.len()..).unwrap_or("").trim()
}

/// Classify a single command.
pub fn classify(command: &str) -> Signature {
    let (_, name, _) = split_command(command);
    let category = category_for(&bare_lower(name));
    let (command_id, parameters) = resolve(command, category);
    Signature {
        category,
        command_id,
        parameters,
    }
}

/// Extract parameters of `command` read as a member of `category`.
///
/// Commands the category does not know come back as verbatim text.
pub fn parse_parameters(command: &str, category: CommandCategory) -> Parameters {
    resolve(command, category).1
}

fn resolve(command: &str, category: CommandCategory) -> (Option<&'static str>, Parameters) {
    let verbatim = || Parameters::Text {
        text: command.trim().to_string(),
    };

    let (implicit, name, args) = split_command(command);
    let Some(d) = lookup(&bare_lower(name)).filter(|d| d.category == category) else {
        return (None, verbatim());
    };

    match shaped(d, implicit, command, name, &args) {
        Some(p) => (Some(d.id), p),
        None => (None, verbatim()),
    }
}

/// Parameters for a known command, or `None` if the arguments don't fit its shape.
fn shaped(
    d: &CommandDef,
    implicit: bool,
    command: &str,
    name: &str,
    args: &[&str],
) -> Option<Parameters> {
    match d.shape {
        ParamShape::None => args.is_empty().then_some(Parameters::None),
        ParamShape::Tray => Some(Parameters::Tray(parse_tray_args(implicit, args, false))),
        ParamShape::TrayBackup => Some(Parameters::Tray(parse_tray_args(implicit, args, true))),
        ParamShape::Amount => parse_amount(args).map(|amount| Parameters::Amount { amount }),
        ParamShape::Ability => match args {
            [one] => Some(Parameters::Ability {
                name: (*one).to_string(),
            }),
            _ => None,
        },
        ParamShape::Text => Some(Parameters::Text {
            text: rest_after_name(command, name).to_string(),
        }),
    }
}
