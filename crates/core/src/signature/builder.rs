//! Command builder: the inverse of `classify`.
//!
//! `build(category, id, params)` spells a command so that classifying the
//! output yields the same signature. Tray commands come in two spellings:
//! - explicit: `STOTrayExecByTray <active> <tray> <slot>`
//! - implicit-active: `+STOTrayExecByTray <tray> <slot>` (press form, active = 1)
//!
//! `build` always emits the explicit form; `build_optimized` and the range
//! expanders use the implicit form whenever `active == 1`.

use std::{borrow::Cow, fmt};

use super::category::CommandCategory;
use super::classify;
use super::params::{ParamShape, Parameters, SLOTS_PER_TRAY, TrayParams, TraySlot};
use super::rules::by_id;

const TRAY_EXEC: &str = "STOTrayExecByTray";
const TRAY_EXEC_BACKUP: &str = "TrayExecByTrayWithBackup";

#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    UnknownCommand {
        category: CommandCategory,
        id: String,
    },
    ParameterMismatch {
        id: Option<String>,
        parameters: Parameters,
    },
    SlotOutOfRange(TraySlot),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::UnknownCommand { category, id } => {
                write!(f, "unknown {category} command '{id}'")
            }
            BuildError::ParameterMismatch { id, parameters } => write!(
                f,
                "parameters {parameters:?} do not fit command '{}'",
                id.as_deref().unwrap_or("<verbatim>")
            ),
            BuildError::SlotOutOfRange(s) => write!(
                f,
                "slot {} of tray {} is out of range (0..{SLOTS_PER_TRAY})",
                s.slot, s.tray
            ),
        }
    }
}

impl std::error::Error for BuildError {}

/// Build a command in its explicit form.
pub fn build(
    category: CommandCategory,
    id: Option<&str>,
    params: &Parameters,
) -> Result<String, BuildError> {
    build_with(category, id, params, false)
}

/// Build a command, using the implicit-active tray form where it applies.
pub fn build_optimized(
    category: CommandCategory,
    id: Option<&str>,
    params: &Parameters,
) -> Result<String, BuildError> {
    build_with(category, id, params, true)
}

fn build_with(
    category: CommandCategory,
    id: Option<&str>,
    params: &Parameters,
    optimize: bool,
) -> Result<String, BuildError> {
    let mismatch = || BuildError::ParameterMismatch {
        id: id.map(str::to_string),
        parameters: params.clone(),
    };

    // No id: the command is only known by category and is carried verbatim.
    let Some(id) = id else {
        return match params {
            Parameters::Text { text } if !text.trim().is_empty() => Ok(text.trim().to_string()),
            _ => Err(mismatch()),
        };
    };

    let d = by_id(id)
        .filter(|d| d.category == category)
        .ok_or_else(|| BuildError::UnknownCommand {
            category,
            id: id.to_string(),
        })?;

    match (d.shape, params) {
        (ParamShape::None, Parameters::None) => Ok(d.name.to_string()),
        (ParamShape::Tray, Parameters::Tray(p)) if p.backup.is_none() => {
            Ok(tray_command(p, optimize))
        }
        (ParamShape::TrayBackup, Parameters::Tray(p)) if p.backup.is_some() => {
            Ok(tray_command(p, optimize))
        }
        (ParamShape::Amount, Parameters::Amount { amount }) => Ok(match amount {
            Some(a) if a.is_finite() => format!("{} {a}", d.name),
            Some(_) => return Err(mismatch()),
            None => d.name.to_string(),
        }),
        (ParamShape::Ability, Parameters::Ability { name }) => {
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(mismatch());
            }
            Ok(format!("{} {name}", d.name))
        }
        (ParamShape::Text, Parameters::Text { text }) => {
            let text = text.trim();
            if text.is_empty() {
                Ok(d.name.to_string())
            } else {
                Ok(format!("{} {text}", d.name))
            }
        }
        _ => Err(mismatch()),
    }
}

fn tray_command(p: &TrayParams, optimize: bool) -> String {
    let active = u8::from(p.active != 0);
    let implicit = optimize && active == 1;
    match (p.backup, implicit) {
        (None, true) => format!("+{TRAY_EXEC} {} {}", p.tray, p.slot),
        (None, false) => format!("{TRAY_EXEC} {active} {} {}", p.tray, p.slot),
        (Some(b), true) => format!(
            "+{TRAY_EXEC_BACKUP} {} {} {} {}",
            p.tray, p.slot, b.tray, b.slot
        ),
        (Some(b), false) => format!(
            "{TRAY_EXEC_BACKUP} {active} {} {} {} {}",
            p.tray, p.slot, b.tray, b.slot
        ),
    }
}

/// Rewrite an explicit active tray command into the implicit form.
///
/// Anything that is not a recognized tray command with `active == 1` is
/// returned untouched.
pub fn optimize_command(command: &str) -> Cow<'_, str> {
    let trimmed = command.trim();
    if trimmed.starts_with('+') {
        return Cow::Borrowed(command);
    }
    let sig = classify(trimmed);
    match (sig.command_id, &sig.parameters) {
        (Some("tray_exec" | "tray_with_backup"), Parameters::Tray(p)) if p.active == 1 => {
            Cow::Owned(tray_command(p, true))
        }
        _ => Cow::Borrowed(command),
    }
}

fn check_slot(s: TraySlot) -> Result<u32, BuildError> {
    if s.slot >= SLOTS_PER_TRAY {
        return Err(BuildError::SlotOutOfRange(s));
    }
    s.index().ok_or(BuildError::SlotOutOfRange(s))
}

/// Linear indices of `start..=end`, both ends validated.
fn range(start: TraySlot, end: TraySlot) -> Result<std::ops::RangeInclusive<u32>, BuildError> {
    Ok(check_slot(start)?..=check_slot(end)?)
}

fn whole_tray(tray: u32) -> Result<std::ops::RangeInclusive<u32>, BuildError> {
    range(TraySlot::new(tray, 0), TraySlot::new(tray, SLOTS_PER_TRAY - 1))
}

fn single(s: TraySlot, active: u8) -> String {
    tray_command(&TrayParams::new(s.tray, s.slot).with_active(active), true)
}

/// Expand `start..=end` (crossing tray boundaries) into single-slot commands.
///
/// An `end` before `start` yields no commands.
pub fn expand_tray_range(
    start: TraySlot,
    end: TraySlot,
    active: u8,
) -> Result<Vec<String>, BuildError> {
    Ok(range(start, end)?
        .map(|ix| single(TraySlot::from_index(ix), active))
        .collect())
}

/// All ten slots of one tray.
pub fn expand_whole_tray(tray: u32, active: u8) -> Result<Vec<String>, BuildError> {
    Ok(whole_tray(tray)?
        .map(|ix| single(TraySlot::from_index(ix), active))
        .collect())
}

/// Like [`expand_tray_range`], with a backup range walked in lockstep from `backup_start`.
pub fn expand_tray_range_with_backup(
    start: TraySlot,
    end: TraySlot,
    backup_start: TraySlot,
    active: u8,
) -> Result<Vec<String>, BuildError> {
    let primary = range(start, end)?;
    let backup_first = check_slot(backup_start)?;
    if let Some(last_offset) = primary.end().checked_sub(*primary.start()) {
        if backup_first.checked_add(last_offset).is_none() {
            return Err(BuildError::SlotOutOfRange(backup_start));
        }
    }
    Ok(primary
        .enumerate()
        .map(|(offset, ix)| {
            let s = TraySlot::from_index(ix);
            let b = TraySlot::from_index(backup_first + offset as u32);
            let p = TrayParams::new(s.tray, s.slot)
                .with_backup(b.tray, b.slot)
                .with_active(active);
            tray_command(&p, true)
        })
        .collect())
}

/// All ten slots of `tray`, each backed by the same slot of `backup_tray`.
pub fn expand_whole_tray_with_backup(
    tray: u32,
    backup_tray: u32,
    active: u8,
) -> Result<Vec<String>, BuildError> {
    Ok(whole_tray(tray)?
        .map(|ix| {
            let s = TraySlot::from_index(ix);
            let p = TrayParams::new(s.tray, s.slot)
                .with_backup(backup_tray, s.slot)
                .with_active(active);
            tray_command(&p, true)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::rules::COMMANDS;
    use pretty_assertions::assert_eq;

    fn roundtrip(category: CommandCategory, id: Option<&str>, params: Parameters) {
        for cmd in [
            build(category, id, &params).unwrap(),
            build_optimized(category, id, &params).unwrap(),
        ] {
            let sig = classify(&cmd);
            assert_eq!(sig.category, category, "{cmd}");
            assert_eq!(sig.command_id, id, "{cmd}");
            assert_eq!(sig.parameters, params, "{cmd}");
        }
    }

    #[test]
    fn classify_inverts_build_for_every_category() {
        use CommandCategory as C;
        roundtrip(C::Tray, Some("tray_exec"), Parameters::Tray(TrayParams::new(0, 5)));
        roundtrip(
            C::Tray,
            Some("tray_exec"),
            Parameters::Tray(TrayParams::new(3, 9).with_active(0)),
        );
        roundtrip(
            C::Tray,
            Some("tray_with_backup"),
            Parameters::Tray(TrayParams::new(1, 2).with_backup(3, 4)),
        );
        roundtrip(
            C::Tray,
            Some("tray_with_backup"),
            Parameters::Tray(TrayParams::new(1, 2).with_backup(3, 4).with_active(0)),
        );
        roundtrip(C::Movement, Some("forward"), Parameters::None);
        roundtrip(
            C::Movement,
            Some("throttle_adjust"),
            Parameters::Amount { amount: Some(-0.25) },
        );
        roundtrip(C::Combat, Some("fire_all"), Parameters::None);
        roundtrip(
            C::Communication,
            Some("team"),
            Parameters::Text {
                text: r#""Engage $$ now""#.into(),
            },
        );
        roundtrip(
            C::Targeting,
            Some("target_teammate"),
            Parameters::Text { text: "2".into() },
        );
        roundtrip(
            C::Power,
            Some("power_exec"),
            Parameters::Ability {
                name: "Distribute_Shields".into(),
            },
        );
        roundtrip(C::Camera, Some("cam_dist"), Parameters::Amount { amount: Some(50.0) });
        roundtrip(C::Camera, Some("cam_reset"), Parameters::None);
        roundtrip(C::System, Some("combat_log"), Parameters::Amount { amount: Some(1.0) });
        roundtrip(
            C::System,
            None,
            Parameters::Text {
                text: "ToggleHUD".into(),
            },
        );
        roundtrip(
            C::Custom,
            None,
            Parameters::Text {
                text: "my_alias".into(),
            },
        );
    }

    #[test]
    fn every_parameterless_definition_roundtrips() {
        for d in COMMANDS.iter().filter(|d| d.shape == ParamShape::None) {
            roundtrip(d.category, Some(d.id), Parameters::None);
        }
    }

    #[test]
    fn tray_spellings() {
        let p = Parameters::Tray(TrayParams::new(0, 5));
        assert_eq!(
            build(CommandCategory::Tray, Some("tray_exec"), &p).unwrap(),
            "STOTrayExecByTray 1 0 5"
        );
        assert_eq!(
            build_optimized(CommandCategory::Tray, Some("tray_exec"), &p).unwrap(),
            "+STOTrayExecByTray 0 5"
        );
        let off = Parameters::Tray(TrayParams::new(0, 5).with_active(0));
        assert_eq!(
            build_optimized(CommandCategory::Tray, Some("tray_exec"), &off).unwrap(),
            "STOTrayExecByTray 0 0 5"
        );
        let b = Parameters::Tray(TrayParams::new(0, 5).with_backup(1, 5));
        assert_eq!(
            build_optimized(CommandCategory::Tray, Some("tray_with_backup"), &b).unwrap(),
            "+TrayExecByTrayWithBackup 0 5 1 5"
        );
    }

    #[test]
    fn build_rejects_mismatches() {
        assert!(matches!(
            build(CommandCategory::Combat, Some("nope"), &Parameters::None),
            Err(BuildError::UnknownCommand { .. })
        ));
        assert!(matches!(
            build(CommandCategory::Movement, Some("fire_all"), &Parameters::None),
            Err(BuildError::UnknownCommand { .. })
        ));
        assert!(matches!(
            build(
                CommandCategory::Tray,
                Some("tray_exec"),
                &Parameters::Tray(TrayParams::new(0, 1).with_backup(1, 1))
            ),
            Err(BuildError::ParameterMismatch { .. })
        ));
        assert!(matches!(
            build(CommandCategory::Custom, None, &Parameters::None),
            Err(BuildError::ParameterMismatch { .. })
        ));
    }

    #[test]
    fn optimizer_only_fires_for_active_tray_commands() {
        assert_eq!(optimize_command("STOTrayExecByTray 1 0 5"), "+STOTrayExecByTray 0 5");
        assert_eq!(
            optimize_command("TrayExecByTrayWithBackup 1 0 5 2 5"),
            "+TrayExecByTrayWithBackup 0 5 2 5"
        );
        assert_eq!(optimize_command("STOTrayExecByTray 0 0 5"), "STOTrayExecByTray 0 0 5");
        assert_eq!(optimize_command("+STOTrayExecByTray 0 5"), "+STOTrayExecByTray 0 5");
        assert_eq!(optimize_command("FireAll"), "FireAll");
        assert!(matches!(optimize_command("FireAll"), Cow::Borrowed(_)));
    }

    #[test]
    fn whole_tray_yields_ten_slots_on_one_tray() {
        let cmds = expand_whole_tray(1, 1).unwrap();
        assert_eq!(cmds.len(), 10);
        for (slot, cmd) in cmds.iter().enumerate() {
            assert_eq!(cmd, &format!("+STOTrayExecByTray 1 {slot}"));
        }
    }

    #[test]
    fn range_crosses_tray_boundary() {
        let cmds = expand_tray_range(TraySlot::new(0, 8), TraySlot::new(1, 1), 1).unwrap();
        assert_eq!(
            cmds,
            vec![
                "+STOTrayExecByTray 0 8",
                "+STOTrayExecByTray 0 9",
                "+STOTrayExecByTray 1 0",
                "+STOTrayExecByTray 1 1",
            ]
        );
    }

    #[test]
    fn range_edge_cases() {
        assert!(
            expand_tray_range(TraySlot::new(2, 0), TraySlot::new(1, 0), 1)
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            expand_tray_range(TraySlot::new(0, 10), TraySlot::new(1, 0), 1),
            Err(BuildError::SlotOutOfRange(TraySlot::new(0, 10)))
        );
        let inactive = expand_tray_range(TraySlot::new(0, 0), TraySlot::new(0, 1), 0).unwrap();
        assert_eq!(inactive[1], "STOTrayExecByTray 0 0 1");
    }

    #[test]
    fn huge_tray_numbers_are_out_of_range() {
        assert_eq!(
            expand_whole_tray(500_000_000, 1),
            Err(BuildError::SlotOutOfRange(TraySlot::new(500_000_000, 0)))
        );
        assert!(expand_whole_tray_with_backup(500_000_000, 0, 1).is_err());
        assert!(
            expand_tray_range(TraySlot::new(0, 0), TraySlot::new(u32::MAX, 9), 1).is_err()
        );

        // Last addressable tray still expands; its backup cannot walk past it.
        let last = u32::MAX / SLOTS_PER_TRAY - 1;
        assert_eq!(expand_whole_tray(last, 1).unwrap().len(), 10);
        assert_eq!(
            expand_tray_range_with_backup(
                TraySlot::new(0, 0),
                TraySlot::new(0, 9),
                TraySlot::new(last + 1, 0),
                1,
            ),
            Err(BuildError::SlotOutOfRange(TraySlot::new(last + 1, 0)))
        );
    }

    #[test]
    fn backup_range_walks_in_lockstep() {
        let cmds = expand_tray_range_with_backup(
            TraySlot::new(0, 9),
            TraySlot::new(1, 0),
            TraySlot::new(5, 9),
            1,
        )
        .unwrap();
        assert_eq!(
            cmds,
            vec![
                "+TrayExecByTrayWithBackup 0 9 5 9",
                "+TrayExecByTrayWithBackup 1 0 6 0",
            ]
        );
        let whole = expand_whole_tray_with_backup(2, 3, 0).unwrap();
        assert_eq!(whole.len(), 10);
        assert_eq!(whole[4], "TrayExecByTrayWithBackup 0 2 4 3 4");
    }
}
