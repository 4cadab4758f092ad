//! Typed command parameters and the active-flag normalizer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Slots per tray; slot indices run 0..=9.
pub const SLOTS_PER_TRAY: u32 = 10;

/// One tray slot address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TraySlot {
    pub tray: u32,
    pub slot: u32,
}

impl TraySlot {
    #[inline]
    pub fn new(tray: u32, slot: u32) -> Self {
        Self { tray, slot }
    }

    /// Linear position across trays (tray * 10 + slot), `None` past `u32::MAX`.
    #[inline]
    pub fn index(&self) -> Option<u32> {
        self.tray
            .checked_mul(SLOTS_PER_TRAY)?
            .checked_add(self.slot)
    }

    #[inline]
    pub fn from_index(ix: u32) -> Self {
        Self {
            tray: ix / SLOTS_PER_TRAY,
            slot: ix % SLOTS_PER_TRAY,
        }
    }

    /// Next slot, rolling from slot 9 into slot 0 of the next tray.
    #[inline]
    pub fn next(&self) -> Option<Self> {
        self.index()?.checked_add(1).map(Self::from_index)
    }
}

/// Parameters of a tray execution command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrayParams {
    pub tray: u32,
    pub slot: u32,
    /// 1 = press (implicit form), 0 = release.
    pub active: u8,
    /// Fallback slot for the with-backup variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<TraySlot>,
}

impl TrayParams {
    pub fn new(tray: u32, slot: u32) -> Self {
        Self {
            tray,
            slot,
            active: 1,
            backup: None,
        }
    }

    pub fn with_backup(mut self, tray: u32, slot: u32) -> Self {
        self.backup = Some(TraySlot::new(tray, slot));
        self
    }

    pub fn with_active(mut self, active: u8) -> Self {
        self.active = active;
        self
    }

    #[inline]
    pub fn primary(&self) -> TraySlot {
        TraySlot::new(self.tray, self.slot)
    }
}

/// Parameters extracted from a command, by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Parameters {
    #[default]
    None,
    Tray(TrayParams),
    /// Optional numeric argument (throttle, camera distance, toggles).
    Amount { amount: Option<f32> },
    /// Power/ability name (`+power_exec Distribute_Shields`).
    Ability { name: String },
    /// Free text after the command name, or the whole command when it is
    /// only known by category.
    Text { text: String },
}

/// Which parameter shape a known command takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamShape {
    None,
    Tray,
    TrayBackup,
    Amount,
    Ability,
    Text,
}

/// Normalize any stored representation of the tray "active" flag to 0/1.
///
/// Explicit falsy values (`0`, `false`, `"0"`, `"false"`, `"off"`, `""`) map
/// to 0. Everything else, including `null` and unrecognized strings, maps to 1.
pub fn normalize_active(value: &Value) -> u8 {
    match value {
        Value::Null => 1,
        Value::Bool(b) => u8::from(*b),
        Value::Number(n) => {
            if n.as_f64() == Some(0.0) {
                0
            } else {
                1
            }
        }
        Value::String(s) => normalize_active_str(s),
        Value::Array(_) | Value::Object(_) => 1,
    }
}

/// String form of [`normalize_active`].
pub fn normalize_active_str(s: &str) -> u8 {
    match s.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "off" => 0,
        _ => 1,
    }
}

#[inline]
fn num(args: &[&str], ix: usize) -> u32 {
    args.get(ix).and_then(|t| t.parse::<u32>().ok()).unwrap_or(0)
}

/// Parse tray arguments.
///
/// Implicit form (`+Cmd tray slot [btray bslot]`) is always active. The
/// explicit form carries the active flag first; if it is short of a full
/// argument list the tokens are read as the implicit layout instead.
pub(crate) fn parse_tray_args(implicit: bool, args: &[&str], with_backup: bool) -> TrayParams {
    let full = if with_backup { 5 } else { 3 };
    let (active, rest) = if !implicit && args.len() >= full {
        (normalize_active_str(args[0]), &args[1..])
    } else {
        (1, args)
    };

    TrayParams {
        tray: num(rest, 0),
        slot: num(rest, 1),
        active,
        backup: with_backup.then(|| TraySlot::new(num(rest, 2), num(rest, 3))),
    }
}

pub(crate) fn parse_amount(args: &[&str]) -> Option<Option<f32>> {
    match args {
        [] => Some(None),
        [one] => one.parse::<f32>().ok().filter(|v| v.is_finite()).map(Some),
        _ => None,
    }
}

/// Rebuild tray parameters from a legacy `parameters` JSON map.
///
/// Missing or non-numeric fields default to 0. A number that does not fit a
/// `u32` is an error naming the field.
pub fn tray_params_from_map(map: &serde_json::Map<String, Value>) -> Result<TrayParams, String> {
    fn field(map: &serde_json::Map<String, Value>, k: &str) -> Result<Option<u32>, String> {
        let out_of_range = |v: &dyn fmt::Display| format!("{k} {v} is out of range");
        match map.get(k) {
            Some(Value::Number(n)) => match n.as_u64() {
                Some(v) => u32::try_from(v).map(Some).map_err(|_| out_of_range(&v)),
                None if n.is_i64() => Err(out_of_range(n)),
                None => Ok(None),
            },
            Some(Value::String(s)) => match s.trim().parse::<u64>() {
                Ok(v) => u32::try_from(v).map(Some).map_err(|_| out_of_range(&v)),
                Err(_) => Ok(None),
            },
            _ => Ok(None),
        }
    }

    let backup = match (field(map, "backup_tray")?, field(map, "backup_slot")?) {
        (None, None) => None,
        (t, s) => Some(TraySlot::new(t.unwrap_or(0), s.unwrap_or(0))),
    };

    Ok(TrayParams {
        tray: field(map, "tray")?.unwrap_or(0),
        slot: field(map, "slot")?.unwrap_or(0),
        active: map.get("active").map(normalize_active).unwrap_or(1),
        backup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn active_flag_table() {
        assert_eq!(normalize_active(&json!(1)), 1);
        assert_eq!(normalize_active(&json!(0)), 0);
        assert_eq!(normalize_active(&json!(true)), 1);
        assert_eq!(normalize_active(&json!(false)), 0);
        assert_eq!(normalize_active(&json!("off")), 0);
        assert_eq!(normalize_active(&json!("on")), 1);
        assert_eq!(normalize_active(&json!("")), 0);
        assert_eq!(normalize_active(&Value::Null), 1);
    }

    #[test]
    fn active_flag_strings_are_trimmed_and_case_insensitive() {
        assert_eq!(normalize_active_str("  OFF "), 0);
        assert_eq!(normalize_active_str("False"), 0);
        assert_eq!(normalize_active_str(" 0"), 0);
        assert_eq!(normalize_active_str("TRUE"), 1);
        assert_eq!(normalize_active(&json!(7)), 1);
        assert_eq!(normalize_active(&json!(0.0)), 0);
    }

    // Permissive default: typos and unknown words still count as active.
    #[test]
    fn active_flag_unrecognized_values_are_active() {
        assert_eq!(normalize_active_str("of"), 1);
        assert_eq!(normalize_active_str("no"), 1);
        assert_eq!(normalize_active(&json!([])), 1);
        assert_eq!(normalize_active(&json!({"active": 0})), 1);
    }

    #[test]
    fn tray_slot_rolls_over() {
        assert_eq!(TraySlot::new(0, 9).next(), Some(TraySlot::new(1, 0)));
        assert_eq!(TraySlot::new(2, 3).index(), Some(23));
        assert_eq!(TraySlot::from_index(23), TraySlot::new(2, 3));
    }

    #[test]
    fn tray_slot_arithmetic_never_overflows() {
        assert_eq!(TraySlot::new(500_000_000, 0).index(), None);
        assert_eq!(TraySlot::new(u32::MAX / 10, 5).index(), Some(u32::MAX));
        assert_eq!(TraySlot::new(u32::MAX / 10, 5).next(), None);
    }

    #[test]
    fn tray_args_layouts() {
        assert_eq!(parse_tray_args(true, &["0", "5"], false), TrayParams::new(0, 5));
        assert_eq!(
            parse_tray_args(false, &["0", "2", "5"], false),
            TrayParams::new(2, 5).with_active(0)
        );
        // Short explicit form falls back to the implicit layout.
        assert_eq!(parse_tray_args(false, &["3", "4"], false), TrayParams::new(3, 4));
        assert_eq!(parse_tray_args(true, &[], false), TrayParams::new(0, 0));
        assert_eq!(
            parse_tray_args(false, &["1", "0", "1", "2", "3"], true),
            TrayParams::new(0, 1).with_backup(2, 3)
        );
    }

    #[test]
    fn legacy_parameter_map() {
        let map = json!({"tray": "1", "slot": 4, "active": "off"});
        let p = tray_params_from_map(map.as_object().unwrap());
        assert_eq!(p, Ok(TrayParams::new(1, 4).with_active(0)));

        let map = json!({"tray": 0, "slot": 1, "backup_tray": 5, "backup_slot": 6});
        let p = tray_params_from_map(map.as_object().unwrap());
        assert_eq!(p, Ok(TrayParams::new(0, 1).with_backup(5, 6)));
    }

    #[test]
    fn legacy_parameter_map_rejects_values_past_u32() {
        for map in [
            json!({"tray": 4_294_967_297u64, "slot": 3}),
            json!({"tray": "4294967297", "slot": 3}),
            json!({"tray": -1, "slot": 3}),
            json!({"tray": 1, "slot": 3, "backup_slot": 5_000_000_000u64}),
        ] {
            let err = tray_params_from_map(map.as_object().unwrap()).unwrap_err();
            assert!(err.contains("out of range"), "{err}");
        }
    }
}
