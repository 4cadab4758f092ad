//! Ordered classification rules and the known-command table.
//!
//! Rules run top to bottom against the lowercase command name with any
//! leading `+` removed; the first hit decides the category. Order matters:
//! - `trayexecbytray` is a substring of `trayexecbytraywithbackup`, so the
//!   longer name is checked first.
//! - the generic `*toggle*` system rule comes last so that named toggles
//!   (`FullImpulseToggle`) keep their own category.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::category::CommandCategory;
use super::params::ParamShape;

#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    Exact(&'static str),
    Prefix(&'static str),
    Contains(&'static str),
    /// Any name listed in [`COMMANDS`] for the given category.
    Known(CommandCategory),
}

impl Matcher {
    pub fn matches(&self, name: &str) -> bool {
        match *self {
            Matcher::Exact(s) => name == s,
            Matcher::Prefix(p) => name.starts_with(p),
            Matcher::Contains(p) => name.contains(p),
            Matcher::Known(cat) => lookup(name).is_some_and(|d| d.category == cat),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub matcher: Matcher,
    pub category: CommandCategory,
}

const fn rule(matcher: Matcher, category: CommandCategory) -> Rule {
    Rule { matcher, category }
}

use CommandCategory as C;

pub static RULES: &[Rule] = &[
    rule(Matcher::Contains("trayexecbytraywithbackup"), C::Tray),
    rule(Matcher::Contains("trayexecbytray"), C::Tray),
    rule(Matcher::Exact("power_exec"), C::Power),
    rule(Matcher::Known(C::Communication), C::Communication),
    rule(Matcher::Known(C::Movement), C::Movement),
    rule(Matcher::Prefix("fire"), C::Combat),
    rule(Matcher::Prefix("target"), C::Targeting),
    rule(Matcher::Prefix("cam"), C::Camera),
    rule(Matcher::Known(C::System), C::System),
    rule(Matcher::Contains("toggle"), C::System),
];

/// A command the builder knows how to spell.
#[derive(Debug, Clone, Copy)]
pub struct CommandDef {
    pub id: &'static str,
    /// Canonical spelling, including a leading `+` for press-style commands.
    pub name: &'static str,
    pub category: CommandCategory,
    pub shape: ParamShape,
}

const fn def(
    id: &'static str,
    name: &'static str,
    category: CommandCategory,
    shape: ParamShape,
) -> CommandDef {
    CommandDef {
        id,
        name,
        category,
        shape,
    }
}

use ParamShape as P;

pub static COMMANDS: &[CommandDef] = &[
    // tray
    def("tray_exec", "STOTrayExecByTray", C::Tray, P::Tray),
    def("tray_with_backup", "TrayExecByTrayWithBackup", C::Tray, P::TrayBackup),
    // power / shields
    def("power_exec", "+power_exec", C::Power, P::Ability),
    // communication
    def("say", "say", C::Communication, P::Text),
    def("team", "team", C::Communication, P::Text),
    def("zone", "zone", C::Communication, P::Text),
    def("local", "local", C::Communication, P::Text),
    def("fleet", "fleet", C::Communication, P::Text),
    def("tell", "tell", C::Communication, P::Text),
    // movement
    def("forward", "+forward", C::Movement, P::None),
    def("backward", "+backward", C::Movement, P::None),
    def("left", "+left", C::Movement, P::None),
    def("right", "+right", C::Movement, P::None),
    def("up", "+up", C::Movement, P::None),
    def("down", "+down", C::Movement, P::None),
    def("turn_left", "+turnleft", C::Movement, P::None),
    def("turn_right", "+turnright", C::Movement, P::None),
    def("auto_forward", "+autoforward", C::Movement, P::None),
    def("full_impulse_toggle", "FullImpulseToggle", C::Movement, P::None),
    def("throttle_adjust", "ThrottleAdjust", C::Movement, P::Amount),
    def("throttle_set", "ThrottleSet", C::Movement, P::Amount),
    // combat
    def("fire_all", "FireAll", C::Combat, P::None),
    def("fire_phasers", "FirePhasers", C::Combat, P::None),
    def("fire_torps", "FireTorps", C::Combat, P::None),
    def("fire_phasers_torps", "FirePhasersTorps", C::Combat, P::None),
    def("fire_mines", "FireMines", C::Combat, P::None),
    // targeting
    def("target", "Target", C::Targeting, P::Text),
    def("target_enemy_near", "Target_Enemy_Near", C::Targeting, P::None),
    def("target_friend_near", "Target_Friend_Near", C::Targeting, P::None),
    def("target_self", "Target_Self", C::Targeting, P::None),
    def("target_clear", "Target_Clear", C::Targeting, P::None),
    def("target_teammate", "Target_Teammate", C::Targeting, P::Text),
    // camera
    def("cam_reset", "camreset", C::Camera, P::None),
    def("cam_dist", "camdist", C::Camera, P::Amount),
    def("cam_turn_to_face", "camTurnToFace", C::Camera, P::None),
    // system
    def("bind_load_file", "bind_load_file", C::System, P::Text),
    def("bind_save_file", "bind_save_file", C::System, P::Text),
    def("combat_log", "CombatLog", C::System, P::Amount),
    def("screenshot", "screenshot", C::System, P::None),
    def("gen_send_message", "GenSendMessage", C::System, P::Text),
];

/// Lowercase bare name (no `+`) → definition. The plain `TrayExecByTray`
/// spelling is accepted as an alias of `STOTrayExecByTray`.
static BY_NAME: Lazy<HashMap<String, &'static CommandDef>> = Lazy::new(|| {
    let mut m: HashMap<String, &'static CommandDef> = COMMANDS
        .iter()
        .map(|d| (bare_lower(d.name), d))
        .collect();
    if let Some(tray) = by_id("tray_exec") {
        m.insert("trayexecbytray".into(), tray);
    }
    m
});

#[inline]
pub(crate) fn bare_lower(name: &str) -> String {
    name.trim_start_matches('+').to_ascii_lowercase()
}

/// Find a definition by lowercase bare name.
pub fn lookup(name: &str) -> Option<&'static CommandDef> {
    BY_NAME.get(name).copied()
}

/// Find a definition by id.
pub fn by_id(id: &str) -> Option<&'static CommandDef> {
    COMMANDS.iter().find(|d| d.id == id)
}

/// First matching rule's category, or `Custom`.
pub fn category_for(name: &str) -> CommandCategory {
    RULES
        .iter()
        .find(|r| r.matcher.matches(name))
        .map(|r| r.category)
        .unwrap_or(CommandCategory::Custom)
}
