use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Coarse classification of a command.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommandCategory {
    Tray,
    Movement,
    Combat,
    Communication,
    Targeting,
    Power,
    Camera,
    System,
    #[default]
    Custom,
}

impl CommandCategory {
    pub fn name(&self) -> &'static str {
        match self {
            CommandCategory::Tray => "tray",
            CommandCategory::Movement => "movement",
            CommandCategory::Combat => "combat",
            CommandCategory::Communication => "communication",
            CommandCategory::Targeting => "targeting",
            CommandCategory::Power => "power",
            CommandCategory::Camera => "camera",
            CommandCategory::System => "system",
            CommandCategory::Custom => "custom",
        }
    }

    pub const ALL: [CommandCategory; 9] = [
        CommandCategory::Tray,
        CommandCategory::Movement,
        CommandCategory::Combat,
        CommandCategory::Communication,
        CommandCategory::Targeting,
        CommandCategory::Power,
        CommandCategory::Camera,
        CommandCategory::System,
        CommandCategory::Custom,
    ];

    pub fn iter() -> impl Iterator<Item = CommandCategory> {
        Self::ALL.into_iter()
    }
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tray" => Ok(CommandCategory::Tray),
            "movement" => Ok(CommandCategory::Movement),
            "combat" => Ok(CommandCategory::Combat),
            "communication" | "chat" => Ok(CommandCategory::Communication),
            "targeting" | "target" => Ok(CommandCategory::Targeting),
            "power" | "shield" | "shields" => Ok(CommandCategory::Power),
            "camera" => Ok(CommandCategory::Camera),
            "system" => Ok(CommandCategory::System),
            "custom" => Ok(CommandCategory::Custom),
            other => Err(format!("unknown command category '{other}'")),
        }
    }
}
