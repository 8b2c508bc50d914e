use serde::{Deserialize, Serialize};

/// Session lifecycle actions offered by the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
    Logout,
    Suspend,
    Reboot,
    Shutdown,
}

impl SessionAction {
    pub const ALL: [SessionAction; 4] = [
        SessionAction::Logout,
        SessionAction::Suspend,
        SessionAction::Reboot,
        SessionAction::Shutdown,
    ];

    /// Human readable label for menus.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Logout => "Log out",
            Self::Suspend => "Suspend",
            Self::Reboot => "Reboot",
            Self::Shutdown => "Shut down",
        }
    }

    /// Shell command implementing the action.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Logout => "hyprctl dispatch exit",
            Self::Suspend => "systemctl suspend",
            Self::Reboot => "systemctl reboot",
            Self::Shutdown => "systemctl poweroff",
        }
    }
}
