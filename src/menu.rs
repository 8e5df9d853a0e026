//! Popup menu model for a single selected tray entry.
//!
//! The menu itself is pure data with stable numeric command IDs; showing
//! it is a [`MenuHost`] concern. Selection never calls transition
//! operations directly; the host posts the picked command back through
//! the dispatcher, keeping one entry point for all state changes.

use thiserror::Error;

/// Commands a menu selection can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuCommand {
    About,
    Exit,
    CloseWindow,
    RestoreWindow,
}

const ID_ABOUT: u32 = 0x1001;
const ID_EXIT: u32 = 0x1002;
const ID_CLOSE: u32 = 0x1003;
const ID_RESTORE: u32 = 0x1004;

impl MenuCommand {
    /// Numeric ID carried through the host's command event.
    pub fn id(self) -> u32 {
        match self {
            MenuCommand::About => ID_ABOUT,
            MenuCommand::Exit => ID_EXIT,
            MenuCommand::CloseWindow => ID_CLOSE,
            MenuCommand::RestoreWindow => ID_RESTORE,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            ID_ABOUT => Some(MenuCommand::About),
            ID_EXIT => Some(MenuCommand::Exit),
            ID_CLOSE => Some(MenuCommand::CloseWindow),
            ID_RESTORE => Some(MenuCommand::RestoreWindow),
            _ => None,
        }
    }
}

/// One entry of the popup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuItem {
    Separator,
    Command {
        command: MenuCommand,
        label: &'static str,
    },
}

/// The fixed tray popup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrayMenu {
    items: Vec<MenuItem>,
}

impl TrayMenu {
    /// The one menu this program shows: program entries first, then the
    /// per-window actions below a separator.
    pub fn standard() -> Self {
        Self {
            items: vec![
                MenuItem::Command {
                    command: MenuCommand::About,
                    label: "About Trayward",
                },
                MenuItem::Command {
                    command: MenuCommand::Exit,
                    label: "Exit Trayward",
                },
                MenuItem::Separator,
                MenuItem::Command {
                    command: MenuCommand::CloseWindow,
                    label: "Close Window",
                },
                MenuItem::Command {
                    command: MenuCommand::RestoreWindow,
                    label: "Restore Window",
                },
            ],
        }
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }
}

/// Text behind the About entry.
pub fn about_text() -> String {
    format!(
        "Trayward {}\nMinimize any window to the notification area.",
        env!("CARGO_PKG_VERSION")
    )
}

/// Menu display errors.
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("failed to create the popup menu")]
    Create,

    #[error("failed to display the popup menu")]
    Display,
}

/// Platform side of the popup: build it, show it at the pointer with the
/// dispatcher window granted temporary foreground status, block until the
/// user picks or dismisses, destroy it. Also carries the blocking user
/// notice used for About and startup failures.
pub trait MenuHost {
    fn show_menu(&mut self, menu: &TrayMenu) -> Result<(), MenuError>;

    fn notice(&mut self, message: &str);
}
