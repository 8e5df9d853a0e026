//! Contract with the external minimize-hook collaborator.
//!
//! The hook is a separately loaded module that watches minimize-box
//! activation on arbitrary windows and posts add/remove/refresh requests
//! into the dispatcher's event stream. The core knows nothing about how
//! the interception works; it only registers, unregisters, and consumes
//! the posted events.

use thiserror::Error;

/// Hook collaborator lifecycle errors.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to load hook library '{library}': {reason}")]
    Load { library: String, reason: String },

    #[error("hook library '{library}' is missing export '{export}'")]
    MissingExport { library: String, export: String },

    #[error("hook registration was rejected by the library")]
    Rejected,
}

/// Register/unregister pair of the hook collaborator.
///
/// `unregister` must be idempotent: teardown can run more than once when
/// the dispatcher window is destroyed after an explicit exit.
pub trait MinimizeHook {
    fn register(&mut self) -> Result<(), HookError>;

    fn unregister(&mut self);
}

/// Stand-in used with `--no-hook`: nothing is intercepted, tray operation
/// happens only through the hotkey.
#[derive(Debug, Default)]
pub struct NullHook;

impl MinimizeHook for NullHook {
    fn register(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    fn unregister(&mut self) {}
}
