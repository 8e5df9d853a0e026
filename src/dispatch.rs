//! Central event dispatch: one closed event set, one entry point.
//!
//! Every stimulus (hook request, shell callback, hotkey, menu command,
//! shell restart, teardown) is translated into an [`Event`] and fed
//! through [`Dispatcher::handle`]. One event is fully processed before
//! the next is read, so the registry and icon set see a single writer by
//! construction.

use log::{debug, warn};

use crate::engine::TrayEngine;
use crate::hook::MinimizeHook;
use crate::menu::{about_text, MenuCommand, MenuHost, TrayMenu};
use crate::platform::{NotifyArea, WindowId, WindowSystem};
use crate::registry::SlotIndex;

/// Sub-events a tray icon callback can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrayCallback {
    /// Icon selected or activated.
    Select,
    /// Context menu requested on the icon.
    ContextMenu,
    /// Pointer moved over the icon.
    PointerMove,
}

/// The closed set of events the dispatcher consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// Hook collaborator: a window's minimize box was activated.
    AddRequest(WindowId),
    /// Hook collaborator: restore this window.
    RemoveRequest(WindowId),
    /// Hook collaborator: reconcile this window's tray state.
    RefreshRequest(WindowId),
    /// Shell callback on the icon registered under `slot`.
    TrayIcon {
        slot: SlotIndex,
        callback: TrayCallback,
    },
    /// The global hotkey fired.
    Hotkey,
    /// A menu selection came back through the host.
    Command(MenuCommand),
    /// The shell's notification area was recreated.
    ShellRestarted,
    /// Final cleanup before the loop exits.
    Teardown,
}

/// What the event loop should do after an event was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

/// The event dispatcher: owns the engine, the menu host, the hook
/// collaborator, and the single menu-target reference.
pub struct Dispatcher<P, M, H> {
    engine: TrayEngine<P>,
    menu: M,
    hook: H,
    menu_target: Option<WindowId>,
}

impl<P, M, H> Dispatcher<P, M, H>
where
    P: WindowSystem + NotifyArea,
    M: MenuHost,
    H: MinimizeHook,
{
    pub fn new(engine: TrayEngine<P>, menu: M, hook: H) -> Self {
        Self {
            engine,
            menu,
            hook,
            menu_target: None,
        }
    }

    pub fn engine(&self) -> &TrayEngine<P> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TrayEngine<P> {
        &mut self.engine
    }

    /// The single message-handling entry point.
    pub fn handle(&mut self, event: Event) -> LoopControl {
        match event {
            Event::AddRequest(window) => {
                self.engine.minimize_to_tray(window);
            }
            Event::RemoveRequest(window) => {
                self.engine.restore_from_tray(window);
            }
            Event::RefreshRequest(window) => {
                self.engine.refresh_in_tray(window);
            }
            Event::TrayIcon { slot, callback } => self.handle_tray_icon(slot, callback),
            Event::Hotkey => self.handle_hotkey(),
            Event::Command(command) => return self.handle_command(command),
            Event::ShellRestarted => {
                debug!("notification area recreated, re-registering icons");
                self.engine.re_add_all();
            }
            Event::Teardown => return self.teardown(),
        }
        LoopControl::Continue
    }

    fn handle_tray_icon(&mut self, slot: SlotIndex, callback: TrayCallback) {
        let Some(window) = self.engine.window_at(slot) else {
            // Stale callback for an already-cleared slot.
            debug!("ignoring tray callback for empty slot {}", slot.index());
            return;
        };
        match callback {
            TrayCallback::Select => {
                self.engine.restore_from_tray(window);
            }
            TrayCallback::ContextMenu => {
                self.menu_target = Some(window);
                if let Err(err) = self.menu.show_menu(&TrayMenu::standard()) {
                    warn!("could not show tray menu: {err}");
                    self.menu_target = None;
                }
            }
            TrayCallback::PointerMove => {
                self.engine.refresh_in_tray(window);
            }
        }
    }

    fn handle_hotkey(&mut self) {
        let Some(foreground) = self.engine.platform().foreground_window() else {
            return;
        };
        if !self.engine.platform().has_minimize_box(foreground) {
            debug!("foreground window has no minimize box, ignoring hotkey");
            return;
        }
        self.engine.minimize_to_tray(foreground);
    }

    fn handle_command(&mut self, command: MenuCommand) -> LoopControl {
        match command {
            MenuCommand::RestoreWindow => {
                if let Some(window) = self.menu_target.take() {
                    self.engine.restore_from_tray(window);
                }
            }
            MenuCommand::CloseWindow => {
                if let Some(window) = self.menu_target.take() {
                    self.engine.close_from_tray(window);
                }
            }
            MenuCommand::About => {
                self.menu_target = None;
                self.menu.notice(&about_text());
            }
            MenuCommand::Exit => return self.teardown(),
        }
        LoopControl::Continue
    }

    /// Best-effort cleanup: every tracked window is restored so no icon
    /// outlives the process, then the hook collaborator is unregistered.
    /// Idempotent: window destruction can route through here twice.
    fn teardown(&mut self) -> LoopControl {
        let tracked: Vec<WindowId> = self
            .engine
            .registry()
            .occupied()
            .map(|(_, window)| window)
            .collect();
        for window in tracked {
            self.engine.restore_from_tray(window);
        }
        self.hook.unregister();
        LoopControl::Quit
    }
}
