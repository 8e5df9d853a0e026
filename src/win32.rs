//! Win32 implementations of the platform traits, plus process bootstrap:
//! single-instance check, hook library loading, window class, hotkey
//! registration, and the message loop that feeds the dispatcher.
//!
//! This is the only module that touches the OS. Messages arriving at the
//! dispatcher window are translated into [`Event`] values; the dispatcher
//! context hangs off the window's user data, so there is no ambient global
//! state.

use std::ffi::c_void;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use windows::core::{w, PCSTR, PCWSTR};
use windows::Win32::Foundation::{HINSTANCE, HMODULE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::{
    FreeLibrary, GetModuleHandleW, GetProcAddress, LoadLibraryW,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS,
};
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NIM_MODIFY,
    NIM_SETVERSION, NIN_SELECT, NOTIFYICONDATAW, NOTIFYICON_VERSION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, CreateWindowExW, DefWindowProcW, DestroyMenu, DestroyWindow,
    DispatchMessageW, FindWindowW, GetAncestor, GetClassLongPtrW, GetCursorPos,
    GetForegroundWindow, GetMessageW, GetWindowLongPtrW, GetWindowTextW, IsWindow,
    IsWindowVisible, LoadIconW, MessageBoxW, PostMessageW, PostQuitMessage, RegisterClassW,
    RegisterWindowMessageW, SendMessageW, SetForegroundWindow, SetWindowLongPtrW, ShowWindow,
    TrackPopupMenu, TranslateMessage, GA_ROOT, GCLP_HICON, GCLP_HICONSM, GWLP_USERDATA,
    GWL_EXSTYLE, GWL_STYLE, HICON, HMENU, ICON_BIG, ICON_SMALL, IDI_WINLOGO, MB_ICONERROR,
    MB_ICONINFORMATION, MB_OK, MESSAGEBOX_STYLE, MF_SEPARATOR, MF_STRING, MSG, SW_HIDE,
    SW_MINIMIZE, SW_RESTORE, SW_SHOW, TPM_BOTTOMALIGN, TPM_LEFTBUTTON, TPM_RIGHTALIGN,
    TPM_RIGHTBUTTON, WINDOW_EX_STYLE, WM_APP, WM_CLOSE, WM_COMMAND, WM_CONTEXTMENU, WM_DESTROY,
    WM_GETICON, WM_HOTKEY, WM_MOUSEMOVE, WM_NULL, WNDCLASSW, WS_CHILD, WS_EX_MDICHILD,
    WS_MINIMIZEBOX, WS_OVERLAPPED,
};

use crate::config::AppConfig;
use crate::dispatch::{Dispatcher, Event, LoopControl, TrayCallback};
use crate::engine::{ClosePoll, TrayEngine};
use crate::hook::{HookError, MinimizeHook, NullHook};
use crate::hotkey;
use crate::menu::{MenuCommand, MenuError, MenuHost, MenuItem, TrayMenu};
use crate::platform::{IconDescriptor, IconHandle, NotifyArea, ShellError, WindowId, WindowSystem};
use crate::registry::SlotIndex;

/// Shell callback message carried by every tray icon.
pub const WM_TRAYCMD: u32 = WM_APP + 1;
/// Hook collaborator contract: minimize this window (lParam = HWND).
pub const WM_TRAY_ADD: u32 = WM_APP + 2;
/// Hook collaborator contract: restore this window (lParam = HWND).
pub const WM_TRAY_REMOVE: u32 = WM_APP + 3;
/// Hook collaborator contract: reconcile this window (lParam = HWND).
pub const WM_TRAY_REFRESH: u32 = WM_APP + 4;

const HOTKEY_ID: i32 = 0;
const WINDOW_CLASS: PCWSTR = w!("Trayward");

/// Command-line switches relevant to bootstrap.
#[derive(Debug, Clone, Copy)]
pub struct LaunchOptions {
    /// Signal a running instance to terminate instead of starting.
    pub request_exit: bool,
    /// Skip hook registration (hotkey-only operation).
    pub use_hook: bool,
}

/// Fatal startup failures. Each is also surfaced as a blocking notice.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("failed to register the dispatcher window class")]
    ClassRegistration,

    #[error("failed to create the dispatcher window: {0}")]
    WindowCreation(String),
}

fn hwnd_of(window: WindowId) -> HWND {
    HWND(window.as_raw() as *mut c_void)
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn message_box(text: &str, style: MESSAGEBOX_STYLE) {
    let wide = to_wide(text);
    unsafe {
        MessageBoxW(None, PCWSTR(wide.as_ptr()), w!("Trayward"), MB_OK | style);
    }
}

/// The live window system.
pub struct Win32Platform {
    dispatcher: HWND,
}

impl Win32Platform {
    pub fn new(dispatcher: HWND) -> Self {
        Self { dispatcher }
    }

    fn notify_data(&self, slot: SlotIndex) -> NOTIFYICONDATAW {
        let mut nid: NOTIFYICONDATAW = unsafe { std::mem::zeroed() };
        nid.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        nid.hWnd = self.dispatcher;
        nid.uID = slot.index() as u32;
        nid
    }
}

fn copy_tooltip(nid: &mut NOTIFYICONDATAW, tooltip: &str) {
    let tip: Vec<u16> = tooltip.encode_utf16().collect();
    let len = tip.len().min(nid.szTip.len() - 1);
    nid.szTip[..len].copy_from_slice(&tip[..len]);
}

impl WindowSystem for Win32Platform {
    fn exists(&self, window: WindowId) -> bool {
        unsafe { IsWindow(Some(hwnd_of(window))).as_bool() }
    }

    fn is_visible(&self, window: WindowId) -> bool {
        unsafe { IsWindowVisible(hwnd_of(window)).as_bool() }
    }

    fn title(&self, window: WindowId) -> String {
        let mut buf = [0u16; 256];
        let len = unsafe { GetWindowTextW(hwnd_of(window), &mut buf) };
        String::from_utf16_lossy(&buf[..len.max(0) as usize])
    }

    /// Preference order mirrors what the taskbar itself would show: the
    /// window's small icon, its large icon, the class icons, and finally
    /// a stock fallback.
    fn icon(&self, window: WindowId) -> IconHandle {
        let hwnd = hwnd_of(window);
        unsafe {
            let small = SendMessageW(hwnd, WM_GETICON, WPARAM(ICON_SMALL as usize), LPARAM(0));
            if small.0 != 0 {
                return IconHandle::from_raw(small.0);
            }
            let big = SendMessageW(hwnd, WM_GETICON, WPARAM(ICON_BIG as usize), LPARAM(0));
            if big.0 != 0 {
                return IconHandle::from_raw(big.0);
            }
            let class_small = GetClassLongPtrW(hwnd, GCLP_HICONSM);
            if class_small != 0 {
                return IconHandle::from_raw(class_small as isize);
            }
            let class_big = GetClassLongPtrW(hwnd, GCLP_HICON);
            if class_big != 0 {
                return IconHandle::from_raw(class_big as isize);
            }
            match LoadIconW(None, IDI_WINLOGO) {
                Ok(icon) => IconHandle::from_raw(icon.0 as isize),
                Err(_) => IconHandle::default(),
            }
        }
    }

    fn is_mdi_child(&self, window: WindowId) -> bool {
        let exstyle = unsafe { GetWindowLongPtrW(hwnd_of(window), GWL_EXSTYLE) } as u32;
        exstyle & WS_EX_MDICHILD.0 != 0
    }

    fn is_child(&self, window: WindowId) -> bool {
        let style = unsafe { GetWindowLongPtrW(hwnd_of(window), GWL_STYLE) } as u32;
        style & WS_CHILD.0 != 0
    }

    fn top_level_ancestor(&self, window: WindowId) -> WindowId {
        let root = unsafe { GetAncestor(hwnd_of(window), GA_ROOT) };
        WindowId::from_raw(root.0 as isize)
    }

    fn has_minimize_box(&self, window: WindowId) -> bool {
        let style = unsafe { GetWindowLongPtrW(hwnd_of(window), GWL_STYLE) } as u32;
        style & WS_MINIMIZEBOX.0 != 0
    }

    fn foreground_window(&self) -> Option<WindowId> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.is_invalid() {
            None
        } else {
            Some(WindowId::from_raw(hwnd.0 as isize))
        }
    }

    fn minimize(&mut self, window: WindowId) {
        unsafe {
            let _ = ShowWindow(hwnd_of(window), SW_MINIMIZE);
        }
    }

    fn hide(&mut self, window: WindowId) {
        unsafe {
            let _ = ShowWindow(hwnd_of(window), SW_HIDE);
        }
    }

    fn restore(&mut self, window: WindowId) {
        unsafe {
            let _ = ShowWindow(hwnd_of(window), SW_RESTORE);
        }
    }

    fn show(&mut self, window: WindowId) {
        unsafe {
            let _ = ShowWindow(hwnd_of(window), SW_SHOW);
        }
    }

    fn set_foreground(&mut self, window: WindowId) {
        unsafe {
            let _ = SetForegroundWindow(hwnd_of(window));
        }
    }

    fn request_close(&mut self, window: WindowId) {
        // PostMessage, not SendMessage: a close prompt must not block the
        // event loop, and Explorer windows ignore a sent WM_CLOSE anyway.
        unsafe {
            let _ = PostMessageW(Some(hwnd_of(window)), WM_CLOSE, WPARAM(0), LPARAM(0));
        }
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl NotifyArea for Win32Platform {
    fn add(&mut self, descriptor: &IconDescriptor) -> Result<(), ShellError> {
        let mut nid = self.notify_data(descriptor.slot);
        nid.uFlags = NIF_MESSAGE | NIF_ICON | NIF_TIP;
        nid.uCallbackMessage = WM_TRAYCMD;
        nid.hIcon = HICON(descriptor.icon.as_raw() as *mut c_void);
        copy_tooltip(&mut nid, &descriptor.tooltip);
        if unsafe { Shell_NotifyIconW(NIM_ADD, &nid) }.as_bool() {
            Ok(())
        } else {
            Err(ShellError {
                operation: "add",
                slot: descriptor.slot.index(),
            })
        }
    }

    fn set_version(&mut self, slot: SlotIndex) -> Result<(), ShellError> {
        let mut nid = self.notify_data(slot);
        nid.Anonymous.uVersion = NOTIFYICON_VERSION;
        if unsafe { Shell_NotifyIconW(NIM_SETVERSION, &nid) }.as_bool() {
            Ok(())
        } else {
            Err(ShellError {
                operation: "set_version",
                slot: slot.index(),
            })
        }
    }

    fn modify_tooltip(&mut self, slot: SlotIndex, tooltip: &str) -> Result<(), ShellError> {
        let mut nid = self.notify_data(slot);
        nid.uFlags = NIF_TIP;
        copy_tooltip(&mut nid, tooltip);
        if unsafe { Shell_NotifyIconW(NIM_MODIFY, &nid) }.as_bool() {
            Ok(())
        } else {
            Err(ShellError {
                operation: "modify",
                slot: slot.index(),
            })
        }
    }

    fn delete(&mut self, slot: SlotIndex) -> Result<(), ShellError> {
        let nid = self.notify_data(slot);
        if unsafe { Shell_NotifyIconW(NIM_DELETE, &nid) }.as_bool() {
            Ok(())
        } else {
            Err(ShellError {
                operation: "delete",
                slot: slot.index(),
            })
        }
    }
}

/// Popup menu and notices over the dispatcher window.
pub struct Win32MenuHost {
    dispatcher: HWND,
}

impl Win32MenuHost {
    pub fn new(dispatcher: HWND) -> Self {
        Self { dispatcher }
    }
}

impl MenuHost for Win32MenuHost {
    fn show_menu(&mut self, menu: &TrayMenu) -> Result<(), MenuError> {
        unsafe {
            let popup: HMENU = CreatePopupMenu().map_err(|_| MenuError::Create)?;

            // Label buffers must outlive TrackPopupMenu.
            let mut labels: Vec<Vec<u16>> = Vec::new();
            for item in menu.items() {
                match item {
                    MenuItem::Separator => {
                        let _ = AppendMenuW(popup, MF_SEPARATOR, 0, PCWSTR::null());
                    }
                    MenuItem::Command { command, label } => {
                        labels.push(to_wide(label));
                        let wide = labels.last().unwrap();
                        let _ = AppendMenuW(
                            popup,
                            MF_STRING,
                            command.id() as usize,
                            PCWSTR(wide.as_ptr()),
                        );
                    }
                }
            }

            let mut point = std::mem::zeroed();
            let _ = GetCursorPos(&mut point);
            // Required: foreground status so the popup dismisses on
            // outside clicks.
            let _ = SetForegroundWindow(self.dispatcher);
            let shown = TrackPopupMenu(
                popup,
                TPM_LEFTBUTTON | TPM_RIGHTBUTTON | TPM_RIGHTALIGN | TPM_BOTTOMALIGN,
                point.x,
                point.y,
                0,
                self.dispatcher,
                None,
            );
            // Benign nudge so the menu closes even when dismissed by a
            // click elsewhere (foreground-window workaround).
            let _ = PostMessageW(Some(self.dispatcher), WM_NULL, WPARAM(0), LPARAM(0));
            let _ = DestroyMenu(popup);

            if shown.as_bool() {
                Ok(())
            } else {
                Err(MenuError::Display)
            }
        }
    }

    fn notice(&mut self, message: &str) {
        message_box(message, MB_ICONINFORMATION);
    }
}

type RegisterHookFn = unsafe extern "system" fn(HMODULE) -> i32;
type UnregisterHookFn = unsafe extern "system" fn() -> i32;

/// Hook collaborator backed by the external DLL.
pub struct DllHook {
    module: Option<HMODULE>,
    register: RegisterHookFn,
    unregister: UnregisterHookFn,
    registered: bool,
}

impl DllHook {
    /// Load the hook library and resolve its register/unregister exports.
    pub fn load(library: &str) -> Result<Self, HookError> {
        let wide = to_wide(library);
        let module = unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) }.map_err(|e| {
            HookError::Load {
                library: library.to_string(),
                reason: e.to_string(),
            }
        })?;

        let resolve = |export: &'static str, name: PCSTR| {
            unsafe { GetProcAddress(module, name) }.ok_or_else(|| HookError::MissingExport {
                library: library.to_string(),
                export: export.to_string(),
            })
        };
        let register = resolve("RegisterHook", PCSTR(b"RegisterHook\0".as_ptr()))?;
        let unregister = resolve("UnRegisterHook", PCSTR(b"UnRegisterHook\0".as_ptr()))?;

        Ok(Self {
            module: Some(module),
            register: unsafe { std::mem::transmute::<_, RegisterHookFn>(register) },
            unregister: unsafe { std::mem::transmute::<_, UnregisterHookFn>(unregister) },
            registered: false,
        })
    }
}

impl MinimizeHook for DllHook {
    fn register(&mut self) -> Result<(), HookError> {
        let Some(module) = self.module else {
            return Err(HookError::Rejected);
        };
        if unsafe { (self.register)(module) } == 0 {
            return Err(HookError::Rejected);
        }
        self.registered = true;
        Ok(())
    }

    fn unregister(&mut self) {
        let Some(module) = self.module.take() else {
            return;
        };
        if self.registered {
            unsafe {
                (self.unregister)();
            }
            self.registered = false;
        }
        unsafe {
            let _ = FreeLibrary(module);
        }
    }
}

/// Either hook flavour, picked at startup.
pub enum HookKind {
    Dll(DllHook),
    Null(NullHook),
}

impl MinimizeHook for HookKind {
    fn register(&mut self) -> Result<(), HookError> {
        match self {
            HookKind::Dll(hook) => hook.register(),
            HookKind::Null(hook) => hook.register(),
        }
    }

    fn unregister(&mut self) {
        match self {
            HookKind::Dll(hook) => hook.unregister(),
            HookKind::Null(hook) => hook.unregister(),
        }
    }
}

/// Context attached to the dispatcher window's user data.
struct WndContext {
    dispatcher: Dispatcher<Win32Platform, Win32MenuHost, HookKind>,
    taskbar_created: u32,
}

fn close_poll(config: &AppConfig) -> ClosePoll {
    ClosePoll {
        first_delay: Duration::from_millis(config.close.first_delay_ms),
        second_delay: Duration::from_millis(config.close.second_delay_ms),
    }
}

/// Bootstrap and run the event loop until teardown.
pub fn run(options: LaunchOptions, config: AppConfig) -> Result<(), SetupError> {
    // A second instance never runs standalone.
    let existing = unsafe { FindWindowW(WINDOW_CLASS, WINDOW_CLASS) };
    if let Some(existing) = existing.ok().filter(|hwnd| !hwnd.is_invalid()) {
        if options.request_exit {
            info!("asking the running instance to exit");
            unsafe {
                SendMessageW(existing, WM_CLOSE, WPARAM(0), LPARAM(0));
            }
        } else {
            message_box("Trayward is already running.", MB_ICONINFORMATION);
        }
        return Ok(());
    }
    if options.request_exit {
        info!("no running instance to exit");
        return Ok(());
    }

    let hook = if options.use_hook && config.hook.enabled {
        let mut hook = DllHook::load(&config.hook.library).map_err(|err| {
            message_box(&format!("Error loading {}.", config.hook.library), MB_ICONERROR);
            err
        })?;
        hook.register().map_err(|err| {
            message_box("Error setting the minimize hook.", MB_ICONERROR);
            err
        })?;
        HookKind::Dll(hook)
    } else {
        info!("running without the minimize hook");
        HookKind::Null(NullHook)
    };

    let hinstance: HINSTANCE = unsafe { GetModuleHandleW(None) }
        .map_err(|e| SetupError::WindowCreation(e.to_string()))?
        .into();

    let wc = WNDCLASSW {
        lpfnWndProc: Some(wndproc),
        hInstance: hinstance,
        lpszClassName: WINDOW_CLASS,
        ..Default::default()
    };
    if unsafe { RegisterClassW(&wc) } == 0 {
        message_box("Error creating the window class.", MB_ICONERROR);
        return Err(SetupError::ClassRegistration);
    }

    let hwnd = unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            WINDOW_CLASS,
            WINDOW_CLASS,
            WS_OVERLAPPED,
            0,
            0,
            0,
            0,
            None,
            None,
            Some(hinstance),
            None,
        )
    }
    .map_err(|e| {
        message_box("Error creating the dispatcher window.", MB_ICONERROR);
        SetupError::WindowCreation(e.to_string())
    })?;

    // Observed by name here, matched by value in the loop.
    let taskbar_created = unsafe { RegisterWindowMessageW(w!("TaskbarCreated")) };

    let mut hotkey_registered = false;
    if config.hotkey.enabled {
        match hotkey::parse_hotkey(&config.hotkey.binding) {
            Ok(binding) => {
                let result = unsafe {
                    RegisterHotKey(
                        Some(hwnd),
                        HOTKEY_ID,
                        HOT_KEY_MODIFIERS(binding.modifier_bits()),
                        binding.key.virtual_key(),
                    )
                };
                match result {
                    Ok(()) => hotkey_registered = true,
                    Err(err) => {
                        // Non-fatal: hook/manual operation still works.
                        warn!("could not register hotkey '{}': {err}", config.hotkey.binding);
                        message_box("Could not register the minimize hotkey.", MB_ICONERROR);
                    }
                }
            }
            Err(err) => warn!("invalid hotkey binding: {err}"),
        }
    }

    let engine = TrayEngine::new(Win32Platform::new(hwnd), close_poll(&config));
    let mut context = Box::new(WndContext {
        dispatcher: Dispatcher::new(engine, Win32MenuHost::new(hwnd), hook),
        taskbar_created,
    });
    unsafe {
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, &mut *context as *mut WndContext as isize);
    }

    info!("dispatcher window ready, entering event loop");
    let mut msg = MSG::default();
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).into() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    if hotkey_registered {
        unsafe {
            let _ = UnregisterHotKey(Some(hwnd), HOTKEY_ID);
        }
    }

    Ok(())
}

fn deliver(context: &mut WndContext, hwnd: HWND, event: Event) {
    if context.dispatcher.handle(event) == LoopControl::Quit {
        unsafe {
            let _ = DestroyWindow(hwnd);
        }
    }
}

unsafe extern "system" fn wndproc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let context = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *mut WndContext;
    let Some(context) = (unsafe { context.as_mut() }) else {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    };

    match msg {
        WM_TRAY_ADD => {
            deliver(context, hwnd, Event::AddRequest(WindowId::from_raw(lparam.0)));
        }
        WM_TRAY_REMOVE => {
            deliver(
                context,
                hwnd,
                Event::RemoveRequest(WindowId::from_raw(lparam.0)),
            );
        }
        WM_TRAY_REFRESH => {
            deliver(
                context,
                hwnd,
                Event::RefreshRequest(WindowId::from_raw(lparam.0)),
            );
        }
        WM_TRAYCMD => {
            let Some(slot) = SlotIndex::new(wparam.0) else {
                debug!("tray callback with out-of-range slot {}", wparam.0);
                return LRESULT(0);
            };
            let callback = match lparam.0 as u32 {
                NIN_SELECT => TrayCallback::Select,
                WM_CONTEXTMENU => TrayCallback::ContextMenu,
                WM_MOUSEMOVE => TrayCallback::PointerMove,
                _ => return LRESULT(0),
            };
            deliver(context, hwnd, Event::TrayIcon { slot, callback });
        }
        WM_HOTKEY => {
            deliver(context, hwnd, Event::Hotkey);
        }
        WM_COMMAND => {
            let id = (wparam.0 & 0xFFFF) as u32;
            if let Some(command) = MenuCommand::from_id(id) {
                deliver(context, hwnd, Event::Command(command));
            }
        }
        WM_CLOSE => {
            let _ = DestroyWindow(hwnd);
        }
        WM_DESTROY => {
            // Teardown is idempotent; an explicit Exit already ran it.
            context.dispatcher.handle(Event::Teardown);
            PostQuitMessage(0);
        }
        m if m == context.taskbar_created => {
            deliver(context, hwnd, Event::ShellRestarted);
        }
        _ => return DefWindowProcW(hwnd, msg, wparam, lparam),
    }

    LRESULT(0)
}
