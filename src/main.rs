#![cfg_attr(windows, windows_subsystem = "windows")]

use clap::Parser;

/// Minimize any window to the notification area instead of the taskbar.
#[derive(Debug, Parser)]
#[command(name = "trayward", version, about)]
struct Cli {
    /// Ask an already-running instance to terminate.
    #[arg(long)]
    exit: bool,

    /// Do not register the minimize hook (hotkey-only operation).
    #[arg(long = "no-hook")]
    no_hook: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    #[cfg(windows)]
    {
        let config = trayward::config::load_config();
        let options = trayward::win32::LaunchOptions {
            request_exit: cli.exit,
            use_hook: !cli.no_hook,
        };
        if let Err(err) = trayward::win32::run(options, config) {
            log::error!("startup failed: {err}");
            std::process::exit(1);
        }
    }

    #[cfg(not(windows))]
    {
        let _ = cli;
        eprintln!("trayward drives the Windows notification area and only runs on Windows");
        std::process::exit(1);
    }
}
