use std::fs;

use serde_json::Value;
use tempfile::TempDir;

use trayward::config::{load_config_from_path, save_config_to_path, AppConfig};
use trayward::hotkey::parse_hotkey;
use trayward::registry::{SlotIndex, WindowRegistry, MAX_TRAY_ITEMS};

#[test]
fn config_file_uses_stable_section_names() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    save_config_to_path(&AppConfig::default(), &path).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    let value: Value = serde_json::from_str(&raw).unwrap();

    // Renaming these sections would silently drop user settings.
    assert!(value.get("schema_version").is_some());
    assert!(value.get("hotkey").is_some());
    assert!(value.get("hook").is_some());
    assert!(value.get("close").is_some());
    assert_eq!(
        value["hotkey"]["binding"].as_str(),
        Some("Ctrl+Alt+Down")
    );
}

#[test]
fn saved_config_round_trips_through_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let mut config = AppConfig::default();
    config.hotkey.binding = "Ctrl+Shift+F9".to_string();
    config.hook.enabled = false;
    config.close.second_delay_ms = 250;
    save_config_to_path(&config, &path).unwrap();

    let loaded = load_config_from_path(&path);
    assert_eq!(loaded.hotkey.binding, "Ctrl+Shift+F9");
    assert!(!loaded.hook.enabled);
    assert_eq!(loaded.close.second_delay_ms, 250);
}

#[test]
fn default_binding_parses_to_ctrl_alt_down() {
    let binding = parse_hotkey(&AppConfig::default().hotkey.binding).unwrap();
    assert!(binding.ctrl);
    assert!(binding.alt);
    assert_eq!(binding.key.virtual_key(), 0x28); // VK_DOWN
}

#[test]
fn registry_capacity_matches_shell_id_range() {
    let registry = WindowRegistry::new();
    assert_eq!(registry.occupied_count(), 0);
    assert_eq!(MAX_TRAY_ITEMS, 64);

    // Slot indices double as shell icon IDs; the valid range is closed.
    assert!(SlotIndex::new(MAX_TRAY_ITEMS - 1).is_some());
    assert!(SlotIndex::new(MAX_TRAY_ITEMS).is_none());
}
