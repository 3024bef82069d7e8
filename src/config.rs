/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::player::PlayerTuning;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub tuning: TuningConfig,
    pub gamepad: GamepadConfig,
    /// Story file, if one was found here or in the levels directory.
    pub story: Option<PathBuf>,
    pub log: LogConfig,
}

#[derive(Clone, Debug)]
pub struct TimingConfig {
    pub tick_rate_ms: u64,
}

impl TimingConfig {
    /// Seconds of simulated time per tick.
    pub fn elapsed_s(&self) -> f32 {
        self.tick_rate_ms as f32 / 1000.0
    }
}

#[derive(Clone, Debug)]
pub struct TuningConfig {
    pub max_run_speed: f32,
    pub climb_speed: f32,
    pub sliding_speed: f32, // px per second
    pub door_speed: f32,    // px per second
    pub initial_water_level: u32,
}

impl TuningConfig {
    pub fn player(&self) -> PlayerTuning {
        PlayerTuning { max_speed: self.max_run_speed, climb_speed: self.climb_speed }
    }
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub jump: Vec<String>,
    pub interact: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub respawn: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub file: PathBuf,
    pub filter: String,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    tuning: TomlTuning,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    log: TomlLog,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlTuning {
    #[serde(default = "default_max_run_speed")]
    max_run_speed: f32,
    #[serde(default = "default_climb_speed")]
    climb_speed: f32,
    #[serde(default = "default_sliding_speed")]
    sliding_speed: f32,
    #[serde(default = "default_door_speed")]
    door_speed: f32,
    #[serde(default = "default_water_level")]
    initial_water_level: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_jump")]
    jump: Vec<String>,
    #[serde(default = "default_interact")]
    interact: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
    #[serde(default = "default_respawn")]
    respawn: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default = "default_story")]
    story: String,
}

#[derive(Deserialize, Debug)]
struct TomlLog {
    #[serde(default = "default_log_file")]
    file: String,
    #[serde(default = "default_log_filter")]
    filter: String,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 40 }
fn default_max_run_speed() -> f32 { 8.0 }
fn default_climb_speed() -> f32 { 4.0 }
fn default_sliding_speed() -> f32 { 100.0 }
fn default_door_speed() -> f32 { 100.0 }
fn default_water_level() -> u32 { 3 }

fn default_jump() -> Vec<String> { vec!["A".into(), "DPadUp".into()] }
fn default_interact() -> Vec<String> { vec!["X".into(), "B".into()] }
fn default_confirm() -> Vec<String> { vec!["Start".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }
fn default_respawn() -> Vec<String> { vec!["Y".into()] }
fn default_levels_dir() -> String { "levels".into() }
fn default_story() -> String { "story.txt".into() }
fn default_log_file() -> String { "playdead.log".into() }
fn default_log_filter() -> String { "info".into() }

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming { tick_rate_ms: default_tick_rate() }
    }
}

impl Default for TomlTuning {
    fn default() -> Self {
        TomlTuning {
            max_run_speed: default_max_run_speed(),
            climb_speed: default_climb_speed(),
            sliding_speed: default_sliding_speed(),
            door_speed: default_door_speed(),
            initial_water_level: default_water_level(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            jump: default_jump(),
            interact: default_interact(),
            confirm: default_confirm(),
            cancel: default_cancel(),
            respawn: default_respawn(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral { levels_dir: default_levels_dir(), story: default_story() }
    }
}

impl Default for TomlLog {
    fn default() -> Self {
        TomlLog { file: default_log_file(), filter: default_log_filter() }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::resolve(toml_cfg, &search_dirs)
    }

    fn resolve(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let levels_dir = find_in(search_dirs, &toml_cfg.general.levels_dir, Path::is_dir)
            .unwrap_or_else(|| PathBuf::from(&toml_cfg.general.levels_dir));

        // A story path is looked up as given, then inside the levels dir.
        let story = find_in(search_dirs, &toml_cfg.general.story, Path::is_file)
            .or_else(|| Some(levels_dir.join(&toml_cfg.general.story)).filter(|p| p.is_file()));

        GameConfig {
            timing: TimingConfig { tick_rate_ms: toml_cfg.timing.tick_rate_ms.max(1) },
            tuning: TuningConfig {
                max_run_speed: toml_cfg.tuning.max_run_speed,
                climb_speed: toml_cfg.tuning.climb_speed,
                sliding_speed: toml_cfg.tuning.sliding_speed,
                door_speed: toml_cfg.tuning.door_speed,
                initial_water_level: toml_cfg.tuning.initial_water_level,
            },
            gamepad: GamepadConfig {
                jump: toml_cfg.gamepad.jump,
                interact: toml_cfg.gamepad.interact,
                confirm: toml_cfg.gamepad.confirm,
                cancel: toml_cfg.gamepad.cancel,
                respawn: toml_cfg.gamepad.respawn,
            },
            story,
            log: LogConfig {
                file: PathBuf::from(toml_cfg.log.file),
                filter: toml_cfg.log.filter,
            },
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::resolve(TomlConfig::default(), &[])
    }
}

/// Absolute paths are taken as-is; relative ones are searched for.
fn find_in(search_dirs: &[PathBuf], name: &str, exists: fn(&Path) -> bool) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_absolute() {
        return Some(path).filter(|p| exists(p));
    }
    search_dirs.iter().map(|d| d.join(name)).find(|p| exists(p))
}

/// Candidate directories to search: exe dir + CWD + XDG data (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/playdead)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/playdead");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        eprintln!("Warning: config.toml parse error: {e}");
                        eprintln!("Using default settings.");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    eprintln!("Warning: could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let cfg: TomlConfig = toml::from_str("[tuning]\nmax_run_speed = 12.0\n").unwrap();
        let cfg = GameConfig::resolve(cfg, &[]);
        assert_eq!(cfg.tuning.max_run_speed, 12.0);
        assert_eq!(cfg.tuning.sliding_speed, 100.0);
        assert_eq!(cfg.tuning.initial_water_level, 3);
        assert_eq!(cfg.timing.tick_rate_ms, 40);
        assert_eq!(cfg.log.filter, "info");
        assert_eq!(cfg.gamepad.jump, vec!["A".to_string(), "DPadUp".to_string()]);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg: TomlConfig = toml::from_str("").unwrap();
        let cfg = GameConfig::resolve(cfg, &[]);
        assert!(cfg.story.is_none());
        assert_eq!(cfg.log.file, PathBuf::from("playdead.log"));
        assert!((cfg.timing.elapsed_s() - 0.04).abs() < 1e-6);
        assert_eq!(cfg.tuning.player().max_speed, 8.0);
    }

    #[test]
    fn zero_tick_rate_is_clamped() {
        let cfg: TomlConfig = toml::from_str("[timing]\ntick_rate_ms = 0\n").unwrap();
        assert_eq!(GameConfig::resolve(cfg, &[]).timing.tick_rate_ms, 1);
    }
}
