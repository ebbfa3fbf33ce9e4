pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

/// 設定ファイルを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "FLEETSCALE_CONFIG_PATH";

const CANDIDATES: [&str; 4] = ["fleet.local.kdl", ".fleet.local.kdl", "fleet.kdl", ".fleet.kdl"];

/// カレントディレクトリを起点にプロジェクトのfleet.kdlを探す
pub fn find_fleet_file() -> Result<PathBuf> {
    let current_dir = std::env::current_dir()?;
    find_fleet_file_in(&current_dir)
}

/// フリート設定ファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 FLEETSCALE_CONFIG_PATH (直接パス指定)
/// 2. `dir`: fleet.local.kdl, .fleet.local.kdl, fleet.kdl, .fleet.kdl
/// 3. `dir/.fleetscale/` ディレクトリ内: 同様の順序
/// 4. ~/.config/fleetscale/fleet.kdl (グローバル設定)
pub fn find_fleet_file_in(dir: &Path) -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(&config_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::ConfigPathMissing(config_path));
    }

    // 2. 指定ディレクトリで検索
    if let Some(path) = first_candidate(dir) {
        return Ok(path);
    }

    // 3. ./.fleetscale/ ディレクトリで検索
    let project_dir = dir.join(".fleetscale");
    if project_dir.is_dir()
        && let Some(path) = first_candidate(&project_dir)
    {
        return Ok(path);
    }

    // 4. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("fleetscale").join("fleet.kdl");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::FleetFileNotFound)
}

fn first_candidate(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}
