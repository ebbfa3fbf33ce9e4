use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: fleet.local.kdl, .fleet.local.kdl, fleet.kdl, .fleet.kdl\n\
        - ./.fleetscale/ ディレクトリ\n\
        - ~/.config/fleetscale/fleet.kdl\n\
        または FLEETSCALE_CONFIG_PATH 環境変数で直接指定できます"
    )]
    FleetFileNotFound,

    #[error("FLEETSCALE_CONFIG_PATH の指すファイルが存在しません: {0}")]
    ConfigPathMissing(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
