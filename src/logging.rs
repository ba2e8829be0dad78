// パス: src/logging.rs
// 役割: tracing の購読者（fmt レイヤ）を初期化する
// 意図: バイナリから 1 度だけ呼ばれる。ライブラリ側は購読者を設定しない
// 関連ファイル: src/bin/replc.rs, src/config.rs

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

/// `"trace" | "debug" | "info" | "warn" | "error" | "off"` を解釈する。未知の値は `warn`。
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::WARN,
    }
}

/// `[LEVEL] message` 形式（時刻・ターゲット・色なし）で標準エラーへ出力する。
/// 既に購読者が設定済みなら何もしない。
pub fn init(level: &str) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_level(true)
        .with_ansi(false)
        .compact()
        .with_filter(parse_level(level));
    let _ = Registry::default().with(layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_and_defaults_to_warn() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::DEBUG);
        assert_eq!(parse_level(" off "), LevelFilter::OFF);
        assert_eq!(parse_level("loud"), LevelFilter::WARN);
    }

    #[test]
    /// 2 回目の初期化は無視される。
    fn init_is_idempotent() {
        init("error");
        init("debug");
    }
}
