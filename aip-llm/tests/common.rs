use std::sync::OnceLock;

use aip_common::observability::{LogConfig, LogFormat};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let dir = std::env::temp_dir().join("aip-llm-tests");
        let config = LogConfig {
            app_name: "aip-llm-tests",
            log_dir: Some(dir),
            emit_stderr: true,
            format: if std::env::var("AIP_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug".to_string(),
        };

        aip_common::observability::init_logging(config).unwrap_or_default()
    });
}
