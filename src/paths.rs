use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the OCR debug capture directory: `<exe_dir>/debug/screenshots/`
pub fn get_debug_screenshots_dir() -> PathBuf {
    get_exe_dir().join("debug").join("screenshots")
}

/// Returns the cache directory: `<exe_dir>/cache/`
pub fn get_cache_dir() -> PathBuf {
    get_exe_dir().join("cache")
}

/// Returns the default config file path: `<exe_dir>/config.json`
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// Returns the cloud OCR key file path: `<exe_dir>/private.json`
pub fn get_private_keys_path() -> PathBuf {
    get_exe_dir().join("private.json")
}

/// Returns the cookie file used by the requirement list fetch.
pub fn get_cookie_path() -> PathBuf {
    get_cache_dir().join("mys_cookie.txt")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_cache_dir())?;
    std::fs::create_dir_all(get_debug_screenshots_dir())?;
    Ok(())
}
