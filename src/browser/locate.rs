//! Chrome/Chromium executable discovery.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, ScoutError};

/// Environment variables consulted before any filesystem probing, in
/// precedence order.
const ENV_OVERRIDES: &[&str] = &["STREAMSCOUT_CHROME", "CHROME_EXECUTABLE", "CHROME_PATH"];

/// Binary names tried on `PATH`.
const PATH_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

#[cfg(target_os = "linux")]
const DEFAULT_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/opt/google/chrome/chrome",
];

#[cfg(target_os = "macos")]
const DEFAULT_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(target_os = "windows")]
const DEFAULT_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const DEFAULT_PATHS: &[&str] = &[];

/// Locate a Chrome or Chromium executable.
///
/// Precedence: explicit configuration, then the override environment
/// variables, then `PATH` lookup, then well-known install locations.
/// An explicit path that does not exist is an error rather than a
/// fallthrough — a configured path is an assertion, not a hint.
pub fn locate_chrome(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(ScoutError::BrowserUnavailable(format!(
            "configured chrome executable not found: {}",
            path.display()
        )));
    }

    for var in ENV_OVERRIDES {
        if let Ok(value) = std::env::var(var) {
            let path = PathBuf::from(&value);
            if path.is_file() {
                debug!(%var, path = %path.display(), "chrome located via environment");
                return Ok(path);
            }
        }
    }

    for name in PATH_CANDIDATES {
        if let Ok(path) = which::which(name) {
            debug!(path = %path.display(), "chrome located on PATH");
            return Ok(path);
        }
    }

    for candidate in DEFAULT_PATHS {
        let path = Path::new(candidate);
        if path.is_file() {
            debug!(path = %path.display(), "chrome located at default path");
            return Ok(path.to_path_buf());
        }
    }

    Err(ScoutError::BrowserUnavailable(
        "no chrome or chromium executable found; install one or set STREAMSCOUT_CHROME".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_path_must_exist() {
        let err = locate_chrome(Some(Path::new("/definitely/not/a/chrome"))).unwrap_err();
        assert_eq!(err.code(), "browser_not_found");
    }
}
