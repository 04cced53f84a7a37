//! Locating Tesseract and its language data.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use super::OcrError;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

const COMMON_EXECUTABLES: [&str; 2] = [
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

const COMMON_TESSDATA_DIRS: [&str; 4] = [
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tessdata",
];

/// Returns the directory for storing Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("yuanshen-helper")
        .join("tesseract")
}

fn executable_name() -> &'static str {
    if cfg!(windows) {
        "tesseract.exe"
    } else {
        "tesseract"
    }
}

/// Finds the Tesseract executable.
///
/// Order: the configured path, our local dir, `tesseract` on PATH, then the
/// default install locations.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf, OcrError> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!("Configured tesseract not found: {}", path.display());
    }

    let local_exe = get_tesseract_dir().join(executable_name());
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            OcrError::EngineNotFound(format!(
                "Tesseract not found. Install Tesseract-OCR, add it to PATH, \
                 or copy it to {}",
                get_tesseract_dir().display()
            ))
        })
}

/// Finds a tessdata directory holding `<language>.traineddata`.
///
/// Returns `None` when none is found; Tesseract then falls back to its
/// compiled-in default.
pub fn find_tessdata_dir(configured: Option<&Path>, language: &str) -> Option<PathBuf> {
    let file = format!("{}.traineddata", language);
    let has_language = |dir: &Path| dir.join(&file).exists();

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = configured {
        candidates.push(dir.to_path_buf());
    }
    candidates.push(get_tesseract_dir().join("tessdata"));
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        candidates.push(PathBuf::from(&prefix));
        candidates.push(PathBuf::from(&prefix).join("tessdata"));
    }
    candidates.extend(COMMON_TESSDATA_DIRS.iter().map(PathBuf::from));

    candidates.into_iter().find(|dir| has_language(dir))
}

/// Makes sure `<language>.traineddata` exists somewhere Tesseract will look,
/// downloading it into the local tessdata dir if necessary.
pub fn ensure_traineddata(
    configured: Option<&Path>,
    language: &str,
) -> Result<PathBuf, OcrError> {
    if let Some(dir) = find_tessdata_dir(configured, language) {
        tracing::info!("Tessdata found at: {}", dir.display());
        return Ok(dir);
    }

    let tessdata_dir = get_tesseract_dir().join("tessdata");
    fs::create_dir_all(&tessdata_dir)?;
    download_traineddata(&tessdata_dir, language)?;
    Ok(tessdata_dir)
}

fn download_traineddata(tessdata_dir: &Path, language: &str) -> Result<(), OcrError> {
    let url = format!("{}/{}.traineddata", TESSDATA_REPO, language);
    let target = tessdata_dir.join(format!("{}.traineddata", language));

    tracing::info!("Downloading {}.traineddata...", language);
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()?;
    let response = client
        .get(&url)
        .header("User-Agent", "yuanshen-helper")
        .send()?;

    if !response.status().is_success() {
        return Err(OcrError::EngineNotFound(format!(
            "Failed to download {}.traineddata: HTTP {}",
            language,
            response.status()
        )));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&target)?;
    file.write_all(&bytes)?;

    tracing::info!(
        "Downloaded {}.traineddata ({} bytes)",
        language,
        bytes.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_configured_tessdata_wins() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("zz_test.traineddata"), b"x").unwrap();
        assert_eq!(
            find_tessdata_dir(Some(dir.path()), "zz_test"),
            Some(dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_configured_tessdata_without_language_is_skipped() {
        let dir = tempdir().unwrap();
        assert_ne!(
            find_tessdata_dir(Some(dir.path()), "zz_missing"),
            Some(dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_configured_executable_is_used_when_present() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("tesseract-custom");
        fs::write(&exe, b"").unwrap();
        assert_eq!(find_tesseract_executable(Some(&exe)).unwrap(), exe);
    }
}
