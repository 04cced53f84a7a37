//! Error types shared by the automation loops.

use thiserror::Error;

use crate::hotkey::HotkeyError;
use crate::inventory::InventoryError;
use crate::ocr::OcrError;

/// Failures surfaced by the operator and the loops it runs.
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("{0}未启动！")]
    WindowNotRunning(String),

    #[error("请等待OCR完成初始化")]
    OcrNotReady,

    #[error("OCR启用不成功：{0}")]
    OcrUnavailable(String),

    #[error("shelf参数错误: {0}")]
    InvalidShelf(String),

    #[error("{0} is already running")]
    AlreadyRunning(String),

    #[error("清单是空的")]
    EmptyInventory,

    #[error("(っ °Д °;)っ解析结果是空的")]
    EmptyScan,

    #[error("screen driver error: {0}")]
    Driver(#[from] anyhow::Error),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Hotkey(#[from] HotkeyError),
}

pub type Result<T> = std::result::Result<T, AutomationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_window() {
        let error = AutomationError::WindowNotRunning("原神".to_string());
        assert_eq!(error.to_string(), "原神未启动！");
    }

    #[test]
    fn test_error_from_ocr() {
        let error: AutomationError = OcrError::NeedsCredentialRefresh.into();
        assert!(matches!(
            error,
            AutomationError::Ocr(OcrError::NeedsCredentialRefresh)
        ));
    }

    #[test]
    fn test_error_display_empty_scan() {
        assert!(AutomationError::EmptyScan.to_string().contains("解析结果是空的"));
    }
}
