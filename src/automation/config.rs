//! Configuration types for automation.
//!
//! Loads settings from config.json next to the executable. Provides the
//! shop layout, loop timing and tuning constants, and OCR selection. Every
//! field has a default, so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::{Point, Rect};
use crate::ocr::OcrProviderKind;
use crate::paths;

/// Target window, matched by class name and title.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub class_name: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "原神".to_string(),
            class_name: "UnityWndClass".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalOcrConfig {
    /// Explicit tesseract executable; discovered when unset
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory; discovered when unset
    pub tessdata_dir: Option<PathBuf>,
    pub language: String,
    /// Tesseract page segmentation mode
    pub psm: u8,
}

impl Default for LocalOcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            tessdata_dir: None,
            language: "chi_sim".to_string(),
            psm: 6,
        }
    }
}

/// Purchase loop tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurchaseConfig {
    /// Minimum fuzzy-match score; a match must be strictly above it
    pub similarity_threshold: f64,
    /// Quantity cap used when the max-quantity label cannot be read
    pub default_cap: u32,
    /// Downscale factor for the list scan
    pub list_downscale: f32,
    /// Wheel units per scroll step
    pub scroll_units: i32,
    /// Status texts meaning nothing more can be bought
    pub terminal_phrases: Vec<String>,
    /// Write the inventory after every confirmed purchase, not only on exit
    pub checkpoint_each_purchase: bool,
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: crate::inventory::matcher::DEFAULT_SIMILARITY_THRESHOLD,
            default_cap: 6,
            list_downscale: 0.5,
            scroll_units: 45,
            terminal_phrases: vec!["已售罄".to_string(), "已掌握该配方".to_string()],
            checkpoint_each_purchase: true,
        }
    }
}

/// Shop screen positions, in 1920x1080 reference pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopLayout {
    /// Dialogue option that opens the shop
    pub open_shop: Point,
    pub stuff_tab: Point,
    pub blueprint_tab: Point,
    /// Scrollable commodity list
    pub list_region: Rect,
    pub redeem_button: Point,
    /// Label showing the largest purchasable quantity
    pub max_quantity_region: Rect,
    pub increase_button: Point,
    /// Confirms the purchase, then dismisses the result dialog
    pub confirm_button: Point,
    pub cancel_button: Point,
    pub scroll_anchor: Point,
    /// Status label on the selected commodity
    pub sold_out_region: Rect,
    /// Action delays to wait after opening the shop
    pub open_wait: f32,
    /// Action delays to wait after switching tabs
    pub tab_wait: f32,
}

impl Default for ShopLayout {
    fn default() -> Self {
        Self {
            open_shop: Point::new(1300, 650),
            stuff_tab: Point::new(200, 250),
            blueprint_tab: Point::new(200, 340),
            list_region: Rect::new(510, 100, 970, 950),
            redeem_button: Point::new(1800, 1024),
            max_quantity_region: Rect::new(1190, 580, 1260, 620),
            increase_button: Point::new(1290, 600),
            confirm_button: Point::new(1210, 800),
            cancel_button: Point::new(800, 780),
            scroll_anchor: Point::new(1200, 860),
            sold_out_region: Rect::new(1200, 110, 1350, 250),
            open_wait: 1.0,
            tab_wait: 1.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Where to click to advance dialogue
    pub click: Point,
    pub initial_delay_ms: u64,
    pub delay_step_ms: u64,
    pub max_delay_ms: u64,
    /// Sleep while paused or unfocused
    pub poll_interval_ms: u64,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            click: Point::new(1300, 800),
            initial_delay_ms: 100,
            delay_step_ms: 400,
            max_delay_ms: 2000,
            poll_interval_ms: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookingConfig {
    pub start_button: Point,
    /// Action delays to wait after starting
    pub start_wait: f32,
    /// Progress bar area watched for the "best area" colour
    pub scan_region: Rect,
    pub best_area_color: [u8; 3],
    /// Per-channel tolerance for the colour match
    pub color_tolerance: u8,
    /// Pixel drop that means the pointer entered the best area
    pub area_drop_threshold: u64,
    pub max_polls: u32,
    pub stop_button: Point,
    /// Action delays to wait for the dish animation
    pub finish_wait: f32,
    pub finish_button: Point,
}

impl Default for CookingConfig {
    fn default() -> Self {
        Self {
            start_button: Point::new(1030, 1030),
            start_wait: 2.0,
            scan_region: Rect::new(520, 680, 1400, 860),
            best_area_color: [255, 192, 64],
            color_tolerance: 5,
            area_drop_threshold: 100,
            max_polls: 300,
            stop_button: Point::new(960, 940),
            finish_wait: 7.0,
            finish_button: Point::new(1020, 910),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    /// Base unit for every wait, in milliseconds
    #[serde(default = "default_action_delay_ms")]
    pub action_delay_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Dry-run purchases and record every OCR image
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default)]
    pub ocr_provider: OcrProviderKind,
    #[serde(default)]
    pub local_ocr: LocalOcrConfig,
    /// Timeout for cloud OCR and list fetch requests
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Requirement list; relative paths resolve against the executable dir
    #[serde(default = "default_inventory_path")]
    pub inventory_path: PathBuf,
    #[serde(default)]
    pub purchase: PurchaseConfig,
    #[serde(default)]
    pub shop: ShopLayout,
    #[serde(default)]
    pub plot: PlotConfig,
    #[serde(default)]
    pub cooking: CookingConfig,
}

fn default_action_delay_ms() -> u64 {
    250
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_inventory_path() -> PathBuf {
    PathBuf::from("inventory.txt")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            action_delay_ms: default_action_delay_ms(),
            log_level: default_log_level(),
            debug_mode: false,
            ocr_provider: OcrProviderKind::default(),
            local_ocr: LocalOcrConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            inventory_path: default_inventory_path(),
            purchase: PurchaseConfig::default(),
            shop: ShopLayout::default(),
            plot: PlotConfig::default(),
            cooking: CookingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Absolute path of the requirement list.
    pub fn resolved_inventory_path(&self) -> PathBuf {
        if self.inventory_path.is_absolute() {
            self.inventory_path.clone()
        } else {
            paths::get_exe_dir().join(&self.inventory_path)
        }
    }
}

/// Loads configuration from `path` or returns defaults.
///
/// A missing or broken file is not fatal: the problem is logged and the
/// defaults are used.
pub fn load_config(path: &Path) -> AppConfig {
    tracing::info!("Looking for config at: {}", path.display());

    if !path.exists() {
        tracing::info!("{} not found. Using default config.", path.display());
        return AppConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Config loaded from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                AppConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
            AppConfig::default()
        }
    }
}
