//! Entry points for every automation the tool offers.
//!
//! The operator owns the collaborators shared by the loops: configuration,
//! screen driver, hotkey registry, the stop token and the OCR provider,
//! which is created on a background thread at startup.

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use crate::automation::config::AppConfig;
use crate::automation::cooking::cook;
use crate::automation::plot;
use crate::automation::purchase::PurchaseEngine;
use crate::automation::state::{CancelToken, Outcome, Shelf};
use crate::capture::ScreenDriver;
use crate::error::{AutomationError, Result};
use crate::hotkey::HotkeyRegistry;
use crate::inventory::InventoryStore;
use crate::ocr::{self, OcrProvider};

/// Provider, or the reason it could not be created.
type OcrSlot = Arc<OnceLock<std::result::Result<Arc<dyn OcrProvider>, String>>>;

pub struct Operator {
    config: AppConfig,
    driver: Arc<dyn ScreenDriver>,
    hotkeys: Arc<dyn HotkeyRegistry>,
    stop: CancelToken,
    ocr: OcrSlot,
}

impl Operator {
    /// Creates the operator and starts OCR initialization on the `init_ocr`
    /// thread.
    pub fn new(
        config: AppConfig,
        driver: Arc<dyn ScreenDriver>,
        hotkeys: Arc<dyn HotkeyRegistry>,
    ) -> Self {
        let slot: OcrSlot = Arc::new(OnceLock::new());
        let init_slot = slot.clone();
        let init_config = config.clone();

        let spawned = thread::Builder::new()
            .name("init_ocr".to_string())
            .spawn(move || {
                let kind = init_config.ocr_provider;
                tracing::info!("init OCR ({})..", kind);
                let result = ocr::create_provider(kind, &init_config).map_err(|e| {
                    tracing::error!("OCR initialization failed: {}", e);
                    e.to_string()
                });
                if result.is_ok() {
                    tracing::info!("OCR ({}) -ok", kind);
                }
                let _ = init_slot.set(result);
            });
        if let Err(e) = spawned {
            let _ = slot.set(Err(e.to_string()));
        }

        Self {
            config,
            driver,
            hotkeys,
            stop: CancelToken::new(),
            ocr: slot,
        }
    }

    /// Operator with the OCR slot already decided.
    #[cfg(test)]
    pub fn with_ocr(
        config: AppConfig,
        driver: Arc<dyn ScreenDriver>,
        hotkeys: Arc<dyn HotkeyRegistry>,
        ocr: Option<std::result::Result<Arc<dyn OcrProvider>, String>>,
    ) -> Self {
        let slot: OcrSlot = Arc::new(OnceLock::new());
        if let Some(ocr) = ocr {
            let _ = slot.set(ocr);
        }
        Self {
            config,
            driver,
            hotkeys,
            stop: CancelToken::new(),
            ocr: slot,
        }
    }

    /// Blocks until OCR initialization has finished or `timeout` passes.
    /// Returns whether it finished.
    pub fn wait_for_ocr(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.ocr.get().is_none() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(100));
        }
        true
    }

    /// Asks every running loop to stop at its next checkpoint.
    pub fn stop_all(&self) {
        tracing::info!("Stop requested for all loops");
        self.stop.cancel();
    }

    /// Buys everything on the requirement list from the given shelf.
    ///
    /// The game must show the dialogue with the teapot spirit; the operator
    /// opens the shop and selects the tab itself.
    pub fn buy_commodities(&self, shelf: Shelf, dry_run: bool) -> Outcome {
        report("buy_commodities", self.try_buy(shelf, dry_run))
    }

    pub fn play_plots(&self) -> Outcome {
        report("play_plots", self.try_play_plots())
    }

    pub fn cooking(&self, count: u32) -> Outcome {
        report("cooking", self.try_cooking(count))
    }

    fn try_buy(&self, shelf: Shelf, dry_run: bool) -> Result<Outcome> {
        let ocr = self.ocr_provider()?;
        if ocr.needs_credentials() {
            return Ok(Outcome::refresh_credentials());
        }
        self.ensure_window()?;

        let store = InventoryStore::new(self.config.resolved_inventory_path());
        let inventory = store.load_active()?;
        if inventory.is_empty() {
            return Err(AutomationError::EmptyInventory);
        }

        tracing::info!("{}启动！", self.driver.window_title());
        let shop = &self.config.shop;
        self.driver.click(shop.open_shop)?;
        self.driver.wait(shop.open_wait);
        self.driver.click(match shelf {
            Shelf::Stuff => shop.stuff_tab,
            Shelf::Blueprint => shop.blueprint_tab,
        })?;
        self.driver.wait(shop.tab_wait);

        let engine = PurchaseEngine::new(
            self.driver.clone(),
            ocr,
            store,
            inventory,
            &self.config.purchase,
            shop,
            shelf,
            dry_run || self.config.debug_mode,
            self.hotkeys.as_ref(),
            self.stop.clone(),
        )?;
        Ok(engine.run())
    }

    fn try_play_plots(&self) -> Result<Outcome> {
        self.ensure_window()?;
        plot::play_plots(
            self.driver.as_ref(),
            &self.config.plot,
            self.hotkeys.as_ref(),
            &self.stop,
        )
    }

    fn try_cooking(&self, count: u32) -> Result<Outcome> {
        self.ensure_window()?;
        cook(
            self.driver.as_ref(),
            &self.config.cooking,
            count,
            self.hotkeys.as_ref(),
            self.stop.clone(),
        )
    }

    fn ocr_provider(&self) -> Result<Arc<dyn OcrProvider>> {
        match self.ocr.get() {
            None => Err(AutomationError::OcrNotReady),
            Some(Err(reason)) => Err(AutomationError::OcrUnavailable(reason.clone())),
            Some(Ok(provider)) => Ok(provider.clone()),
        }
    }

    fn ensure_window(&self) -> Result<()> {
        if self.driver.activate_window() {
            Ok(())
        } else {
            Err(AutomationError::WindowNotRunning(
                self.driver.window_title().to_string(),
            ))
        }
    }
}

fn report(operation: &str, result: Result<Outcome>) -> Outcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!("{}: {}", operation, e);
            e.into()
        }
    }
}
