//! Shop purchase loop.
//!
//! The engine repeatedly captures the commodity list, matches every row
//! against the active requirement list and buys what is still missing:
//!
//! ```text
//! Scanning -> Matching -> CheckingCompletion -> Scrolling -> ProbingSoldOut
//!    ^           |                                               |
//!    +-----------+ (early restart)                               |
//!    +-----------------------------------------------------------+
//! ```
//!
//! Terminal states are `Complete`, `Exhausted`, `Cancelled` and `Failed`.
//! The in-memory inventory is written back on every exit path unless the
//! run is a dry run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::automation::config::{PurchaseConfig, ShopLayout};
use crate::automation::state::{
    BuyState, CancelWatch, CancelToken, ExhaustReason, Outcome, Shelf, MSG_COMPLETE,
};
use crate::capture::ScreenDriver;
use crate::error::{AutomationError, Result};
use crate::hotkey::HotkeyRegistry;
use crate::inventory::matcher::is_numeric;
use crate::inventory::{FuzzyMatcher, Inventory, InventoryStore};
use crate::ocr::{DetectedItem, OcrProvider};

/// How a pass over the scanned rows ended.
enum Traversal {
    /// Every row was visited
    Finished,
    /// A purchase hit the quantity cap; the list has to be read again
    Restart,
    Cancelled,
}

pub struct PurchaseEngine {
    driver: Arc<dyn ScreenDriver>,
    ocr: Arc<dyn OcrProvider>,
    store: InventoryStore,
    inventory: Inventory,
    matcher: FuzzyMatcher,
    tuning: PurchaseConfig,
    layout: ShopLayout,
    shelf: Shelf,
    dry_run: bool,
    cancel: CancelWatch,
    /// Raw row texts and inventory keys already dealt with in this run
    ignored: HashSet<String>,
    /// First row of the previous scan, for end-of-list detection
    first_row: Option<String>,
    dirty: bool,
    error: Option<AutomationError>,
    pub state: BuyState,
}

impl PurchaseEngine {
    /// Binds ESC for the lifetime of the engine. `inventory` must be the
    /// active part of `store`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        driver: Arc<dyn ScreenDriver>,
        ocr: Arc<dyn OcrProvider>,
        store: InventoryStore,
        inventory: Inventory,
        tuning: &PurchaseConfig,
        layout: &ShopLayout,
        shelf: Shelf,
        dry_run: bool,
        hotkeys: &dyn HotkeyRegistry,
        stop: CancelToken,
    ) -> Result<Self> {
        if inventory.is_empty() {
            return Err(AutomationError::EmptyInventory);
        }
        Ok(Self {
            driver,
            ocr,
            store,
            inventory,
            matcher: FuzzyMatcher::new(tuning.similarity_threshold),
            tuning: tuning.clone(),
            layout: layout.clone(),
            shelf,
            dry_run,
            cancel: CancelWatch::register(hotkeys, stop)?,
            ignored: HashSet::new(),
            first_row: None,
            dirty: false,
            error: None,
            state: BuyState::Scanning,
        })
    }

    /// Drives the state machine to a terminal state and persists.
    pub fn run(mut self) -> Outcome {
        let started = Instant::now();
        tracing::info!(
            "Buying {} ({} items needed, threshold {}{})",
            self.shelf,
            self.inventory.len(),
            self.matcher.threshold(),
            if self.dry_run { ", dry run" } else { "" }
        );

        loop {
            match self.step() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::error!("Purchase failed in {}: {}", self.state, e);
                    self.state = BuyState::Failed(e.to_string());
                    self.error = Some(e);
                    break;
                }
            }
        }

        if let Err(e) = self.save() {
            return self.unsaved(&e);
        }
        tracing::info!(
            "Purchase finished: {} in {:.1}s",
            self.state,
            started.elapsed().as_secs_f32()
        );

        match self.state {
            BuyState::Complete | BuyState::Exhausted(_) => Outcome::done(MSG_COMPLETE),
            BuyState::Cancelled => Outcome::stopped(),
            _ => match self.error.take() {
                Some(e) => e.into(),
                None => Outcome::failed(self.state.to_string()),
            },
        }
    }

    /// Advances the state machine by one step.
    ///
    /// Returns `Ok(true)` while the loop should continue.
    pub fn step(&mut self) -> Result<bool> {
        if self.state.is_terminal() {
            return Ok(false);
        }
        if self.cancel.requested() {
            self.state = BuyState::Cancelled;
            return Ok(false);
        }

        match std::mem::replace(&mut self.state, BuyState::Scanning) {
            BuyState::Scanning => {
                let rows = self.scan_list()?;
                let first = rows[0].text.clone();
                if self.first_row.as_deref() == Some(first.as_str()) && !is_numeric(&first) {
                    tracing::info!("列表结束");
                    self.state = BuyState::Exhausted(ExhaustReason::ListEnd);
                    return Ok(false);
                }
                self.first_row = Some(first);
                self.state = BuyState::Matching(rows);
            }

            BuyState::Matching(rows) => match self.traverse(&rows)? {
                Traversal::Finished => self.state = BuyState::CheckingCompletion,
                Traversal::Restart => {
                    self.first_row = None;
                    self.state = BuyState::Scanning;
                }
                Traversal::Cancelled => {
                    self.state = BuyState::Cancelled;
                    return Ok(false);
                }
            },

            BuyState::CheckingCompletion => {
                if self.inventory.keys().all(|key| self.ignored.contains(key)) {
                    tracing::info!("购买完成");
                    self.state = BuyState::Complete;
                    return Ok(false);
                }
                self.state = BuyState::Scrolling;
            }

            BuyState::Scrolling => {
                self.driver.move_to(self.layout.scroll_anchor)?;
                self.driver.scroll(-self.tuning.scroll_units, None)?;
                self.state = BuyState::ProbingSoldOut;
            }

            BuyState::ProbingSoldOut => {
                let image = self.driver.capture_region(self.layout.sold_out_region)?;
                let lines = self.ocr.scan_text(&image)?;
                if let Some(status) = lines.first() {
                    if self.tuning.terminal_phrases.iter().any(|p| p == status) {
                        tracing::info!("剩余商品已无法购买: {}", status);
                        self.state = BuyState::Exhausted(ExhaustReason::SoldOut);
                        return Ok(false);
                    }
                }
                self.state = BuyState::Scanning;
            }

            terminal => {
                self.state = terminal;
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn scan_list(&self) -> Result<Vec<DetectedItem>> {
        let image = self.driver.capture_region(self.layout.list_region)?;
        let rows = self
            .ocr
            .scan_detailed(&image, self.tuning.list_downscale)?;
        if rows.is_empty() {
            return Err(AutomationError::EmptyScan);
        }
        tracing::debug!("Scanned {} rows", rows.len());
        Ok(rows)
    }

    fn traverse(&mut self, rows: &[DetectedItem]) -> Result<Traversal> {
        for row in rows {
            if self.cancel.requested() {
                return Ok(Traversal::Cancelled);
            }
            if self.ignored.contains(&row.text) {
                tracing::debug!("已忽略：{}", row.text);
                continue;
            }

            let found = self.matcher.find(self.inventory.keys(), &row.text);
            let Some(key) = found.key.map(str::to_string) else {
                continue;
            };
            if self.ignored.contains(&key) {
                // Same item re-read with different glyphs after a re-scan
                tracing::debug!("已忽略：{} ({})", key, row.text);
                self.ignored.insert(row.text.clone());
                continue;
            }
            let Some(requirement) = self.inventory.get(&key).copied() else {
                continue;
            };
            tracing::info!(
                "「{}」({:.2}, {})：{}\\{}",
                key,
                found.score,
                row.text,
                requirement.needed,
                requirement.existing
            );
            if requirement.is_satisfied() {
                tracing::info!("物品数量已足够");
                self.ignore(row, &key);
                continue;
            }

            let (x, y) = row.center();
            self.driver
                .click(self.layout.list_region.origin().offset(x, y))?;
            self.driver.click(self.layout.redeem_button)?;

            let (count, cap) = match self.shelf {
                Shelf::Stuff => self.choose_quantity(requirement.remaining())?,
                Shelf::Blueprint => (1, 1),
            };
            if count == 0 {
                tracing::info!("「{}」当前无法购买", key);
                self.driver.click(self.layout.cancel_button)?;
                self.ignore(row, &key);
                continue;
            }

            self.inventory.record_purchase(&key, count)?;
            self.dirty = true;
            tracing::info!("购买数量：{}", count);

            if self.dry_run {
                self.driver.click(self.layout.cancel_button)?;
            } else {
                self.driver.click(self.layout.confirm_button)?;
                self.driver.wait(1.0);
                // Second click dismisses the result dialog
                self.driver.click(self.layout.confirm_button)?;
                if self.tuning.checkpoint_each_purchase {
                    if let Err(e) = self.save() {
                        tracing::warn!("Checkpoint failed, retrying on exit: {}", e);
                    }
                }
            }
            self.ignore(row, &key);

            if count == cap {
                return Ok(Traversal::Restart);
            }
        }
        Ok(Traversal::Finished)
    }

    /// Reads the per-purchase limit and presses "increase" until `count`
    /// units are selected. Returns `(count, cap)`.
    fn choose_quantity(&self, remaining: u32) -> Result<(u32, u32)> {
        let image = self.driver.capture_region(self.layout.max_quantity_region)?;
        let lines = self.ocr.scan_text(&image)?;
        let cap = lines
            .first()
            .map(|s| s.trim())
            .filter(|s| is_numeric(s))
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(self.tuning.default_cap);

        let count = remaining.min(cap);
        for _ in 1..count {
            self.driver.click(self.layout.increase_button)?;
        }
        Ok((count, cap))
    }

    fn ignore(&mut self, row: &DetectedItem, key: &str) {
        self.ignored.insert(row.text.clone());
        self.ignored.insert(key.to_string());
    }

    fn save(&mut self) -> Result<()> {
        if self.dry_run || !self.dirty {
            return Ok(());
        }
        self.store.persist(&self.inventory)?;
        self.dirty = false;
        Ok(())
    }

    /// Failure outcome for a run whose purchases could not be written back.
    fn unsaved(&self, error: &AutomationError) -> Outcome {
        let counts: Vec<String> = self
            .inventory
            .iter()
            .map(|(name, req)| format!("{}: {}\\{}", name, req.needed, req.existing))
            .collect();
        tracing::error!(
            "Failed to save {}: {}",
            self.store.path().display(),
            error
        );
        Outcome::failed(format!(
            "清单保存失败 {}：{}。未保存的数量：{}",
            self.store.path().display(),
            error,
            counts.join("；")
        ))
    }
}
