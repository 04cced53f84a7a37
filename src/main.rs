//! Yuanshen Helper
//!
//! Automates repetitive chores in the Genshin Impact client: buying
//! furnishings from the realm shop against a requirement list, advancing
//! story dialogue and playing the cooking minigame.

mod automation;
mod capture;
mod cli;
mod error;
mod hotkey;
mod inventory;
mod logging;
mod ocr;
mod paths;
#[cfg(test)]
mod testing;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use automation::config::{load_config, AppConfig};
use automation::operator::Operator;
use automation::runner;
use automation::state::{Outcome, OutcomeKind, Shelf};
use cli::{Cli, Commands, InventoryCommand};
use hotkey::GlobalHotkeys;
use inventory::fetch::{merge_items, BlueprintClient, CookieStore};
use inventory::InventoryStore;
use ocr::{ApiKeys, OcrKeys};

/// Tesseract may download language data on first use.
const OCR_INIT_TIMEOUT: Duration = Duration::from_secs(180);

fn main() -> Result<()> {
    let cli = Cli::parse();

    paths::ensure_directories().context("Failed to create output directories")?;
    let config_path = cli.config.clone().unwrap_or_else(paths::get_config_path);
    let mut config = load_config(&config_path);
    if let Some(kind) = cli.ocr {
        config.ocr_provider = kind;
    }

    logging::init_logging(&config.log_level)?;
    logging::install_panic_hook();
    tracing::info!("Config: {}", config_path.display());

    match cli.command {
        Commands::Buy { shelf, dry_run } => {
            let shelf: Shelf = shelf.parse()?;
            run_loop(config, "buy_commodities", cli.timeout, true, move |op| {
                op.buy_commodities(shelf, dry_run)
            })
        }
        Commands::Plot => run_loop(config, "play_plots", cli.timeout, false, |op| {
            op.play_plots()
        }),
        Commands::Cook { count } => run_loop(config, "cooking", cli.timeout, false, move |op| {
            op.cooking(count)
        }),
        Commands::Inventory { action } => inventory_command(&config, action),
        Commands::OcrKeys {
            api_key,
            secret_key,
        } => {
            let path = paths::get_private_keys_path();
            let mut keys = OcrKeys::load(&path);
            keys.baidu = Some(ApiKeys {
                api_key,
                secret_key,
            });
            keys.save(&path)?;
            println!("OCR密钥已保存到 {}", path.display());
            Ok(())
        }
        Commands::Cookie { value } => {
            let mut cookies = CookieStore::load(paths::get_cookie_path());
            if !cookies.set(&value)? {
                return Err(inventory::InventoryError::InvalidCookie.into());
            }
            println!("cookie已保存");
            Ok(())
        }
    }
}

/// Runs one loop on its worker thread and reports the outcome.
fn run_loop<F>(
    config: AppConfig,
    name: &str,
    timeout: Option<u64>,
    needs_ocr: bool,
    job: F,
) -> Result<()>
where
    F: FnOnce(&Operator) -> Outcome + Send + 'static,
{
    let driver = capture::create_driver(&config)?;
    let operator = Arc::new(Operator::new(config, driver, Arc::new(GlobalHotkeys)));

    if needs_ocr && !operator.wait_for_ocr(OCR_INIT_TIMEOUT) {
        tracing::warn!("OCR is still initializing after {:?}", OCR_INIT_TIMEOUT);
    }

    let worker = operator.clone();
    let handle = runner::start(name, move || job(worker.as_ref()))?;

    if let Some(secs) = timeout {
        let deadline = Instant::now() + Duration::from_secs(secs);
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!("{} exceeded {}s, stopping", name, secs);
                operator.stop_all();
                break;
            }
            thread::sleep(Duration::from_millis(200));
        }
    }

    let outcome = runner::join(handle);
    println!("{}", outcome.message);
    match outcome.kind {
        _ if outcome.success => Ok(()),
        OutcomeKind::Stopped => Ok(()),
        OutcomeKind::RefreshCredentials => Err(anyhow!(
            "OCR密钥无效或已过期，请运行 `yuanshen-helper ocr-keys <api-key> <secret-key>` 后重试"
        )),
        _ => Err(anyhow!(outcome.message)),
    }
}

fn inventory_command(config: &AppConfig, action: InventoryCommand) -> Result<()> {
    let store = InventoryStore::new(config.resolved_inventory_path());

    match action {
        InventoryCommand::Show => {
            let inventory = store.load()?;
            for (name, req) in inventory.iter() {
                let mark = if req.is_satisfied() { "✔" } else { " " };
                println!("{} {}: {}\\{}", mark, name, req.needed, req.existing);
            }
            println!(
                "共{}项，未完成{}项 ({})",
                inventory.len(),
                inventory.active().len(),
                store.path().display()
            );
        }
        InventoryCommand::Import { file, mode } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let inventory = store.import(&raw, mode)?;
            println!("导入完成，清单共{}项", inventory.len());
        }
        InventoryCommand::Validate { file, save } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let inventory = if save {
                store.save_text(&text)?
            } else {
                inventory::validate_text(&text)?
            };
            println!("格式正确，共{}项{}", inventory.len(), if save { "，已保存" } else { "" });
        }
        InventoryCommand::Fetch { share_code } => {
            let mut cookies = CookieStore::load(paths::get_cookie_path());
            let client = BlueprintClient::new(Duration::from_secs(config.request_timeout_secs))?;
            let items = client.fetch(&mut cookies, &share_code)?;

            let mut inventory = store.load()?;
            let merged = merge_items(&mut inventory, &items);
            store.persist(&inventory)?;
            println!("已获取{}种材料，清单共{}项", merged, inventory.len());
        }
    }
    Ok(())
}
