use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::inventory::ImportMode;
use crate::ocr::OcrProviderKind;

#[derive(Parser, Debug)]
#[command(name = "yuanshen-helper")]
#[command(about = "原神洞天商店自动购买、剧情自动播放与自动烹饪", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 配置文件（默认：程序目录/config.json）
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// OCR平台，覆盖配置文件中的设置
    #[arg(long, global = true)]
    pub ocr: Option<OcrProviderKind>,

    /// 最长运行秒数，超时后停止所有操作
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 按清单购买洞天摆设或图纸（需已打开与壶灵的对话）
    Buy {
        /// stuff=摆设，blueprint=图纸
        shelf: String,

        /// 只演练，取消每次购买且不保存清单
        #[arg(long)]
        dry_run: bool,
    },

    /// 自动播放剧情（CAPSLOCK暂停，ALT+Q停止，←/→调整速度）
    Plot,

    /// 自动烹饪
    Cook {
        /// 烹饪次数
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
    },

    /// 管理需求清单
    Inventory {
        #[command(subcommand)]
        action: InventoryCommand,
    },

    /// 保存百度OCR密钥
    OcrKeys { api_key: String, secret_key: String },

    /// 保存米游社cookie
    Cookie { value: String },
}

#[derive(Subcommand, Debug)]
pub enum InventoryCommand {
    /// 显示清单
    Show,

    /// 从文本导入需求
    Import {
        file: PathBuf,

        /// append=追加，write=覆盖
        #[arg(short, long, value_enum, default_value = "append")]
        mode: ImportMode,
    },

    /// 检查手动编辑的清单
    Validate {
        file: PathBuf,

        /// 检查通过后替换当前清单
        #[arg(long)]
        save: bool,
    },

    /// 通过分享码获取摆设图纸所需材料
    Fetch { share_code: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_buy() {
        let cli = Cli::parse_from(["yuanshen-helper", "buy", "stuff", "--dry-run"]);
        assert!(matches!(
            cli.command,
            Commands::Buy { ref shelf, dry_run: true } if shelf == "stuff"
        ));
    }

    #[test]
    fn test_parse_global_options() {
        let cli = Cli::parse_from([
            "yuanshen-helper",
            "cook",
            "-n",
            "3",
            "--ocr",
            "baidu",
            "--config",
            "alt.json",
        ]);
        assert!(matches!(cli.command, Commands::Cook { count: 3 }));
        assert_eq!(cli.ocr, Some(OcrProviderKind::Baidu));
        assert_eq!(cli.config, Some(PathBuf::from("alt.json")));
    }

    #[test]
    fn test_parse_import_mode() {
        let cli = Cli::parse_from(["yuanshen-helper", "inventory", "import", "list.txt", "-m", "write"]);
        assert!(matches!(
            cli.command,
            Commands::Inventory {
                action: InventoryCommand::Import {
                    mode: ImportMode::Write,
                    ..
                }
            }
        ));
    }
}
