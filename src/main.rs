use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use app_lib::commands::{evaluate_cmd, settings_cmd};
use app_lib::db::database::Database;
use app_lib::models::report::ScreenRequest;
use app_lib::services::eastmoney::EastMoneySource;
use app_lib::AppState;

#[derive(Parser)]
#[command(name = "sector-eval", version, about = "A股板块归属与多维度综合评分")]
struct Cli {
    /// 数据目录（存放 sector_eval.db）
    #[arg(long, global = true, default_value = "./data")]
    data_dir: PathBuf,

    /// 结果条数
    #[arg(long, global = true)]
    top: Option<usize>,

    /// 明细资金流的股票池上限
    #[arg(long, global = true)]
    detailed_limit: Option<usize>,

    /// 并发请求数
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// 把命令行覆盖的参数写回 settings 表
    #[arg(long, global = true)]
    save_settings: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 单只股票详细报告
    Code { code: String },
    /// 按板块筛选（主板/沪市/深市/创业板/科创板/北交所/沪主板/深主板）
    Board {
        #[arg(required = true)]
        boards: Vec<String>,
    },
    /// 按概念关键词筛选
    Concept {
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// 板块 + 概念组合筛选
    Screen {
        #[arg(long = "board")]
        boards: Vec<String>,
        #[arg(long = "concept")]
        concepts: Vec<String>,
    },
    /// 列出全部概念板块
    Concepts,
    /// 最近的评估记录
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// 显示当前参数
    Settings,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let db = Database::new(&cli.data_dir)?;
    let mut settings = db.load_settings()?;
    if let Some(limit) = cli.detailed_limit {
        settings.detailed_flow_limit = limit;
    }
    if let Some(n) = cli.concurrency {
        settings.fetch_concurrency = n.max(1);
    }
    if let Some(n) = cli.top {
        settings.top_n = n;
    }

    let source = EastMoneySource::new(&settings)?;
    let state = AppState::new(db, Arc::new(source), settings);
    if cli.save_settings {
        settings_cmd::save_settings(&state, state.evaluator.settings().clone()).map_err(|e| anyhow!(e))?;
    }

    match cli.command {
        Command::Code { code } => {
            let report = evaluate_cmd::evaluate_code(&state, code).await.map_err(|e| anyhow!(e))?;
            print_json(&report)
        }
        Command::Board { boards } => {
            let report = evaluate_cmd::screen_by_board(&state, boards, cli.top).await.map_err(|e| anyhow!(e))?;
            print_json(&report)
        }
        Command::Concept { keywords } => {
            let report = evaluate_cmd::screen_by_concept(&state, keywords, cli.top).await.map_err(|e| anyhow!(e))?;
            print_json(&report)
        }
        Command::Screen { boards, concepts } => {
            let request = ScreenRequest { boards, concepts, top_n: cli.top };
            let report = evaluate_cmd::screen(&state, request).await.map_err(|e| anyhow!(e))?;
            print_json(&report)
        }
        Command::Concepts => {
            let concepts = evaluate_cmd::list_concepts(&state).await.map_err(|e| anyhow!(e))?;
            print_json(&concepts)
        }
        Command::History { limit } => {
            let runs = evaluate_cmd::recent_runs(&state, limit).map_err(|e| anyhow!(e))?;
            print_json(&runs)
        }
        Command::Settings => {
            let settings = settings_cmd::get_settings(&state).map_err(|e| anyhow!(e))?;
            print_json(&settings)
        }
    }
}
