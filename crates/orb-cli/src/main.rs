//! ORB 옵션 백테스트 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! orb template -o strategy_conditions_template.xlsx
//! orb run -u strategies.xlsx -f 2025-08-01 -t 2025-08-09 -o out/
//! orb run-single -n default -f 2025-08-01 -t 2025-08-09
//! orb upload-index -d data/nifty_1min
//! orb upload-options -d data/nifty_1min
//! orb health
//! ```

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use orb_cli::commands::health::check_health;
use orb_cli::commands::parse_date;
use orb_cli::commands::run::{run_backtests, RunOptions};
use orb_cli::commands::template::{write_template, TEMPLATE_FILE};
use orb_cli::commands::upload::{upload_folder, CandleKind};
use orb_core::{init_logging, init_logging_from_env, AppConfig, LogConfig};

#[derive(Parser)]
#[command(name = "orb")]
#[command(about = "ORB options backtest harness", version)]
struct Cli {
    /// 설정 파일. 없으면 로깅은 `RUST_LOG` / `LOG_FORMAT`을 따릅니다
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 전략 조건 업로드 템플릿 생성
    Template {
        /// 출력 파일
        #[arg(short, long, default_value = TEMPLATE_FILE)]
        output: PathBuf,
    },

    /// 전략 조건을 업로드하고 백테스트 실행
    Run {
        /// 전략 조건 파일 (CSV / XLSX). 없으면 저장된 전략 전체 실행
        #[arg(short, long)]
        upload: Option<PathBuf>,

        /// 시작 날짜 (YYYY-MM-DD)
        #[arg(short = 'f', long)]
        from: String,

        /// 종료 날짜 (YYYY-MM-DD)
        #[arg(short, long)]
        to: String,

        /// 리포트 출력 디렉토리
        #[arg(short, long, default_value = "out")]
        output: PathBuf,

        /// 전략별 첫 조건 행을 strategy_settings에도 반영
        #[arg(long, default_value = "false")]
        sync_settings: bool,
    },

    /// 저장된 전략 하나를 실행
    RunSingle {
        /// 전략 이름
        #[arg(short, long, default_value = "default")]
        name: String,

        /// 시작 날짜 (YYYY-MM-DD)
        #[arg(short = 'f', long)]
        from: String,

        /// 종료 날짜 (YYYY-MM-DD)
        #[arg(short, long)]
        to: String,

        /// 리포트 출력 디렉토리
        #[arg(short, long, default_value = "out")]
        output: PathBuf,
    },

    /// 폴더의 1분봉 CSV에서 지수 행을 적재
    UploadIndex {
        /// CSV 폴더
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// 폴더의 1분봉 CSV에서 옵션 행을 적재
    UploadOptions {
        /// CSV 폴더
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// 시스템 상태 확인
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    let logging = if cli.config.exists() {
        init_logging(LogConfig::from_config(&config.logging))
    } else {
        init_logging_from_env()
    };
    logging.map_err(|e| anyhow!(e.to_string()))?;

    match cli.command {
        Commands::Template { output } => {
            write_template(&output).await?;
            println!("템플릿 저장 위치: {}", output.display());
        }

        Commands::Run {
            upload,
            from,
            to,
            output,
            sync_settings,
        } => {
            let options = RunOptions {
                upload,
                strategies: Vec::new(),
                start: parse_date(&from)?,
                end: parse_date(&to)?,
                output,
                write_trades_csv: false,
            };
            let outcome = run_backtests(&config, &options, sync_settings).await?;
            if !outcome.report.is_all_succeeded() {
                bail!(
                    "{} of {} strategies failed",
                    outcome.report.failed().len(),
                    outcome.report.entries.len()
                );
            }
        }

        Commands::RunSingle {
            name,
            from,
            to,
            output,
        } => {
            let options = RunOptions {
                upload: None,
                strategies: vec![name],
                start: parse_date(&from)?,
                end: parse_date(&to)?,
                output,
                write_trades_csv: true,
            };
            let outcome = run_backtests(&config, &options, false).await?;
            if let Some((strategy, reason)) = outcome.report.failed().first() {
                bail!("Backtest failed for {}: {}", strategy, reason);
            }
        }

        Commands::UploadIndex { dir } => {
            report_upload(upload_folder(&config, CandleKind::Index, &dir).await?)?;
        }

        Commands::UploadOptions { dir } => {
            report_upload(upload_folder(&config, CandleKind::Options, &dir).await?)?;
        }

        Commands::Health => {
            if !check_health(&config).await? {
                bail!("Health check failed");
            }
        }
    }

    Ok(())
}

fn report_upload(summary: orb_cli::commands::upload::UploadSummary) -> Result<()> {
    info!(
        files = summary.files,
        succeeded = summary.succeeded,
        rows = summary.rows,
        "Upload finished"
    );
    println!(
        "\n{}/{} 파일 처리 완료 ({} 행)",
        summary.succeeded, summary.files, summary.rows
    );
    if !summary.failed.is_empty() {
        bail!("{} file(s) failed to upload", summary.failed.len());
    }
    Ok(())
}
