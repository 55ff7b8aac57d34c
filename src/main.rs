// ==========================================
// 光伏 BOS 配置引擎 - 命令行入口
// ==========================================
// 用法: solar-bos [db_path] <project_uuid> [detect|apply|options|output]
// 输出: JSON（stdout），日志走 tracing（stderr）
// ==========================================

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;
use solar_bos::app::{get_default_db_path, AppState};
use solar_bos::config::BosConfigReader;
use solar_bos::engine::notifications::CollectingNotificationSink;
use solar_bos::engine::WorkflowState;

const COMMANDS: [&str; 4] = ["detect", "apply", "options", "output"];

struct CliArgs {
    db_path: String,
    project_uuid: String,
    command: String,
}

fn parse_args(mut args: Vec<String>) -> Result<CliArgs> {
    let command = match args.last() {
        Some(last) if COMMANDS.contains(&last.as_str()) => args.pop().unwrap_or_default(),
        _ => "detect".to_string(),
    };

    let (db_path, project_uuid) = match args.len() {
        1 => (get_default_db_path(), args.remove(0)),
        2 => {
            let project_uuid = args.remove(1);
            (args.remove(0), project_uuid)
        }
        _ => bail!(
            "用法: solar-bos [db_path] <project_uuid> [{}]",
            COMMANDS.join("|")
        ),
    };

    Ok(CliArgs {
        db_path,
        project_uuid,
        command,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    solar_bos::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", solar_bos::APP_NAME, solar_bos::VERSION);
    tracing::info!("==================================================");

    let args = parse_args(std::env::args().skip(1).collect())?;
    tracing::info!("使用数据库: {}", args.db_path);

    let sink = Arc::new(CollectingNotificationSink::new());
    let state = AppState::with_notification_sink(args.db_path.clone(), sink.clone())
        .map_err(|e| anyhow!(e))
        .context("无法初始化AppState")?;
    let api = state.bos_api.clone();

    let output = match args.command.as_str() {
        "detect" => serde_json::to_value(api.detect(&args.project_uuid).await?)?,
        "apply" => {
            let options = state
                .config_manager
                .load_population_options(None)
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
            let final_state = api
                .orchestrator()
                .detect_and_apply(&args.project_uuid, &options)
                .await;
            let failed = matches!(final_state, WorkflowState::Failed { .. });
            let output = json!({
                "state": final_state,
                "notifications": sink.take(),
            });
            if failed {
                println!("{}", serde_json::to_string_pretty(&output)?);
                bail!("BOS 自动填充失败");
            }
            output
        }
        "options" => json!({
            "eligibility": api.combine_eligibility(&args.project_uuid).await?,
            "options": api.combine_options(&args.project_uuid).await?,
        }),
        "output" => json!({
            "combined_max_output": api.combined_max_output(&args.project_uuid).await?,
        }),
        other => bail!("未知命令: {}", other),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
