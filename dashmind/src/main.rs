mod cli;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dashmind::init_telemetry;
use dashmind::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::cli::{ChatCommand, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(error) = init_telemetry(cli.verbose) {
        eprintln!("error: {error}");
        return ExitCode::from(error.exit_code());
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(error = %error, "dashmind failed");
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(max_turns) = cli.max_turns {
        config.session.max_model_turns = max_turns;
    }
    config.validate()?;

    let target = cli.target();
    println!("Starting analytics dashboard");
    println!("   Website: {}", target.website);
    println!("   Date Range: {}", target.period());
    println!("   Timezone: {}", target.timezone);
    println!(
        "   Chat Mode: {}",
        if cli.chat { "Enabled" } else { "Disabled" }
    );
    println!();

    let handles = build_backends(&config.backends, &EnvCredentials::from_env())?;
    let selector = build_selector(&config, handles, cli.backend)?;

    let server = tool_server_config(&config.tool_server, &cli.mcp_server_dir, cli.verbose);
    let provider = spawn_tool_server(server).await?;
    info!("connected to tool server");

    let outcome = run_with_provider(&cli, &config, &target, selector, &provider).await;
    provider.shutdown().await;
    outcome
}

async fn run_with_provider(
    cli: &Cli,
    config: &AppConfig,
    target: &ReportTarget,
    selector: BackendSelector,
    provider: &Arc<McpToolProvider>,
) -> Result<(), AppError> {
    let guide = fetch_dashboard_guide(provider, target).await;
    let request = dashboard_request(target, guide.as_deref());

    let tools: Arc<dyn ToolProvider> = provider.clone();
    let mut session = start_session(
        selector,
        tools,
        format!("report-{}", target.website),
        target,
        config.chat_policy(),
    )
    .await?;
    info!(tools = session.catalog().len(), "tool catalog loaded");

    println!("Generating dashboard for {}...", target.website);
    match session.run_turn(&request).await {
        Ok(answer) => print_report(target, session.last_backend(), &answer),
        Err(error) => {
            print_turn_error(&error);
            if !cli.chat || !error.is_session_recoverable() {
                return Err(error.into());
            }
        }
    }

    if cli.chat {
        chat_loop(&mut session).await?;
    }

    Ok(())
}

fn print_report(target: &ReportTarget, backend: Option<BackendId>, answer: &str) {
    println!();
    println!("{}", render_report(target, backend, answer));
    println!();

    let found = detect_fabrication(answer);
    if !found.is_empty() {
        warn!(indicators = ?found, "report may contain fabricated data");
    }
    println!("{}", fabrication_summary(&found));
}

fn print_turn_error(error: &ChatError) {
    println!();
    println!("Error ({:?}): {}", error.kind, error.message);
    if error.kind == ChatErrorKind::MaxTurnsExceeded {
        if let Some(partial) = error.partial_answer.as_deref() {
            println!("Partial answer:");
            println!("{partial}");
        }
    }
}

async fn chat_loop(session: &mut ChatSession) -> Result<(), AppError> {
    println!();
    println!("Entering chat mode. Ask questions about your analytics data.");
    println!("Type 'quit', 'exit' or 'q' to leave, 'retry' to rerun a failed question.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYour question: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let outcome = match ChatCommand::parse(&line) {
            ChatCommand::Exit => break,
            ChatCommand::Retry if session.has_pending_turn() => session.retry_turn().await,
            ChatCommand::Retry => {
                println!("Nothing to retry.");
                continue;
            }
            ChatCommand::Ask(question) => {
                println!("Thinking...");
                session.run_turn(&question).await
            }
        };

        match outcome {
            Ok(answer) => {
                let backend = session
                    .last_backend()
                    .map(|id| id.to_string().to_uppercase())
                    .unwrap_or_default();
                println!();
                println!("{backend} response:");
                println!("{}", "-".repeat(50));
                println!("{}", answer.trim());
                println!("{}", "-".repeat(50));
            }
            Err(error) if error.is_session_recoverable() => print_turn_error(&error),
            Err(error) => return Err(error.into()),
        }
    }

    println!("Exiting chat mode. Goodbye!");
    Ok(())
}
