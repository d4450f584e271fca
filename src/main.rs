//! ragbuddy - CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use ragbuddy::{
    cli::{credentials::load_env_file, Args, Commands, Config, Credentials, Verbosity},
    doctor::Doctor,
    logging,
    rag::RAGPipeline,
    repl::{display::format_exchange_error, DisplayManager, ReplSession},
    session::SessionState,
    upload::UploadContext,
    RagError,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if let Err(message) = args.validate() {
        eprintln!("{} {}", "Error:".red().bold(), message);
        eprintln!("\nUsage:");
        eprintln!("  ragbuddy <QUERY>              Answer one question");
        eprintln!("  ragbuddy chat                 Interactive session");
        eprintln!("  ragbuddy doctor               Check services and index");
        eprintln!("  ragbuddy config               Show configuration");
        return Ok(ExitCode::from(2));
    }

    let env_file = load_env_file(None);
    let config = Config::load(args.config.clone()).context("loading configuration")?;
    let verbosity = args.verbosity();

    // Held until main returns so queued log lines reach the file
    let _log_guard = match logging::init(&config.log_dir(), verbosity.show_logs()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} {}", "Warning:".yellow(), e);
            None
        }
    };
    info!(
        verbosity = verbosity.as_str(),
        env_file = ?env_file,
        "ragbuddy starting"
    );

    let code = match &args.command {
        Some(Commands::Chat) => run_chat(&args, &config, verbosity).await?,
        Some(Commands::Doctor) => run_doctor(&config).await,
        Some(Commands::Config) => show_config(&config)?,
        None => match &args.query {
            Some(query) => run_query(&args, &config, verbosity, query).await?,
            None => ExitCode::SUCCESS,
        },
    };

    Ok(code)
}

/// Build the pipeline and refuse to start on an embedder/index mismatch
async fn start_pipeline(config: &Config) -> ragbuddy::Result<RAGPipeline> {
    let credentials = Credentials::from_env(&config.index)?;
    let pipeline = RAGPipeline::from_config(config, &credentials).await?;
    pipeline.verify_compatibility().await?;
    Ok(pipeline)
}

/// Report a startup failure; configuration problems point at `doctor`
fn startup_failed(error: &RagError) -> ExitCode {
    error!(error = %error, "startup failed");
    eprintln!("{} {}", "Error:".red().bold(), error);
    if error.is_fatal_at_startup() {
        eprintln!("Run {} to check credentials and the index.", "ragbuddy doctor".cyan());
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

fn load_upload(args: &Args, session: &mut SessionState) -> Result<()> {
    if let Some(path) = &args.upload {
        let upload = UploadContext::from_path(path)
            .with_context(|| format!("reading upload {}", path.display()))?;
        session.attach(upload);
    }
    Ok(())
}

/// Answer one question, then exit
async fn run_query(
    args: &Args,
    config: &Config,
    verbosity: Verbosity,
    query: &str,
) -> Result<ExitCode> {
    let pipeline = match start_pipeline(config).await {
        Ok(pipeline) => pipeline,
        Err(e) => return Ok(startup_failed(&e)),
    };

    let mut session = SessionState::new();
    load_upload(args, &mut session)?;

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut display = if verbosity.show_progress() {
        DisplayManager::new()
    } else {
        DisplayManager::quiet()
    };
    display.start_exchange("문서 검색 및 답변 생성 중");
    let outcome = pipeline.ask(&mut session, query, &cancel).await;
    display.finish_current();
    watcher.abort();

    match outcome {
        Ok(answer) => {
            println!("{}", answer.text);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "query failed");
            eprintln!("{}", format_exchange_error(&e).red());
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Run the interactive REPL
async fn run_chat(args: &Args, config: &Config, verbosity: Verbosity) -> Result<ExitCode> {
    let pipeline = match start_pipeline(config).await {
        Ok(pipeline) => pipeline,
        Err(e) => return Ok(startup_failed(&e)),
    };

    let mut repl = ReplSession::with_history(config.state_dir().join("history"))?;
    repl.set_verbose(matches!(verbosity, Verbosity::Verbose | Verbosity::VeryVerbose));
    load_upload(args, repl.session_mut())?;

    let model = pipeline
        .generator()
        .models()
        .first()
        .cloned()
        .unwrap_or_default();
    repl.show_welcome(
        env!("CARGO_PKG_VERSION"),
        &model,
        pipeline.retriever().index_name(),
    );

    info!(backend = pipeline.generator().backend_name(), model = %model, "chat started");

    repl.run(&pipeline).await?;
    info!(
        exchanges = repl.session().exchange_count(),
        failures = repl.session().failure_count(),
        "chat session ended"
    );
    Ok(ExitCode::SUCCESS)
}

async fn run_doctor(config: &Config) -> ExitCode {
    let doctor = Doctor::new(config.clone());
    let checks = doctor.run_diagnostics().await;
    Doctor::display_results(&checks);

    if Doctor::overall_status(&checks) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn show_config(config: &Config) -> Result<ExitCode> {
    println!("\n{}\n", "ragbuddy Configuration".bold());
    println!("{}", toml::to_string_pretty(config)?);
    println!("State directory: {}", config.state_dir().display());
    println!("Log directory:   {}", config.log_dir().display());
    println!();
    Ok(ExitCode::SUCCESS)
}
