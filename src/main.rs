use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt};

use doc_processor::api::{
    health::health_config,
    job::{JobService, job_config},
    validation,
};
use doc_processor::config::Config;
use doc_processor::db;
use doc_processor::engine::{self, EngineSettings, JobEngine, JobId};
use doc_processor::llm::openai_client::OpenAiClient;
use doc_processor::shutdown::ShutdownCoordinator;

#[derive(Parser)]
#[command(name = "doc-processor", about = "Segment-wise document transformation with a language model")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server and re-enter unfinished jobs (default)
    Serve,
    /// List stored jobs
    List,
    /// Print one job as JSON
    Show { id: String },
    /// Process a text file in the foreground
    Run {
        file: PathBuf,
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        name: Option<String>,
        /// Write the assembled result here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn other<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> io::Error + '_ {
    move |e| io::Error::new(io::ErrorKind::Other, format!("{context}: {e}"))
}

/// Console output plus daily rotating files split by level,
/// e.g. logs/info.log.2024-12-22, logs/error.log.2024-12-22
fn init_tracing(log_dir: &str) -> io::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let info_file = tracing_appender::rolling::daily(log_dir, "info.log");
    let warn_file = tracing_appender::rolling::daily(log_dir, "warn.log");
    let error_file = tracing_appender::rolling::daily(log_dir, "error.log");
    let debug_file = tracing_appender::rolling::daily(log_dir, "debug.log");

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let debug_layer = tracing_subscriber::fmt::layer()
        .with_writer(debug_file)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .with(debug_layer)
        .init();

    Ok(())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().map_err(other("Failed to load configuration"))?;

    init_tracing(&config.log_dir)?;

    info!("Starting doc-processor");
    info!("Configuration loaded successfully:");
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Chunk size: {}", config.chunk_size);
    info!("  - Batch size: {}", config.batch_size);
    info!("  - Max concurrent jobs: {}", config.max_concurrent_jobs);
    info!("  - Retry: {:?}", config.retry);

    let store = db::open_store(&config.store)
        .await
        .map_err(other("Failed to open job store"))?;
    let client = OpenAiClient::new(&config.llm).map_err(other("Failed to build generation client"))?;
    info!("Generation endpoint: {} (model {})", client.base_url(), config.llm.model);

    // Every pass observes this channel at its batch boundaries
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = JobEngine::new(
        store,
        Arc::new(client),
        EngineSettings {
            batch_size: config.batch_size,
            max_concurrent_jobs: config.max_concurrent_jobs,
            retry: config.retry.clone(),
        },
        shutdown_rx,
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, engine, shutdown_tx).await,
        Command::List => list(&engine).await,
        Command::Show { id } => show(&engine, &id).await,
        Command::Run {
            file,
            prompt,
            name,
            output,
        } => run(&config, engine, file, prompt, name, output).await,
    }
}

async fn serve(config: Config, engine: Arc<JobEngine>, shutdown_tx: watch::Sender<bool>) -> io::Result<()> {
    let report = engine::recover(&engine)
        .await
        .map_err(other("Failed to scan for unfinished jobs"))?;
    info!(
        "Recovery scanned {} jobs, re-entered {}",
        report.scanned,
        report.handles.len()
    );

    let server_engine = engine.clone();
    let chunk_size = config.chunk_size;
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        let job_service = web::Data::new(JobService::new(server_engine.clone(), chunk_size));

        let payload_config = web::PayloadConfig::default().limit(max_payload_size);

        App::new()
            .app_data(web::Data::from(server_engine.clone()))
            .app_data(job_service)
            .app_data(payload_config)
            .app_data(validation::multipart_config(max_payload_size))
            .app_data(validation::json_config().limit(max_payload_size))
            .configure(health_config)
            .configure(job_config)
    });

    info!("Server starting on http://{}:{}", config.host, config.port);

    let server = server.bind((config.host.as_str(), config.port))?.run();
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(
        server_handle,
        server_task,
        engine,
        shutdown_tx,
        config.shutdown_timeout,
    );

    coordinator.wait_for_shutdown().await
}

async fn list(engine: &JobEngine) -> io::Result<()> {
    let jobs = engine
        .store()
        .list_all()
        .await
        .map_err(other("Failed to list jobs"))?;

    for job in jobs {
        println!(
            "{}  {:<10}  {:>3}%  {:>4} segments  {}",
            job.id,
            job.status,
            job.progress(),
            job.total_segments(),
            job.name
        );
    }
    Ok(())
}

async fn show(engine: &JobEngine, raw_id: &str) -> io::Result<()> {
    let id: JobId = raw_id.parse().map_err(other("Invalid job id"))?;
    let job = engine
        .store()
        .get(id)
        .await
        .map_err(other("Failed to load job"))?
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("Job {id} not found")))?;

    let json = serde_json::to_string_pretty(&job).map_err(other("Failed to encode job"))?;
    println!("{json}");
    Ok(())
}

async fn run(
    config: &Config,
    engine: Arc<JobEngine>,
    file: PathBuf,
    prompt: String,
    name: Option<String>,
    output: Option<PathBuf>,
) -> io::Result<()> {
    let text = tokio::fs::read_to_string(&file).await?;
    let name = name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    });

    let service = JobService::new(engine.clone(), config.chunk_size);
    let submitted = service
        .create_job(&name, &prompt, &text)
        .await
        .map_err(other("Failed to create job"))?;
    info!(
        "Created job {} with {} segments",
        submitted.job.id,
        submitted.job.total_segments()
    );

    let Some(handle) = submitted.handle else {
        return Err(io::Error::new(io::ErrorKind::Other, "Job was not started"));
    };
    let outcome = handle.wait().await.map_err(other("Processing failed"))?;
    info!("Job {} finished: {:?}", submitted.job.id, outcome);

    let job = service
        .get_job(submitted.job.id)
        .await
        .map_err(other("Failed to reload job"))?;
    engine.store().close().await;

    if job.status != engine::JobStatus::Completed {
        error!("Job {} ended with {} failed segments", job.id, job.failed_count());
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("Job {} ended {}; resume it with the HTTP API", job.id, job.status),
        ));
    }

    let assembled = job.results.concat();
    match output {
        Some(path) => tokio::fs::write(&path, assembled).await?,
        None => println!("{assembled}"),
    }
    Ok(())
}
