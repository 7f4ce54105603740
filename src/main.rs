use std::{process, sync::Arc, time::Duration};

use stampa::{
    application::convert::{ConvertLimits, ConvertService, EngineConfig, PdfEngine},
    config::{self, Command, EngineSettings, ServeArgs, Settings},
    infra::{
        error::InfraError,
        http::{HttpState, build_router},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), InfraError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::Check(_) => run_check(settings).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), InfraError> {
    let converter = Arc::new(build_converter(&settings));
    let router = build_router(HttpState { converter });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "stampa::serve",
        addr = %settings.server.addr,
        engine = %settings.engine.binary_path.display(),
        timeout_s = settings.engine.timeout.as_secs(),
        max_payload_bytes = settings.convert.max_payload_bytes.get(),
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await
        .map_err(InfraError::from)?;

    info!(target = "stampa::serve", "Server stopped");
    Ok(())
}

async fn run_check(settings: Settings) -> Result<(), InfraError> {
    let engine = PdfEngine::new(engine_config(&settings.engine));
    let binary = settings.engine.binary_path.display();

    match engine.probe().await {
        Ok(true) => {
            info!(
                target = "stampa::check",
                binary = %binary,
                "Rendering engine available"
            );
            println!("rendering engine available: {binary}");
            Ok(())
        }
        Ok(false) => Err(InfraError::configuration(format!(
            "rendering engine at `{binary}` exited unsuccessfully"
        ))),
        Err(err) => Err(InfraError::configuration(format!(
            "rendering engine probe failed: {err}"
        ))),
    }
}

fn build_converter(settings: &Settings) -> ConvertService {
    ConvertService::new(
        PdfEngine::new(engine_config(&settings.engine)),
        ConvertLimits {
            max_payload_bytes: settings.convert.max_payload_bytes.get(),
            scratch_dir: settings.convert.scratch_dir.clone(),
        },
    )
}

fn engine_config(engine: &EngineSettings) -> EngineConfig {
    EngineConfig {
        binary_path: engine.binary_path.clone(),
        timeout: engine.timeout,
        probe_timeout: engine.probe_timeout,
    }
}

/// Resolve once the process receives a shutdown signal. In-flight requests
/// are drained; a watchdog forces exit if draining outlives the grace
/// period.
async fn shutdown_signal(grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target = "stampa::serve", error = %err, "Failed to listen for shutdown signal");
        return;
    }

    info!(
        target = "stampa::serve",
        grace_s = grace.as_secs(),
        "Shutdown signal received; draining connections"
    );

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(
            target = "stampa::serve",
            "Drain deadline exceeded; exiting"
        );
        process::exit(1);
    });
}
