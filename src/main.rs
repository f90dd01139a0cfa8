use std::{
    io::{self, Read},
    path::Path,
    pin::pin,
    process,
    sync::Arc,
};

use mdkv::{
    application::{
        convert::{ConversionService, ConvertError, wrap_output},
        error::AppError,
        history::HistoryService,
        render::{ComrakRenderService, RenderService},
    },
    config::{self, ConvertArgs, HistoryArgs, HistoryCommand, Settings},
    infra::{
        error::InfraError,
        http::{self, AppState},
        kv::open_store,
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Convert(args) => run_convert(settings, args).await,
        config::Command::History(args) => run_history(settings, args).await,
    }
}

async fn build_history(settings: &Settings) -> Result<Arc<HistoryService>, AppError> {
    let store = open_store(&settings.store).await?;
    Ok(Arc::new(
        HistoryService::new(store).with_timeout(settings.store.timeout),
    ))
}

fn build_conversions(settings: &Settings, history: Arc<HistoryService>) -> ConversionService {
    ConversionService::new(Arc::new(ComrakRenderService::new()), history)
        .with_max_input_bytes(settings.render.max_input_bytes.get())
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let history = build_history(&settings).await?;
    let conversions = Arc::new(build_conversions(&settings, history));

    // Leave room for JSON framing around an input at the size limit.
    let body_limit = settings.render.max_input_bytes.get().saturating_mul(2);
    let router = http::build_router(AppState::new(conversions), body_limit);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown({
            let shutdown = Arc::clone(&shutdown);
            async move { shutdown.notified().await }
        })
        .into_future();
    let mut server = pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        () = shutdown_signal() => {}
    }

    info!(
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown requested; draining connections"
    );
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(result) => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            info!("server stopped");
        }
        Err(_) => warn!("graceful shutdown timed out; dropping open connections"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn run_convert(settings: Settings, args: ConvertArgs) -> Result<(), AppError> {
    let source = read_source(args.file.as_deref()).await?;
    if source.is_empty() {
        return Err(AppError::validation(if args.reverse {
            "no html provided"
        } else {
            "no markdown provided"
        }));
    }

    let limit = settings.render.max_input_bytes.get();
    if source.len() > limit {
        return Err(ConvertError::TooLarge {
            limit,
            actual: source.len(),
        }
        .into());
    }

    let renderer = ComrakRenderService::new();
    let rendered = if args.reverse {
        renderer.render_reverse(&source)
    } else {
        renderer.render(&source)
    }
    .map_err(ConvertError::from)?;

    let output = if args.reverse {
        rendered
    } else {
        let css = match args.css.as_deref() {
            Some(path) => Some(read_file(path).await?),
            None => None,
        };
        wrap_output(&rendered, css.as_deref())
    };

    println!("{output}");
    Ok(())
}

async fn run_history(settings: Settings, args: HistoryArgs) -> Result<(), AppError> {
    let history = build_history(&settings).await?;

    match args.command {
        HistoryCommand::List => {
            let records = history.fetch().await?;
            let encoded = serde_json::to_string_pretty(&records)
                .map_err(|err| AppError::unexpected(format!("failed to encode history: {err}")))?;
            println!("{encoded}");
        }
        HistoryCommand::Clear => {
            history.clear().await?;
            info!("history cleared");
        }
    }

    Ok(())
}

async fn read_source(path: Option<&Path>) -> Result<String, AppError> {
    match path {
        Some(path) => read_file(path).await,
        None => tokio::task::spawn_blocking(|| {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).map(|_| buffer)
        })
        .await
        .map_err(|err| AppError::unexpected(format!("stdin reader failed: {err}")))?
        .map_err(|err| AppError::from(InfraError::from(err))),
    }
}

async fn read_file(path: &Path) -> Result<String, AppError> {
    tokio::fs::read_to_string(path).await.map_err(|err| {
        AppError::validation(format!("failed to read `{}`: {err}", path.display()))
    })
}
