use std::{
    io::{self, Write},
    path::PathBuf,
    process,
    sync::Arc,
    time::Duration,
};

use quire::{
    application::{
        error::AppError,
        render::{BodyRenderer, render_service},
        repos::{ArticlesRepo, BodiesRepo},
    },
    cache::{ArticlesCache, BodyCache},
    config::{self, PayloadArgs},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        memory::MemoryStore,
        telemetry,
    },
};
use tokio::task::JoinHandle;
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

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
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
        config::Command::Payload(args) => run_payload(settings, args).await,
    }
}

/// Process-lifetime caches and the store behind them.
struct ApplicationContext {
    store: Arc<MemoryStore>,
    articles: Arc<ArticlesCache>,
    bodies: Arc<BodyCache>,
}

async fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let store = Arc::new(MemoryStore::load_dir(&settings.content.directory).await?);

    let articles_repo: Arc<dyn ArticlesRepo> = store.clone();
    let bodies_repo: Arc<dyn BodiesRepo> = store.clone();
    let renderer: Arc<dyn BodyRenderer> = render_service();

    Ok(ApplicationContext {
        store,
        articles: Arc::new(ArticlesCache::new(articles_repo)),
        bodies: Arc::new(BodyCache::new(bodies_repo, renderer)),
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;

    let reload_handle = settings
        .content
        .reload_interval
        .map(|interval| spawn_content_reload(app.store.clone(), &settings, interval));

    let state = HttpState {
        articles: app.articles,
        bodies: app.bodies,
    };
    let result = serve_http(&settings, state).await;

    if let Some(handle) = reload_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

fn spawn_content_reload(
    store: Arc<MemoryStore>,
    settings: &config::Settings,
    interval: Duration,
) -> JoinHandle<()> {
    let directory: PathBuf = settings.content.directory.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // Skip the first immediate tick
        loop {
            ticker.tick().await;
            match store.reload_dir(&directory).await {
                Ok(Some(version)) => info!(
                    target = "quire::reload",
                    version,
                    dir = %directory.display(),
                    "content changed"
                ),
                Ok(None) => {}
                Err(err) => warn!(
                    target = "quire::reload",
                    error = %err,
                    dir = %directory.display(),
                    "content reload failed; keeping previous content"
                ),
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "quire::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    // Bound the drain phase so a stuck connection cannot hold the process.
    let drain = async {
        server
            .await
            .map_err(|err| AppError::unexpected(format!("server error: {err}")))
    };
    tokio::select! {
        result = drain => result,
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(target = "quire::serve", "graceful shutdown timed out");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "quire::serve", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "quire::serve", "shutdown requested");
}

async fn run_payload(settings: config::Settings, args: PayloadArgs) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;
    let payload = app.articles.payload().await;
    let url = app.articles.resource_url().await;

    let mut stdout = io::stdout().lock();
    let written = if args.url_only {
        writeln!(stdout, "{url}")
    } else {
        writeln!(stdout, "{url}")
            .and_then(|()| stdout.write_all(&payload.bytes))
            .and_then(|()| writeln!(stdout))
    };
    written.map_err(|err| AppError::from(InfraError::from(err)))
}
