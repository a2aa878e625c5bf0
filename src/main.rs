use std::{process, sync::Arc, time::Duration};

use blogroll::{
    application::{error::AppError, groups::GroupService, repos::GroupsRepo},
    cache::{PageCacheConfig, PageCacheState},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpOptions, HttpState, session::SESSION_COOKIE},
        memory::MemoryRepositories,
        telemetry,
        uploads::UploadStorage,
    },
};
use tokio::signal;
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::CreateGroup(args) => run_create_group(settings, args).await,
    }
}

async fn connect_postgres(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await?;
    PostgresRepositories::run_migrations(&pool).await?;

    Ok(PostgresRepositories::new(pool))
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    connect_postgres(&settings).await?;
    info!(target = "blogroll::migrate", "Database migrations applied");
    Ok(())
}

async fn run_create_group(
    settings: config::Settings,
    args: config::CreateGroupArgs,
) -> Result<(), AppError> {
    let repositories = Arc::new(connect_postgres(&settings).await?);
    let groups: Arc<dyn GroupsRepo> = repositories;
    let service = GroupService::new(groups);

    let group = service
        .create(&args.title, args.slug.as_deref(), &args.description)
        .await?;

    info!(
        target = "blogroll::create_group",
        id = group.id,
        slug = %group.slug,
        "Group created"
    );
    println!("Created group `{}` at /group/{}/", group.title, group.slug);
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let upload_storage = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone())
            .map_err(InfraError::from)?,
    );

    let cache_config = PageCacheConfig::from(&settings.cache);
    let cache = cache_config
        .enabled
        .then(|| PageCacheState::new(cache_config, SESSION_COOKIE));

    let options = HttpOptions {
        site_title: settings.site.title.clone(),
        cache,
        cookie_secure: settings.session.cookie_secure,
        upload_limit_bytes: usize::try_from(settings.uploads.max_request_bytes.get())
            .unwrap_or(usize::MAX),
    };

    let state = if settings.database.url.is_some() {
        let repositories = Arc::new(connect_postgres(&settings).await?);
        HttpState::new(repositories, upload_storage, options)
    } else {
        warn!(
            target = "blogroll::serve",
            "No database url configured; serving from volatile in-memory storage"
        );
        HttpState::new(Arc::new(MemoryRepositories::new()), upload_storage, options)
    };

    serve_http(&settings, state).await
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "blogroll::serve",
        addr = %settings.server.addr,
        "Listening"
    );

    let grace = settings.server.graceful_shutdown;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(grace))
        .await
        .map_err(AppError::Server)?;

    info!(target = "blogroll::serve", "Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM, then arm a hard deadline for in-flight requests.
async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => error!(error = %err, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(
        target = "blogroll::serve",
        grace_seconds = grace.as_secs(),
        "Shutdown requested; draining connections"
    );
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(
            target = "blogroll::serve",
            "Graceful shutdown timed out; exiting"
        );
        process::exit(1);
    });
}
