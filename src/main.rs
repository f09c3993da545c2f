use std::{future::IntoFuture, process, sync::Arc};

use tessera::{
    application::{
        error::AppError,
        handlers::{default_registry, parse_payload},
        registry::HandlerRegistry,
    },
    cache::{CacheConfig, CacheError, CacheTracker, MemoryStore, Mutations, PageStore, StoreBackend},
    config,
    domain::keys::DataKey,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        memcached::MemcachedStore,
        news_board::InMemoryNewsBoard,
        telemetry,
    },
    routing::{CleanPath, Resolution, RouteResolver, RouteTable},
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

    let app = build_application_context(&settings)?;

    match command {
        config::Command::Serve(_) => serve_http(&settings, app).await,
        config::Command::Index => run_index(app),
        config::Command::Routes => run_routes(&settings, app),
        config::Command::Resolve(args) => run_resolve(&settings, app, args),
        config::Command::Invalidate(args) => run_invalidate(app, args).await,
        config::Command::Delete(args) => run_delete(app, args).await,
    }
}

struct ApplicationContext {
    registry: Arc<HandlerRegistry>,
    tracker: Arc<CacheTracker>,
    resolver: RouteResolver,
}

fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let registry = Arc::new(default_registry(Arc::new(InMemoryNewsBoard::new())));

    let cache_config = CacheConfig::from(&settings.cache);
    let store = build_store(&cache_config);
    info!(
        target = "tessera::cache",
        backend = store.backend(),
        namespace = %cache_config.namespace,
        caching = cache_config.cache_content,
        "page store configured"
    );
    let tracker = Arc::new(CacheTracker::new(
        cache_config,
        Arc::clone(&registry),
        store,
    )?);

    let mut resolver = RouteResolver::new(registry.clone(), settings.routing.user_404);
    if settings.routing.cache_route {
        resolver = resolver.with_table(RouteTable::load_or_build(
            &settings.routing.route_snapshot_path,
            &*registry,
        ));
    }
    info!(
        target = "tessera::routing",
        mode = resolver.mode().as_str(),
        handlers = registry.len(),
        "route resolver ready"
    );

    Ok(ApplicationContext {
        registry,
        tracker,
        resolver,
    })
}

fn build_store(config: &CacheConfig) -> Arc<dyn PageStore> {
    match config.backend {
        StoreBackend::Memcached => Arc::new(MemcachedStore::new(config)),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    }
}

async fn serve_http(settings: &config::Settings, app: ApplicationContext) -> Result<(), AppError> {
    let router = http::build_router(HttpState {
        registry: app.registry,
        resolver: app.resolver,
        tracker: app.tracker,
        reserved_prefixes: settings.routing.reserved_prefixes.clone().into(),
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "tessera::serve", addr = %settings.server.addr, "listening");

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let stop = Arc::clone(&stop);
        async move { stop.notified().await }
    });
    let mut server = std::pin::pin!(server.into_future());

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        () = shutdown_signal() => {}
    }

    let grace = settings.server.graceful_shutdown;
    info!(target = "tessera::serve", grace_secs = grace.as_secs(), "shutting down");
    stop.notify_one();

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "tessera::serve",
                "graceful shutdown window elapsed; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

fn run_index(app: ApplicationContext) -> Result<(), AppError> {
    let index = app.tracker.build_index()?;
    print_json(&*index)
}

fn run_routes(settings: &config::Settings, app: ApplicationContext) -> Result<(), AppError> {
    let table = RouteTable::from_catalog(&*app.registry);
    table
        .persist(&settings.routing.route_snapshot_path)
        .map_err(CacheError::from)?;
    info!(
        target = "tessera::routing",
        path = %settings.routing.route_snapshot_path.display(),
        handlers = table.len(),
        "route snapshot rebuilt"
    );
    print_json(&table)
}

fn run_resolve(
    settings: &config::Settings,
    app: ApplicationContext,
    args: config::ResolveArgs,
) -> Result<(), AppError> {
    let path = CleanPath::parse(&args.path, settings.routing.reserved_prefixes.as_slice())?;
    match app.resolver.resolve(&path) {
        Resolution::Found(route) => {
            println!(
                "{} -> {} {:?}",
                path,
                route.handler,
                route.arguments.as_slice()
            );
            Ok(())
        }
        Resolution::NotFound => Err(AppError::NotFound),
    }
}

async fn run_invalidate(
    app: ApplicationContext,
    args: config::InvalidateArgs,
) -> Result<(), AppError> {
    let payload = parse_payload(args.payload.as_deref().unwrap_or_default());
    let mutations = Mutations::single(DataKey::new(args.key), payload);
    let report = app.tracker.invalidate_async(mutations).await?;

    for key in &report.keys {
        println!("{key}");
    }
    info!(
        target = "tessera::cache",
        handlers = report.handlers.len(),
        keys = report.keys.len(),
        removed = report.removed,
        "invalidation finished"
    );
    Ok(())
}

async fn run_delete(app: ApplicationContext, args: config::DeleteArgs) -> Result<(), AppError> {
    let removed = app.tracker.delete_key_async(args.key.clone()).await?;
    println!("{} {}", args.key, if removed { "deleted" } else { "not found" });
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render json: {err}")))?;
    println!("{rendered}");
    Ok(())
}
