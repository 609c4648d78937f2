use std::{process, sync::Arc, time::Duration};

use mediateca::{
    application::{
        auth::Authorizer,
        contents::ContentService,
        definitions::{DefinitionService, DefinitionSource},
        dispatch::Dispatcher,
        files::FileGateway,
        messaging::{PeerMessage, UpdateBus},
        profiles::ProfileService,
        repos::{ContentStore, ProfileStore},
        search::SearchService,
    },
    cache::{ListingCache, MemoryListingCache},
    config,
    infra::{
        auth::RoleBasedAuthorizer,
        bus::InProcessBus,
        definitions::FsDefinitionSource,
        error::InfraError,
        files::{HttpFileGateway, NoopFileGateway},
        http::{self, ApiState},
        store::{MemoryContentStore, MemoryProfileStore},
        telemetry,
    },
};
use serde_json::Value as JsonValue;
use tokio::signal;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

/// Update fan-out buffer per subscriber; slow consumers lag, they do not
/// block publishers.
const UPDATE_BUS_CAPACITY: usize = 64;

/// Inbound peer message type that maps to a download count.
const PEER_DOWNLOAD_KIND: &str = "File#Download";

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
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), InfraError> {
    let app = build_application_context(&settings)?;

    let listener = tokio::net::TcpListener::bind(settings.server.listen).await?;
    info!(listen = %settings.server.listen, "listening");

    let peer_handle = spawn_peer_listener(&app.bus, app.contents.clone());

    // Socket is bound; re-prime connected clients in the background.
    let broadcaster = app.contents.clone();
    tokio::spawn(async move { broadcaster.latest_broadcast().await });

    let router = http::build_router(app.state);
    let result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await
        .map_err(InfraError::from);

    if let Some(handle) = peer_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

struct ApplicationContext {
    state: ApiState,
    contents: ContentService,
    bus: Arc<InProcessBus>,
}

fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, InfraError> {
    let listing_cache = Arc::new(MemoryListingCache::new(settings.cache.capacity.get()));
    let page_cache: Arc<dyn ListingCache> = listing_cache.clone();
    let hint_cache: Arc<dyn ListingCache> = listing_cache.clone();

    let content_store: Arc<dyn ContentStore> = Arc::new(MemoryContentStore::new(
        Some(hint_cache),
        settings.cache.expiration,
    ));
    let profile_store: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::new());

    let files: Arc<dyn FileGateway> = match &settings.files.gateway_url {
        Some(url) => Arc::new(
            HttpFileGateway::new(url.clone(), settings.files.timeout)
                .map_err(|err| InfraError::configuration(format!("files gateway: {err}")))?,
        ),
        None => Arc::new(NoopFileGateway),
    };

    let authorizer: Arc<dyn Authorizer> = Arc::new(RoleBasedAuthorizer);
    let bus = Arc::new(InProcessBus::new(UPDATE_BUS_CAPACITY));
    let update_bus: Arc<dyn UpdateBus> = bus.clone();
    let definition_source: Arc<dyn DefinitionSource> = Arc::new(FsDefinitionSource::new(
        settings.definitions.directory.clone(),
    ));

    let search = SearchService::new(
        content_store.clone(),
        page_cache,
        files.clone(),
        authorizer.clone(),
        settings.files.base_uri.clone(),
        settings.cache.expiration,
    );
    let contents = ContentService::new(
        content_store,
        files,
        authorizer.clone(),
        update_bus,
        settings.files.base_uri.clone(),
    );
    let profiles = ProfileService::new(profile_store, authorizer);
    let definitions = DefinitionService::new(definition_source);

    let dispatcher = Dispatcher::new(search, contents.clone(), profiles, definitions);

    Ok(ApplicationContext {
        state: ApiState {
            dispatcher: Arc::new(dispatcher),
        },
        contents,
        bus,
    })
}

fn spawn_peer_listener(
    bus: &InProcessBus,
    contents: ContentService,
) -> Option<tokio::task::JoinHandle<()>> {
    let mut intake = bus.take_peer_intake()?;
    Some(tokio::spawn(async move {
        while let Some(message) = intake.recv().await {
            handle_peer_message(&contents, message).await;
        }
    }))
}

/// Applies one inbound peer notice. Every failure is logged and
/// swallowed; peers get no feedback channel.
async fn handle_peer_message(contents: &ContentService, message: PeerMessage) {
    if !message.kind.eq_ignore_ascii_case(PEER_DOWNLOAD_KIND) {
        return;
    }

    let Some(raw) = message.data.get("x-object-id").and_then(JsonValue::as_str) else {
        warn!(kind = %message.kind, "peer download notice without an object id");
        return;
    };

    match Uuid::parse_str(raw) {
        Ok(id) => {
            if let Err(error) = contents.record_download(id).await {
                warn!(error = %error, %id, "recording a peer download failed");
            }
        }
        Err(error) => {
            warn!(error = %error, value = raw, "peer download notice with a malformed id");
        }
    }
}

async fn shutdown_signal(drain: Duration) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            error!(error = %error, "failed to install the interrupt handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => error!(error = %error, "failed to install the terminate handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!(
        drain_seconds = drain.as_secs(),
        "shutdown signal received, draining connections"
    );

    // A stuck connection must not wedge the exit.
    tokio::spawn(async move {
        tokio::time::sleep(drain).await;
        warn!("drain window elapsed, exiting");
        process::exit(0);
    });
}
