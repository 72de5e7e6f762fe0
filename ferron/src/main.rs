mod acme;
mod cert_catalog;
mod publisher;
mod request_handler;
mod setup;
mod snapshot;
mod stream;
mod util;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ferron_common::acme::AcmeJobQueue;
use ferron_common::error::FatalError;
use ferron_common::logging::ErrorLogger;
use ferron_common::modules::{Http01TokenStore, SocketData};
use ferron_common::observability::ObservabilityBackend;
use ferron_common::reconcile::ReconcileHandle;
use ferron_observability_builtin::{LogFileObservabilityBackend, Stats};
use ferron_store::Store;
use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use mimalloc::MiMalloc;
use password_auth::generate_hash;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use acme::worker::AcmeWorker;
use cert_catalog::{generate_fallback_certified_key, CertificateCatalog};
use publisher::{trusted_proxies_from_env, Publisher};
use request_handler::{handle_request, AccessLog, AnyBody};
use setup::{build_tls_server_config, Cli, Command};
use stream::StreamForwarder;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Spec.md §5's drain window: once the shutdown signal fires, listeners
/// stop accepting and in-flight connections get this long to finish before
/// the process gives up on them and exits anyway.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> std::process::ExitCode {
  human_panic::setup_panic!();
  let cli = Cli::parse();

  if let Some(Command::HashPassword { password }) = cli.command {
    println!("{}", generate_hash(password));
    return std::process::ExitCode::SUCCESS;
  }

  if rustls::crypto::aws_lc_rs::default_provider().install_default().is_err() {
    eprintln!("FATAL: could not install the default TLS crypto provider");
    return std::process::ExitCode::from(1);
  }

  let available_parallelism = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
  let runtime = match tokio::runtime::Builder::new_multi_thread()
    .worker_threads(available_parallelism)
    .thread_name("ferron-worker")
    .enable_all()
    .build()
  {
    Ok(runtime) => runtime,
    Err(err) => {
      eprintln!("FATAL: could not start the Tokio runtime: {err}");
      return std::process::ExitCode::from(1);
    }
  };

  match runtime.block_on(run(cli)) {
    Ok(()) => std::process::ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("FATAL: {err}");
      std::process::ExitCode::from(err.exit_code() as u8)
    }
  }
}

async fn run(cli: Cli) -> Result<(), FatalError> {
  for dir in [&cli.data_dir, &cli.config_dir, &cli.log_dir, &cli.static_dir] {
    tokio::fs::create_dir_all(dir)
      .await
      .map_err(|err| FatalError::StoreOpen(format!("could not create directory {}: {err}", dir.display())))?;
  }

  let store = Arc::new(
    Store::open(cli.data_dir.join("data.db"))
      .await
      .map_err(|err| FatalError::StoreOpen(err.to_string()))?,
  );

  let observability = LogFileObservabilityBackend::open(
    Some(&cli.log_dir.join("access.log")),
    Some(&cli.log_dir.join("error.log")),
  )
  .await
  .map_err(|err| FatalError::StoreOpen(format!("could not open log files: {err}")))?;
  let log_channel = observability.get_log_channel();
  let error_logger = ErrorLogger::new(log_channel.clone());
  let access_log: AccessLog = log_channel;

  let fallback_key = generate_fallback_certified_key()
    .map_err(|err| FatalError::StoreOpen(format!("could not generate the fallback certificate: {err}")))?;
  let cert_catalog = Arc::new(CertificateCatalog::new(Arc::new(fallback_key)));

  let stream_forwarder = Arc::new(StreamForwarder::new(error_logger.clone()));
  let trusted_proxies = trusted_proxies_from_env();

  let publisher = Arc::new(
    Publisher::new(store.clone(), cert_catalog.clone(), stream_forwarder.clone(), trusted_proxies)
      .await
      .map_err(|err| FatalError::StoreOpen(format!("could not build the initial configuration snapshot: {err}")))?,
  );
  publisher.spawn_reconcile_loop();

  let http01_tokens: Http01TokenStore = Arc::new(RwLock::new(HashMap::new()));

  let acme_worker = AcmeWorker::new(
    store.clone(),
    cert_catalog.clone(),
    http01_tokens.clone(),
    publisher.clone() as Arc<dyn ReconcileHandle>,
    cli.config_dir.clone(),
  )
  .map_err(|err| FatalError::StoreOpen(format!("could not start the ACME worker: {err}")))?;
  let acme_jobs: AcmeJobQueue = Arc::new(acme_worker).spawn();

  let stats = Arc::new(Stats::new());

  // A missing JWT_SECRET is treated the same as any other unusable
  // bootstrap configuration: the process refuses to start rather than
  // mint admin sessions nobody asked it to sign.
  let jwt_secret: Arc<str> = Arc::from(
    std::env::var("JWT_SECRET").map_err(|_| FatalError::StoreOpen("JWT_SECRET environment variable is not set".to_string()))?,
  );

  let admin_state = ferron_admin_api::AppState {
    store: (*store).clone(),
    reconcile: publisher.clone() as Arc<dyn ReconcileHandle>,
    acme_jobs,
    stats: stats.clone(),
    jwt_secret,
    access_log_path: Arc::new(cli.log_dir.join("access.log")),
  };
  let admin_router = ferron_admin_api::build_router(admin_state);

  let shutdown = CancellationToken::new();

  let http_listener = TcpListener::bind(("0.0.0.0", 8080))
    .await
    .map_err(|err| FatalError::ListenerBind(format!("0.0.0.0:8080: {err}")))?;
  let https_listener = TcpListener::bind(("0.0.0.0", 443))
    .await
    .map_err(|err| FatalError::ListenerBind(format!("0.0.0.0:443: {err}")))?;
  let admin_listener = TcpListener::bind(("0.0.0.0", 81))
    .await
    .map_err(|err| FatalError::ListenerBind(format!("0.0.0.0:81: {err}")))?;

  let tls_config = build_tls_server_config(cert_catalog.clone());

  let http_task = tokio::spawn(serve_plain(
    http_listener,
    publisher.clone(),
    stats.clone(),
    http01_tokens.clone(),
    error_logger.clone(),
    access_log.clone(),
    shutdown.clone(),
  ));

  let https_task = tokio::spawn(serve_tls(
    https_listener,
    tls_config,
    publisher.clone(),
    stats.clone(),
    http01_tokens.clone(),
    error_logger.clone(),
    access_log.clone(),
    shutdown.clone(),
  ));

  let admin_shutdown = shutdown.clone();
  let admin_task = tokio::spawn(async move {
    if let Err(err) = axum::serve(admin_listener, admin_router)
      .with_graceful_shutdown(async move { admin_shutdown.cancelled().await })
      .await
    {
      eprintln!("admin API server error: {err}");
    }
  });

  wait_for_shutdown_signal().await;
  shutdown.cancel();

  let _ = tokio::join!(http_task, https_task, admin_task);

  Ok(())
}

/// The plain-HTTP listener: serves port 8080, used both for ordinary
/// traffic behind `ForceHttps`/`Redirect` and for ACME HTTP-01 challenge
/// responses, which must never be redirected.
#[allow(clippy::too_many_arguments)]
async fn serve_plain(
  listener: TcpListener,
  publisher: Arc<Publisher>,
  stats: Arc<Stats>,
  tokens: Http01TokenStore,
  error_logger: ErrorLogger,
  access_log: AccessLog,
  shutdown: CancellationToken,
) {
  let graceful = GracefulShutdown::new();
  loop {
    tokio::select! {
      accepted = listener.accept() => {
        let (stream, remote_addr) = match accepted {
          Ok(pair) => pair,
          Err(err) => {
            error_logger.log(format!("cannot accept a connection: {err}"));
            continue;
          }
        };
        let _ = stream.set_nodelay(true);
        let local_addr = stream.local_addr().unwrap_or(remote_addr);
        spawn_connection(
          TokioIo::new(stream),
          remote_addr,
          local_addr,
          false,
          publisher.clone(),
          stats.clone(),
          tokens.clone(),
          error_logger.clone(),
          access_log.clone(),
          &graceful,
        );
      }
      _ = shutdown.cancelled() => break,
    }
  }
  tokio::select! {
    _ = graceful.shutdown() => {}
    _ = tokio::time::sleep(DRAIN_TIMEOUT) => {}
  }
}

/// The HTTPS listener: serves port 443, terminating TLS with SNI-driven
/// certificate selection from the Certificate Catalog before handing the
/// plaintext connection to the same request pipeline as `serve_plain`.
#[allow(clippy::too_many_arguments)]
async fn serve_tls(
  listener: TcpListener,
  tls_config: Arc<rustls::ServerConfig>,
  publisher: Arc<Publisher>,
  stats: Arc<Stats>,
  tokens: Http01TokenStore,
  error_logger: ErrorLogger,
  access_log: AccessLog,
  shutdown: CancellationToken,
) {
  let acceptor = tokio_rustls::TlsAcceptor::from(tls_config);
  let graceful = GracefulShutdown::new();
  loop {
    tokio::select! {
      accepted = listener.accept() => {
        let (stream, remote_addr) = match accepted {
          Ok(pair) => pair,
          Err(err) => {
            error_logger.log(format!("cannot accept a connection: {err}"));
            continue;
          }
        };
        let _ = stream.set_nodelay(true);
        let local_addr = stream.local_addr().unwrap_or(remote_addr);
        let tls_stream = match acceptor.accept(stream).await {
          Ok(tls_stream) => tls_stream,
          Err(err) => {
            error_logger.log(format!("TLS handshake failed: {err}"));
            continue;
          }
        };
        spawn_connection(
          TokioIo::new(tls_stream),
          remote_addr,
          local_addr,
          true,
          publisher.clone(),
          stats.clone(),
          tokens.clone(),
          error_logger.clone(),
          access_log.clone(),
          &graceful,
        );
      }
      _ = shutdown.cancelled() => break,
    }
  }
  tokio::select! {
    _ = graceful.shutdown() => {}
    _ = tokio::time::sleep(DRAIN_TIMEOUT) => {}
  }
}

/// Hands one accepted (and, for HTTPS, already TLS-terminated) connection
/// to hyper's protocol-sniffing HTTP/1.1-or-HTTP/2 builder, routing every
/// request on it through [`handle_request`].
#[allow(clippy::too_many_arguments)]
fn spawn_connection<IO>(
  io: IO,
  remote_addr: SocketAddr,
  local_addr: SocketAddr,
  encrypted: bool,
  publisher: Arc<Publisher>,
  stats: Arc<Stats>,
  tokens: Http01TokenStore,
  error_logger: ErrorLogger,
  access_log: AccessLog,
  graceful: &GracefulShutdown,
) where
  IO: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
  let service = service_fn(move |request: Request<hyper::body::Incoming>| {
    let publisher = publisher.clone();
    let stats = stats.clone();
    let tokens = tokens.clone();
    let error_logger = error_logger.clone();
    let access_log = access_log.clone();
    async move {
      let request = box_request(request);
      let snapshot = publisher.current();
      let socket_data = SocketData {
        remote_addr,
        local_addr,
        encrypted,
      };
      let response = handle_request(request, snapshot, socket_data, stats, tokens, error_logger, access_log).await;
      Ok::<_, std::convert::Infallible>(response)
    }
  });

  let conn = auto::Builder::new(TokioExecutor::new()).serve_connection_with_upgrades(io, service);
  let conn = graceful.watch(conn);
  tokio::spawn(async move {
    if let Err(err) = conn.await {
      eprintln!("connection error: {err}");
    }
  });
}

fn box_request(request: Request<hyper::body::Incoming>) -> Request<AnyBody> {
  let (parts, body) = request.into_parts();
  Request::from_parts(parts, body.map_err(|err| std::io::Error::other(err.to_string())).boxed())
}

async fn wait_for_shutdown_signal() {
  let ctrl_c = async {
    let _ = tokio::signal::ctrl_c().await;
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(_) => std::future::pending::<()>().await,
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
}
