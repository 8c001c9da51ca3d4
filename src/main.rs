use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use http::{Request, Response};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use edgegate::alert::{AlertScript, Dispatcher, EventQueue, ALERT_INTERVAL};
use edgegate::config::{Protocol, ProxyStore};
use edgegate::filter::{self, Decision};
use edgegate::forwarder::{denied_response, no_backend_response, Forwarder, ProxyBody};
use edgegate::registry::HostRegistry;
use edgegate::selector::Selector;
use edgegate::statistics::{self, Counters, StatisticsSink};
use edgegate::tls::CertStore;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
	/// Path to the proxy configuration document (spec.md §6).
	#[arg(long, value_name = "file")]
	proxy_config: std::path::PathBuf,

	/// Path to the alert configuration document (spec.md §6). Optional: a
	/// deployment with no alerting simply omits it.
	#[arg(long, value_name = "file")]
	alert_config: Option<std::path::PathBuf>,

	/// Root directory of the certificate layout described in spec.md §6.
	#[arg(long, value_name = "dir", default_value = "certs")]
	cert_dir: std::path::PathBuf,
}

struct App {
	config: Arc<ProxyStore>,
	registry: Arc<HostRegistry>,
	certs: Arc<CertStore>,
	selector: Arc<Selector>,
	forwarder: Arc<Forwarder>,
}

async fn handle(app: Arc<App>, req: Request<Incoming>, peer: SocketAddr, is_tls: bool) -> Result<Response<ProxyBody>, Infallible> {
	let host_header = req
		.headers()
		.get(http::header::HOST)
		.and_then(|v| v.to_str().ok())
		.unwrap_or_default()
		.to_string();
	let host = filter::strip_port(&host_header).to_string();

	let Decision { admit, body } = filter::check(&app.config, &app.certs, &host, is_tls);
	if !admit {
		return Ok(denied_response(body.unwrap_or_default()));
	}

	let policy = app.config.policy();
	let Some(endpoint) = app.selector.select(&app.config, &app.registry, &host, policy) else {
		return Ok(no_backend_response(&host));
	};

	match app.forwarder.forward(req, &host, &endpoint, peer, is_tls).await {
		Ok(resp) => Ok(resp.map(|b| http_body_util::Either::Left(b))),
		Err(e) => {
			warn!(error = %e, %host, "error forwarding request");
			Ok(no_backend_response(&host))
		},
	}
}

async fn serve_http(addr: &str, app: Arc<App>) -> Result<()> {
	let addr: SocketAddr = normalize_addr(addr).parse()?;
	let listener = TcpListener::bind(addr).await?;
	info!(%addr, "listening for http");
	loop {
		let (stream, peer) = listener.accept().await?;
		let io = TokioIo::new(stream);
		let app = app.clone();
		tokio::spawn(async move {
			let service = hyper::service::service_fn(move |req| handle(app.clone(), req, peer, false));
			if let Err(e) = ConnBuilder::new(TokioExecutor::new()).serve_connection(io, service).await {
				warn!(error = %e, "connection error");
			}
		});
	}
}

/// `":80"`-style addresses (spec.md §6) bind all interfaces.
fn normalize_addr(addr: &str) -> String {
	if let Some(stripped) = addr.strip_prefix(':') {
		format!("0.0.0.0:{stripped}")
	} else {
		addr.to_string()
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.init();

	let args = Args::parse();

	let config = match ProxyStore::load(&args.proxy_config) {
		Ok(c) => Arc::new(c),
		Err(e) => {
			error!(error = %e, "fatal: could not load proxy configuration");
			std::process::exit(1);
		},
	};

	let certs = match CertStore::load(&args.cert_dir) {
		Ok(c) => Arc::new(c),
		Err(e) => {
			error!(error = %e, "fatal: could not enumerate certificate directory");
			std::process::exit(1);
		},
	};

	let registry = Arc::new(HostRegistry::new());
	let queue = Arc::new(EventQueue::new());

	if let Some(alert_path) = &args.alert_config {
		match AlertScript::load(alert_path) {
			Ok(script) => {
				for (host, events) in script.hosts {
					queue.push(host, events);
				}
				info!(email_open = script.email.open, "alert script loaded");
			},
			Err(e) => {
				error!(error = %e, "fatal: could not load alert configuration");
				std::process::exit(1);
			},
		}
	}

	use rand::SeedableRng;
	let rng = rand::rngs::SmallRng::from_os_rng();
	let selector = Arc::new(Selector::new(rng));
	let stats: Arc<dyn StatisticsSink> = Arc::new(Counters::default());
	let forwarder = Arc::new(Forwarder::new(stats.clone()));

	let app = Arc::new(App { config: config.clone(), registry: registry.clone(), certs, selector, forwarder });

	let mut tasks = JoinSet::new();

	if config.global_switch(Protocol::Http) {
		let http_addr = config.http_addr();
		let app = app.clone();
		tasks.spawn(async move {
			if let Err(e) = serve_http(&http_addr, app).await {
				error!(error = %e, "http listener exited");
			}
		});
	}

	if config.global_switch(Protocol::Https) {
		// TLS termination and the HTTPS listener socket are external to this
		// crate (spec.md §1); only the admission decision is implemented.
		warn!("https_switch is on but the TLS listener is out of this crate's scope");
	}

	tasks.spawn(async move {
		statistics::run(stats, statistics::STATISTICS_INTERVAL).await;
	});

	tasks.spawn(async move {
		let mut ticker = tokio::time::interval(ALERT_INTERVAL);
		loop {
			ticker.tick().await;
			Dispatcher::dispatch_once(&queue, &registry);
		}
	});

	while let Some(result) = tasks.join_next().await {
		result?;
	}
	Ok(())
}
