//! `rsvp-proxy` binary: serve RSVPs or bootstrap the OAuth client.

// std
use std::sync::Arc;
// crates.io
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tokio::net::TcpListener;
// self
use rsvp_proxy::{
	auth::CredentialStore,
	cache::ResponseCache,
	config::{Cli, Commands, ServeSettings},
	flows::{AuthorizationRequest, Refresher},
	http::ReqwestHttpClient,
	obs,
	provider::ProviderDescriptor,
	server::{self, AppState},
	service::RsvpService,
	shutdown::Shutdown,
	upstream::ApiClient,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let dotenv = dotenvy::dotenv();

	obs::init_tracing();

	match dotenv {
		Err(e) if !e.not_found() => tracing::warn!(error = %e, "Failed to load .env file."),
		_ => {},
	}

	let cli = Cli::parse();
	let descriptor = ProviderDescriptor::meetup()?;

	match cli.command {
		Commands::Serve(args) => serve(descriptor, args.into_settings()?).await,
		Commands::AuthUrl(args) => {
			let request = AuthorizationRequest::new(
				&descriptor,
				args.client.client_id()?,
				args.client.redirect_uri()?,
			);

			println!("{}", request.url);
			println!("MEETUP_AUTH_STATE={}", request.state);

			Ok(())
		},
		Commands::ExchangeCode(args) => {
			let credentials = args.client.credentials()?;
			let code = AuthorizationRequest::with_state(
				&descriptor,
				&credentials.client_id,
				&credentials.redirect_uri,
				args.state,
			)
			.code_from_callback(&args.callback)?;
			let refresher =
				Refresher::new(descriptor, credentials, Arc::new(CredentialStore::default()))?;
			let pair = refresher.exchange_code(&code).await?;

			println!("MEETUP_ACCESS_TOKEN={}", pair.access_token.expose());

			match pair.refresh_token {
				Some(refresh_token) => println!("MEETUP_REFRESH_TOKEN={}", refresh_token.expose()),
				None => tracing::warn!("Provider did not issue a refresh token."),
			}

			Ok(())
		},
	}
}

async fn serve(descriptor: ProviderDescriptor, settings: ServeSettings) -> Result<()> {
	let shutdown = Shutdown::new();
	let store = Arc::new(CredentialStore::default());
	let http_client = ReqwestHttpClient::new()?;
	let refresher = Arc::new(
		Refresher::with_http_client(
			descriptor.clone(),
			settings.credentials,
			store.clone(),
			http_client.clone(),
		)
		.with_refresh_token(settings.refresh_token)
		.with_interval(settings.refresh_interval)
		.with_exchange_timeout(settings.token_timeout),
	);
	let refresh_metrics = refresher.metrics.clone();
	let api = ApiClient::with_http_client(&descriptor, store.clone(), http_client);
	let cache = Arc::new(
		ResponseCache::new(Arc::new(api), settings.group)
			.with_ttl(settings.cache_ttl)
			.with_fetch_timeout(settings.fetch_timeout)
			.with_sweep_interval(settings.cache_sweep_interval),
	);
	let refresher_task = refresher.start(shutdown.signal()).await;

	if store.snapshot().is_none() {
		tracing::warn!("No access token yet; RSVP requests fail until a refresh succeeds.");
	}

	let sweeper_task = cache.clone().spawn_sweeper(shutdown.signal());
	let app = server::router(
		AppState { service: RsvpService::new(cache), store, refresh_metrics },
		settings.allowed_origins,
	);
	let listener = TcpListener::bind(settings.addr)
		.await
		.wrap_err_with(|| format!("failed to bind {}", settings.addr))?;
	let signal = shutdown.signal();

	tokio::spawn(shutdown.trigger_on_ctrl_c());
	server::serve(listener, app, signal).await?;

	let (refresher, sweeper) = tokio::join!(refresher_task, sweeper_task);

	refresher.wrap_err("credential refresher panicked")?;
	sweeper.wrap_err("cache sweeper panicked")?;

	Ok(())
}
