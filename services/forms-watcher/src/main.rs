//! forms-watcher
//!
//! Single-binary CLI that:
//! 1. Signs the operator in with the Microsoft device-code flow
//! 2. Keeps a list of Microsoft Forms share links to watch
//! 3. Polls each form until it opens, alerting once per form

mod cli;
mod config;
mod error;
mod resolve;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use forms_auth::{CredentialStore, DeviceAuthFlow, TokenRefresher};
use forms_poll::{
    DesktopNotifier, NotificationSink, PollEngine, RegistryStore, ResourceRegistry, RunSummary,
    StatusChecker,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{AddArgs, AuthArgs, ClearArgs, Cli, Commands, PollArgs};
use crate::config::Config;

/// Exit status when the operator has to run `forms-watcher auth` first.
const EXIT_SIGN_IN_REQUIRED: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    // Human-readable logs on stderr; stdout is for the operator prompts
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if needs_sign_in(&e) {
                ExitCode::from(EXIT_SIGN_IN_REQUIRED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("failed to build HTTP client")?;

    match cli.command.unwrap_or(Commands::Poll(PollArgs::default())) {
        Commands::Auth(args) => auth(&config, client, args).await,
        Commands::Add(args) => add(&config, &client, args).await,
        Commands::List => list(&config, &mut std::io::stdout()).await,
        Commands::Clear(args) => clear(&config, args).await,
        Commands::Poll(args) => {
            poll(&config, client, args, Arc::new(DesktopNotifier)).await?;
            Ok(())
        }
    }
}

/// Whether the failure is fixed by signing in again.
fn needs_sign_in(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let auth = match cause.downcast_ref::<forms_poll::Error>() {
            Some(forms_poll::Error::Auth(e)) => Some(e),
            _ => cause.downcast_ref::<forms_auth::Error>(),
        };
        auth.is_some_and(forms_auth::Error::requires_reauth)
    })
}

/// Interactive device-code sign-in; saves the resulting tokens.
async fn auth(config: &Config, client: reqwest::Client, args: AuthArgs) -> Result<()> {
    let tenant = args.tenant.unwrap_or_else(|| config.auth.tenant.clone());
    let flow = DeviceAuthFlow::new(client, &config.auth.login_url, tenant);

    let challenge = flow.begin().await?;
    println!("\n  Go to: {}", challenge.verification_uri);
    println!("  Enter code: {}\n", challenge.user_code);
    print!("  Waiting for sign-in...");
    let _ = std::io::stdout().flush();

    let result = flow
        .await_completion_with(&challenge, || {
            print!(".");
            let _ = std::io::stdout().flush();
        })
        .await;
    println!();
    let tokens = result?;

    let store = CredentialStore::new(&config.auth.token_file);
    store.save(&tokens).await.context("failed to save tokens")?;
    let path = store.path().display();
    println!("  Authenticated! Tokens saved to {path}");
    Ok(())
}

/// Resolve and append share URLs not already watched.
async fn add(config: &Config, client: &reqwest::Client, args: AddArgs) -> Result<()> {
    let store = RegistryStore::new(&config.watch.forms_file);
    let mut forms = store.load().await?;

    // Forms live in the tenant we signed in to, if we have
    let credentials = CredentialStore::new(&config.auth.token_file);
    let tenant = match credentials.load().await {
        Ok(tokens) => tokens.tenant,
        Err(forms_auth::Error::NotAuthenticated) => config.auth.tenant.clone(),
        Err(e) => return Err(e.into()),
    };
    let group = &config.watch.group_id;

    for (i, url) in args.urls.iter().enumerate() {
        if forms.iter().any(|f| f.url == *url) {
            println!("  Already watching: {url}");
            continue;
        }
        print!("  Resolving: {url}... ");
        let _ = std::io::stdout().flush();

        let name = args.names.get(i).cloned();
        let form = resolve::resolve_form(client, url, name, &tenant, group).await?;
        println!("OK ({})", form.short);
        info!(form = %form.label(), form_id = %form.form_id, "form added");
        forms.push(form);
    }

    store.save(&forms).await?;
    println!("\n  Watching {} forms.", forms.len());
    Ok(())
}

async fn list(config: &Config, out: &mut impl Write) -> Result<()> {
    let forms = RegistryStore::new(&config.watch.forms_file).load().await?;
    if forms.is_empty() {
        writeln!(out, "No forms configured.")?;
        return Ok(());
    }
    for form in &forms {
        writeln!(out, "  {}: {}", form.label(), form.url)?;
    }
    Ok(())
}

async fn clear(config: &Config, args: ClearArgs) -> Result<()> {
    RegistryStore::new(&config.watch.forms_file).clear().await?;
    println!("  Cleared all watched forms.");
    if args.tokens {
        let store = CredentialStore::new(&config.auth.token_file);
        store.clear().await?;
        println!("  Removed saved tokens from {}", store.path().display());
    }
    Ok(())
}

/// Watch every registered form until all are resolved.
async fn poll(
    config: &Config,
    client: reqwest::Client,
    args: PollArgs,
    sink: Arc<dyn NotificationSink>,
) -> Result<RunSummary> {
    let forms = RegistryStore::new(&config.watch.forms_file).load().await?;
    if forms.is_empty() {
        anyhow::bail!("No forms configured. Run: forms-watcher add <url> [<url> ...]");
    }

    let credentials = Arc::new(CredentialStore::new(&config.auth.token_file));
    let tokens = credentials.load().await?;

    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.interval());
    let timeout = config.request_timeout();

    let refresher = TokenRefresher::new(client.clone(), &config.auth.login_url, credentials);
    let checker = StatusChecker::new(client, &config.watch.forms_api_url, timeout);
    let engine = PollEngine::new(Arc::new(refresher), Arc::new(checker), sink, interval);

    let secs = engine.interval().as_secs();
    println!("Polling {} forms every {secs}s", forms.len());
    for form in &forms {
        println!("  - {}", form.url);
    }
    println!();

    let mut registry = ResourceRegistry::new(forms);
    let summary = engine.run(&mut registry, tokens).await?;

    if summary.exhausted.is_empty() {
        println!("\nAll forms open. Done.");
    } else {
        println!(
            "\nAll forms resolved ({} open, {} already submitted). Done.",
            summary.opened.len(),
            summary.exhausted.len()
        );
    }
    Ok(summary)
}
