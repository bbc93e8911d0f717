use clap::Parser;
use env_logger::Env;
use log::warn;
use std::process;
use std::sync::Arc;
use std::time::Instant;
use trustgrid::{
    auth::{AuthClient, TokenStore},
    backend::{build_http_client, normalize_base_url, HttpBackend},
    cli::{Cli, Commands},
    config::Config,
    display::{DisplayManager, StageBars},
    lifecycle::{LifecycleEvent, Phase, ScanController},
    profile::{ScanProfile, ScannerKind},
    store::{Action, AppState, Store},
    types::{ResultRecord, ScanRequest},
    utils::progress,
    Result, ScanError,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let display = DisplayManager::with_quiet(cli.quiet);

    if !cli.quiet {
        display.print_banner(
            "🔒 TRUSTGRID - Security Scan Client",
            Some("Authorized Testing Only"),
        );
    }

    let mut config = if let Some(config_path) = &cli.config {
        match Config::load_from_file(&config_path.to_string_lossy()) {
            Ok(config) => {
                if !cli.quiet {
                    display.print_success(&format!("Loaded configuration from {}", config_path.display()));
                }
                config
            }
            Err(e) => {
                display.print_warning(&format!("Failed to load configuration: {}, using defaults", e));
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    // Apply CLI overrides to config
    if let Some(base_url) = &cli.base_url {
        config.backend.base_url = base_url.clone();
    }
    if let Some(interval) = cli.interval {
        config.polling.interval_ms = Some(interval);
    }
    if let Some(timeout) = cli.timeout {
        config.backend.request_timeout = timeout;
    }
    if let Some(output) = &cli.output {
        config.reporting.output_dir = output.clone();
    }

    let token_store = TokenStore::new(config.auth.token_file.clone());
    let session = token_store.load().unwrap_or_else(|e| {
        warn!("Ignoring unreadable session file {}: {}", token_store.path().display(), e);
        None
    });
    let store = Store::new(AppState {
        session,
        active_scan: None,
    });

    let start_time = Instant::now();

    let result = match &cli.command {
        Commands::Register { username, email, password } => {
            execute_register(&config, &display, username, email, password).await
        }
        Commands::Login { username, password } => {
            execute_login(&config, &display, &store, &token_store, username, password).await
        }
        Commands::Logout => execute_logout(&display, &store, &token_store),
        Commands::Whoami => execute_whoami(&config, &display, &store).await,
        command => match command.scan_target() {
            Some((kind, target, ports)) => {
                let request = match ports {
                    Some(ports) => ScanRequest::new(target).with_ports(ports),
                    None => ScanRequest::new(target),
                };
                execute_scan(&config, &display, &store, kind, request, cli.download).await
            }
            None => Err(ScanError::InvalidInput("unsupported command".to_string())),
        },
    };

    match result {
        Ok(_) => {
            if !cli.quiet {
                display.print_success(&format!(
                    "Done in {}",
                    trustgrid::utils::time::format_duration(start_time.elapsed())
                ));
            }
        }
        Err(e) => {
            display.print_error(&e.to_string());
            process::exit(1);
        }
    }
}

async fn execute_scan(
    config: &Config,
    display: &DisplayManager,
    store: &Store,
    kind: ScannerKind,
    request: ScanRequest,
    download: bool,
) -> Result<()> {
    let profile = config.tune_profile(ScanProfile::for_kind(kind));
    display.print_section_header(&format!("🌐 {}", profile.title.to_uppercase()));

    let token = if config.auth.attach_token {
        store.access_token()
    } else {
        None
    };
    let backend = Arc::new(HttpBackend::new(config)?.with_token(token));
    let (mut controller, mut events) = ScanController::new(profile.clone(), backend, store.clone());
    controller.set_distraction_delay(config.distraction_delay());

    // Inline scanners answer on the create call, which can take a while.
    let spinner = (!profile.is_polling() && !display.is_quiet())
        .then(|| progress::create_spinner(&format!("Running {}...", profile.title)));
    let submitted = tokio::select! {
        result = controller.submit(request) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let Some(submitted) = submitted else {
        controller.stop();
        display.print_warning(&controller.message());
        display.print_info("The backend may still be running this scan.");
        return Ok(());
    };

    if let Err(e) = submitted {
        display.print_warning(&controller.message());
        return Err(e);
    }

    let mut bars = StageBars::new(display.is_quiet());
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    LifecycleEvent::Submitted { target } => {
                        display.print_info(&format!("🎯 Scanning {}", target));
                    }
                    LifecycleEvent::Started { scan_id } => {
                        display.print_info(&format!("Scan queued as {} (polling every {} ms)",
                            scan_id, profile.poll_interval.as_millis()));
                        display.print_warning("Keep this terminal open; Ctrl-C stops polling.");
                        bars.update(&controller.snapshot().progress);
                    }
                    LifecycleEvent::Progress(map) => bars.update(&map),
                    LifecycleEvent::DistractionOffered => {
                        bars.println("  ☕ Still scanning. Big targets take a while; grab a coffee.");
                    }
                    terminal => {
                        debug_assert!(terminal.is_terminal());
                        bars.finish();
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                controller.stop();
            }
        }
    }

    let state = controller.snapshot();
    match state.phase {
        Phase::Finished => {
            display.print_scan_message(&state.message);
            println!();
            display.print_results(&profile, &state.results);
            display.print_scan_summary(&profile, &state);

            if download {
                match controller.download_report(&config.reporting.output_dir).await {
                    Ok(path) => display.print_success(&format!("Report saved to {}", path.display())),
                    Err(ScanError::NoReport(reason)) => display.print_warning(&reason),
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        }
        Phase::Stopped => {
            display.print_warning(&state.message);
            display.print_info("The backend may still be running this scan.");
            Ok(())
        }
        _ => {
            display.print_scan_summary(&profile, &state);
            Err(ScanError::ScanFailed(state.message))
        }
    }
}

fn auth_client(config: &Config) -> Result<AuthClient> {
    let client = build_http_client(config)?;
    let base = normalize_base_url(&config.backend.base_url)?;
    Ok(AuthClient::new(client, base))
}

async fn execute_register(
    config: &Config,
    display: &DisplayManager,
    username: &str,
    email: &str,
    password: &str,
) -> Result<()> {
    display.print_section_header("📝 REGISTER");
    auth_client(config)?.register(username, email, password).await?;
    display.print_success(&format!("Account {} created; log in to start scanning", username));
    Ok(())
}

async fn execute_login(
    config: &Config,
    display: &DisplayManager,
    store: &Store,
    token_store: &TokenStore,
    username: &str,
    password: &str,
) -> Result<()> {
    display.print_section_header("🔑 LOGIN");
    let tokens = auth_client(config)?.login(username, password).await?;
    token_store.save(&tokens)?;
    store.dispatch(Action::LoggedIn(tokens));
    display.print_success(&format!("Logged in as {}", username));
    Ok(())
}

fn execute_logout(display: &DisplayManager, store: &Store, token_store: &TokenStore) -> Result<()> {
    token_store.clear()?;
    store.dispatch(Action::LoggedOut);
    display.print_success("Logged out");
    Ok(())
}

async fn execute_whoami(config: &Config, display: &DisplayManager, store: &Store) -> Result<()> {
    let access = store
        .access_token()
        .ok_or_else(|| ScanError::AuthenticationFailed("not logged in".to_string()))?;

    let user = auth_client(config)?.current_user(&access).await?;
    display.print_section_header("👤 CURRENT USER");
    display.print_key_values(&ResultRecord(user));
    Ok(())
}
