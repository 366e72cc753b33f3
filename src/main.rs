//! WolfDAV - Multi-tenant WebDAV Access Control
//!
//! Serves Davfile-declared mounts over HTTP and provides tools to check
//! the mount configuration and trace routing decisions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::Method;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfdav::api::DavServer;
use wolfdav::config::WolfDavConfig;
use wolfdav::engine::FsEngineFactory;
use wolfdav::error::{Error, Result};
use wolfdav::router::{display_prefix, MountRouter};
use wolfdav::rules::Access;

/// WolfDAV - Multi-tenant WebDAV Access Control
#[derive(Parser)]
#[command(name = "wolfdav")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolfdav.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start serving the configured mounts
    Start,

    /// Validate the configuration and Davfile
    Validate {
        /// Print the mount summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which mount and user would serve a request, and whether it is allowed
    Route {
        /// Request path, e.g. /files/report.pdf
        path: String,

        /// Authenticated principal (default user when omitted)
        #[arg(short, long)]
        user: Option<String>,

        /// Request method
        #[arg(short, long, default_value = "GET")]
        method: String,
    },

    /// Initialize a new configuration file and Davfile
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfdav.toml")]
        output: PathBuf,

        /// Output path for the Davfile
        #[arg(long, default_value = "Davfile")]
        davfile: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = cli
        .log_level
        .clone()
        .or_else(|| {
            WolfDavConfig::from_file(&cli.config)
                .ok()
                .map(|c| c.logging.level)
        })
        .unwrap_or_else(|| "info".to_string());
    init_logging(&level);

    match cli.command {
        Commands::Start => run_start(cli.config).await,
        Commands::Validate { json } => run_validate(cli.config, json),
        Commands::Route { path, user, method } => run_route(cli.config, path, user, method),
        Commands::Init { output, davfile } => run_init(output, davfile),
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load the configuration and provision every mount
fn load(config_path: &Path) -> Result<(WolfDavConfig, MountRouter)> {
    let config = match WolfDavConfig::from_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load configuration from {:?}: {}", config_path, e);
            return Err(e);
        }
    };

    let specs = config.load_mounts()?;
    let router = MountRouter::provision(&specs, &FsEngineFactory)?;
    Ok((config, router))
}

/// Start the server
async fn run_start(config_path: PathBuf) -> Result<()> {
    tracing::info!("Starting WolfDAV...");

    let (config, router) = match load(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Refusing to start: {}", e);
            return Err(e);
        }
    };

    if router.is_empty() {
        tracing::warn!("No mounts declared; every request will get 404");
    }

    let server = DavServer::new(
        config.server.bind_address.clone(),
        config.principal_header()?,
        Arc::new(router),
    );

    server.start().await
}

/// Summary of one mount for `validate`
#[derive(Serialize)]
struct MountSummary {
    prefix: String,
    scope: PathBuf,
    modify: bool,
    rules: usize,
    users: Vec<String>,
}

/// Validate configuration file
fn run_validate(config_path: PathBuf, json: bool) -> Result<()> {
    let (config, router) = match load(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            return Err(e);
        }
    };

    let summaries: Vec<MountSummary> = router
        .mounts()
        .iter()
        .map(|m| MountSummary {
            prefix: display_prefix(m.base_prefix()).to_string(),
            scope: m.default_user().scope().to_path_buf(),
            modify: m.default_user().allow_modify(),
            rules: m.default_user().matchers().len(),
            users: m.user_names().into_iter().map(str::to_string).collect(),
        })
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&summaries)
            .map_err(|e| Error::Config(format!("cannot render summary: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    println!("✓ Configuration is valid");
    println!("  Bind Address: {}", config.server.bind_address);
    println!("  Principal Header: {}", config.server.principal_header);
    println!("  Mounts: {}", summaries.len());
    for summary in &summaries {
        println!();
        println!("  {}", summary.prefix);
        println!("    Scope:  {}", summary.scope.display());
        println!("    Modify: {}", summary.modify);
        println!("    Rules:  {}", summary.rules);
        if !summary.users.is_empty() {
            println!("    Users:  {}", summary.users.join(", "));
        }
    }

    Ok(())
}

/// Explain the routing decision for one request
fn run_route(config_path: PathBuf, path: String, user: Option<String>, method: String) -> Result<()> {
    let (_, router) = load(&config_path)?;

    let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| Error::Config(format!("invalid method {:?}", method)))?;
    let access = Access::from_method(&method);

    let decision = match router.explain(&path, user.as_deref(), access) {
        Some(d) => d,
        None => {
            println!("{} {}: no mount matches, request passes to the next handler", method, path);
            return Ok(());
        }
    };

    println!("{} {}", method, path);
    if decision.path != path {
        println!("  Path:    {}", decision.path);
    }
    println!(
        "  Mount:   #{} {}",
        decision.mount_index + 1,
        display_prefix(&decision.base_prefix)
    );
    println!(
        "  User:    {}",
        decision.user.as_deref().unwrap_or("(default)")
    );
    println!("  Scope:   {}", decision.scope.display());
    println!("  Access:  {:?}", decision.access);
    println!(
        "  Result:  {}",
        if decision.allowed { "allowed" } else { "forbidden" }
    );

    let user = router.mounts()[decision.mount_index].user_for(decision.user.as_deref());
    if access == Access::Write && !user.allow_modify() {
        println!("  Reason:  modify is disabled for this user");
    } else if let Some(rule) = user.matchers().iter().rev().find(|m| m.matches(&decision.path)) {
        println!(
            "  Reason:  last matching rule is {}",
            if rule.is_allow() { "allow" } else { "block" }
        );
    } else {
        println!("  Reason:  no rule matches");
    }

    Ok(())
}

/// Write a starter configuration
fn run_init(output: PathBuf, davfile: PathBuf) -> Result<()> {
    for path in [&output, &davfile] {
        if path.exists() {
            return Err(Error::Config(format!(
                "{} already exists, not overwriting",
                path.display()
            )));
        }
    }

    let config_content = format!(
        r#"# WolfDAV Configuration
# Generated configuration file

[server]
bind_address = "0.0.0.0:8080"
# Header set by the authenticating reverse proxy
principal_header = "X-Remote-User"

[mounts]
davfile = "{davfile}"

[logging]
level = "info"
"#,
        davfile = davfile.display()
    );

    let davfile_content = r#"# WolfDAV mounts
#
# Mounts are matched in the order they are declared: put more specific
# prefixes first.

webdav /files {
    scope /srv/files
    modify false
    block dotfiles

    # Settings below apply to alice only, starting from a copy of the above
    alice:
    modify
}
"#;

    std::fs::write(&output, config_content)?;
    std::fs::write(&davfile, davfile_content)?;

    println!("Wrote {} and {}", output.display(), davfile.display());

    Ok(())
}
