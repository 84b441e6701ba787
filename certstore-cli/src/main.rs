//! `sslserver-certs`: print the certificate chain a TLS server presents.
//!
//! ```bash
//! sslserver-certs fetch example.com
//! sslserver-certs fetch https://example.com:8443 --ca-only --format pem
//! sslserver-certs fetch 10.0.0.5:443 --serial 1f:a0 --format json
//! sslserver-certs provider --json
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::panic))]

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use server_certstore::{
    CertStoreConfig, CertSelector, Certificate, CertificateInfo, ChainRetriever, ProtocolVersions,
    SslServerProvider, Target, TrustContext, X509Selector,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// SSLServer certificate store client
#[derive(Parser, Debug)]
#[command(name = "sslserver-certs")]
#[command(version, about = "Capture the certificate chain presented by a TLS server")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to a server and print the chain it presents
    Fetch(FetchArgs),
    /// Print the provider descriptor
    Provider {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug)]
struct FetchArgs {
    /// URI, or host[:port] for https
    target: String,

    /// Only certificates with this subject DN
    #[arg(long)]
    subject: Option<String>,

    /// Only certificates with this issuer DN
    #[arg(long)]
    issuer: Option<String>,

    /// Only the certificate with this serial number (hex)
    #[arg(long)]
    serial: Option<String>,

    /// Only the certificate with this SHA-256 fingerprint (hex)
    #[arg(long)]
    fingerprint: Option<String>,

    /// Only CA certificates
    #[arg(long, conflicts_with = "leaf_only")]
    ca_only: bool,

    /// Only end-entity certificates
    #[arg(long)]
    leaf_only: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,

    /// TCP connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// TLS handshake timeout in seconds
    #[arg(long)]
    handshake_timeout: Option<u64>,

    /// Protocol versions to offer (all, tls12, tls13)
    #[arg(long)]
    tls_versions: Option<ProtocolVersions>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Summary,
    Pem,
    Json,
}

#[derive(Serialize)]
struct ChainEntry {
    position: usize,
    fingerprint_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    info: Option<CertificateInfo>,
    pem: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Command::Fetch(args) => fetch(args).await,
        Command::Provider { json } => provider(json),
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("server_certstore={},certstore_cli={}", level, level).into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbose)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .init();
    }
}

async fn fetch(args: FetchArgs) -> anyhow::Result<()> {
    let target = parse_target(&args.target)?;
    let config = fetch_config(&args)?;
    debug!(?config, "effective configuration");

    let context = TrustContext::new(config).context("Failed to build trust context")?;
    let retriever = ChainRetriever::with_context(target, Arc::new(context));
    let selector = build_selector(&args);

    info!(uri = %retriever.target(), "retrieving certificate chain");
    let chain = retriever
        .fetch(selector.as_ref().map(|s| s as &dyn CertSelector))
        .await
        .with_context(|| format!("Failed to retrieve certificates from {}", retriever.target()))?;

    if chain.is_empty() {
        info!("no certificates matched");
    }

    match args.format {
        OutputFormat::Summary => print_summary(&chain),
        OutputFormat::Pem => {
            for cert in &chain {
                print!("{}", cert.to_pem());
            }
        }
        OutputFormat::Json => {
            let entries: Vec<ChainEntry> = chain.iter().enumerate().map(|(i, c)| chain_entry(i, c)).collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}

fn provider(json: bool) -> anyhow::Result<()> {
    let descriptor = SslServerProvider::new().descriptor();

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptor)?);
        return Ok(());
    }

    println!("{} {}", descriptor.name.bright_cyan(), descriptor.version.bright_white());
    println!("  {}", descriptor.info);
    for service in &descriptor.services {
        println!(
            "  {}.{} -> {}",
            service.service_type.as_str().bright_yellow(),
            service.algorithm.bright_yellow(),
            service.implementation
        );
    }
    Ok(())
}

/// Accept a full URI or a bare `host[:port]`, which means `https`.
fn parse_target(input: &str) -> anyhow::Result<Target> {
    let uri = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    Target::parse(&uri).with_context(|| format!("Invalid target '{}'", input))
}

fn fetch_config(args: &FetchArgs) -> anyhow::Result<CertStoreConfig> {
    let mut config = CertStoreConfig::from_env().context("Invalid environment configuration")?;

    if let Some(seconds) = args.connect_timeout {
        config = config.with_connect_timeout(Duration::from_secs(seconds));
    }
    if let Some(seconds) = args.handshake_timeout {
        config = config.with_handshake_timeout(Duration::from_secs(seconds));
    }
    if let Some(versions) = args.tls_versions {
        config = config.with_protocol_versions(versions);
    }

    config.validate()?;
    Ok(config)
}

/// `None` when no filter was requested
fn build_selector(args: &FetchArgs) -> Option<X509Selector> {
    let mut selector = X509Selector::new();
    let mut any = false;

    if let Some(subject) = &args.subject {
        selector = selector.subject(subject.clone());
        any = true;
    }
    if let Some(issuer) = &args.issuer {
        selector = selector.issuer(issuer.clone());
        any = true;
    }
    if let Some(serial) = &args.serial {
        selector = selector.serial(serial);
        any = true;
    }
    if let Some(fingerprint) = &args.fingerprint {
        selector = selector.fingerprint_sha256(fingerprint);
        any = true;
    }
    if args.ca_only || args.leaf_only {
        selector = selector.ca(args.ca_only);
        any = true;
    }

    any.then_some(selector)
}

fn chain_entry(position: usize, cert: &Certificate) -> ChainEntry {
    ChainEntry {
        position,
        fingerprint_sha256: cert.fingerprint_sha256(),
        info: cert.info().ok(),
        pem: cert.to_pem(),
    }
}

fn kind_label(info: &CertificateInfo) -> &'static str {
    match (info.is_ca, info.is_self_issued()) {
        (true, true) => "self-issued CA",
        (true, false) => "CA",
        (false, true) => "self-issued end-entity",
        (false, false) => "end-entity",
    }
}

fn print_summary(chain: &[Certificate]) {
    let now = Utc::now();
    for (position, cert) in chain.iter().enumerate() {
        let header = format!("[{}]", position);
        match cert.info() {
            Ok(info) => {
                let kind = if info.is_ca {
                    kind_label(&info).bright_yellow()
                } else {
                    kind_label(&info).bright_green()
                };
                println!("{} {} ({})", header.bright_cyan(), info.subject.bold(), kind);
                println!("    issuer:      {}", info.issuer);
                println!("    serial:      {}", info.serial);
                let validity = format!("{} .. {}", info.not_before.to_rfc3339(), info.not_after.to_rfc3339());
                if info.is_valid_at(now) {
                    println!("    valid:       {}", validity);
                } else {
                    println!("    valid:       {} {}", validity, "(outside validity period)".bright_red());
                }
                if !info.dns_names.is_empty() {
                    println!("    dns names:   {}", info.dns_names.join(", "));
                }
                println!("    sha-256:     {}", info.fingerprint_sha256.bright_black());
            }
            Err(e) => {
                println!("{} {} ({})", header.bright_cyan(), "undecodable certificate".bright_red(), e);
                println!("    sha-256:     {}", cert.fingerprint_sha256().bright_black());
            }
        }
    }
}
