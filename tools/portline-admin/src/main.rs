//! Portline Admin: inspect bundles and links, and run an in-memory handshake.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use portline_core::{
    bundle_to_fallback_link, parse_link, BundleVersionRegistry, ConnectionRequest,
    CreatePortRequest, InMemoryBackend, InMemoryIssuer, ParsedLink, PortKind, PortProtocolApi,
    PortProtocolConfig, PortService,
};
use portline_telemetry::{init_telemetry, TelemetryConfig};
use std::sync::Arc;

/// Portline Admin: Port protocol inspection tool
#[derive(Parser, Debug)]
#[command(name = "portline-admin")]
#[command(about = "Inspect Port bundles and links")]
struct Args {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a bundle (JSON or fallback link) and print its kind and version
    Validate {
        /// Bundle JSON or link
        input: String,
    },
    /// Turn bundle JSON into a fallback link
    Link {
        /// Bundle JSON
        bundle: String,
    },
    /// Decode a short or fallback link
    Decode {
        /// Link to decode
        link: String,
    },
    /// Connect two in-memory users through a port
    Demo {
        /// Use a superport with this limit instead of a direct port
        #[arg(long)]
        superport: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    let _telemetry = init_telemetry(TelemetryConfig::for_tool("portline-admin").with_log_level(level))
        .context("failed to initialize logging")?;

    let config = PortProtocolConfig::from_env();
    match args.command {
        Command::Validate { input } => validate(&config, &input),
        Command::Link { bundle } => link(&config, &bundle),
        Command::Decode { link } => decode(&config, &link),
        Command::Demo { superport } => demo(config, superport).await,
    }
}

fn to_value(config: &PortProtocolConfig, input: &str) -> Result<Value> {
    let input = input.trim();
    if input.starts_with('{') {
        return serde_json::from_str(input).context("bundle is not valid JSON");
    }
    match parse_link(input, &config.short_link_prefix, &config.fallback_link_prefix)? {
        ParsedLink::Inline(value) => Ok(value),
        ParsedLink::BundleId(id) => bail!("short link {} needs the issuer to resolve it", id),
    }
}

fn validate(config: &PortProtocolConfig, input: &str) -> Result<()> {
    let value = to_value(config, input)?;
    let bundle = BundleVersionRegistry::with_defaults().validate_any(&value)?;
    println!("kind:    {}", bundle.kind());
    println!("version: {}", bundle.version());
    println!("port:    {}", bundle.port_id());
    if let Some(name) = bundle.name() {
        println!("name:    {}", name);
    }
    Ok(())
}

fn link(config: &PortProtocolConfig, bundle: &str) -> Result<()> {
    let value: Value = serde_json::from_str(bundle).context("bundle is not valid JSON")?;
    BundleVersionRegistry::with_defaults().validate_any(&value)?;
    println!("{}", bundle_to_fallback_link(&config.fallback_link_prefix, &value)?);
    Ok(())
}

fn decode(config: &PortProtocolConfig, link: &str) -> Result<()> {
    match parse_link(link, &config.short_link_prefix, &config.fallback_link_prefix)? {
        ParsedLink::Inline(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        ParsedLink::BundleId(id) => println!("bundle id: {}", id),
    }
    Ok(())
}

async fn demo(config: PortProtocolConfig, superport: Option<u32>) -> Result<()> {
    let issuer = Arc::new(InMemoryIssuer::default());
    let alice = InMemoryBackend::with_issuer("Alice", issuer.clone());
    let bob = InMemoryBackend::with_issuer("Bob", issuer.clone());
    let alice_service = PortService::new(alice.context(config.clone()));
    let bob_service = PortService::new(bob.context(config));

    let request = match superport {
        Some(limit) => CreatePortRequest::Superport {
            label: Some("Bob".into()),
            limit,
            folder_id: None,
            permissions: None,
        },
        None => CreatePortRequest::Direct {
            label: Some("Bob".into()),
            folder_id: None,
            permissions: None,
            expires_in: None,
        },
    };
    let kind = request.kind();
    let mut port = alice_service.try_create_port(request).await?;
    let bundle = port.get_shareable_bundle().await?;
    portline_telemetry::log_port_event!(info, "demo port created", port.port_id(), kind);
    println!("alice created {} port {}", kind, port.port_id());
    println!("link: {}", port.get_shareable_link().await?);

    bob_service
        .try_read_bundle(&bundle.to_json()?, None, None)
        .await?;
    let report = bob_service.process_read_bundles().await?;
    println!(
        "bob swept {} pending bundle(s): {} consumed",
        report.processed, report.consumed
    );

    let line = issuer
        .line_requests()
        .pop()
        .context("the issuer received no line request")?;
    let notification = ConnectionRequest {
        line_id: line.grant.line_id.clone(),
        pair_hash: uuid::Uuid::new_v4().simple().to_string(),
        intro: line.intro,
    };
    alice_service
        .on_line_created(kind, &port.port_id().to_string(), &notification)
        .await?;

    for (who, backend) in [("alice", &alice), ("bob", &bob)] {
        for chat in backend.connections.chats() {
            portline_telemetry::log_line_event!(debug, "demo chat formed", chat.line_id, user = who);
            println!("{} has chat {} on line {}", who, chat.chat_id, chat.line_id);
        }
    }
    if kind == PortKind::Superport {
        for summary in alice_service.list_generated_ports().await? {
            println!(
                "port {} used {}/{}",
                summary.port_id,
                summary.connections_made.unwrap_or(0),
                summary.connections_limit.unwrap_or(0)
            );
        }
    }
    Ok(())
}
