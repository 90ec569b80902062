// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Siivila CLI - response body filtering from the command line
//!
//! Response bodies go to stdout, everything else to stderr.

use std::env;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use siivila::{
    BodyCapture, BodyLogger, FilterConfig, HttpTransport, RegexReplace, RequestDetails,
    RequestRegistry, ResourceType, RewriterChain, WriterSink,
};

/// Env var naming a JSON file with filter buffer limits
const CONFIG_ENV: &str = "SIIVILA_FILTER_CONFIG";

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("siivila=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "fetch" => {
            if args.len() < 3 {
                eprintln!("Usage: siivila fetch <url>");
                return ExitCode::from(1);
            }
            fetch_url(&args[2]).await
        }
        "rewrite" => {
            if args.len() < 5 {
                eprintln!("Usage: siivila rewrite <url> <pattern> <replacement>");
                return ExitCode::from(1);
            }
            rewrite_url(&args[2], &args[3], &args[4]).await
        }
        "replay" => {
            if args.len() < 3 {
                eprintln!("Usage: siivila replay <file> [chunk-size]");
                return ExitCode::from(1);
            }
            let chunk_size = match args.get(3).map(|s| s.parse::<usize>()) {
                None => 4096,
                Some(Ok(size)) if size > 0 => size,
                Some(_) => {
                    eprintln!("Invalid chunk size: {}", args[3]);
                    return ExitCode::from(1);
                }
            };
            replay_file(&args[2], chunk_size).await
        }
        "--help" | "-h" | "help" => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        "--version" | "-v" | "version" => {
            println!("siivila {}", siivila::VERSION);
            return ExitCode::SUCCESS;
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            return ExitCode::from(1);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"Siivila - Response body stream filtering

USAGE:
    siivila <COMMAND> [OPTIONS]

COMMANDS:
    fetch <url>                             Fetch a URL and write the body to stdout
    rewrite <url> <pattern> <replacement>   Fetch a URL, replacing regex matches in the body
    replay <file> [chunk-size]              Stream a file through a filter as a response body
    help                                    Show this help message
    version                                 Show version information

ENVIRONMENT:
    SIIVILA_FILTER_CONFIG   JSON file with filter buffer limits
    RUST_LOG                Log filter, e.g. siivila=debug

EXAMPLES:
    siivila fetch https://example.com
    siivila rewrite https://example.com/app.js 'api\.example\.com' 'localhost:8080'
    siivila replay capture.html 512
"#
    );
}

fn filter_config(default: FilterConfig) -> anyhow::Result<FilterConfig> {
    let config = match env::var(CONFIG_ENV) {
        Ok(path) => FilterConfig::from_file(&path)
            .with_context(|| format!("loading {} from {}", CONFIG_ENV, path))?,
        Err(_) => default,
    };
    config.validate()?;
    Ok(config)
}

async fn fetch_url(url: &str) -> anyhow::Result<()> {
    eprintln!("Fetching: {}", url);

    let registry = RequestRegistry::with_config(filter_config(FilterConfig::default())?);
    let transport = HttpTransport::new(registry)?;

    let outcome = transport
        .fetch(url, ResourceType::MainFrame, WriterSink::new(io::stdout()))
        .await?;

    eprintln!("\n=== Response ===");
    eprintln!("Status: {}", outcome.status);
    eprintln!("URL: {}", outcome.url);
    eprintln!("Size: {} bytes", outcome.bytes_received);
    for header in &outcome.headers {
        if header.is("content-type") {
            eprintln!("Content-Type: {}", header.value.as_deref().unwrap_or("<binary>"));
        }
    }

    Ok(())
}

async fn rewrite_url(url: &str, pattern: &str, replacement: &str) -> anyhow::Result<()> {
    let registry = RequestRegistry::with_config(filter_config(FilterConfig::for_rewriting())?);
    let transport = HttpTransport::new(registry)?;

    let mut chain = RewriterChain::new();
    chain.add(RegexReplace::new(pattern, replacement.as_bytes().to_vec())?);
    chain.add(BodyLogger::new());

    let pending = transport.prepare(url, ResourceType::MainFrame, WriterSink::new(io::stdout()))?;
    let (filter, events) = transport
        .registry()
        .filter_response_data(pending.request_id(), "siivila-cli")?;

    let driver = tokio::spawn(async move { chain.run(&filter, events).await });

    let outcome = pending.send().await?;
    let status = driver.await.context("rewriter task panicked")??;

    eprintln!(
        "\nRewrote {} ({} bytes received, filter {})",
        outcome.url, outcome.bytes_received, status
    );
    Ok(())
}

async fn replay_file(path: &str, chunk_size: usize) -> anyhow::Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path))?;

    let registry = RequestRegistry::with_config(filter_config(FilterConfig::for_streaming())?);
    let details = RequestDetails::new(
        registry.next_request_id(),
        format!("file://{}", path),
        "GET",
        ResourceType::Other,
    );
    let request_id = details.request_id.clone();

    let body = registry.begin(details, WriterSink::new(io::stdout()))?;
    let (filter, events) = registry.filter_response_data(&request_id, "siivila-replay")?;

    let capture = Arc::new(BodyCapture::new(data.len()));
    let mut chain = RewriterChain::new();
    chain.add(BodyLogger::new().log_chunks(true));
    chain.add_shared(capture.clone());

    let driver = tokio::spawn(async move { chain.run(&filter, events).await });

    body.start()?;
    for chunk in data.chunks(chunk_size) {
        body.ready().await;
        body.data(chunk.to_vec())?;
    }
    body.finish()?;

    let status = driver.await.context("rewriter task panicked")??;
    let captured = capture
        .captured(&request_id)
        .map(|c| c.body.len())
        .unwrap_or(0);

    eprintln!("\n=== Replay ===");
    eprintln!("Chunks: {}", data.len().div_ceil(chunk_size));
    eprintln!("Captured: {} bytes", captured);
    eprintln!("Filter: {}", status);
    eprintln!("{}", serde_json::to_string_pretty(&registry.metrics().report())?);

    Ok(())
}
