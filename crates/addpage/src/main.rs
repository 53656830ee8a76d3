//! # addpage
//!
//! A terminal rendition of the number adder page. The main panel adds the two
//! operands natively. With `--runtime` or `--self-test`, the runtime panel
//! boots the embedded runtime and repeats the addition through it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use addrun::BridgeInvoker;
use addrun::EntryRegistry;
use addrun::ImageLocation;
use addrun::LoaderConfig;
use addrun::LoaderStatus;
use addrun::RuntimeLoader;
use addrun::WasmEntry;
use addrun::input;
use addrun::run_self_tests;
use addrun::status::EMPTY_CATEGORY;

#[derive(Parser, Debug)]
#[command(name = "addpage", version, about = "Adds two numbers, natively and through an embedded runtime")]
#[command(allow_negative_numbers = true)]
struct Args {
    /// First number
    a: String,

    /// Second number
    b: String,

    /// Also add the numbers inside the runtime
    #[arg(long)]
    runtime: bool,

    /// Run the runtime self-test suite
    #[arg(long)]
    self_test: bool,

    /// Runtime image: `embedded`, a file path, or an http(s) URL
    #[arg(long)]
    image: Option<String>,

    /// Delay before the bootstrap entry point is published
    #[arg(long, default_value_t = 0)]
    entry_delay_ms: u64,
}

fn show(panel: &str, category: &str, text: &str) {
    println!("{:<8} [{}] {}", panel, category, text);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match input::local_sum(&args.a, &args.b) {
        Ok(sum) => show("result", "result", &input::render_sum(sum)),
        Err(e) => show("result", "error", &e.to_string()),
    }

    if !args.runtime && !args.self_test {
        show("runtime", EMPTY_CATEGORY, "Pass --runtime or --self-test to use the runtime panel");
        return Ok(());
    }

    let mut config = LoaderConfig::from_env()?;
    if let Some(image) = &args.image {
        config = config.with_image(ImageLocation::parse(image));
    }

    tracing::info!(image = %config.image, poll = ?config.poll, "starting runtime panel");

    let registry = EntryRegistry::new();
    let loader = RuntimeLoader::new(config.clone(), registry.clone());

    // Publishing happens on its own task, the way a page's bootstrap script
    // finishes loading alongside everything else.
    let entry = WasmEntry::new(config.image.clone());
    let delay = Duration::from_millis(args.entry_delay_ms);
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        registry.publish(Arc::new(entry));
    });

    // The status panel follows the loader until it settles.
    let mut states = loader.subscribe();
    let panel = tokio::spawn(async move {
        let mut shown = None;
        loop {
            let state = states.borrow_and_update().clone();
            let status = LoaderStatus::from(&state);
            if shown.as_ref() != Some(&status) {
                show("status", status.category(), &status.text());
                shown = Some(status);
            }
            if state.outcome().is_some() || states.changed().await.is_err() {
                break;
            }
        }
    });

    let outcome = loader.bootstrap().await;
    panel.await?;
    if outcome.is_err() {
        return Ok(());
    }

    let bridge = BridgeInvoker::new(loader);

    if args.runtime {
        match input::parse_operands(&args.a, &args.b) {
            Ok((a, b)) => {
                let status = bridge.invoke_status(a, b).await;
                show("runtime", status.category(), &status.text());
            }
            Err(e) => show("runtime", "error", &e.to_string()),
        }
    }

    if args.self_test {
        match run_self_tests(&bridge).await {
            Ok(report) => {
                let category = if report.all_passed() { "success" } else { "error" };
                show("tests", category, "");
                println!("{}", report.render());
            }
            Err(e) => show("tests", "error", &e.to_string()),
        }
    }

    Ok(())
}
