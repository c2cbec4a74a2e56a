use anyhow::Result;
use clap::Parser;
use google_image_gen::ai::ProxySettings;
use google_image_gen::app::{App, ProxyRouting};
use google_image_gen::models::{Config, GenerateOptions, GenerationResult, Vendor};
use google_image_gen::preferences::{PreferenceStore, Preferences};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "google-image-gen")]
#[command(about = "Generate images with Google's Imagen and Gemini APIs")]
struct CliArgs {
    /// Text prompt describing the image.
    prompt: String,

    /// API to call (defaults to the last one used, then imagen).
    #[arg(long, value_enum)]
    api: Option<Vendor>,

    /// Number of images to request (Imagen only).
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=4))]
    count: u32,

    /// Aspect ratio such as 1:1, 16:9 or 9:16.
    #[arg(long)]
    aspect_ratio: Option<String>,

    /// Imagen person generation mode (dont_allow, allow_adult, allow_all).
    #[arg(long)]
    person_generation: Option<String>,

    /// Things the image should not contain (Imagen only).
    #[arg(long)]
    negative_prompt: Option<String>,

    /// Seed for reproducible output (Imagen only).
    #[arg(long)]
    seed: Option<u32>,

    /// Reference image to condition on; may be repeated.
    #[arg(short = 'i', long = "image", value_name = "PATH")]
    images: Vec<PathBuf>,

    /// Directory for generated images.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Directory for request/response JSON files (defaults to the output directory).
    #[arg(long)]
    json_dir: Option<PathBuf>,

    /// Proxy URL for the request, overriding HTTPS_PROXY.
    #[arg(long)]
    proxy: Option<String>,

    /// Debug logging and extra diagnostic files.
    #[arg(short, long)]
    verbose: bool,

    /// Print the result record as JSON.
    #[arg(long)]
    json: bool,
}

/// Primary route from the explicit/env proxy; the fallback is the configured
/// fallback proxy, else the cached one, else a direct connection when the
/// primary goes through a proxy.
fn proxy_routing(primary: Option<String>, fallback: Option<String>, cached: Option<String>) -> ProxyRouting {
    let primary = ProxySettings { url: primary };
    let fallback = match fallback.or(cached) {
        Some(url) => Some(ProxySettings::via(url)),
        None if primary.url.is_some() => Some(ProxySettings::direct()),
        None => None,
    }
    .filter(|fallback| *fallback != primary);

    ProxyRouting { primary, fallback }
}

fn build_options(args: &CliArgs, prefs: &Preferences) -> GenerateOptions {
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| prefs.last_output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("output"));
    let json_dir = args
        .json_dir
        .clone()
        .or_else(|| {
            args.output_dir
                .is_none()
                .then(|| prefs.last_json_dir.clone())
                .flatten()
        })
        .unwrap_or_else(|| output_dir.clone());

    GenerateOptions {
        prompt: args.prompt.clone(),
        count: args.count,
        aspect_ratio: args.aspect_ratio.clone(),
        person_generation: args.person_generation.clone(),
        negative_prompt: args.negative_prompt.clone(),
        seed: args.seed,
        reference_images: args.images.clone(),
        output_dir,
        json_dir,
        verbose: args.verbose,
    }
}

fn report(result: &GenerationResult) {
    for path in &result.images {
        println!("{}", path.display());
    }
    for note in &result.notes {
        info!("{}", note);
    }
    for warning in &result.warnings {
        warn!("{}", warning);
    }
    if let Some(text) = &result.model_text {
        info!("Model said: {}", text);
    }
    if !result.success {
        error!(
            "Generation failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
        for detail in &result.details {
            error!("  {}", detail);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let default_filter = if args.verbose {
        "google_image_gen=debug"
    } else {
        "google_image_gen=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = PreferenceStore::new_default();
    let mut prefs = store.load();

    let mut config = Config::from_env();
    if config.gemini_api_key.is_none() {
        config.gemini_api_key = prefs.api_key.clone();
    }

    let vendor = args.api.or(prefs.default_api).unwrap_or(Vendor::Imagen);
    let options = build_options(&args, &prefs);
    let routing = proxy_routing(
        args.proxy.clone().or_else(|| config.proxy.clone()),
        config.fallback_proxy.clone(),
        prefs.proxy.clone(),
    );

    let app = App::new(config, routing);
    let result = match app.generate(vendor, &options).await {
        Ok(result) => result,
        Err(e) => {
            error!("Generation aborted: {}", e);
            std::process::exit(1);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        report(&result);
    }

    if result.success {
        prefs.remember_run(vendor, &options.output_dir, &options.json_dir);
        if let Some(proxy) = &result.fallback_proxy {
            prefs.proxy = Some(proxy.clone());
        }
        if let Err(e) = store.save(&prefs) {
            warn!("Could not save preferences: {}", e);
        }
        Ok(())
    } else {
        std::process::exit(1);
    }
}
