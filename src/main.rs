use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use qrbrand::assets::{FsAssetStore, LogoLibrary};
use qrbrand::style::{MAX_PIXEL_SIZE, MIN_PIXEL_SIZE};
use qrbrand::{
    normalize, ContentType, EngineConfig, ExportFormat, ExportPipeline, ExportRequest, Renderer,
    StyleOptions,
};

#[derive(Parser, Debug)]
#[command(name = "qrbrand")]
#[command(about = "Render branded QR codes as PNG, SVG, PDF or EPS", long_about = None)]
struct Cli {
    /// Engine configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a branded QR code
    Export(ExportArgs),
    /// Delete uploaded logos older than the retention window
    Sweep,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Raw content (e.g. 'example.com', 'MyWiFi,secret,WPA')
    content: String,

    /// URL, Text, Email, Phone, SMS, WiFi or vCard
    #[arg(long = "type", default_value = "url")]
    content_type: String,

    /// png, svg, pdf or eps
    #[arg(long, default_value = "png")]
    format: String,

    /// Style options as JSON; flags below override its fields
    #[arg(long)]
    style: Option<PathBuf>,

    /// Border color (#RRGGBB, #RGB or a color name)
    #[arg(long)]
    color: Option<String>,

    /// square, dots or rounded
    #[arg(long)]
    module_style: Option<String>,

    /// Error correction level: L, M, Q or H
    #[arg(long)]
    ec: Option<String>,

    /// Symbol size in pixels
    #[arg(long)]
    size: Option<u32>,

    /// Logo image file
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Logo size as a percentage of the symbol (10-40)
    #[arg(long)]
    logo_size: Option<i64>,

    /// center, top-left, top-right, bottom-left or bottom-right
    #[arg(long)]
    logo_position: Option<String>,

    /// Company name printed under or beside the symbol
    #[arg(long)]
    company: Option<String>,

    /// standard or sides
    #[arg(long)]
    layout: Option<String>,

    /// Output directory
    #[arg(long, default_value = ".", conflicts_with = "stdout")]
    out: PathBuf,

    /// Write the file to stdout instead of a directory
    #[arg(long)]
    stdout: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Export(args) => export(config, args),
        Command::Sweep => sweep(config),
    }
}

fn logo_library(config: &EngineConfig) -> LogoLibrary {
    let store = Arc::new(FsAssetStore::new(config.assets.dir.clone()));
    LogoLibrary::new(store, &config.assets)
}

fn read_style(path: &Path) -> Result<StyleOptions> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read style file {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("Invalid style file {}", path.display()))
}

fn export(mut config: EngineConfig, args: ExportArgs) -> Result<()> {
    let content_type: ContentType = args.content_type.parse()?;
    let format: ExportFormat = args.format.parse()?;

    if let Some(size) = args.size {
        if !(MIN_PIXEL_SIZE..=MAX_PIXEL_SIZE).contains(&size) {
            bail!("--size must be between {} and {}", MIN_PIXEL_SIZE, MAX_PIXEL_SIZE);
        }
        config.download_size = size;
    }

    let mut options = match &args.style {
        Some(path) => read_style(path)?,
        None => StyleOptions::default(),
    };
    options.border_color = args.color.or(options.border_color);
    options.module_style = args.module_style.or(options.module_style);
    options.error_correction = args.ec.or(options.error_correction);
    options.logo_size_percent = args.logo_size.or(options.logo_size_percent);
    options.logo_position = args.logo_position.or(options.logo_position);
    options.company_text = args.company.or(options.company_text);
    options.layout = args.layout.or(options.layout);

    let logos = logo_library(&config);
    if let Some(path) = &args.logo {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read logo {}", path.display()))?;
        let asset = logos
            .upload(&bytes, options.logo.as_ref())
            .with_context(|| format!("Failed to store logo {}", path.display()))?;
        info!("logo stored as {}", asset.key);
        options.logo = Some(asset);
    }

    let style = options.resolve()?;
    let payload = normalize(&args.content, content_type);
    if payload.is_empty() {
        bail!("Nothing to encode: content is empty");
    }

    let pipeline = ExportPipeline::new(Renderer::new(config, logos));
    let output = pipeline
        .export(&ExportRequest::new(payload, content_type, style, format))
        .context("Failed to export QR code")?;

    if args.stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(&output.bytes)
            .context("Failed to write to stdout")?;
        handle.flush().context("Failed to flush stdout")?;
    } else {
        fs::create_dir_all(&args.out)
            .with_context(|| format!("Failed to create {}", args.out.display()))?;
        let path = args.out.join(&output.filename);
        fs::write(&path, &output.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{}", path.display());
    }

    Ok(())
}

fn sweep(config: EngineConfig) -> Result<()> {
    let removed = logo_library(&config)
        .sweep(SystemTime::now())
        .context("Failed to sweep logo assets")?;
    println!("removed {} expired logo(s)", removed);
    Ok(())
}
