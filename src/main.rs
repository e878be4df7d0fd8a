use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::Env;
use scenekit::{
    config::{ConfigFileLoader, SceneConfig},
    model_cache::ModelCache,
    scene::{Scene, SceneInfo},
    AssetDocument, DocumentFormat,
};

/// Inspects scene documents and their model cache files.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Settings file, created with defaults when missing.
    #[arg(long, default_value = "scenekit.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints the render settings of a scene without loading its geometry.
    Info { scene: PathBuf },
    /// Lists the model caches a scene references and whether their files exist.
    Caches { scene: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config_loader = ConfigFileLoader::new(&cli.config);
    let config = config_loader.get_or_load_config()?;
    env_logger::Builder::from_env(Env::default().default_filter_or(config.default_log_filter())).init();

    match cli.command {
        Command::Info { scene } => print_info(&scene),
        Command::Caches { scene } => print_caches(config, &scene),
    }
}

fn scene_root(scene_path: &Path) -> &Path {
    scene_path.parent().unwrap_or_else(|| Path::new("."))
}

fn print_info(scene_path: &Path) -> anyhow::Result<()> {
    let document = AssetDocument::load(scene_path)
        .with_context(|| format!("failed to read scene {}", scene_path.display()))?;
    let mut scene_info = SceneInfo::default();
    let header = Scene::read_header(&document, Some(&mut scene_info))
        .with_context(|| format!("{} is not a scene document", scene_path.display()))?;

    let info = &header.create_info;
    println!("version:     {}", header.version);
    println!("renderer:    {}", info.renderer);
    println!("render mode: {}", header.render_mode.name());
    println!("device:      {}", info.device_type.name());
    match info.samples {
        Some(samples) => println!("samples:     {samples}"),
        None => println!("samples:     renderer default"),
    }
    println!("denoise:     {}", info.denoise_mode.name());
    println!("output:      {}", header.output_file_name);
    if !scene_info.sky.is_empty() {
        println!("sky:         {}", scene_info.sky);
    }
    println!("max bounces: {}", scene_info.max_bounces);
    Ok(())
}

fn print_caches(config: &SceneConfig, scene_path: &Path) -> anyhow::Result<()> {
    let document = AssetDocument::load(scene_path)
        .with_context(|| format!("failed to read scene {}", scene_path.display()))?;
    Scene::read_header(&document, None)?;
    let root = scene_root(scene_path);
    for entry in document.root.elements("modelCaches")? {
        let key: u64 = entry?.get_as("hash")?;
        let found = DocumentFormat::ALL
            .into_iter()
            .map(|format| config.cache_path(root, key, format))
            .find(|path| path.exists());
        match found {
            Some(path) => {
                let cache = ModelCache::from_document(&AssetDocument::load(&path)?)?;
                println!("{key}: {} ({} chunks)", path.display(), cache.chunks().len());
            }
            None => println!("{key}: missing"),
        }
    }
    Ok(())
}
