use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use shub::{
    labels::{JsonLabelFile, LabelStore},
    naming::{derive_name, NamingConfig, DEFAULT_EXTENSION},
    reference::DEFAULT_REGISTRY,
    ImageReference, PullOptions, ShubClient,
};

/// shub
#[derive(Debug, Parser)]
#[clap(name = "shub", version)]
pub struct App {
    /// Registry to use when an image reference doesn't name one
    #[clap(long, env = "SHUB_API_BASE", default_value = DEFAULT_REGISTRY)]
    registry: String,
    /// Don't print progress or notices
    #[clap(long, short)]
    quiet: bool,

    /// Name every image this (spaces and .img/.gz are dropped); overrides SHUB_CONTAINERNAME
    #[clap(long, group = "naming")]
    container_name: Option<String>,
    /// Name images after the commit they were built from; overrides SHUB_NAMEBYCOMMIT
    #[clap(long, group = "naming")]
    name_by_commit: bool,
    /// Name images after the file the registry stores them in; overrides SHUB_NAMEBYHASH
    #[clap(long, group = "naming")]
    name_by_hash: bool,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prints the manifest of an image
    Manifest { image: String },
    /// Prints the file name an image would be downloaded as
    Name { image: String },
    /// Downloads an image
    Pull {
        image: String,
        /// File name to use instead of the derived one
        #[clap(long)]
        name: Option<String>,
        /// Directory to download into
        #[clap(long)]
        folder: Option<PathBuf>,
        /// Keep the image gzip-compressed
        #[clap(long)]
        no_extract: bool,
        /// JSON file to save the image's metadata in
        #[clap(long)]
        labelfile: Option<PathBuf>,
        /// Prefix for the saved metadata keys
        #[clap(long)]
        prefix: Option<String>,
    },
}

/// MESSAGELEVEL: 0 is quiet, 1 is the default, 2-4 are verbose, 5 and up is debug.
fn message_level() -> i64 {
    std::env::var("MESSAGELEVEL")
        .ok()
        .and_then(|level| level.trim().parse().ok())
        .unwrap_or(1)
}

fn init_logging(level: i64) {
    let filter = match level {
        i64::MIN..=0 => "error",
        1 => "warn",
        2..=4 => "info",
        5 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

impl App {
    fn naming(&self) -> NamingConfig {
        // flags win over whatever is set in the environment
        if self.container_name.is_some() || self.name_by_commit || self.name_by_hash {
            NamingConfig {
                container_name: self.container_name.clone(),
                name_by_commit: self.name_by_commit,
                name_by_hash: self.name_by_hash,
            }
        } else {
            NamingConfig::from_env()
        }
    }

    fn reference(&self, image: &str) -> Result<ImageReference> {
        Ok(ImageReference::parse(image, &self.registry)?)
    }
}

async fn run(args: &App, client: &ShubClient) -> Result<()> {
    match &args.cmd {
        Command::Manifest { image } => {
            let manifest = client.get_manifest(&args.reference(image)?).await?;
            println!("{}", serde_json::to_string_pretty(manifest.as_map())?);
        }
        Command::Name { image } => {
            let manifest = client.get_manifest(&args.reference(image)?).await?;
            let name = derive_name(&manifest, DEFAULT_EXTENSION, &args.naming())?;
            println!("{}", name.file_name);
        }
        Command::Pull {
            image,
            name,
            folder,
            no_extract,
            labelfile,
            prefix,
        } => {
            let mut labels = labelfile.as_ref().map(JsonLabelFile::new);
            let options = PullOptions {
                image_name: name.clone(),
                download_folder: folder.clone(),
                no_extract: *no_extract,
                labels: labels.as_mut().map(|l| l as &mut dyn LabelStore),
                prefix: prefix.clone(),
            };
            let result = client
                .pull(&args.reference(image)?, options)
                .await
                .with_context(|| format!("Pulling {image}"))?;
            if *no_extract || result.extracted {
                println!("{}", result.local_path.display());
            } else {
                anyhow::bail!("Failed to decompress {image}");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let level = message_level();
    init_logging(level);

    let args = App::parse();
    let client = ShubClient::new()
        .naming(args.naming())
        .quiet(args.quiet || level <= 0);

    if let Err(err) = run(&args, &client).await {
        // fatal: print the message as-is and exit 1
        if let Some(fatal) = err.downcast_ref::<shub::Error>().filter(|e| e.is_fatal()) {
            for line in fatal.to_string().lines() {
                eprintln!("ERROR {line}");
            }
            std::process::exit(1);
        }
        return Err(err);
    }
    Ok(())
}
