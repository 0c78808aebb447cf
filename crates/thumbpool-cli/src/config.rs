use anyhow::bail;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use thumbpool::{
    DEFAULT_NUM_WORKERS, DEFAULT_QUEUE_DEPTH, DEFAULT_THUMBNAIL_SIZE, GenerationId, PoolConfig,
    ThumbnailMode,
};

/// Runtime configuration for the `thumbpool` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file in the working directory is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "thumbpool",
    version,
    about = "Reads image headers and sizes thumbnails for every file in a directory"
)]
pub struct CliArgs {
    /// Directory to browse.
    ///
    /// Environment variable: `BROWSE_DIR`
    #[arg(env = "BROWSE_DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Descend into subdirectories.
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Number of worker threads.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = DEFAULT_NUM_WORKERS)]
    pub num_workers: usize,

    /// Requests that may wait on one worker before submission blocks.
    ///
    /// Environment variable: `QUEUE_DEPTH`
    #[arg(long, env = "QUEUE_DEPTH", default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,

    /// Thumbnail quality.
    ///
    /// Environment variable: `THUMBNAIL_MODE`
    #[arg(long, env = "THUMBNAIL_MODE", value_enum, default_value_t = ModeArg::Low)]
    pub thumbnail_mode: ModeArg,

    /// Longest edge of generated thumbnails, in pixels.
    ///
    /// Environment variable: `THUMBNAIL_SIZE`
    #[arg(long, env = "THUMBNAIL_SIZE", default_value_t = DEFAULT_THUMBNAIL_SIZE)]
    pub thumbnail_size: u32,

    /// Generation id stamped on every request.
    ///
    /// Environment variable: `GENERATION_ID`
    #[arg(long, env = "GENERATION_ID", default_value_t = 1)]
    pub generation_id: GenerationId,

    /// How long to wait for all results before giving up, in milliseconds.
    ///
    /// Environment variable: `TIMEOUT_MS`
    #[arg(long, env = "TIMEOUT_MS", default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Output format.
    ///
    /// Environment variable: `OUTPUT_FORMAT`
    #[arg(long, env = "OUTPUT_FORMAT", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Off,
    Low,
    High,
}

impl From<ModeArg> for ThumbnailMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Off => Self::Off,
            ModeArg::Low => Self::Low,
            ModeArg::High => Self::High,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned columns.
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Clone)]
pub struct BrowseConfig {
    pub root: PathBuf,
    pub recursive: bool,
    pub pool: PoolConfig,
    pub thumbnail_mode: ThumbnailMode,
    pub thumbnail_size: u32,
    pub generation_id: GenerationId,
    pub timeout: Duration,
    pub format: OutputFormat,
}

impl TryFrom<CliArgs> for BrowseConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if !args.dir.is_dir() {
            bail!("BROWSE_DIR ({}) is not a directory", args.dir.display());
        }

        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.queue_depth == 0 {
            bail!("QUEUE_DEPTH must be greater than 0");
        }

        if args.timeout_ms == 0 {
            bail!("TIMEOUT_MS must be greater than 0");
        }

        let pool = PoolConfig::default()
            .with_num_workers(args.num_workers)
            .with_queue_depth(args.queue_depth);
        pool.validate()?;

        Ok(Self {
            root: args.dir,
            recursive: args.recursive,
            pool,
            thumbnail_mode: args.thumbnail_mode.into(),
            thumbnail_size: args.thumbnail_size,
            generation_id: args.generation_id,
            timeout: Duration::from_millis(args.timeout_ms),
            format: args.format,
        })
    }
}
