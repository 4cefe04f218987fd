//! Command-line surface for the migration tools

use crate::config::{
    EndpointConfig, RunConfig, Target, TargetRegistry, WriteMode, DEFAULT_API_TIMEOUT_SECS,
    DEFAULT_ENDPOINT,
};
use crate::lookup::{apply_selected, RecordSelector};
use crate::reconcile::ReconciliationDriver;
use crate::relabel::{RelabelScope, Relabeler};
use crate::remote::{NucliaClient, ResourceKey};
use crate::upload::UploadDriver;
use crate::validator::validate;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// KBM - migrate CMS exports into a knowledge base
#[derive(Parser, Debug)]
#[command(name = "kbm-ingest")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Knowledge-base API endpoint
    #[arg(long, env = "KBM_ENDPOINT", default_value = DEFAULT_ENDPOINT, global = true)]
    pub endpoint: String,

    /// Request timeout in seconds
    #[arg(
        long,
        env = "KBM_API_TIMEOUT_SECS",
        default_value_t = DEFAULT_API_TIMEOUT_SECS,
        global = true
    )]
    pub timeout_secs: u64,
}

/// Arguments shared by the record-writing commands
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Target knowledge base name (e.g. vietnamese)
    pub target: String,

    /// Export file: a JSON array of records
    pub filename: PathBuf,

    /// Only write the record with this @id
    #[arg(long)]
    pub id: Option<String>,

    /// Only write the record with this UID
    #[arg(long, alias = "uid")]
    pub slug: Option<String>,

    /// Skip published records until this count is reached
    #[arg(long = "resume-at", alias = "resume_at", default_value_t = 0)]
    pub resume_at: usize,

    /// Stop after this many published records
    #[arg(long)]
    pub max: Option<usize>,

    /// Run everything except the remote calls
    #[arg(long)]
    pub fake_it: bool,

    /// Minimum milliseconds between remote calls
    #[arg(long = "min-interval-ms")]
    pub min_interval_ms: Option<u64>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Count objects, published records and unexported paths
    Validate {
        /// Export file: a JSON array of records
        filename: PathBuf,
    },

    /// Create or update every published record
    Upload {
        #[command(flatten)]
        args: WriteArgs,

        /// Report existing slugs as conflicts instead of updating them
        #[arg(long)]
        create_only: bool,
    },

    /// Update origin and thumbnail metadata on existing resources
    Edit {
        #[command(flatten)]
        args: WriteArgs,
    },

    /// Delete remote resources whose records are not published
    Reconcile {
        /// Target knowledge base name
        target: String,

        /// Export file: a JSON array of records
        filename: PathBuf,

        /// Run everything except the deletes
        #[arg(long)]
        fake_it: bool,

        /// Minimum milliseconds between remote calls
        #[arg(long = "min-interval-ms")]
        min_interval_ms: Option<u64>,
    },

    /// Rename the legacy language-service labelset
    Relabel {
        /// Target knowledge base name
        target: String,

        /// Only relabel the resource with this slug
        #[arg(long, alias = "uid", conflicts_with = "rid")]
        slug: Option<String>,

        /// Only relabel the resource with this resource id
        #[arg(long)]
        rid: Option<String>,

        /// Run everything except the updates
        #[arg(long)]
        fake_it: bool,

        /// Minimum milliseconds between remote calls
        #[arg(long = "min-interval-ms")]
        min_interval_ms: Option<u64>,
    },
}

fn interval(ms: Option<u64>) -> Option<Duration> {
    ms.map(Duration::from_millis)
}

impl Cli {
    fn client(&self) -> Result<NucliaClient> {
        let endpoint = EndpointConfig::new(&self.endpoint, Duration::from_secs(self.timeout_secs));
        NucliaClient::new(&endpoint).context("failed to create knowledge-base client")
    }
}

/// Resolve a target name; unknown names fail here, before any file or
/// network access
fn resolve(name: &str) -> Result<Target> {
    Ok(TargetRegistry::from_env().resolve(name)?)
}

/// Execute the parsed command
pub async fn execute(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Validate { filename } => {
            let summary = validate(filename)
                .with_context(|| format!("failed to validate {}", filename.display()))?;
            println!(
                "{}: {} objects | {} published | {} errors",
                filename.display(),
                summary.total,
                summary.published(),
                summary.malformed
            );
        }
        Command::Upload { args, create_only } => {
            let mode = if *create_only {
                WriteMode::CreateOnly
            } else {
                WriteMode::Upsert
            };
            write_records(cli, args, mode).await?;
        }
        Command::Edit { args } => {
            write_records(cli, args, WriteMode::EditOrigin).await?;
        }
        Command::Reconcile {
            target,
            filename,
            fake_it,
            min_interval_ms,
        } => {
            let target = resolve(target)?;
            let config = RunConfig::builder(filename, target)
                .fake_it(*fake_it)
                .min_interval(interval(*min_interval_ms))
                .build()?;
            let client = cli.client()?;
            ReconciliationDriver::new(&config, &client).run().await?;
        }
        Command::Relabel {
            target,
            slug,
            rid,
            fake_it,
            min_interval_ms,
        } => {
            let target = resolve(target)?;
            let scope = match (slug, rid) {
                (Some(slug), _) => RelabelScope::One(ResourceKey::slug(slug)),
                (None, Some(rid)) => RelabelScope::One(ResourceKey::id(rid)),
                (None, None) => RelabelScope::All,
            };
            let client = cli.client()?;
            Relabeler::new(&client, &target, *fake_it, interval(*min_interval_ms))
                .run(&scope)
                .await?;
        }
    }

    Ok(())
}

async fn write_records(cli: &Cli, args: &WriteArgs, mode: WriteMode) -> Result<()> {
    let target = resolve(&args.target)?;
    let config = RunConfig::builder(&args.filename, target)
        .resume_at(args.resume_at)
        .max_uploads(args.max)
        .fake_it(args.fake_it)
        .mode(mode)
        .min_interval(interval(args.min_interval_ms))
        .build()?;
    let client = cli.client()?;

    match RecordSelector::from_flags(args.id.clone(), args.slug.clone()) {
        Some(selector) => {
            let outcome = apply_selected(&config, &client, &selector).await?;
            info!(?outcome, "single record run finished");
        }
        None => {
            UploadDriver::new(&config, &client).run().await?;
        }
    }

    Ok(())
}
