//! recon: reconcile AWS resources against a desired configuration
//!
//! Every command prints one JSON document per resource on stdout. Logs go to stderr and
//! are controlled by `RUST_LOG`.

#![allow(
    clippy::bool_assert_comparison, // I don't like `assert!(!expression)`. It's very misleading.
)]

use recon::config::ReconcileConfig;
use recon::kinds::bucket_acl::BucketAcl;
use recon::kinds::distribution_configuration::DistributionConfiguration;
use recon::kinds::identity_policy::IdentityPolicy;
use recon::reconcile::{Plan, Reconciler};
use recon::remote::{Deletion, Remote};
use recon::resource::Resource;
use recon_aws::{ImageBuilderDistribution, S3BucketAcl, SesIdentityPolicy};

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "recon")]
#[command(about = "Reconcile AWS resources against a desired configuration")]
#[command(version)]
struct Opt {
    /// AWS region
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// AWS shared config profile
    #[arg(long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Reconciliation settings (JSON)
    #[arg(long, global = true, env = "RECON_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read resources by identifier
    Read {
        kind: Kind,

        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Adopt an existing resource, printing its canonical identifier
    Import { kind: Kind, id: String },

    /// Delete a resource
    Destroy { kind: Kind, id: String },

    /// Show what `apply` would do
    Plan {
        kind: Kind,

        /// Desired configuration (JSON)
        desired: PathBuf,

        /// Identifier of the tracked resource, if any
        #[arg(long)]
        id: Option<String>,
    },

    /// Converge a resource to the desired configuration
    Apply {
        kind: Kind,

        /// Desired configuration (JSON)
        desired: PathBuf,

        /// Identifier of the tracked resource, if any
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    #[value(name = "s3_bucket_acl")]
    BucketAcl,
    #[value(name = "ses_identity_policy")]
    IdentityPolicy,
    #[value(name = "imagebuilder_distribution_configuration")]
    DistributionConfiguration,
}

impl Command {
    fn kind(&self) -> Kind {
        match self {
            Self::Read { kind, .. }
            | Self::Import { kind, .. }
            | Self::Destroy { kind, .. }
            | Self::Plan { kind, .. }
            | Self::Apply { kind, .. } => *kind,
        }
    }
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Arc<ReconcileConfig>> {
    let config = match path {
        Some(path) => read_json(path)?,
        None => ReconcileConfig::default(),
    };
    Ok(Arc::new(config))
}

async fn load_sdk_config(opt: &Opt) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &opt.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(profile) = &opt.profile {
        info!(%profile, "using AWS profile");
        loader = loader.profile_name(profile);
    }
    loader.load().await
}

fn plan_to_json<K, S: Serialize>(plan: &Plan<K, S>) -> serde_json::Value {
    let action = plan.action().as_str();
    match plan {
        Plan::Create => json!({ "action": action }),
        Plan::NoOp { id, state } | Plan::Update { id, state, .. } => {
            json!({ "action": action, "id": id, "current": state })
        }
        Plan::Replace { id, .. } | Plan::Gone { id } => json!({ "action": action, "id": id }),
    }
}

async fn run<R, C>(remote: &C, config: Arc<ReconcileConfig>, command: Command) -> Result<()>
where
    R: Resource,
    R::Config: DeserializeOwned,
    R::State: Serialize,
    C: Remote<R>,
{
    let reconciler = Reconciler::<R, C>::with_config(remote, config);

    match command {
        Command::Read { ids, .. } => {
            let mut failed = 0_usize;
            for (id, result) in reconciler.read_many(ids).await {
                match result {
                    Ok(observed) => print_json(&json!({ "id": id, "state": observed.as_present() }))?,
                    Err(err) => {
                        error!(kind = R::NAME, %id, %err, "read failed");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} read(s) failed");
            }
        }
        Command::Import { id, .. } => {
            let (id, state) = reconciler.import(&id).await?;
            print_json(&json!({ "id": id, "state": state }))?;
        }
        Command::Destroy { id, .. } => {
            let deletion = reconciler.destroy(&id).await?;
            print_json(&json!({ "id": id, "deleted": deletion == Deletion::Deleted }))?;
        }
        Command::Plan { desired, id, .. } => {
            let desired: R::Config = read_json(&desired)?;
            let plan = reconciler.plan(&desired, id.as_deref()).await?;
            print_json(&plan_to_json(&plan))?;
        }
        Command::Apply { desired, id, .. } => {
            let desired: R::Config = read_json(&desired)?;
            let applied = reconciler.apply(&desired, id.as_deref()).await?;
            print_json(&json!({
                "id": applied.id,
                "action": applied.action.as_str(),
                "state": applied.observed.as_present(),
            }))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();
    setup_tracing();

    let config = load_config(opt.config.as_deref())?;
    let sdk = load_sdk_config(&opt).await;

    let kind = opt.command.kind();
    match kind {
        Kind::BucketAcl => {
            let remote = S3BucketAcl::new(aws_sdk_s3::Client::new(&sdk));
            run::<BucketAcl, _>(&remote, config, opt.command).await
        }
        Kind::IdentityPolicy => {
            let remote = SesIdentityPolicy::new(aws_sdk_ses::Client::new(&sdk));
            run::<IdentityPolicy, _>(&remote, config, opt.command).await
        }
        Kind::DistributionConfiguration => {
            let remote = ImageBuilderDistribution::new(aws_sdk_imagebuilder::Client::new(&sdk));
            run::<DistributionConfiguration, _>(&remote, config, opt.command).await
        }
    }
}
