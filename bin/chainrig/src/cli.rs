use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// How `networks` renders its listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "chainrig")]
#[command(
    author,
    version,
    about = "Sequence contract deployments and exercise the result against a configured network"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "CHAINRIG_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the network profile configuration.
    #[arg(
        long,
        alias = "networks",
        env = "CHAINRIG_NETWORKS_FILE",
        default_value = "networks.toml"
    )]
    pub networks_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute a deployment plan against a network.
    ///
    /// Completed steps are recorded in a ledger and never re-submitted; a
    /// re-run after a failure picks up at the failed step.
    Deploy {
        /// The network profile to deploy to.
        #[arg(short, long, env = "CHAINRIG_NETWORK")]
        network: String,

        /// Path to the deployment plan.
        #[arg(long, env = "CHAINRIG_PLAN", default_value = "deploy-plan.toml")]
        plan: PathBuf,

        /// Path to the completion ledger.
        ///
        /// Defaults to `<network>.ledger.json` next to the plan file.
        #[arg(long, env = "CHAINRIG_LEDGER")]
        ledger: Option<PathBuf>,

        /// Unlock window in seconds, used when ACCOUNT_PASSWORD is set.
        /// The window must cover the whole run.
        #[arg(long, env = "CHAINRIG_UNLOCK_DURATION", default_value_t = 600)]
        unlock_duration: u64,

        /// Retry the failed step up to this many times when it failed with
        /// a transient network error. Completed steps are never re-run.
        #[arg(long, env = "CHAINRIG_RETRIES", default_value_t = 0)]
        retries: usize,
    },

    /// Invoke a state-changing method on a deployed contract and print the
    /// events it emitted.
    Send {
        /// The network profile to send through.
        #[arg(short, long, env = "CHAINRIG_NETWORK")]
        network: String,

        /// Artifact of the target contract, for ABI encoding and event
        /// decoding.
        #[arg(long)]
        artifact: PathBuf,

        /// Address of the deployed contract.
        #[arg(long)]
        address: Address,

        /// Unlock window in seconds, used when ACCOUNT_PASSWORD is set.
        #[arg(long, env = "CHAINRIG_UNLOCK_DURATION", default_value_t = 300)]
        unlock_duration: u64,

        /// Method name.
        method: String,

        /// Method arguments, coerced against the ABI types.
        args: Vec<String>,
    },

    /// List configured network profiles.
    Networks {
        #[arg(long, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}
