//! chainrig is a CLI to sequence contract deployments against a configured
//! network and poke at the result.

mod cli;

use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use backon::{BackoffBuilder, ExponentialBuilder};
use clap::Parser;
use comfy_table::Table;

use chainrig_deploy::{
    AuthorizationPolicy, ContractArtifact, DeploymentLedger, DeploymentSequencer, NetworkProfile,
    NetworkProfiles, Node, NodeClient, NodeClientConfig, PlanFile, SequenceReport, coerce_args,
    unlock_if_required,
};
use cli::{Cli, Command, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let profiles = NetworkProfiles::load(&cli.networks_file)?;

    match cli.command {
        Command::Deploy {
            network,
            plan,
            ledger,
            unlock_duration,
            retries,
        } => deploy(&profiles, &network, &plan, ledger, unlock_duration, retries).await,
        Command::Send {
            network,
            artifact,
            address,
            unlock_duration,
            method,
            args,
        } => {
            send(
                &profiles,
                &network,
                &artifact,
                address,
                unlock_duration,
                &method,
                &args,
            )
            .await
        }
        Command::Networks { format } => networks(&profiles, format),
    }
}

/// Connect to the profile's node and, when the profile pins a chain id,
/// check the node actually serves that chain before touching it.
async fn connect_checked(profile: &NetworkProfile) -> Result<NodeClient> {
    let client = NodeClient::connect(profile, NodeClientConfig::default())?;

    if let Some(expected) = profile.chain_id {
        let actual = client
            .chain_id()
            .await
            .context("Failed to query the node's chain id")?;
        anyhow::ensure!(
            actual == expected,
            "network '{}' expects chain id {expected}, but the node reports {actual}",
            profile.name
        );
    }

    Ok(client)
}

async fn deploy(
    profiles: &NetworkProfiles,
    network: &str,
    plan_path: &Path,
    ledger: Option<PathBuf>,
    unlock_duration: u64,
    retries: usize,
) -> Result<()> {
    let profile = profiles.resolve(network)?;
    let client = connect_checked(profile).await?;

    let policy = AuthorizationPolicy::from_env(Duration::from_secs(unlock_duration));
    unlock_if_required(client.rpc(), profile, &policy).await?;

    let base_dir = plan_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let plan = PlanFile::load(plan_path)?.into_plan(&base_dir, profile.from_address)?;

    let ledger_path = ledger.unwrap_or_else(|| base_dir.join(format!("{network}.ledger.json")));
    let mut sequencer = DeploymentSequencer::new(DeploymentLedger::load(ledger_path)?);

    tracing::info!(
        network = %profile.name,
        steps = plan.len(),
        "Starting deployment run..."
    );

    // The sequencer never retries; re-running here is safe because
    // completed steps are recorded in the ledger and skipped.
    let mut backoff = ExponentialBuilder::default().with_max_times(retries).build();
    let report = loop {
        let report = sequencer.run(&client, &plan).await?;
        if let Some(failure) = &report.failure {
            if failure.error.is_transient() {
                if let Some(delay) = backoff.next() {
                    tracing::warn!(
                        step = %failure.step_id,
                        delay_ms = delay.as_millis() as u64,
                        "Transient network failure, retrying the failed step..."
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
        }
        break report;
    };

    print_report(&report);

    let completed = report.deployed.len();
    match report.failure {
        None => Ok(()),
        Some(failure) => {
            Err(failure).context(format!("deployment halted after {completed} completed step(s)"))
        }
    }
}

fn print_report(report: &SequenceReport) {
    let mut table = Table::new();
    table.set_header(vec!["Step", "Contract", "Address", "Status"]);

    for step in &report.deployed {
        table.add_row(vec![
            step.step_id.clone(),
            step.contract.contract_name.clone(),
            step.contract.address.to_string(),
            if step.reused { "reused" } else { "deployed" }.to_string(),
        ]);
    }

    if let Some(failure) = &report.failure {
        table.add_row(vec![
            failure.step_id.clone(),
            String::new(),
            String::new(),
            format!("FAILED: {}", failure.error),
        ]);
    }

    println!("{table}");
}

async fn send(
    profiles: &NetworkProfiles,
    network: &str,
    artifact_path: &Path,
    address: Address,
    unlock_duration: u64,
    method: &str,
    args: &[String],
) -> Result<()> {
    let profile = profiles.resolve(network)?;
    let client = connect_checked(profile).await?;

    let policy = AuthorizationPolicy::from_env(Duration::from_secs(unlock_duration));
    unlock_if_required(client.rpc(), profile, &policy).await?;

    let artifact = ContractArtifact::load(artifact_path)?;
    let function = artifact
        .abi
        .functions
        .get(method)
        .and_then(|overloads| overloads.first())
        .with_context(|| {
            format!(
                "no function '{method}' in the ABI of '{}'",
                artifact.contract_name
            )
        })?;

    let values = coerce_args(&function.inputs, args)?;

    let receipt = client
        .send(address, &artifact.abi, method, &values, profile.from_address)
        .await?;

    tracing::info!(
        tx_hash = %receipt.tx_hash,
        block_number = ?receipt.block_number,
        "Transaction confirmed"
    );

    if receipt.events.is_empty() {
        println!("(no events decoded from the receipt)");
    }
    for event in &receipt.events {
        println!("{}: {}", event.name, serde_json::to_string(&event.fields)?);
    }

    Ok(())
}

fn networks(profiles: &NetworkProfiles, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let list: Vec<&NetworkProfile> = profiles.iter().collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["Network", "RPC URL", "From", "Chain ID"]);
            for profile in profiles.iter() {
                table.add_row(vec![
                    profile.name.clone(),
                    profile
                        .rpc_url()
                        .map(|url| url.to_string())
                        .unwrap_or_else(|_| format!("{}:{}", profile.host, profile.port)),
                    profile.from_address.to_string(),
                    profile
                        .chain_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
