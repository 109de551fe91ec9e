//! Ordered deployment runs.
//!
//! A plan is a list of steps executed strictly in order, one at a time: the
//! target network enforces one account nonce at a time, and a later step may
//! use the address produced by an earlier one. If a step fails the run halts
//! there. Earlier results are kept and reported, later steps are never
//! attempted, nothing is rolled back (contract deployments are not atomic
//! across steps).
//!
//! Completed steps are recorded in a ledger keyed by step id, so re-running
//! a plan never re-submits a step that already succeeded. Each ledger entry
//! carries a hash of the step definition; a recorded step whose definition
//! has since changed fails the run instead of being silently skipped or
//! silently re-deployed.
//!
//! This layer never retries. A transient network failure is reported with
//! the failed step's index; the caller decides whether to re-run, which is
//! safe because of the ledger.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::PathBuf;

use alloy_core::dyn_abi::DynSolValue;
use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::artifact::ContractArtifact;
use crate::error::{Error, Result};
use crate::events::canonical_value;
use crate::node::{DeployedContract, Node};

/// One constructor argument of a deployment step.
#[derive(Debug, Clone)]
pub enum StepArg {
    /// A literal ABI value.
    Value(DynSolValue),
    /// The address deployed by an earlier step, referenced by its position
    /// in the plan. Only backward references are valid.
    DeployedAddress(usize),
}

/// One unit of work: publish a contract and record its address.
///
/// Consumed exactly once per run; produces a [`DeployedContract`].
#[derive(Debug, Clone)]
pub struct DeploymentStep {
    /// Stable identity of this step, used for ledger tracking.
    pub id: String,
    /// The contract to deploy.
    pub artifact: ContractArtifact,
    /// Constructor arguments, literal or referencing earlier steps.
    pub ctor_args: Vec<StepArg>,
    /// The account the deployment transaction is sent from.
    pub from: Address,
}

/// An ordered, validated list of deployment steps.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    steps: Vec<DeploymentStep>,
}

impl DeploymentPlan {
    /// Validate and build a plan.
    ///
    /// Step ids must be unique, and a step may only reference the deployed
    /// address of a step strictly before it. Violations fail here, before
    /// any network I/O.
    pub fn new(steps: Vec<DeploymentStep>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for step in &steps {
            if !seen.insert(step.id.as_str()) {
                return Err(Error::Plan(format!("duplicate step id '{}'", step.id)));
            }
        }

        for (index, step) in steps.iter().enumerate() {
            for arg in &step.ctor_args {
                if let StepArg::DeployedAddress(target) = arg {
                    if *target >= index {
                        return Err(Error::Plan(format!(
                            "step '{}' (index {index}) references the address of step {target}, \
                             which is not deployed before it",
                            step.id
                        )));
                    }
                }
            }
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Hash of the parts of a step that, when changed, make a recorded result
/// stale: identity, contract, bytecode, arguments, sender.
fn step_content_hash(step: &DeploymentStep) -> String {
    let args: Vec<serde_json::Value> = step
        .ctor_args
        .iter()
        .map(|arg| match arg {
            StepArg::Value(value) => canonical_value(value),
            StepArg::DeployedAddress(target) => serde_json::json!({ "step-ref": target }),
        })
        .collect();

    // serde_json maps serialize with sorted keys, so this is deterministic.
    let canonical = serde_json::json!({
        "id": step.id,
        "contract": step.artifact.contract_name,
        "bytecode": step.artifact.bytecode,
        "args": args,
        "from": step.from,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// One recorded, completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub step_id: String,
    pub content_hash: String,
    pub contract: DeployedContract,
    /// Unix timestamp of when the step completed.
    pub deployed_at: i64,
}

/// Record of completed deployment steps, keyed by step id.
///
/// Optionally backed by a JSON file so completion survives the process.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DeploymentLedger {
    #[serde(default)]
    entries: BTreeMap<String, LedgerEntry>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl DeploymentLedger {
    /// A ledger that lives only for this process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load a ledger from `path`, or start an empty one bound to `path` if
    /// the file does not exist yet.
    pub fn load(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                entries: BTreeMap::new(),
                path: Some(path),
            });
        }

        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read ledger {}: {e}", path.display())))?;
        let mut ledger: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse ledger {}: {e}", path.display())))?;
        ledger.path = Some(path);

        tracing::debug!(entries = ledger.entries.len(), "Deployment ledger loaded");
        Ok(ledger)
    }

    fn record(&mut self, entry: LedgerEntry) -> Result<()> {
        self.entries.insert(entry.step_id.clone(), entry);
        if let Some(path) = &self.path {
            let raw = serde_json::to_string_pretty(self)
                .expect("ledger serialization should never fail");
            std::fs::write(path, raw).map_err(|e| {
                Error::Config(format!("failed to write ledger {}: {e}", path.display()))
            })?;
        }
        Ok(())
    }

    pub fn get(&self, step_id: &str) -> Option<&LedgerEntry> {
        self.entries.get(step_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A step that completed during (or before) a run.
#[derive(Debug, Clone)]
pub struct CompletedStep {
    pub step_id: String,
    pub contract: DeployedContract,
    /// True when the result came from the ledger instead of a fresh
    /// deployment.
    pub reused: bool,
}

/// The failure that halted a run.
#[derive(Debug, thiserror::Error)]
#[error("step {index} ('{step_id}') failed: {error}")]
pub struct StepFailure {
    /// Zero-based index of the failed step in the plan.
    pub index: usize,
    pub step_id: String,
    #[source]
    pub error: Error,
}

/// Outcome of one run: every completed step in order, and the failure that
/// stopped the run, if any. Steps after a failure are never attempted.
#[derive(Debug)]
pub struct SequenceReport {
    pub deployed: Vec<CompletedStep>,
    pub failure: Option<StepFailure>,
}

impl SequenceReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// The deployed address for a step id, if that step completed.
    pub fn address_of(&self, step_id: &str) -> Option<Address> {
        self.deployed
            .iter()
            .find(|step| step.step_id == step_id)
            .map(|step| step.contract.address)
    }
}

/// Executes deployment plans strictly in order against a node.
#[derive(Debug)]
pub struct DeploymentSequencer {
    ledger: DeploymentLedger,
}

impl DeploymentSequencer {
    pub fn new(ledger: DeploymentLedger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &DeploymentLedger {
        &self.ledger
    }

    /// Run a plan.
    ///
    /// Returns `Err` only for plan-level problems detected before any step
    /// executes (stale ledger entries). Step failures are reported inside
    /// the [`SequenceReport`] together with the results of the steps that
    /// completed before the failure.
    pub async fn run<N: Node>(&mut self, node: &N, plan: &DeploymentPlan) -> Result<SequenceReport> {
        for step in plan.steps() {
            if let Some(entry) = self.ledger.get(&step.id) {
                if entry.content_hash != step_content_hash(step) {
                    return Err(Error::Plan(format!(
                        "step '{}' changed since it was recorded in the ledger; \
                         remove the stale entry or rename the step",
                        step.id
                    )));
                }
            }
        }

        let mut deployed: Vec<CompletedStep> = Vec::with_capacity(plan.len());
        let mut addresses: Vec<Address> = Vec::with_capacity(plan.len());

        for (index, step) in plan.steps().iter().enumerate() {
            if let Some(entry) = self.ledger.get(&step.id) {
                tracing::info!(
                    step = %step.id,
                    address = %entry.contract.address,
                    "Step already deployed, skipping"
                );
                addresses.push(entry.contract.address);
                deployed.push(CompletedStep {
                    step_id: step.id.clone(),
                    contract: entry.contract.clone(),
                    reused: true,
                });
                continue;
            }

            // Plan validation guarantees every referenced index is below
            // `index`, and `addresses` holds one entry per completed step.
            let args = resolve_args(&step.ctor_args, &addresses);

            tracing::info!(
                step = %step.id,
                index,
                contract = %step.artifact.contract_name,
                "Running deployment step..."
            );

            match node.deploy(&step.artifact, &args, step.from).await {
                Ok(contract) => {
                    self.ledger.record(LedgerEntry {
                        step_id: step.id.clone(),
                        content_hash: step_content_hash(step),
                        contract: contract.clone(),
                        deployed_at: chrono::Utc::now().timestamp(),
                    })?;
                    addresses.push(contract.address);
                    deployed.push(CompletedStep {
                        step_id: step.id.clone(),
                        contract,
                        reused: false,
                    });
                }
                Err(error) => {
                    tracing::error!(
                        step = %step.id,
                        index,
                        error = %error,
                        "Deployment step failed, halting run"
                    );
                    return Ok(SequenceReport {
                        deployed,
                        failure: Some(StepFailure {
                            index,
                            step_id: step.id.clone(),
                            error,
                        }),
                    });
                }
            }
        }

        tracing::info!(steps = deployed.len(), "Deployment run complete");
        Ok(SequenceReport {
            deployed,
            failure: None,
        })
    }
}

fn resolve_args(args: &[StepArg], addresses: &[Address]) -> Vec<DynSolValue> {
    args.iter()
        .map(|arg| match arg {
            StepArg::Value(value) => value.clone(),
            StepArg::DeployedAddress(target) => DynSolValue::Address(addresses[*target]),
        })
        .collect()
}
