//! TOML deployment plans.
//!
//! A plan file lists the steps of one deployment run. Arguments are plain
//! strings coerced against the constructor's ABI types; an argument of the
//! form `@step-id` resolves to the address deployed by an earlier step.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use serde::Deserialize;

use crate::artifact::{ContractArtifact, coerce_args};
use crate::error::{Error, Result};
use crate::sequencer::{DeploymentPlan, DeploymentStep, StepArg};

/// On-disk shape of a deployment plan.
///
/// ```toml
/// [[steps]]
/// id = "migrations"
/// artifact = "artifacts/Migrations.json"
///
/// [[steps]]
/// id = "bank"
/// artifact = "artifacts/Bank.json"
/// args = ["@migrations", "1000"]
/// ```
#[derive(Debug, Deserialize)]
pub struct PlanFile {
    pub steps: Vec<PlanStep>,
}

/// One step as written in the plan file.
#[derive(Debug, Deserialize)]
pub struct PlanStep {
    pub id: String,
    /// Artifact path, relative to the plan file's directory.
    pub artifact: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    /// Sender override; defaults to the network profile's account.
    #[serde(default)]
    pub from: Option<Address>,
}

impl PlanFile {
    /// Read and parse a plan file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Plan(format!("failed to read plan {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| Error::Plan(format!("failed to parse plan {}: {e}", path.display())))
    }

    /// Resolve the file into an executable plan: load each artifact, coerce
    /// arguments against its constructor's ABI types, and turn `@step-id`
    /// references into positional ones.
    pub fn into_plan(self, base_dir: &Path, default_from: Address) -> Result<DeploymentPlan> {
        let mut steps = Vec::with_capacity(self.steps.len());
        let mut ids: Vec<String> = Vec::with_capacity(self.steps.len());

        for plan_step in self.steps {
            let artifact = ContractArtifact::load(&base_dir.join(&plan_step.artifact))?;
            let params = artifact.constructor_params();

            if params.len() != plan_step.args.len() {
                return Err(Error::Plan(format!(
                    "step '{}': constructor of '{}' expects {} argument(s), got {}",
                    plan_step.id,
                    artifact.contract_name,
                    params.len(),
                    plan_step.args.len()
                )));
            }

            let mut ctor_args = Vec::with_capacity(params.len());
            for (param, raw) in params.iter().zip(&plan_step.args) {
                if let Some(target_id) = raw.strip_prefix('@') {
                    if param.ty != "address" {
                        return Err(Error::Plan(format!(
                            "step '{}': '@{target_id}' supplies an address, but parameter \
                             '{}' has type '{}'",
                            plan_step.id, param.name, param.ty
                        )));
                    }
                    let target = ids.iter().position(|id| id == target_id).ok_or_else(|| {
                        Error::Plan(format!(
                            "step '{}' references '@{target_id}', which is not deployed \
                             before it",
                            plan_step.id
                        ))
                    })?;
                    ctor_args.push(StepArg::DeployedAddress(target));
                } else {
                    let mut values = coerce_args(
                        std::slice::from_ref(param),
                        std::slice::from_ref(raw),
                    )
                    .map_err(|e| Error::Plan(format!("step '{}': {e}", plan_step.id)))?;
                    ctor_args.push(StepArg::Value(values.remove(0)));
                }
            }

            ids.push(plan_step.id.clone());
            steps.push(DeploymentStep {
                id: plan_step.id,
                artifact,
                ctor_args,
                from: plan_step.from.unwrap_or(default_from),
            });
        }

        DeploymentPlan::new(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIGRATIONS_ARTIFACT: &str = r#"{
        "contractName": "Migrations",
        "abi": [],
        "bytecode": "0x6080604052"
    }"#;

    const BANK_ARTIFACT: &str = r#"{
        "contractName": "Bank",
        "abi": [
            {
                "inputs": [
                    { "name": "registry", "type": "address" },
                    { "name": "limit", "type": "uint256" }
                ],
                "stateMutability": "nonpayable",
                "type": "constructor"
            }
        ],
        "bytecode": "0x60806040aa"
    }"#;

    fn write_artifacts(dir: &Path) {
        std::fs::write(dir.join("Migrations.json"), MIGRATIONS_ARTIFACT).unwrap();
        std::fs::write(dir.join("Bank.json"), BANK_ARTIFACT).unwrap();
    }

    fn default_from() -> Address {
        Address::repeat_byte(0x11)
    }

    #[test]
    fn test_plan_file_resolves_step_references() {
        let dir = tempdir::TempDir::new("chainrig-plan").unwrap();
        write_artifacts(dir.path());

        let file: PlanFile = toml::from_str(
            r#"
                [[steps]]
                id = "migrations"
                artifact = "Migrations.json"

                [[steps]]
                id = "bank"
                artifact = "Bank.json"
                args = ["@migrations", "1000"]
            "#,
        )
        .unwrap();

        let plan = file.into_plan(dir.path(), default_from()).unwrap();
        assert_eq!(plan.len(), 2);

        let bank = &plan.steps()[1];
        assert!(matches!(bank.ctor_args[0], StepArg::DeployedAddress(0)));
        assert!(matches!(bank.ctor_args[1], StepArg::Value(_)));
        assert_eq!(bank.from, default_from());
    }

    #[test]
    fn test_plan_file_rejects_unknown_reference() {
        let dir = tempdir::TempDir::new("chainrig-plan").unwrap();
        write_artifacts(dir.path());

        let file: PlanFile = toml::from_str(
            r#"
                [[steps]]
                id = "bank"
                artifact = "Bank.json"
                args = ["@registry", "1000"]
            "#,
        )
        .unwrap();

        let err = file.into_plan(dir.path(), default_from()).unwrap_err();
        assert!(matches!(err, Error::Plan(_)));
        assert!(err.to_string().contains("@registry"));
    }

    #[test]
    fn test_plan_file_rejects_reference_to_non_address_parameter() {
        let dir = tempdir::TempDir::new("chainrig-plan").unwrap();
        write_artifacts(dir.path());

        let file: PlanFile = toml::from_str(
            r#"
                [[steps]]
                id = "migrations"
                artifact = "Migrations.json"

                [[steps]]
                id = "bank"
                artifact = "Bank.json"
                args = ["0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "@migrations"]
            "#,
        )
        .unwrap();

        let err = file.into_plan(dir.path(), default_from()).unwrap_err();
        assert!(matches!(err, Error::Plan(_)));
        assert!(err.to_string().contains("uint256"));
    }

    #[test]
    fn test_plan_file_rejects_argument_count_mismatch() {
        let dir = tempdir::TempDir::new("chainrig-plan").unwrap();
        write_artifacts(dir.path());

        let file: PlanFile = toml::from_str(
            r#"
                [[steps]]
                id = "bank"
                artifact = "Bank.json"
                args = ["1000"]
            "#,
        )
        .unwrap();

        let err = file.into_plan(dir.path(), default_from()).unwrap_err();
        assert!(matches!(err, Error::Plan(_)));
        assert!(err.to_string().contains("expects 2"));
    }

    #[test]
    fn test_plan_file_sender_override() {
        let dir = tempdir::TempDir::new("chainrig-plan").unwrap();
        write_artifacts(dir.path());

        let file: PlanFile = toml::from_str(
            r#"
                [[steps]]
                id = "migrations"
                artifact = "Migrations.json"
                from = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
            "#,
        )
        .unwrap();

        let plan = file.into_plan(dir.path(), default_from()).unwrap();
        assert_ne!(plan.steps()[0].from, default_from());
    }
}
