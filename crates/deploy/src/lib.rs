//! chainrig-deploy - deployment and test orchestration for
//! contract-bearing networks.
//!
//! This crate sequences multi-step contract deployments against a remote
//! execution node over JSON-RPC, manages temporary account authorization,
//! and gives integration tests a declarative way to assert on the events a
//! transaction emitted.

mod artifact;
mod error;
mod events;
mod harness;
mod network;
mod node;
mod plan;
pub mod rpc;
mod sequencer;
mod unlock;

pub use artifact::{ContractArtifact, coerce_args};
pub use error::{Error, Result};
pub use events::{
    EmittedEvent, EventMatcher, FieldMatch, RawLog, canonical_value, decode_events,
};
pub use harness::{TestFailure, TestHarness};
pub use network::{ENV_PREFIX, NetworkProfile, NetworkProfiles};
pub use node::{
    DEFAULT_RECEIPT_TIMEOUT, DeployedContract, Node, NodeClient, NodeClientConfig, RawReceipt,
    TxReceipt,
};
pub use plan::{PlanFile, PlanStep};
pub use rpc::{DEFAULT_REQUEST_TIMEOUT, RpcClient};
pub use sequencer::{
    CompletedStep, DeploymentLedger, DeploymentPlan, DeploymentSequencer, DeploymentStep,
    LedgerEntry, SequenceReport, StepArg, StepFailure,
};
pub use unlock::{ACCOUNT_PASSWORD_ENV, AuthorizationPolicy, Secret, unlock_if_required};
