//! Integration-test harness: deploy a fixture, invoke a method, assert on
//! emitted events.
//!
//! Each test case gets its own freshly deployed fixture; nothing is shared
//! across cases. Failures are returned, never panicked, so the enclosing
//! test fails while the process keeps running, and the failure kind tells
//! the reader whether the fixture could not be arranged, the method under
//! test was rejected, the network failed, or the assertion did not hold.

use alloy_core::dyn_abi::DynSolValue;
use alloy_core::json_abi::JsonAbi;
use alloy_core::primitives::Address;

use crate::artifact::ContractArtifact;
use crate::error::Error;
use crate::events::EventMatcher;
use crate::network::NetworkProfile;
use crate::node::{DeployedContract, Node, TxReceipt};

/// Why a test case failed.
#[derive(Debug, thiserror::Error)]
pub enum TestFailure {
    /// The fixture could not be deployed. The test never ran.
    #[error("fixture setup failed: {0}")]
    Setup(Error),

    /// The method under test was rejected by the node or the contract.
    #[error("method under test failed: {0}")]
    Invoke(Error),

    /// Transient infrastructure failure while exercising the method.
    #[error("network failure during test: {0}")]
    Network(Error),

    /// The receipt did not contain the expected event.
    #[error("expected event '{}' was not emitted; receipt contained {seen:?}", .matcher.event)]
    Assertion {
        matcher: EventMatcher,
        /// Names of the events that were actually present, in order.
        seen: Vec<String>,
    },
}

/// Deploys fixtures and asserts post-conditions against one network.
pub struct TestHarness<N> {
    node: N,
    network: String,
    default_from: Address,
}

impl<N: Node> TestHarness<N> {
    pub fn new(node: N, profile: &NetworkProfile) -> Self {
        Self {
            node,
            network: profile.name.clone(),
            default_from: profile.from_address,
        }
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    /// Deploy a fresh fixture contract for one test case.
    pub async fn deploy_fixture(
        &self,
        artifact: &ContractArtifact,
        ctor_args: &[DynSolValue],
    ) -> Result<DeployedContract, TestFailure> {
        tracing::debug!(
            contract = %artifact.contract_name,
            network = %self.network,
            "Deploying test fixture..."
        );
        self.node
            .deploy(artifact, ctor_args, self.default_from)
            .await
            .map_err(TestFailure::Setup)
    }

    /// Invoke the method under test from the profile's account.
    pub async fn invoke(
        &self,
        to: Address,
        abi: &JsonAbi,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<TxReceipt, TestFailure> {
        self.invoke_as(self.default_from, to, abi, method, args).await
    }

    /// Invoke the method under test from a specific account. Used to
    /// exercise authorization behavior.
    pub async fn invoke_as(
        &self,
        from: Address,
        to: Address,
        abi: &JsonAbi,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<TxReceipt, TestFailure> {
        self.node
            .send(to, abi, method, args, from)
            .await
            .map_err(|e| {
                if e.is_transient() {
                    TestFailure::Network(e)
                } else {
                    TestFailure::Invoke(e)
                }
            })
    }

    /// Assert that the receipt carries an event satisfying the matcher.
    pub fn expect_event(
        &self,
        receipt: &TxReceipt,
        matcher: &EventMatcher,
    ) -> Result<(), TestFailure> {
        if matcher.assert_emitted(receipt) {
            return Ok(());
        }
        Err(TestFailure::Assertion {
            matcher: matcher.clone(),
            seen: receipt.events.iter().map(|e| e.name.clone()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkProfiles;
    use alloy_core::primitives::B256;
    use std::collections::BTreeMap;

    /// Node stub for tests that never reach the network.
    struct OfflineNode;

    impl Node for OfflineNode {
        async fn deploy(
            &self,
            _artifact: &ContractArtifact,
            _ctor_args: &[DynSolValue],
            _from: Address,
        ) -> crate::error::Result<DeployedContract> {
            Err(Error::Network("offline".into()))
        }

        async fn send(
            &self,
            _to: Address,
            _abi: &JsonAbi,
            _method: &str,
            _args: &[DynSolValue],
            _from: Address,
        ) -> crate::error::Result<TxReceipt> {
            Err(Error::Network("offline".into()))
        }
    }

    fn harness() -> TestHarness<OfflineNode> {
        let profiles = NetworkProfiles::from_toml_str(
            r#"
                [networks.local-dev]
                host = "127.0.0.1"
                port = 8545
                from_address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
            "#,
        )
        .unwrap();
        TestHarness::new(OfflineNode, profiles.resolve("local-dev").unwrap())
    }

    fn receipt_with_events(names: &[&str]) -> TxReceipt {
        TxReceipt {
            tx_hash: B256::repeat_byte(0x01),
            block_number: Some(1),
            contract_address: None,
            events: names
                .iter()
                .map(|name| crate::events::EmittedEvent {
                    name: name.to_string(),
                    fields: BTreeMap::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_expect_event_passes_on_match() {
        let harness = harness();
        let receipt = receipt_with_events(&["LogEcho"]);
        let matcher = EventMatcher::new("LogEcho");
        assert!(harness.expect_event(&receipt, &matcher).is_ok());
    }

    #[test]
    fn test_expect_event_fails_on_empty_receipt() {
        let harness = harness();
        let receipt = receipt_with_events(&[]);
        let matcher = EventMatcher::new("LogEcho");
        let failure = harness.expect_event(&receipt, &matcher).unwrap_err();
        assert!(matches!(failure, TestFailure::Assertion { ref seen, .. } if seen.is_empty()));
    }

    #[test]
    fn test_assertion_failure_reports_what_was_seen() {
        let harness = harness();
        let receipt = receipt_with_events(&["LogDeposit", "LogWithdraw"]);
        let matcher = EventMatcher::new("LogEcho");
        let failure = harness.expect_event(&receipt, &matcher).unwrap_err();
        let message = failure.to_string();
        assert!(message.contains("LogEcho"));
        assert!(message.contains("LogDeposit"));
    }

    #[tokio::test]
    async fn test_setup_failure_is_distinguished_from_network_failure() {
        let harness = harness();
        let artifact = ContractArtifact::from_json_str(
            r#"{"contractName": "Echo", "abi": [], "bytecode": "0x00"}"#,
        )
        .unwrap();

        let failure = harness.deploy_fixture(&artifact, &[]).await.unwrap_err();
        assert!(matches!(failure, TestFailure::Setup(_)));

        let failure = harness
            .invoke(Address::repeat_byte(0x01), &artifact.abi, "echo", &[])
            .await
            .unwrap_err();
        assert!(matches!(failure, TestFailure::Network(_)));
    }
}
