//! Node client: deploy contracts, send method calls, await receipts.
//!
//! State-changing calls publish a transaction and return only after the node
//! confirms it is mined or the receipt timeout elapses. A timeout aborts the
//! call, not the transaction: it may still land after the caller gives up,
//! so a timeout reads as "unknown outcome".

use std::future::Future;
use std::time::{Duration, Instant};

use alloy_core::dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_core::json_abi::JsonAbi;
use alloy_core::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

use crate::artifact::ContractArtifact;
use crate::error::{Error, Result};
use crate::events::{EmittedEvent, RawLog, decode_events};
use crate::network::NetworkProfile;
use crate::rpc::{DEFAULT_REQUEST_TIMEOUT, RpcClient};

/// Default time to wait for a submitted transaction to be mined.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default interval between receipt polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Timeouts for node interaction.
#[derive(Debug, Clone)]
pub struct NodeClientConfig {
    /// Timeout for a single RPC request.
    pub request_timeout: Duration,
    /// Total time to wait for a transaction receipt.
    pub receipt_timeout: Duration,
    /// Interval between receipt polls.
    pub poll_interval: Duration,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// A deployed contract: where it landed and the transaction that put it
/// there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContract {
    pub contract_name: String,
    pub address: Address,
    pub deploy_tx_hash: B256,
}

/// The confirmed outcome of a submitted transaction, with its emitted
/// events decoded against the contract's ABI.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub contract_address: Option<Address>,
    pub events: Vec<EmittedEvent>,
}

/// Wire shape of `eth_getTransactionReceipt`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub transaction_hash: B256,
    #[serde(default, deserialize_with = "opt_u64_from_hex")]
    pub block_number: Option<u64>,
    #[serde(default, deserialize_with = "opt_u64_from_hex")]
    pub status: Option<u64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

/// Deserialize an optional u64 from a 0x-prefixed hex string.
fn opt_u64_from_hex<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) => u64::from_str_radix(s.trim_start_matches("0x"), 16)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// The node operations the sequencer and test harness depend on.
///
/// [`NodeClient`] is the JSON-RPC implementation; tests substitute an
/// in-memory fake.
pub trait Node: Send + Sync {
    /// Deploy a contract, returning its address once the deployment
    /// transaction is mined.
    fn deploy(
        &self,
        artifact: &ContractArtifact,
        ctor_args: &[DynSolValue],
        from: Address,
    ) -> impl Future<Output = Result<DeployedContract>> + Send;

    /// Invoke a state-changing method and await its receipt, with emitted
    /// events decoded against `abi`.
    fn send(
        &self,
        to: Address,
        abi: &JsonAbi,
        method: &str,
        args: &[DynSolValue],
        from: Address,
    ) -> impl Future<Output = Result<TxReceipt>> + Send;
}

/// JSON-RPC node client bound to one network profile.
#[derive(Debug, Clone)]
pub struct NodeClient {
    rpc: RpcClient,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl NodeClient {
    /// Create a client for the profile's RPC endpoint.
    pub fn connect(profile: &NetworkProfile, config: NodeClientConfig) -> Result<Self> {
        let rpc = RpcClient::new(profile.rpc_url()?, config.request_timeout)?;
        Ok(Self {
            rpc,
            receipt_timeout: config.receipt_timeout,
            poll_interval: config.poll_interval,
        })
    }

    /// The underlying RPC client (shared with the account unlocker).
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Query the node's chain id.
    pub async fn chain_id(&self) -> Result<u64> {
        let raw: String = self.rpc.call("eth_chainId", vec![]).await?;
        u64::from_str_radix(raw.trim_start_matches("0x"), 16)
            .map_err(|e| Error::Network(format!("failed to parse eth_chainId result: {e}")))
    }

    async fn submit(&self, tx: serde_json::Value) -> Result<B256> {
        self.rpc.call("eth_sendTransaction", vec![tx]).await
    }

    /// Poll for the receipt of `tx_hash` until it is mined or the receipt
    /// timeout elapses.
    pub async fn wait_for_receipt(&self, tx_hash: B256) -> Result<RawReceipt> {
        let start = Instant::now();

        loop {
            if start.elapsed() > self.receipt_timeout {
                return Err(Error::Network(format!(
                    "timed out after {}s waiting for receipt of {tx_hash}; \
                     the transaction may still be mined",
                    self.receipt_timeout.as_secs()
                )));
            }

            let receipt: Option<RawReceipt> = self
                .rpc
                .call("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
                .await?;

            match receipt {
                Some(receipt) => return Ok(receipt),
                None => {
                    tracing::trace!(tx_hash = %tx_hash, "Transaction not yet mined, retrying...")
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Turn a mined receipt into a [`TxReceipt`], failing on an on-chain
    /// revert.
    fn confirmed(&self, raw: RawReceipt, abi: &JsonAbi) -> Result<TxReceipt> {
        if raw.status == Some(0) {
            return Err(Error::Reverted(format!(
                "transaction {} reverted on-chain",
                raw.transaction_hash
            )));
        }

        Ok(TxReceipt {
            tx_hash: raw.transaction_hash,
            block_number: raw.block_number,
            contract_address: raw.contract_address,
            events: decode_events(abi, &raw.logs),
        })
    }
}

impl Node for NodeClient {
    async fn deploy(
        &self,
        artifact: &ContractArtifact,
        ctor_args: &[DynSolValue],
        from: Address,
    ) -> Result<DeployedContract> {
        let data = artifact.deploy_data(ctor_args)?;

        tracing::info!(
            contract = %artifact.contract_name,
            from = %from,
            "Deploying contract..."
        );

        let tx_hash = self
            .submit(serde_json::json!({ "from": from, "data": data }))
            .await?;

        tracing::info!(tx_hash = %tx_hash, "Deployment transaction sent, waiting for receipt...");

        let raw = self.wait_for_receipt(tx_hash).await?;
        let receipt = self.confirmed(raw, &artifact.abi)?;

        let address = receipt.contract_address.ok_or_else(|| {
            Error::Network(format!(
                "receipt for {} is missing a contract address",
                receipt.tx_hash
            ))
        })?;

        tracing::info!(
            contract = %artifact.contract_name,
            address = %address,
            "Contract deployed"
        );

        Ok(DeployedContract {
            contract_name: artifact.contract_name.clone(),
            address,
            deploy_tx_hash: receipt.tx_hash,
        })
    }

    async fn send(
        &self,
        to: Address,
        abi: &JsonAbi,
        method: &str,
        args: &[DynSolValue],
        from: Address,
    ) -> Result<TxReceipt> {
        let function = abi
            .functions
            .get(method)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| Error::Plan(format!("no function '{method}' in the contract ABI")))?;

        let data = function.abi_encode_input(args).map_err(|e| {
            Error::Plan(format!("arguments for '{method}' do not match its ABI: {e}"))
        })?;

        tracing::debug!(method, to = %to, from = %from, "Sending transaction...");

        let tx_hash = self
            .submit(serde_json::json!({
                "from": from,
                "to": to,
                "data": Bytes::from(data)
            }))
            .await?;

        let raw = self.wait_for_receipt(tx_hash).await?;
        self.confirmed(raw, abi)
    }
}
