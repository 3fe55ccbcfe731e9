//! Bindings for the on-chain contracts the harness configures or reads from.
//!
//! Everything ABI related (call encoding, return decoding, event topic hashing) is generated by
//! `alloy::sol!` from the interface definitions below.

#![allow(missing_docs)]

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

/// `CapabilitiesRegistry.sol` (v1.1) bindings
pub mod capabilities_registry {
    alloy::sol! {
        #[sol(rpc)]
        interface ICapabilitiesRegistry {
            #[derive(Debug, PartialEq, Eq)]
            struct Capability {
                string labelledName;
                string version;
                uint8 capabilityType;
                uint8 responseType;
                address configurationContract;
            }

            #[derive(Debug, PartialEq, Eq)]
            struct CapabilityInfo {
                bytes32 hashedId;
                string labelledName;
                string version;
                uint8 capabilityType;
                uint8 responseType;
                address configurationContract;
                bool isDeprecated;
            }

            #[derive(Debug, PartialEq, Eq)]
            struct CapabilityConfiguration {
                bytes32 capabilityId;
                bytes config;
            }

            #[derive(Debug, PartialEq, Eq)]
            struct NodeOperator {
                address admin;
                string name;
            }

            #[derive(Debug, PartialEq, Eq)]
            struct NodeParams {
                uint32 nodeOperatorId;
                bytes32 signer;
                bytes32 p2pId;
                bytes32 encryptionPublicKey;
                bytes32[] hashedCapabilityIds;
            }

            #[derive(Debug, PartialEq, Eq)]
            struct DONInfo {
                uint32 id;
                uint32 configCount;
                uint8 f;
                bool isPublic;
                bool acceptsWorkflows;
                bytes32[] nodeP2PIds;
                CapabilityConfiguration[] capabilityConfigurations;
            }

            #[derive(Debug)]
            event CapabilityConfigured(bytes32 indexed hashedCapabilityId);
            #[derive(Debug)]
            event NodeOperatorAdded(uint32 indexed nodeOperatorId, address indexed admin, string name);
            #[derive(Debug)]
            event NodeAdded(bytes32 p2pId, uint32 indexed nodeOperatorId, bytes32 signer);
            #[derive(Debug)]
            event ConfigSet(uint32 indexed donId, uint32 configCount);

            function addCapabilities(Capability[] calldata capabilities) external;
            function addNodeOperators(NodeOperator[] calldata nodeOperators) external;
            function addNodes(NodeParams[] calldata nodes) external;
            function addDON(
                bytes32[] calldata nodes,
                CapabilityConfiguration[] calldata capabilityConfigurations,
                bool isPublic,
                bool acceptsWorkflows,
                uint8 f
            ) external;

            function getCapabilities() external view returns (CapabilityInfo[] memory);
            function getDONs() external view returns (DONInfo[] memory);
            function getHashedCapabilityId(string calldata labelledName, string calldata version) external pure returns (bytes32);
            function getNextDONId() external view returns (uint32);
        }
    }

    /// On-chain capability type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u8)]
    pub enum CapabilityType {
        Trigger = 0,
        Action = 1,
        Consensus = 2,
        Target = 3,
    }

    impl From<CapabilityType> for u8 {
        fn from(value: CapabilityType) -> Self {
            value as Self
        }
    }
}

/// `KeystoneForwarder.sol` bindings
pub mod keystone_forwarder {
    alloy::sol! {
        #[sol(rpc)]
        interface IKeystoneForwarder {
            #[derive(Debug)]
            event ReportProcessed(
                address indexed receiver,
                bytes32 indexed workflowExecutionId,
                bytes2 indexed reportId,
                bool result
            );
            #[derive(Debug)]
            event ConfigSet(uint32 indexed donId, uint32 indexed configVersion, uint8 f, address[] signers);

            function setConfig(uint32 donId, uint32 configVersion, uint8 f, address[] calldata signers) external;
            function report(
                address receiver,
                bytes calldata rawReport,
                bytes calldata reportContext,
                bytes[] calldata signatures
            ) external;
        }
    }
}

/// `WorkflowRegistry.sol` bindings
pub mod workflow_registry {
    alloy::sol! {
        #[sol(rpc)]
        interface IWorkflowRegistry {
            #[derive(Debug)]
            event AllowedDONsListUpdatedV1(uint32[] donIDs, bool allowed);
            #[derive(Debug)]
            event AuthorizedAddressesListUpdatedV1(address[] addresses, bool allowed);
            #[derive(Debug)]
            event WorkflowRegisteredV1(
                bytes32 indexed workflowID,
                address indexed workflowOwner,
                uint32 indexed donID,
                uint8 status,
                string workflowName,
                string binaryURL,
                string configURL,
                string secretsURL
            );

            function updateAllowedDONs(uint32[] calldata donIDs, bool allowed) external;
            function updateAuthorizedAddresses(address[] calldata addresses, bool allowed) external;
            function getAllAllowedDONs() external view returns (uint32[] memory);
            function getAllAuthorizedAddresses() external view returns (address[] memory);
        }
    }
}

/// `OCR3Capability.sol` bindings
pub mod ocr3_capability {
    alloy::sol! {
        #[sol(rpc)]
        interface IOCR3Capability {
            #[derive(Debug)]
            event ConfigSet(
                uint32 previousConfigBlockNumber,
                bytes32 configDigest,
                uint64 configCount,
                address[] signers,
                address[] transmitters,
                uint8 f,
                bytes onchainConfig,
                uint64 offchainConfigVersion,
                bytes offchainConfig
            );

            function setConfig(
                bytes[] calldata signers,
                address[] calldata transmitters,
                uint8 f,
                bytes calldata onchainConfig,
                uint64 offchainConfigVersion,
                bytes calldata offchainConfig
            ) external;
            function latestConfigDetails()
                external
                view
                returns (uint32 configCount, uint32 blockNumber, bytes32 configDigest);
        }
    }
}

/// Token pool bindings, including the `Pool` and `RateLimiter` library tuples.
pub mod token_pool {
    alloy::sol! {
        library Pool {
            #[derive(Debug, PartialEq, Eq)]
            struct LockOrBurnInV1 {
                bytes receiver;
                uint64 remoteChainSelector;
                address originalSender;
                uint256 amount;
                address localToken;
            }

            #[derive(Debug, PartialEq, Eq)]
            struct LockOrBurnOutV1 {
                bytes destTokenAddress;
                bytes destPoolData;
            }

            #[derive(Debug, PartialEq, Eq)]
            struct ReleaseOrMintInV1 {
                bytes originalSender;
                uint64 remoteChainSelector;
                address receiver;
                uint256 amount;
                address localToken;
                bytes sourcePoolAddress;
                bytes sourcePoolData;
                bytes offchainTokenData;
            }

            #[derive(Debug, PartialEq, Eq)]
            struct ReleaseOrMintOutV1 {
                uint256 destinationAmount;
            }
        }

        library RateLimiter {
            #[derive(Debug, PartialEq, Eq)]
            struct Config {
                bool isEnabled;
                uint128 capacity;
                uint128 rate;
            }

            #[derive(Debug, PartialEq, Eq)]
            struct TokenBucket {
                uint128 tokens;
                uint32 lastUpdated;
                bool isEnabled;
                uint128 capacity;
                uint128 rate;
            }
        }

        #[sol(rpc)]
        interface ITokenPool {
            #[derive(Debug)]
            event ChainConfigured(
                uint64 remoteChainSelector,
                RateLimiter.Config outboundRateLimiterConfig,
                RateLimiter.Config inboundRateLimiterConfig
            );
            #[derive(Debug)]
            event Locked(address indexed sender, uint256 amount);
            #[derive(Debug)]
            event Burned(address indexed sender, uint256 amount);
            #[derive(Debug)]
            event Released(address indexed sender, address indexed recipient, uint256 amount);
            #[derive(Debug)]
            event Minted(address indexed sender, address indexed recipient, uint256 amount);

            function lockOrBurn(Pool.LockOrBurnInV1 calldata lockOrBurnIn)
                external
                returns (Pool.LockOrBurnOutV1 memory);
            function releaseOrMint(Pool.ReleaseOrMintInV1 calldata releaseOrMintIn)
                external
                returns (Pool.ReleaseOrMintOutV1 memory);
            function setChainRateLimiterConfig(
                uint64 remoteChainSelector,
                RateLimiter.Config calldata outboundConfig,
                RateLimiter.Config calldata inboundConfig
            ) external;
            function getCurrentOutboundRateLimiterState(uint64 remoteChainSelector)
                external
                view
                returns (RateLimiter.TokenBucket memory);
            function getSupportedChains() external view returns (uint64[] memory);
            function isSupportedChain(uint64 remoteChainSelector) external view returns (bool);
            function getToken() external view returns (address);
        }
    }

    impl RateLimiter::Config {
        /// A disabled rate limiter, the default for newly configured lanes.
        pub const fn disabled() -> Self {
            Self { isEnabled: false, capacity: 0, rate: 0 }
        }
    }
}

/// Path to write deploy info to
pub const DEFAULT_DEPLOY_INFO: &str = "./logs/deploy_info.json";

/// Addresses of the contracts deployed for a CRE environment.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployInfo {
    /// Capabilities registry on the home chain.
    pub capabilities_registry: Address,
    /// Workflow registry on the home chain.
    pub workflow_registry: Address,
    /// OCR3 capability contract on the home chain.
    pub ocr3_capability: Address,
    /// Keystone forwarders keyed by chain id.
    #[serde(default)]
    pub forwarders: BTreeMap<u64, Address>,
    /// Next DON id reported by the capabilities registry at deploy time.
    #[serde(default)]
    pub next_don_id: Option<u32>,
    /// Balance each node was funded with, in wei.
    #[serde(default)]
    pub node_funding: Option<U256>,
}

impl DeployInfo {
    /// Forwarder deployed on `chain_id`, if any.
    pub fn forwarder(&self, chain_id: u64) -> Option<Address> {
        self.forwarders.get(&chain_id).copied()
    }

    /// Write the deploy info as pretty JSON.
    pub fn write_to(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let raw = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, raw).map_err(Into::into)
    }
}

/// Read deploy info from `path`.
pub fn read_deploy_info(path: impl AsRef<Path>) -> eyre::Result<DeployInfo> {
    let raw_json = std::fs::read(path)?;
    serde_json::from_slice(&raw_json).map_err(Into::into)
}

/// Read deploy info from [`DEFAULT_DEPLOY_INFO`].
pub fn get_default_deploy_info() -> eyre::Result<DeployInfo> {
    read_deploy_info(DEFAULT_DEPLOY_INFO)
}
