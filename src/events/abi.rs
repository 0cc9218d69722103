//! Solidity bindings for the events and calls the parser understands
//!
//! Generates Rust bindings for:
//! - Deployment library events (`ContractDeployed`, `TransactionSimulated`)
//! - Safe batching events (`SafeTransactionQueued`, `SafeTransactionExecuted`)
//! - Proxy lifecycle events (`ProxyDeployed` and the EIP-1967 trio)
//! - Calls recognized inside traces and broadcasts (`prank`, `execTransaction`)

use alloy::sol;

sol! {
    /// Parameters of a single deployment as reported by the deployer library
    struct DeploymentDetails {
        string artifact;
        string label;
        string entropy;
        bytes32 salt;
        bytes32 bytecodeHash;
        bytes32 initCodeHash;
        bytes constructorArgs;
        string createStrategy;
    }

    /// The call a simulated transaction performs
    struct SimulatedCall {
        string label;
        address to;
        bytes data;
        uint256 value;
    }

    /// A transaction recorded during simulation, before broadcast
    struct SimulatedTransaction {
        bytes32 transactionId;
        string senderId;
        address sender;
        bytes returnData;
        SimulatedCall transaction;
    }

    event ContractDeployed(
        address indexed deployer,
        address indexed location,
        bytes32 indexed transactionId,
        DeploymentDetails deployment
    );

    event TransactionSimulated(SimulatedTransaction simulatedTx);

    event SafeTransactionQueued(
        bytes32 indexed safeTxHash,
        address indexed safe,
        address indexed proposer,
        bytes32[] transactionIds
    );

    event SafeTransactionExecuted(
        bytes32 indexed safeTxHash,
        address indexed safe,
        address indexed executor,
        bytes32[] transactionIds
    );

    event ProxyDeployed(address indexed proxy, address indexed implementation);

    event Upgraded(address indexed implementation);

    event AdminChanged(address previousAdmin, address newAdmin);

    event BeaconUpgraded(address indexed beacon);

    /// Cheat code attributing the next call to `msgSender`
    function prank(address msgSender);

    /// Safe entry point executing a confirmed transaction
    function execTransaction(
        address to,
        uint256 value,
        bytes data,
        uint8 operation,
        uint256 safeTxGas,
        uint256 baseGas,
        uint256 gasPrice,
        address gasToken,
        address refundReceiver,
        bytes signatures
    ) returns (bool success);
}
