// Transport module
// Network clients the service binary plugs into the engine's collaborator
// interfaces
//
// Numan Thabit 2025 Nov

pub mod jsonrpc;

pub use jsonrpc::JsonRpcProbeExecutor;
