//! Upload services: finalization plus the two ways bytes reach the chunk store.

pub mod finalizer;
pub mod gateway;
pub mod transfer;

pub use finalizer::UploadFinalizer;
pub use gateway::UploadGateway;
pub use transfer::TransferService;
