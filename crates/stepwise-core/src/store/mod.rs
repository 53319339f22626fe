pub mod execution_store;

pub use execution_store::ExecutionStore;
