//! Model hub integration: metadata client, the file-transferring
//! [`executor::HubExecutor`], and the local [`inventory::ModelInventory`].

pub mod client;
pub mod error;
pub mod executor;
pub mod inventory;

pub use client::{HubClient, ModelRevisions, ModelValidation, RepoFile};
pub use error::HubError;
pub use executor::HubExecutor;
pub use inventory::{LocalModel, ModelInventory};
