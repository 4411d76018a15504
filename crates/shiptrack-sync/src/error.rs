//! Error types for `shiptrack-sync`.

use thiserror::Error;
use uuid::Uuid;

use crate::adapter::AdapterError;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] shiptrack_core::Error),

  /// No carrier adapter configured. Fails immediately, never retried.
  #[error("no carrier adapter configured")]
  AdapterUnavailable,

  /// The adapter kept failing through the whole retry budget.
  #[error("carrier adapter failed after {attempts} attempts: {source}")]
  Adapter {
    attempts: u32,
    #[source]
    source:   AdapterError,
  },

  /// The shipment has neither a tracking session nor a carrier binding to
  /// create one from.
  #[error("shipment {0} has no carrier binding to sync")]
  MissingCarrierBinding(Uuid),

  #[error("sync task panicked: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl Error {
  /// Fatal errors abort a whole batch: when the ledger or the store itself
  /// is failing, the audit guarantee is gone and carrying on would hide it.
  /// Per-shipment conditions are not fatal — siblings keep going.
  pub fn is_fatal(&self) -> bool {
    matches!(
      self,
      Self::Core(shiptrack_core::Error::Storage(_))
        | Self::Core(shiptrack_core::Error::Serialization(_))
        | Self::Join(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
