//! The shipment status lifecycle and its transition table.
//!
//! The table below is the single authority on which status changes are legal.
//! It applies unconditionally — an administrator forcing a status and a
//! carrier-reported update go through the same check. The effectful
//! `transition` operation lives on [`crate::store::ShipmentStore`] because the
//! check must run against the *persisted* status inside the same transaction
//! that writes the ledger entry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The lifecycle status of a shipment.
///
/// Adding a variant forces a compile-time-visible update to
/// [`allowed_transitions`] — transitions are never dispatched on strings.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ShipmentStatus {
  Pending,
  InTransit,
  OutForDelivery,
  Delivered,
  Exception,
  Cancelled,
}

impl ShipmentStatus {
  /// All variants, in declaration order. Used by tests and candidate
  /// selection queries.
  pub const ALL: [ShipmentStatus; 6] = [
    Self::Pending,
    Self::InTransit,
    Self::OutForDelivery,
    Self::Delivered,
    Self::Exception,
    Self::Cancelled,
  ];

  /// Statuses for which carrier sync is still meaningful.
  pub const ACTIVE: [ShipmentStatus; 3] =
    [Self::Pending, Self::InTransit, Self::OutForDelivery];

  /// The kebab-case wire/database form; matches the serde representation.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::InTransit => "in-transit",
      Self::OutForDelivery => "out-for-delivery",
      Self::Delivered => "delivered",
      Self::Exception => "exception",
      Self::Cancelled => "cancelled",
    }
  }

  /// A terminal status has no outgoing legal transitions.
  pub fn is_terminal(self) -> bool {
    allowed_transitions(self).is_empty()
  }

  pub fn is_active(self) -> bool { Self::ACTIVE.contains(&self) }
}

impl fmt::Display for ShipmentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Transition table ────────────────────────────────────────────────────────

/// The fixed adjacency table: which targets are reachable from `from`.
pub fn allowed_transitions(from: ShipmentStatus) -> &'static [ShipmentStatus] {
  use ShipmentStatus::*;
  match from {
    Pending => &[InTransit, Cancelled],
    InTransit => &[OutForDelivery, Delivered, Exception, Cancelled],
    OutForDelivery => &[Delivered, Exception, InTransit],
    Exception => &[InTransit, OutForDelivery, Cancelled],
    Delivered => &[],
    Cancelled => &[],
  }
}

/// Whether `from -> to` appears in the adjacency table.
pub fn can_transition(from: ShipmentStatus, to: ShipmentStatus) -> bool {
  allowed_transitions(from).contains(&to)
}

#[cfg(test)]
mod tests {
  use super::*;
  use ShipmentStatus::*;

  #[test]
  fn terminal_statuses_have_no_exits() {
    assert!(Delivered.is_terminal());
    assert!(Cancelled.is_terminal());
    for to in ShipmentStatus::ALL {
      assert!(!can_transition(Delivered, to));
      assert!(!can_transition(Cancelled, to));
    }
  }

  #[test]
  fn adjacency_table_matches_lifecycle() {
    assert_eq!(allowed_transitions(Pending), &[InTransit, Cancelled]);
    assert_eq!(
      allowed_transitions(InTransit),
      &[OutForDelivery, Delivered, Exception, Cancelled]
    );
    assert_eq!(
      allowed_transitions(OutForDelivery),
      &[Delivered, Exception, InTransit]
    );
    assert_eq!(
      allowed_transitions(Exception),
      &[InTransit, OutForDelivery, Cancelled]
    );
  }

  #[test]
  fn no_self_transitions() {
    for s in ShipmentStatus::ALL {
      assert!(!can_transition(s, s), "{s} must not transition to itself");
    }
  }

  #[test]
  fn every_pair_is_classified() {
    // The full 6x6 grid; exactly the pairs in the table are legal.
    let legal: usize = ShipmentStatus::ALL
      .iter()
      .map(|&from| {
        ShipmentStatus::ALL
          .iter()
          .filter(|&&to| can_transition(from, to))
          .count()
      })
      .sum();
    assert_eq!(legal, 2 + 4 + 3 + 3);
  }

  #[test]
  fn active_statuses_are_non_terminal() {
    for s in ShipmentStatus::ACTIVE {
      assert!(!s.is_terminal());
      assert!(s.is_active());
    }
    assert!(!Delivered.is_active());
  }

  #[test]
  fn serde_round_trips_kebab_case() {
    let json = serde_json::to_string(&OutForDelivery).unwrap();
    assert_eq!(json, "\"out-for-delivery\"");
    let back: ShipmentStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(back, OutForDelivery);
  }
}
