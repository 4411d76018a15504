//! Pure mapping from carrier events to internal statuses and ledger entry
//! types.
//!
//! Two tiers: an exact match on the structured event kind, then a substring
//! fallback over the free-text description for adapters that cannot
//! classify. Events that map to no status (pure location updates) never
//! trigger a transition.

use shiptrack_core::{event::EventType, status::ShipmentStatus};

use crate::adapter::{CarrierEvent, CarrierEventKind};

/// Tier 1: the status implied by a structured event kind.
pub fn status_for_kind(kind: CarrierEventKind) -> Option<ShipmentStatus> {
  use CarrierEventKind::*;
  match kind {
    Pickup | InTransit => Some(ShipmentStatus::InTransit),
    OutForDelivery => Some(ShipmentStatus::OutForDelivery),
    Delivered => Some(ShipmentStatus::Delivered),
    Exception => Some(ShipmentStatus::Exception),
    Cancelled => Some(ShipmentStatus::Cancelled),
    DeliveryAttempt | LocationUpdate => None,
  }
}

/// Tier 2: best-effort classification of a free-text description.
pub fn status_from_description(description: &str) -> Option<ShipmentStatus> {
  let text = description.to_lowercase();
  let has = |needle: &str| text.contains(needle);

  // Order matters: "out for delivery" must win over "delivered"-adjacent
  // phrasing, and attempted deliveries are not deliveries.
  if has("out for delivery") {
    Some(ShipmentStatus::OutForDelivery)
  } else if has("attempt") {
    None
  } else if has("delivered") || has("signed") {
    Some(ShipmentStatus::Delivered)
  } else if has("cancelled") || has("canceled") {
    Some(ShipmentStatus::Cancelled)
  } else if has("exception") || has("returned") || has("refused") || has("damaged")
  {
    Some(ShipmentStatus::Exception)
  } else if has("picked up")
    || has("in transit")
    || has("departed")
    || has("arrived")
    || has("accepted")
  {
    Some(ShipmentStatus::InTransit)
  } else {
    None
  }
}

/// The status a carrier event maps to, if any.
pub fn map_status(event: &CarrierEvent) -> Option<ShipmentStatus> {
  match event.kind {
    Some(kind) => status_for_kind(kind),
    None => status_from_description(&event.description),
  }
}

/// The ledger entry type used when ingesting a carrier event.
pub fn ledger_event_type(event: &CarrierEvent) -> EventType {
  match event.kind {
    Some(CarrierEventKind::Exception) => EventType::Exception,
    Some(CarrierEventKind::DeliveryAttempt) => EventType::DeliveryAttempt,
    Some(_) => EventType::LocationUpdate,
    None => {
      let desc = event.description.to_lowercase();
      if desc.contains("attempt") {
        EventType::DeliveryAttempt
      } else if status_from_description(&event.description)
        == Some(ShipmentStatus::Exception)
      {
        EventType::Exception
      } else {
        EventType::LocationUpdate
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn text_event(description: &str) -> CarrierEvent {
    CarrierEvent {
      kind:        None,
      description: description.to_owned(),
      location:    None,
      occurred_at: Utc::now(),
      raw:         serde_json::Value::Null,
    }
  }

  #[test]
  fn structured_kinds_map_exactly() {
    use CarrierEventKind::*;
    assert_eq!(status_for_kind(Pickup), Some(ShipmentStatus::InTransit));
    assert_eq!(status_for_kind(InTransit), Some(ShipmentStatus::InTransit));
    assert_eq!(
      status_for_kind(OutForDelivery),
      Some(ShipmentStatus::OutForDelivery)
    );
    assert_eq!(status_for_kind(Delivered), Some(ShipmentStatus::Delivered));
    assert_eq!(status_for_kind(Exception), Some(ShipmentStatus::Exception));
    assert_eq!(status_for_kind(Cancelled), Some(ShipmentStatus::Cancelled));
    assert_eq!(status_for_kind(DeliveryAttempt), None);
    assert_eq!(status_for_kind(LocationUpdate), None);
  }

  #[test]
  fn description_fallback_classifies_common_phrases() {
    assert_eq!(
      status_from_description("Delivered, signed for by J. DOE"),
      Some(ShipmentStatus::Delivered)
    );
    assert_eq!(
      status_from_description("Out for delivery"),
      Some(ShipmentStatus::OutForDelivery)
    );
    assert_eq!(
      status_from_description("Package arrived at sort facility"),
      Some(ShipmentStatus::InTransit)
    );
    assert_eq!(
      status_from_description("Returned to sender"),
      Some(ShipmentStatus::Exception)
    );
    assert_eq!(
      status_from_description("Shipment cancelled by requester"),
      Some(ShipmentStatus::Cancelled)
    );
  }

  #[test]
  fn attempted_delivery_is_not_a_delivery() {
    assert_eq!(status_from_description("Delivery attempted - no access"), None);
    assert_eq!(
      ledger_event_type(&text_event("Delivery attempted - no access")),
      EventType::DeliveryAttempt
    );
  }

  #[test]
  fn structured_kind_wins_over_description() {
    let event = CarrierEvent {
      kind: Some(CarrierEventKind::LocationUpdate),
      ..text_event("delivered") // free text would have said delivered
    };
    assert_eq!(map_status(&event), None);
  }

  #[test]
  fn unclassifiable_text_maps_to_no_status() {
    assert_eq!(status_from_description("Label created"), None);
    assert_eq!(
      ledger_event_type(&text_event("Label created")),
      EventType::LocationUpdate
    );
  }
}
