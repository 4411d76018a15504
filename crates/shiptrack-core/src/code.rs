//! Public tracking codes — generation, validation, and normalisation.
//!
//! A tracking code is the customer-facing identifier for a shipment: the
//! fixed prefix `SC` followed by nine decimal digits. Codes are drawn from
//! the OS entropy source and rejected when the digit string is guessable
//! (sequential or repeating), so the public identifier space cannot be
//! enumerated by walking adjacent values.

use std::fmt;

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, store::ShipmentStore};

pub const PREFIX: &str = "SC";
pub const DIGIT_LEN: usize = 9;
pub const CODE_LEN: usize = PREFIX.len() + DIGIT_LEN;

/// Attempts before [`Error::CodeGenerationExhausted`]. Repeated exhaustion is
/// an operational alarm (code-space pressure or a broken entropy source),
/// not a transient blip.
pub const MAX_ATTEMPTS: u32 = 5;

// ─── TrackingCode ────────────────────────────────────────────────────────────

/// A validated public tracking code. Construction goes through
/// [`TrackingCode::parse`] or [`generate`]; the inner string is always in
/// canonical `SC#########` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingCode(String);

impl TrackingCode {
  /// Accept a string already in canonical form.
  pub fn parse(s: &str) -> Result<Self> {
    if validate_format(s) {
      Ok(Self(s.to_owned()))
    } else {
      Err(Error::InvalidCode(s.to_owned()))
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The nine-digit portion, without the prefix.
  pub fn digits(&self) -> &str { &self.0[PREFIX.len()..] }

  /// Public display form: `SC 123 456 789`.
  pub fn display_grouped(&self) -> String {
    let d = self.digits();
    format!("{PREFIX} {} {} {}", &d[0..3], &d[3..6], &d[6..9])
  }
}

impl fmt::Display for TrackingCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Format ──────────────────────────────────────────────────────────────────

/// Whether `s` is in canonical form: `SC` + exactly nine ASCII digits.
pub fn validate_format(s: &str) -> bool {
  s.len() == CODE_LEN
    && s.starts_with(PREFIX)
    && s[PREFIX.len()..].bytes().all(|b| b.is_ascii_digit())
}

/// Normalise user input: strip whitespace and hyphens, uppercase, then
/// validate.
///
/// Strings shaped like known carrier tracking numbers are rejected outright
/// so a carrier number pasted into the wrong field can never be mistaken for
/// an internal code.
pub fn normalize(input: &str) -> Result<TrackingCode> {
  let cleaned: String = input
    .chars()
    .filter(|c| !c.is_whitespace() && *c != '-')
    .map(|c| c.to_ascii_uppercase())
    .collect();

  if looks_like_carrier_number(&cleaned) {
    return Err(Error::InvalidCode(input.to_owned()));
  }

  TrackingCode::parse(&cleaned)
}

/// Shapes of common carrier tracking numbers (UPS `1Z...`, FedEx 12/15
/// digit, USPS 20–22 digit).
fn looks_like_carrier_number(s: &str) -> bool {
  if s.starts_with("1Z") {
    return true;
  }
  let all_digits = !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
  all_digits && matches!(s.len(), 12 | 15 | 20..=22)
}

// ─── Pattern rejection ───────────────────────────────────────────────────────

/// Whether the digit string is an ascending or descending run (mod 10), e.g.
/// `123456789` or `210987654`.
fn is_sequential(digits: &[u8]) -> bool {
  let ascending = digits
    .windows(2)
    .all(|w| (w[0] + 1) % 10 == w[1]);
  let descending = digits
    .windows(2)
    .all(|w| (w[1] + 1) % 10 == w[0]);
  ascending || descending
}

/// Whether a sub-pattern of length `p` (with `p` dividing the digit count)
/// repeats across the whole string; `p = 1` covers the constant case.
fn is_repeating(digits: &[u8]) -> bool {
  (1..=digits.len() / 2)
    .filter(|p| digits.len() % p == 0)
    .any(|p| digits.iter().enumerate().all(|(i, &d)| d == digits[i % p]))
}

/// A candidate digit string is acceptable when it is neither sequential nor
/// repetitive.
fn acceptable(digits: &[u8]) -> bool {
  !is_sequential(digits) && !is_repeating(digits)
}

// ─── Generation ──────────────────────────────────────────────────────────────

fn candidate(rng: &mut impl RngCore) -> ([u8; DIGIT_LEN], String) {
  let mut digits = [0u8; DIGIT_LEN];
  for d in &mut digits {
    *d = (rng.next_u32() % 10) as u8;
  }
  let mut s = String::with_capacity(CODE_LEN);
  s.push_str(PREFIX);
  for d in digits {
    s.push((b'0' + d) as char);
  }
  (digits, s)
}

/// Generate a new unique tracking code, drawing digits from `rng`.
///
/// Pattern-rejected candidates and uniqueness collisions both count toward
/// the attempt bound.
pub async fn generate_with<S: ShipmentStore>(
  store: &S,
  rng: &mut impl RngCore,
) -> Result<TrackingCode> {
  for attempt in 0..MAX_ATTEMPTS {
    let (digits, s) = candidate(rng);
    if !acceptable(&digits) {
      tracing::debug!(code = %s, attempt, "rejected guessable candidate");
      continue;
    }
    let code = TrackingCode(s);
    if store.tracking_code_exists(&code).await? {
      tracing::warn!(code = %code, attempt, "tracking code collision");
      continue;
    }
    return Ok(code);
  }
  Err(Error::CodeGenerationExhausted { attempts: MAX_ATTEMPTS })
}

/// Generate a new unique tracking code from the OS entropy source.
pub async fn generate<S: ShipmentStore>(store: &S) -> Result<TrackingCode> {
  generate_with(store, &mut OsRng).await
}

#[cfg(test)]
mod tests {
  use super::*;

  fn digits(s: &str) -> Vec<u8> {
    s.bytes().map(|b| b - b'0').collect()
  }

  #[test]
  fn format_validation() {
    assert!(validate_format("SC493817205"));
    assert!(!validate_format("SC49381720")); // too short
    assert!(!validate_format("SC4938172050")); // too long
    assert!(!validate_format("SX493817205")); // wrong prefix
    assert!(!validate_format("sc493817205")); // lowercase
    assert!(!validate_format("SC49381720a"));
  }

  #[test]
  fn sequential_runs_rejected() {
    assert!(is_sequential(&digits("123456789")));
    assert!(is_sequential(&digits("987654321")));
    // Wrapping runs are still runs.
    assert!(is_sequential(&digits("890123456")));
    assert!(is_sequential(&digits("109876543")));
    assert!(!is_sequential(&digits("493817205")));
  }

  #[test]
  fn repeating_patterns_rejected() {
    assert!(is_repeating(&digits("777777777")));
    assert!(is_repeating(&digits("123123123")));
    assert!(!is_repeating(&digits("123123124")));
    assert!(!is_repeating(&digits("493817205")));
  }

  #[test]
  fn acceptable_is_the_conjunction() {
    assert!(!acceptable(&digits("123456789")));
    assert!(!acceptable(&digits("555555555")));
    assert!(acceptable(&digits("493817205")));
  }

  #[test]
  fn normalize_strips_and_uppercases() {
    let code = normalize(" sc 493-817-205 ").unwrap();
    assert_eq!(code.as_str(), "SC493817205");
    assert_eq!(code.display_grouped(), "SC 493 817 205");
  }

  #[test]
  fn normalize_rejects_carrier_shapes() {
    // UPS
    assert!(normalize("1Z999AA10123456784").is_err());
    // FedEx 12-digit
    assert!(normalize("986578788855").is_err());
    // USPS 22-digit
    assert!(normalize("9400111899223197428490").is_err());
    // Garbage
    assert!(normalize("not-a-code").is_err());
  }

  #[test]
  fn candidate_is_always_well_formed() {
    let mut rng = OsRng;
    for _ in 0..64 {
      let (d, s) = candidate(&mut rng);
      assert!(validate_format(&s));
      assert_eq!(d.len(), DIGIT_LEN);
    }
  }
}
