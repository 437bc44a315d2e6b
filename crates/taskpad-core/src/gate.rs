//! Generation gate for classification
//! results produced while a draft is
//! still being edited.

use tracing::debug;

use crate::classifier::ClassifierSuggestion;

/// Identifies the draft generation a
/// classification request was issued
/// for.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub struct SuggestionGate {
  generation: u64
}

impl SuggestionGate {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn begin(&self) -> Ticket {
    Ticket(self.generation)
  }

  /// Invalidates every outstanding
  /// ticket. Call when the draft is
  /// submitted, closed or cleared.
  pub fn reset(&mut self) {
    self.generation =
      self.generation.wrapping_add(1);
  }

  /// Returns the suggestion only if the
  /// draft it was computed for is still
  /// open.
  pub fn accept(
    &self,
    ticket: Ticket,
    suggestion: ClassifierSuggestion
  ) -> Option<ClassifierSuggestion> {
    if ticket.0 == self.generation {
      Some(suggestion)
    } else {
      debug!(
        ticket = ticket.0,
        generation = self.generation,
        "discarding stale suggestion"
      );
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::SuggestionGate;
  use crate::classifier::classify;

  #[test]
  fn current_ticket_is_accepted() {
    let gate = SuggestionGate::new();
    let ticket = gate.begin();
    let suggestion =
      classify("Buy milk", "");
    assert_eq!(
      gate.accept(
        ticket,
        suggestion.clone()
      ),
      Some(suggestion)
    );
  }

  #[test]
  fn result_after_reset_is_discarded() {
    let mut gate =
      SuggestionGate::new();
    let stale = gate.begin();
    gate.reset();
    let fresh = gate.begin();

    assert!(
      gate
        .accept(
          stale,
          classify("Buy milk", "")
        )
        .is_none()
    );
    assert!(
      gate
        .accept(
          fresh,
          classify("Buy milk", "")
        )
        .is_some()
    );
  }
}
