use std::collections::HashMap;
use std::sync::Mutex;

use orderflow_core::{DomainError, DomainResult, NumberPrefixes};
use orderflow_fulfillment::{IssuedNumber, NumberKind, NumberSequence};

/// Per-kind counters formatted as `<prefix>-<sequence>`, e.g. `INV-00042`.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryNumberSequence {
    prefixes: NumberPrefixes,
    counters: Mutex<HashMap<NumberKind, u32>>,
}

impl InMemoryNumberSequence {
    pub fn new(prefixes: NumberPrefixes) -> Self {
        Self {
            prefixes,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Continue an existing series: the next number of `kind` is `last + 1`.
    pub fn with_last(self, kind: NumberKind, last: u32) -> Self {
        if let Ok(mut counters) = self.counters.lock() {
            counters.insert(kind, last);
        }
        self
    }
}

impl NumberSequence for InMemoryNumberSequence {
    fn next(&self, kind: NumberKind) -> DomainResult<IssuedNumber> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| DomainError::invariant("number sequence lock poisoned"))?;
        let counter = counters.entry(kind).or_insert(0);
        *counter = counter
            .checked_add(1)
            .ok_or_else(|| DomainError::invariant(format!("{kind:?} number series exhausted")))?;

        let sequence = *counter;
        Ok(IssuedNumber {
            sequence,
            number: format!("{}-{sequence:05}", kind.prefix(&self.prefixes)),
        })
    }
}
