//! Result of a use case whose side effects may have partially failed.
//!
//! Persisting is the commit point of every use case. Anything after it
//! (broker publish, client push) is best effort: a failure there is recorded
//! on the `Outcome` as a `Degradation` instead of turning the call into an
//! error, because the state change has already happened.

use log::*;
use serde::Serialize;

/// Ordered by severity: a lost broker event hurts more than a missed push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationKind {
    NotificationFailed,
    PublishFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degradation {
    pub kind: DegradationKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    degradations: Vec<Degradation>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            degradations: Vec::new(),
        }
    }

    pub fn degrade(&mut self, kind: DegradationKind, detail: impl Into<String>) {
        self.degradations.push(Degradation {
            kind,
            detail: detail.into(),
        });
    }

    /// Records a failed broker publish, if `result` is one.
    pub fn note_publish(&mut self, what: &str, result: Result<(), broker::Error>) {
        if let Err(err) = result {
            warn!("Failed to publish {what}: {err}");
            self.degrade(DegradationKind::PublishFailed, format!("{what} was not published"));
        }
    }

    /// Records a failed client push, if `result` is one.
    pub fn note_push(&mut self, what: &str, result: Result<(), push::Error>) {
        if let Err(err) = result {
            warn!("Failed to push {what}: {err}");
            self.degrade(
                DegradationKind::NotificationFailed,
                format!("{what} was not delivered"),
            );
        }
    }

    pub fn degradations(&self) -> &[Degradation] {
        &self.degradations
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    /// The worst degradation recorded, if any.
    pub fn severity(&self) -> Option<DegradationKind> {
        self.degradations.iter().map(|d| d.kind).max()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            degradations: self.degradations,
        }
    }

    pub fn into_parts(self) -> (T, Vec<Degradation>) {
        (self.value, self.degradations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use push::PushErrorKind;

    #[test]
    fn a_clean_outcome_has_no_severity() {
        let outcome = Outcome::new(7);
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.severity(), None);
    }

    #[test]
    fn publish_failure_outranks_notification_failure() {
        let mut outcome = Outcome::new(());
        outcome.note_push(
            "ride update",
            Err(push::Error::new(PushErrorKind::ActorNotConnected)),
        );
        assert_eq!(outcome.severity(), Some(DegradationKind::NotificationFailed));

        outcome.note_publish(
            "ride status",
            Err(broker::Error::new(broker::BrokerErrorKind::Publish)),
        );
        assert_eq!(outcome.severity(), Some(DegradationKind::PublishFailed));
        assert_eq!(outcome.degradations().len(), 2);
    }

    #[test]
    fn successes_are_not_recorded() {
        let mut outcome = Outcome::new("ok");
        outcome.note_publish("ride status", Ok(()));
        outcome.note_push("ride update", Ok(()));
        assert!(!outcome.is_degraded());
    }

    #[test]
    fn map_keeps_degradations() {
        let mut outcome = Outcome::new(2);
        outcome.degrade(DegradationKind::PublishFailed, "lost");
        let mapped = outcome.map(|v| v * 10);
        assert_eq!(mapped.value, 20);
        assert_eq!(mapped.severity(), Some(DegradationKind::PublishFailed));
    }
}
