//! Failure classification.
//!
//! Decides whether an operation error counts against the breaker.
//! Every error counts unless it matches an ignore rule.
//!
//! # Matching
//! Rules are checked against the error and every error in its `source()`
//! chain. Registering a type therefore also ignores any wrapper error whose
//! cause is that type.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

type Predicate = dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync;

#[derive(Clone)]
enum IgnoreRule {
    Type {
        name: &'static str,
        matches: fn(&(dyn StdError + 'static)) -> bool,
    },
    Predicate(Arc<Predicate>),
}

impl IgnoreRule {
    fn matches(&self, error: &(dyn StdError + 'static)) -> bool {
        match self {
            IgnoreRule::Type { matches, .. } => matches(error),
            IgnoreRule::Predicate(predicate) => predicate(error),
        }
    }
}

fn is_type<E: StdError + 'static>(error: &(dyn StdError + 'static)) -> bool {
    error.is::<E>()
}

/// Predicate over errors with an ignore allow-list.
#[derive(Clone, Default)]
pub struct FailureClassifier {
    ignored: Vec<IgnoreRule>,
}

impl FailureClassifier {
    /// Classifier that counts every error as a failure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore errors of type `E`, and errors caused by one.
    pub fn ignore<E: StdError + 'static>(mut self) -> Self {
        let name = std::any::type_name::<E>();
        let already = self
            .ignored
            .iter()
            .any(|rule| matches!(rule, IgnoreRule::Type { name: n, .. } if *n == name));
        if !already {
            self.ignored.push(IgnoreRule::Type {
                name,
                matches: is_type::<E>,
            });
        }
        self
    }

    /// Ignore any error in the chain for which `predicate` returns true.
    pub fn ignore_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.ignored.push(IgnoreRule::Predicate(Arc::new(predicate)));
        self
    }

    /// Returns true if `error` counts as a failure.
    pub fn classify(&self, error: &(dyn StdError + 'static)) -> bool {
        if self.ignored.is_empty() {
            return true;
        }

        let mut current = Some(error);
        while let Some(err) = current {
            if self.ignored.iter().any(|rule| rule.matches(err)) {
                return false;
            }
            current = err.source();
        }
        true
    }

    /// Type names registered through [`FailureClassifier::ignore`].
    pub fn ignored_types(&self) -> Vec<&'static str> {
        self.ignored
            .iter()
            .filter_map(|rule| match rule {
                IgnoreRule::Type { name, .. } => Some(*name),
                IgnoreRule::Predicate(_) => None,
            })
            .collect()
    }
}

impl fmt::Debug for FailureClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let predicates = self
            .ignored
            .iter()
            .filter(|rule| matches!(rule, IgnoreRule::Predicate(_)))
            .count();
        f.debug_struct("FailureClassifier")
            .field("ignored_types", &self.ignored_types())
            .field("predicates", &predicates)
            .finish()
    }
}
