//! Change notifications raised by tree mutations.

use crate::model::ValueScope;

/// What happened to the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    ValueChanged,
}

/// A single change, delivered synchronously to every listener.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// idShort of the element, or `[i]` for unnamed List children.
    pub id_short: String,
    /// Path of the element at the time of the change.
    pub path: String,
    /// The new value scope, for `ValueChanged` only.
    pub value: Option<ValueScope>,
}

impl ChangeEvent {
    pub(crate) fn structural(kind: ChangeKind, id_short: String, path: String) -> Self {
        Self {
            kind,
            id_short,
            path,
            value: None,
        }
    }
}

/// Receives change events.
pub trait ChangeListener {
    fn on_change(&mut self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: FnMut(&ChangeEvent),
{
    fn on_change(&mut self, event: &ChangeEvent) {
        self(event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);
