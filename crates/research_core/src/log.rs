use crate::Event;

/// Append-only, arrival-ordered store of the active job's events.
///
/// Reading is public; appending and clearing are reserved for [`crate::update`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, seq: usize) -> Option<&Event> {
        self.events.get(seq)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    /// Appends an event and returns its arrival sequence number.
    pub(crate) fn append(&mut self, event: Event) -> usize {
        self.events.push(event);
        self.events.len() - 1
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
    }
}
