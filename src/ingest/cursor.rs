/// Checkpoint state for one run.
///
/// `last_fetched` moves as soon as a page is read, whether or not the
/// consumer later accepts it, so a batch the consumer keeps rejecting is not
/// fetched forever. `last_committed` only moves on successful delivery.
#[derive(Debug, Clone, Default)]
pub struct CheckpointCursor {
    initial: Option<String>,
    last_fetched: Option<String>,
    last_committed: Option<String>,
}

impl CheckpointCursor {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            initial,
            last_fetched: None,
            last_committed: None,
        }
    }

    /// Cursor for the next fetch
    pub fn fetch_from(&self) -> Option<&str> {
        self.last_fetched.as_deref().or(self.initial.as_deref())
    }

    pub fn record_fetched(&mut self, position: impl Into<String>) {
        self.last_fetched = Some(position.into());
    }

    pub fn commit(&mut self, position: impl Into<String>) {
        self.last_committed = Some(position.into());
    }

    pub fn initial(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    pub fn last_fetched(&self) -> Option<&str> {
        self.last_fetched.as_deref()
    }

    pub fn last_committed(&self) -> Option<&str> {
        self.last_committed.as_deref()
    }
}
