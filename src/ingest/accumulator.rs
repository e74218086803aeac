use crate::source::record::LogRecord;

/// Records handed to the consumer in one invocation, in fetch order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    records: Vec<LogRecord>,
}

impl Batch {
    pub fn new(records: Vec<LogRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<LogRecord> {
        self.records
    }

    /// Position of the last record, i.e. the checkpoint this batch commits
    pub fn last_position(&self) -> Option<&str> {
        self.records.last().map(|r| r.position.as_str())
    }
}

impl IntoIterator for Batch {
    type Item = LogRecord;
    type IntoIter = std::vec::IntoIter<LogRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Buffers fetched pages until a batch's worth is available.
///
/// Page size and batch size are independent: several pages may make up one
/// batch. Records are never reordered or deduplicated.
#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: usize,
    buffer: Vec<LogRecord>,
}

impl BatchAccumulator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            buffer: Vec::with_capacity(batch_size),
        }
    }

    pub fn append(&mut self, records: impl IntoIterator<Item = LogRecord>) {
        self.buffer.extend(records);
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.batch_size
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Take everything buffered, leaving the accumulator empty
    pub fn flush(&mut self) -> Batch {
        let records = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        Batch::new(records)
    }
}
