//! Record buffers handed to outputs.

/// One record: an id and its string fields.
///
/// The meaning of the fields (tags, member roles, ...) belongs to the caller;
/// encoders only see strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub fields: Vec<String>,
}

impl Record {
    pub fn new<I, S>(id: i64, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// A batch of records submitted to a writer in one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    records: Vec<Record>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Approximate payload size: ids plus field bytes.
    pub fn committed_bytes(&self) -> usize {
        self.records
            .iter()
            .map(|r| 8 + r.fields.iter().map(String::len).sum::<usize>())
            .sum()
    }
}

impl From<Vec<Record>> for Buffer {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl FromIterator<Record> for Buffer {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Buffer {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Buffer {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
