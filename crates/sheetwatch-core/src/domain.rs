use std::borrow::Cow;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id of a notification recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One record of the worksheet: ordered cell strings.
pub type Row = Vec<String>;

/// Header row of the worksheet. Index `i` names column `i`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderSet(Vec<String>);

impl HeaderSet {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    /// Column label for cell `index`; positional when the header row is shorter.
    pub fn label(&self, index: usize) -> Cow<'_, str> {
        match self.0.get(index) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(format!("Column {}", index + 1)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
