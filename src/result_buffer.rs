//! The visitor's output accumulator: a growable string plus the `dropped`
//! flag a `$when`-false iteration (or an object all of whose iterations
//! were dropped) uses to tell its parent to omit it entirely.

#[derive(Debug, Default, Clone)]
pub struct ResultBuffer {
    text: String,
    dropped: bool,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            dropped: false,
        }
    }

    /// An empty, dropped result — the parent must omit this subtree and
    /// the delimiter that would have followed it.
    pub fn dropped() -> Self {
        Self {
            text: String::new(),
            dropped: true,
        }
    }

    pub fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    pub fn set_dropped(&mut self, dropped: bool) {
        self.dropped = dropped;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
