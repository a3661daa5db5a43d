use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// # [`Message`] Identifier
///
/// All the copies of a message that spread through the network share the
/// same identifier. Cloning is cheap (reference counted).
///
/// [`Message`]: crate::message::Message
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(Arc<str>);

/// a generator for monotonically increasing **unique** [`MessageId`]
///
/// Identifiers are made of a prefix followed by a counter: `M1`, `M2`...
/// Clones share the same counter.
///
/// ```
/// # use dtnsim_core::message::MessageIdGenerator;
/// let generator = MessageIdGenerator::new("M");
/// assert_eq!(generator.generate().as_str(), "M1");
/// assert_eq!(generator.clone().generate().as_str(), "M2");
/// ```
#[derive(Debug, Clone)]
pub struct MessageIdGenerator {
    prefix: Arc<str>,
    next: Arc<AtomicU64>,
}

impl MessageId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// identifier of the data message wrapping the data item `item`
    pub(crate) fn data(item: u64) -> Self {
        Self::new(format!("D{item}"))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl MessageIdGenerator {
    pub fn new(prefix: impl Into<Arc<str>>) -> Self {
        Self {
            prefix: prefix.into(),
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    /// generate a new unique identifier
    pub fn generate(&self) -> MessageId {
        let id = self.next.fetch_add(1, Ordering::SeqCst);

        debug_assert!(
            id != 0,
            "The generator wrapped around after `u64::MAX` identifiers"
        );

        MessageId::new(format!("{}{id}", self.prefix))
    }
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::new("M")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let generator = MessageIdGenerator::new("X");
        let a = generator.generate();
        let b = generator.generate();

        assert_ne!(a, b);
        assert_eq!(a.to_string(), "X1");
        assert_eq!(b.to_string(), "X2");
    }

    #[test]
    fn data_ids() {
        assert_eq!(MessageId::data(7), MessageId::from("D7"));
    }
}
