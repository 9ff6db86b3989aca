use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A provider-specific message kept in the conversation verbatim.
///
/// The neutral types of this crate cannot carry everything a provider may
/// need to see again on the next request (e.g. signatures attached to a
/// function call part). A provider wraps its own representation of the
/// model turn in an `OpaqueMessage`, and gets it back unchanged when the
/// conversation is replayed.
///
/// Two opaque messages are equal when their ids are equal; the id should be
/// unique across the conversation.
#[derive(Clone)]
pub struct OpaqueMessage(Arc<Inner>);

struct Inner {
    id: String,
    value: Box<dyn Any + Send + Sync>,
}

impl OpaqueMessage {
    /// Wraps `value` under the given id.
    #[inline]
    pub fn new<ID: Into<String>, T: Send + Sync + 'static>(
        id: ID,
        value: T,
    ) -> Self {
        Self(Arc::new(Inner {
            id: id.into(),
            value: Box::new(value),
        }))
    }

    /// Returns the id of this message.
    #[inline]
    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// Returns the wrapped value if it is of type `T`.
    #[inline]
    pub fn to_raw<T: 'static>(&self) -> Option<&T> {
        self.0.value.downcast_ref()
    }
}

impl Debug for OpaqueMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueMessage").field(&self.0.id).finish()
    }
}

impl PartialEq for OpaqueMessage {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for OpaqueMessage {}

impl Hash for OpaqueMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct ProviderTurn {
        parts: Vec<String>,
    }

    #[test]
    fn test_downcast() {
        let opaque = OpaqueMessage::new(
            "resp-1",
            ProviderTurn {
                parts: vec!["call writeFile".to_owned()],
            },
        );
        assert_eq!(opaque.id(), "resp-1");
        assert_eq!(
            opaque.to_raw::<ProviderTurn>().unwrap().parts,
            ["call writeFile"]
        );
        assert!(opaque.to_raw::<String>().is_none());
    }

    #[test]
    fn test_identity_by_id() {
        let first = OpaqueMessage::new("resp-1", 1_u32);
        let same_id = OpaqueMessage::new("resp-1", 2_u32);
        let other = OpaqueMessage::new("resp-2", 1_u32);

        assert_eq!(first, first.clone());
        assert_eq!(first, same_id);
        assert_ne!(first, other);

        let set: HashSet<_> = [first, same_id, other].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
