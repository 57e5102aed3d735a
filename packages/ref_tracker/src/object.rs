//! The host object model that the tracker observes.

use std::fmt;

/// Opaque, address-sized identity of one tracked object.
///
/// Two identities are equal only if they denote the same object (or the same address reused
/// by a later object). The value of the object is never consulted.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Creates an identity from the object's address.
    #[must_use]
    pub const fn new(address: usize) -> Self {
        Self(address)
    }

    /// Creates an identity from a pointer to the object.
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr.addr())
    }

    /// The address this identity was created from.
    #[must_use]
    pub const fn address(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Callback invoked once when a watched object is finalized.
pub type FinalizationCallback = Box<dyn FnOnce(ObjectId) + Send + 'static>;

/// The reference-counted object model whose lifecycle operations are intercepted.
///
/// An implementation of this trait is supplied by the interception provider. The three
/// lifecycle methods are the *real* (non-intercepted) implementations: calling them must not
/// route back into the tracker. The remaining methods let the tracker inspect objects.
///
/// The lifecycle methods and [`watch_finalization()`][Self::watch_finalization] are never
/// called while the tracker holds its global exclusion. [`ref_count()`][Self::ref_count] is
/// called under the exclusion, so it must not wait for a lock that the model holds while
/// invoking finalization callbacks.
///
/// Finalization callbacks may be invoked from inside [`decrement()`][Self::decrement] on the
/// same thread or later from any other thread, and may be invoked while holding the model's
/// own locks.
pub trait ObjectModel: Send + Sync + 'static {
    /// Parameters needed to construct a new object.
    type CreateArgs;

    /// Constructs a new object and returns its identity.
    fn create(&self, args: Self::CreateArgs) -> ObjectId;

    /// Adds a reference to the object, returning the object as the real implementation does.
    fn increment(&self, object: ObjectId) -> ObjectId;

    /// Removes a reference from the object, finalizing it if this was the last reference.
    fn decrement(&self, object: ObjectId);

    /// The current reference count of the object, or zero if it is no longer live.
    fn ref_count(&self, object: ObjectId) -> u32;

    /// The name of the object's type.
    fn type_name(&self, object: ObjectId) -> String;

    /// Arranges for `callback` to be called exactly once, with the object's identity,
    /// when the object is finalized.
    fn watch_finalization(&self, object: ObjectId, callback: FinalizationCallback);
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::ptr;

    use super::*;

    #[test]
    fn identity_compares_by_address() {
        let value = 42_u64;
        let a = ObjectId::from_ptr(ptr::from_ref(&value));
        let b = ObjectId::new(a.address());

        assert_eq!(a, b);
        assert_ne!(a, ObjectId::new(a.address().wrapping_add(8)));
    }

    #[test]
    fn displays_as_hex_address() {
        assert_eq!(ObjectId::new(0x1000).to_string(), "0x1000");
    }
}
