// Typed attachment keys.

use std::fmt;
use std::marker::PhantomData;

/// AttachmentKey names a slot of a unit context and fixes the type stored in it.
pub struct AttachmentKey<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> AttachmentKey<T> {
    /// Creates a key. Keys are compared by name, so names must be unique per type.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttachmentKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttachmentKey<T> {}

impl<T> fmt::Debug for AttachmentKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttachmentKey({})", self.name)
    }
}
