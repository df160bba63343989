//! Generational handles over pool slots.
//!
//! Mirrors the `{id, tag}` handle pair used throughout the system this pool
//! design is drawn from: a handle is a plain, `Copy`, two-word value that
//! stays valid to *compare* even after the slot it names has been freed and
//! reused — it just stops being valid to *dereference*. `id == 0` is the
//! permanently-invalid sentinel, matching the 1-indexed id space of the
//! backing id pool (see [`crate::pool`]).

use std::marker::PhantomData;

/// Sentinel id meaning "no slot" / "invalid handle".
pub const INVALID_ID: u32 = 0;

/// A generational handle into a [`crate::pool::Pool<T>`].
///
/// Two handles compare equal iff they name the same slot generation; a
/// handle surviving past its slot's deallocation-and-reuse will compare
/// unequal to the new handle occupying that slot, because `tag` was bumped
/// on deallocation.
pub struct Handle<T> {
    pub id: u32,
    pub tag: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub const INVALID: Handle<T> = Handle {
        id: INVALID_ID,
        tag: 0,
        _marker: PhantomData,
    };

    pub fn new(id: u32, tag: u32) -> Self {
        Handle {
            id,
            tag,
            _marker: PhantomData,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.id == INVALID_ID
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.tag == other.tag
    }
}
impl<T> Eq for Handle<T> {}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .finish()
    }
}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.tag.hash(state);
    }
}
