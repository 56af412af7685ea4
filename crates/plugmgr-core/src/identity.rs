//! Identity descriptors and handler tokens.
//!
//! An [`Identity`] is the self-description a plugin hands to the host. It
//! lives inside the library that produced it; the manager never owns one and
//! only reaches it through the library's [`LibraryId`](crate::LibraryId).
//!
//! A [`Handler`] is a move-only token for one capability instance. It has no
//! `Drop` glue: the only way to release it is to give it back to
//! [`Identity::destroy_handler`] on the identity that spawned it, which is
//! what lets a plugin keep allocation and release inside its own library.

use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr};
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::config::ApiVersion;

/// A plugin's versioned self-description.
pub trait Identity<T: ?Sized> {
    /// Declared API major version.
    fn major_version(&self) -> i32;

    /// Declared API minor version.
    fn minor_version(&self) -> i32;

    /// Declared operation names, in declaration order.
    fn operations(&self) -> Operations<'_>;

    /// Build a new handler. `None` is an ordinary spawn failure.
    fn spawn_handler(&self) -> Option<Handler<T>>;

    /// Release a handler previously returned by this identity's
    /// [`spawn_handler`](Identity::spawn_handler).
    fn destroy_handler(&self, handler: Handler<T>);

    fn version(&self) -> ApiVersion {
        ApiVersion::new(self.major_version(), self.minor_version())
    }
}

/// Owned pointer to one capability instance.
///
/// Dropping a `Handler` without destroying it leaks the instance.
#[must_use = "a handler must be returned to its identity to be released"]
pub struct Handler<T: ?Sized> {
    ptr: NonNull<Box<T>>,
}

impl<T: ?Sized> Handler<T> {
    /// Wrap a host-allocated instance. Release it with [`Handler::into_box`].
    pub fn new(instance: Box<T>) -> Self {
        Self {
            ptr: NonNull::from(Box::leak(Box::new(instance))),
        }
    }

    /// Adopt a pointer produced by a plugin's spawn function.
    ///
    /// Returns `None` for null.
    ///
    /// # Safety
    /// `raw` must be null or point to a live `Box<T>` laid out as described in
    /// [`plugmgr_sdk::abi`], with the same `T`.
    pub unsafe fn from_raw(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw.cast::<Box<T>>()).map(|ptr| Self { ptr })
    }

    /// Give up ownership, returning the pointer in ABI form.
    pub fn into_raw(self) -> *mut c_void {
        self.ptr.as_ptr().cast()
    }

    /// Reclaim the instance on the host side.
    ///
    /// # Safety
    /// The handler must have been allocated by the same allocator this code
    /// runs under, as with [`Handler::new`].
    pub unsafe fn into_box(self) -> Box<T> {
        // SAFETY: guaranteed by the caller; `ptr` came from `Box::leak`/`Box::into_raw`.
        unsafe { *Box::from_raw(self.ptr.as_ptr()) }
    }
}

impl<T: ?Sized> Deref for Handler<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the pointer is live until the handler is consumed.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized> DerefMut for Handler<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, and `&mut self` gives exclusive access.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: ?Sized> Debug for Handler<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("ptr", &self.ptr).finish()
    }
}

/// Iterator over an identity's operation names.
///
/// Native tables are walked until their null sentinel; no length is read.
pub struct Operations<'a> {
    inner: OperationsInner<'a>,
}

enum OperationsInner<'a> {
    Slice(std::slice::Iter<'a, &'a str>),
    Raw {
        cursor: *const *const c_char,
        _table: PhantomData<&'a CStr>,
    },
}

impl<'a> Operations<'a> {
    pub fn from_slice(names: &'a [&'a str]) -> Self {
        Self {
            inner: OperationsInner::Slice(names.iter()),
        }
    }

    /// Walk a null-terminated table of NUL-terminated strings.
    ///
    /// A null `table` yields nothing.
    ///
    /// # Safety
    /// `table` and every string it points to must stay valid for `'a`.
    pub unsafe fn from_raw(table: *const *const c_char) -> Self {
        Self {
            inner: OperationsInner::Raw {
                cursor: table,
                _table: PhantomData,
            },
        }
    }
}

impl<'a> Iterator for Operations<'a> {
    type Item = Cow<'a, str>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            OperationsInner::Slice(names) => names.next().map(|name| Cow::Borrowed(*name)),
            OperationsInner::Raw { cursor, .. } => {
                if cursor.is_null() {
                    return None;
                }
                // SAFETY: `from_raw` contract; we stop at the sentinel and never
                // advance past it.
                unsafe {
                    let entry = **cursor;
                    if entry.is_null() {
                        return None;
                    }
                    *cursor = cursor.add(1);
                    Some(CStr::from_ptr(entry).to_string_lossy())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    trait Shape {
        fn sides(&self) -> u32;
    }

    struct Square;

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    #[test]
    fn test_handler_deref_and_reclaim() {
        let mut handler: Handler<dyn Shape> = Handler::new(Box::new(Square));
        assert_eq!(handler.sides(), 4);
        let _ = &mut *handler;

        let shape = unsafe { handler.into_box() };
        assert_eq!(shape.sides(), 4);
    }

    #[test]
    fn test_handler_from_null_is_none() {
        assert!(unsafe { Handler::<dyn Shape>::from_raw(ptr::null_mut()) }.is_none());
    }

    #[test]
    fn test_handler_raw_round_trip() {
        let raw = Handler::<dyn Shape>::new(Box::new(Square)).into_raw();
        let handler = unsafe { Handler::<dyn Shape>::from_raw(raw) }.unwrap();
        assert_eq!(handler.sides(), 4);
        drop(unsafe { handler.into_box() });
    }

    #[test]
    fn test_slice_operations() {
        let names = ["encode", "decode"];
        let ops: Vec<_> = Operations::from_slice(&names).collect();
        assert_eq!(ops, vec!["encode", "decode"]);
    }

    #[test]
    fn test_raw_operations_stop_at_sentinel() {
        let table: [*const c_char; 4] = [
            c"alpha".as_ptr(),
            c"beta".as_ptr(),
            ptr::null(),
            c"never".as_ptr(),
        ];
        let ops: Vec<_> = unsafe { Operations::from_raw(table.as_ptr()) }.collect();
        assert_eq!(ops, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_null_table_is_empty() {
        assert_eq!(unsafe { Operations::from_raw(ptr::null()) }.count(), 0);
    }
}
