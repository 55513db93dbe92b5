//! A wrapper around the std::sync::atomic.
//!
//! # Atomic types
//!
//! Atomic types provide primitive shared-memory communication between
//! threads, and are the building blocks of other concurrent types.
//!
//! This module wraps the atomic types of [`std::sync::atomic`] such that every
//! operation is [`SeqCst`](std::sync::atomic::Ordering::SeqCst).
//!
//! Atomic variables are safe to share between threads (they implement [`Sync`])
//! but they do not themselves provide the mechanism for sharing. The most
//! common way to share an atomic variable is to put it into an
//! [`Arc`](std::sync::Arc).

use std::sync::atomic::Ordering;

/// A boolean type which can be safely shared between threads.
#[derive(Default)]
pub struct AtomicBool(std::sync::atomic::AtomicBool);

impl AtomicBool {
    /// Creates a new `AtomicBool`.
    #[inline]
    #[must_use]
    pub const fn new(v: bool) -> AtomicBool {
        Self(std::sync::atomic::AtomicBool::new(v))
    }

    /// Loads the value.
    #[inline]
    pub fn load(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Stores `val`.
    #[inline]
    pub fn store(&self, val: bool) {
        self.0.store(val, Ordering::SeqCst)
    }

    /// Stores `val`, returning the previous value.
    #[inline]
    pub fn swap(&self, val: bool) -> bool {
        self.0.swap(val, Ordering::SeqCst)
    }

    /// Stores `new` if the value is `current`.
    #[inline]
    pub fn compare_exchange(&self, current: bool, new: bool) -> Result<bool, bool> {
        self.0
            .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
    }
}

impl std::fmt::Debug for AtomicBool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.load(), f)
    }
}

macro_rules! atomic_int {
    ($int_type:ident $atomic_type:ident) => {
        /// An integer type which can be safely shared between threads.
        ///
        /// This type has the same size and bit validity as the underlying
        /// integer type, [`
        #[doc = stringify!($int_type)]
        /// `].
        #[repr(transparent)]
        #[derive(Default)]
        pub struct $atomic_type(std::sync::atomic::$atomic_type);

        impl From<$int_type> for $atomic_type {
            #[doc = concat!("Converts an `", stringify!($int_type), "` into an `", stringify!($atomic_type), "`.")]
            #[inline]
            fn from(v: $int_type) -> Self {
                Self::new(v)
            }
        }

        impl std::fmt::Debug for $atomic_type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Debug::fmt(&self.load(), f)
            }
        }

        impl $atomic_type {
            /// Creates a new atomic integer.
            #[inline]
            #[must_use]
            pub const fn new(v: $int_type) -> Self {
                Self(std::sync::atomic::$atomic_type::new(v))
            }

            /// Consumes the atomic and returns the contained value.
            #[inline]
            pub fn into_inner(self) -> $int_type {
                self.0.into_inner()
            }

            /// Loads the value.
            #[inline]
            pub fn load(&self) -> $int_type {
                self.0.load(Ordering::SeqCst)
            }

            /// Stores `val`.
            #[inline]
            pub fn store(&self, val: $int_type) {
                self.0.store(val, Ordering::SeqCst)
            }

            /// Stores `val`, returning the previous value.
            #[inline]
            pub fn swap(&self, val: $int_type) -> $int_type {
                self.0.swap(val, Ordering::SeqCst)
            }

            /// Stores `new` if the value is `current`.
            ///
            /// Returns the previous value, wrapped in `Ok` on success.
            #[inline]
            pub fn compare_exchange(
                &self,
                current: $int_type,
                new: $int_type,
            ) -> Result<$int_type, $int_type> {
                self.0
                    .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
            }

            /// Adds to the value, returning the previous value.
            ///
            /// This operation wraps around on overflow.
            #[inline]
            pub fn fetch_add(&self, val: $int_type) -> $int_type {
                self.0.fetch_add(val, Ordering::SeqCst)
            }

            /// Subtracts from the value, returning the previous value.
            ///
            /// This operation wraps around on overflow.
            #[inline]
            pub fn fetch_sub(&self, val: $int_type) -> $int_type {
                self.0.fetch_sub(val, Ordering::SeqCst)
            }

            /// Stores the maximum of the value and `val`, returning the
            /// previous value.
            #[inline]
            pub fn fetch_max(&self, val: $int_type) -> $int_type {
                self.0.fetch_max(val, Ordering::SeqCst)
            }

            /// Applies `f` to the value until it succeeds or `f` returns
            /// `None`.
            #[inline]
            pub fn fetch_update<F>(&self, f: F) -> Result<$int_type, $int_type>
            where
                F: FnMut($int_type) -> Option<$int_type>,
            {
                self.0.fetch_update(Ordering::SeqCst, Ordering::SeqCst, f)
            }
        }
    };
}

atomic_int! { u32 AtomicU32 }
atomic_int! { i64 AtomicI64 }
atomic_int! { u64 AtomicU64 }
atomic_int! { isize AtomicIsize }
atomic_int! { usize AtomicUsize }
