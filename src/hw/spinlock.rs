//! Interrupt-safe spinlock guarding state shared with ISR context.
//!
//! On ESP-IDF this is a critical section backed by a portMUX spinlock:
//! interrupts are masked on the local core and the lock spins on the other,
//! so it is safe to take from both task and ISR context. Holders must keep
//! the critical section short; the firing engine only walks a small fixed
//! array under it.
//!
//! On the host it degrades to a `std::sync::Mutex`, which is all the test
//! harness needs: there is no real ISR, just test threads.

use core::ops::{Deref, DerefMut};

#[cfg(target_os = "espidf")]
mod imp {
    use super::*;
    use core::cell::UnsafeCell;
    use esp_idf_svc::hal::interrupt::{IsrCriticalSection, IsrCriticalSectionGuard};

    pub struct IsrSpinlock<T> {
        cs: IsrCriticalSection,
        value: UnsafeCell<T>,
    }

    // SAFETY: access to `value` only happens through `lock()`, which holds
    // the critical section for the lifetime of the guard.
    unsafe impl<T: Send> Sync for IsrSpinlock<T> {}
    unsafe impl<T: Send> Send for IsrSpinlock<T> {}

    impl<T> IsrSpinlock<T> {
        pub fn new(value: T) -> Self {
            Self {
                cs: IsrCriticalSection::new(),
                value: UnsafeCell::new(value),
            }
        }

        pub fn lock(&self) -> SpinGuard<'_, T> {
            let cs = self.cs.enter();
            // SAFETY: the critical section serializes all accessors.
            SpinGuard {
                _cs: cs,
                value: unsafe { &mut *self.value.get() },
            }
        }
    }

    pub struct SpinGuard<'a, T> {
        _cs: IsrCriticalSectionGuard<'a>,
        pub(super) value: &'a mut T,
    }
}

#[cfg(not(target_os = "espidf"))]
mod imp {
    use std::sync::Mutex;

    pub struct IsrSpinlock<T> {
        inner: Mutex<T>,
    }

    impl<T> IsrSpinlock<T> {
        pub fn new(value: T) -> Self {
            Self {
                inner: Mutex::new(value),
            }
        }

        pub fn lock(&self) -> SpinGuard<'_, T> {
            SpinGuard {
                guard: self.inner.lock().unwrap_or_else(|e| e.into_inner()),
            }
        }
    }

    pub struct SpinGuard<'a, T> {
        pub(super) guard: std::sync::MutexGuard<'a, T>,
    }
}

pub use imp::{IsrSpinlock, SpinGuard};

impl<T> Deref for SpinGuard<'_, T> {
    type Target = T;

    #[cfg(target_os = "espidf")]
    fn deref(&self) -> &T {
        self.value
    }

    #[cfg(not(target_os = "espidf"))]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    #[cfg(target_os = "espidf")]
    fn deref_mut(&mut self) -> &mut T {
        self.value
    }

    #[cfg(not(target_os = "espidf"))]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
