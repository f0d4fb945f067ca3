// Licensed under the Apache-2.0 license

//! Spinlock-style mutex.
//!
//! The only concurrency on this BSP is a UART receive interrupt feeding a
//! command buffer consumed by the main loop, so the lock is a single
//! try-acquire flag: interrupt context gives up immediately instead of
//! spinning against the context it preempted.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

pub struct Spinlock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

// The guard hands out &mut T only while the flag is held.
unsafe impl<T: Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Attempt to take the lock without spinning.
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinlockGuard { lock: self })
        } else {
            None
        }
    }

    /// Whether the lock is currently held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

pub struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
}

impl<T> Deref for SpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive() {
        let lock = Spinlock::new(0u32);
        let guard = lock.try_lock().unwrap();
        assert!(lock.try_lock().is_none());
        assert!(lock.is_locked());
        drop(guard);
        assert!(!lock.is_locked());
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn guard_gives_mutable_access() {
        let lock = Spinlock::new(Vec::new());
        {
            let mut guard = lock.try_lock().unwrap();
            guard.push(1u8);
            guard.push(2);
        }
        let guard = lock.try_lock().unwrap();
        assert_eq!(guard.as_slice(), &[1, 2]);
    }

    #[test]
    fn static_lock_works_from_multiple_call_sites() {
        static LOCK: Spinlock<u32> = Spinlock::new(7);
        {
            let mut g = LOCK.try_lock().unwrap();
            *g += 1;
        }
        assert_eq!(*LOCK.try_lock().unwrap(), 8);
    }
}
