//! Global kernel cell.
//!
//! The kernel state is one object behind a spin lock. Syscall paths take
//! the lock with [`KernelCell::with`]; the timer path uses
//! [`KernelCell::try_with`] and skips the tick when the lock is held, so an
//! interrupt can never deadlock against the code it interrupted.

use spin::Mutex;

/// Lock-protected, lazily initialized global.
pub struct KernelCell<T> {
    inner: Mutex<Option<T>>,
}

impl<T> KernelCell<T> {
    /// Create an empty cell.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Install the value, replacing any previous one.
    pub fn init(&self, value: T) {
        *self.inner.lock() = Some(value);
    }

    /// Whether [`init`](Self::init) has run.
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Run `f` with exclusive access. Returns `None` before initialization.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.inner.lock();
        guard.as_mut().map(f)
    }

    /// Like [`with`](Self::with), but gives up instead of spinning when the
    /// lock is already held.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        // Lock is held elsewhere: the caller skips this round.
        let mut guard = self.inner.try_lock()?;
        guard.as_mut().map(f)
    }
}

impl<T> Default for KernelCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
