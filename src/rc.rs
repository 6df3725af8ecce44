use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

/// Shared, lock-protected value handed between the threads of one
/// subscription.
///
/// Poisoned locks are recovered, not propagated.
#[derive(Default)]
pub struct MutArc<T>(Arc<Mutex<T>>);

impl<T> MutArc<T> {
  pub fn own(t: T) -> Self { Self(Arc::new(Mutex::new(t))) }

  #[inline]
  pub fn rc_deref_mut(&self) -> MutexGuard<'_, T> { lock(&self.0) }

  /// Locks only when nobody else holds the value, including the current
  /// thread further up its own stack.
  pub fn try_rc_deref_mut(&self) -> Option<MutexGuard<'_, T>> {
    match self.0.try_lock() {
      Ok(guard) => Some(guard),
      Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
      Err(TryLockError::WouldBlock) => None,
    }
  }
}

impl<T> Clone for MutArc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
