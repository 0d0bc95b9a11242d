// rackflow/src/core/context_data.rs
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared pipeline context with interior mutability.
///
/// Every handler and compensator gets a clone pointing at the same data, so a
/// value written by one step (say, the id of a freshly inserted row) is visible
/// to every later step and to the compensation that undoes it.
///
/// IMPORTANT: guards are blocking and MUST NOT be held across `.await`.
#[derive(Debug)]
pub struct ContextData<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> ContextData<T> {
  pub fn new(data: T) -> Self {
    ContextData(Arc::new(RwLock::new(data)))
  }

  /// The returned guard MUST be dropped before any `.await` point.
  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  /// The returned guard MUST be dropped before any `.await` point.
  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  /// Reads a value out of the context without exposing the guard.
  pub fn get<U>(&self, f: impl FnOnce(&T) -> U) -> U {
    f(&self.0.read())
  }

  /// Applies a mutation without exposing the guard.
  pub fn update<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
    f(&mut self.0.write())
  }

  /// Takes the data back out once the pipeline is finished with it.
  ///
  /// Returns `Err(self)` while other clones are still alive.
  pub fn try_into_inner(self) -> Result<T, Self> {
    Arc::try_unwrap(self.0).map(RwLock::into_inner).map_err(ContextData)
  }
}

impl<T: Send + Sync + 'static> Clone for ContextData<T> {
  fn clone(&self) -> Self {
    ContextData(Arc::clone(&self.0))
  }
}

impl<T: Send + Sync + 'static + Default> Default for ContextData<T> {
  fn default() -> Self {
    Self::new(Default::default())
  }
}
