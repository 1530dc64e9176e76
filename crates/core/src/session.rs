//! MCP session lifecycle.
//!
//! [`SessionManager`] owns the single server-issued session identifier for
//! a client instance. Establishment is guarded by an async mutex with a
//! second check inside the critical section, so N concurrent callers with
//! no session produce exactly one establishment round trip; the other N-1
//! block on the lock and then observe the cached id.
//!
//! Mid-flight expiry recovery goes through [`SessionManager::recover`],
//! which runs under the same lock. A flood of simultaneous expiry
//! detections therefore still triggers a single re-establishment: the
//! first caller through the lock replaces the session, and the rest see
//! that the id they observed is already stale and reuse the fresh one.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::Result;

/// Owns the cached session identifier and serializes establishment.
pub struct SessionManager {
	/// Cached session id. `None` until established or after invalidation.
	cached: Mutex<Option<Arc<str>>>,
	/// Held across the establishment round trip. The same exclusion
	/// domain covers both check-and-establish and invalidate-and-replace,
	/// so an invalidation cannot race an in-progress establishment.
	establish_lock: AsyncMutex<()>,
}

impl Default for SessionManager {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionManager {
	pub fn new() -> Self {
		Self {
			cached: Mutex::new(None),
			establish_lock: AsyncMutex::new(()),
		}
	}

	/// Cheap read of the cached session id. The invoker calls this at
	/// send time for every attempt so a refreshed session is picked up.
	pub fn current(&self) -> Option<Arc<str>> {
		self.cached.lock().clone()
	}

	/// Clears the cached session wholesale. The next [`ensure`] performs
	/// a fresh round trip.
	///
	/// [`ensure`]: Self::ensure
	pub fn invalidate(&self) {
		*self.cached.lock() = None;
	}

	/// Returns the current session, establishing one first if needed.
	///
	/// `establish` runs at most once per missing session, no matter how
	/// many callers arrive concurrently. If it fails nothing is cached
	/// and the error propagates; a later call may try again.
	pub async fn ensure<F, Fut>(&self, establish: F) -> Result<Arc<str>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Arc<str>>>,
	{
		if let Some(sid) = self.current() {
			return Ok(sid);
		}

		let _guard = self.establish_lock.lock().await;

		// Another caller may have established while we waited for the lock.
		if let Some(sid) = self.current() {
			return Ok(sid);
		}

		let sid = establish().await?;
		*self.cached.lock() = Some(sid.clone());
		Ok(sid)
	}

	/// Replaces an expired session, observed as `stale`, with a fresh one.
	///
	/// Runs under the establishment lock. If the cached id no longer
	/// matches `stale`, another caller already recovered (or invalidated);
	/// the replacement round trip is skipped and the fresh id returned.
	pub async fn recover<F, Fut>(&self, stale: &str, establish: F) -> Result<Arc<str>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Arc<str>>>,
	{
		let _guard = self.establish_lock.lock().await;

		if let Some(current) = self.current() {
			if current.as_ref() != stale {
				tracing::debug!("session already replaced by concurrent recovery");
				return Ok(current);
			}
		}

		self.invalidate();
		let sid = establish().await?;
		*self.cached.lock() = Some(sid.clone());
		Ok(sid)
	}
}
