//! Scoped session ownership
//!
//! A session is never closed by hand at each return point. Instead:
//! 1. The opened session is moved into a [`SessionGuard`]
//! 2. All remote work borrows the session through the guard
//! 3. The guard closes the session when it goes out of scope

use crate::context::RemoteSession;
use std::ops::{Deref, DerefMut};

/// Owns an open session and closes it exactly once on drop.
pub struct SessionGuard<S: RemoteSession> {
    session: Option<S>,
}

impl<S: RemoteSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Close the session now instead of at end of scope.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }
}

impl<S: RemoteSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        // Only `release` empties the slot, and it runs on consume or drop.
        self.session.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<S: RemoteSession> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<S: RemoteSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}
