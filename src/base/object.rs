//! Object lifecycle
//!
//! Every reader, writer and record object is Open until closed, and healthy
//! until its first failure. The first failure is kept; later ones are
//! dropped.

use tracing::debug;

use crate::error::{Result, RiffleError};

/// Open / failed / closed state of a stream object
#[derive(Debug, Clone, Default)]
pub struct ObjectState {
    closed: bool,
    failure: Option<RiffleError>,
}

impl ObjectState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an object that is already closed, like a default-constructed
    /// reader that was never given a source.
    pub fn closed() -> Self {
        Self {
            closed: true,
            failure: None,
        }
    }

    /// Open and not failed.
    #[inline]
    pub fn healthy(&self) -> bool {
        !self.closed && self.failure.is_none()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        !self.closed
    }

    #[inline]
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure(&self) -> Option<&RiffleError> {
        self.failure.as_ref()
    }

    /// `Ok` unless the object failed. A successfully closed object reports
    /// `Ok` as well.
    pub fn status(&self) -> Result<()> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Records a failure and returns false so callers can `return state.fail(..)`.
    pub fn fail(&mut self, err: RiffleError) -> bool {
        if self.failure.is_none() {
            debug!(error = %err, "Object failed");
            self.failure = Some(err);
        }
        false
    }

    /// Forgets the failure so a recovered object can continue.
    pub fn mark_not_failed(&mut self) -> Option<RiffleError> {
        self.failure.take()
    }

    /// Marks the object closed. Returns true if it had not failed.
    pub fn mark_closed(&mut self) -> bool {
        self.closed = true;
        self.failure.is_none()
    }
}
