//! The cursor that drives a request's handler list.

use std::sync::Arc;

use super::Handler;

/// Observable state of a [`Chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// `next` has not been called yet.
    NotStarted,
    /// The handler at this index is the latest one invoked.
    Running(usize),
    /// `abort` was called; no further handler will run.
    Aborted,
    /// The cursor ran past the last handler, or dispatch finished.
    Completed,
}

/// An ordered handler list plus a cursor.
///
/// The chain never iterates on its own: [`advance`](Self::advance) hands out
/// at most one handler per call and the caller invokes it. Once the cursor
/// reaches the end of the list, by exhaustion or by [`abort`](Self::abort),
/// every further `advance` returns `None`.
#[derive(Clone)]
pub struct Chain {
    handlers: Arc<[Handler]>,
    // `None` until the first advance; never exceeds `handlers.len()`.
    cursor: Option<usize>,
    aborted: bool,
}

impl Chain {
    /// Creates a chain positioned before its first handler.
    pub fn new(handlers: Arc<[Handler]>) -> Self {
        Self {
            handlers,
            cursor: None,
            aborted: false,
        }
    }

    /// Moves the cursor forward by one and returns the handler now under it.
    ///
    /// Returns `None`, leaving the cursor at the end, once the list is
    /// exhausted or the chain was aborted.
    pub fn advance(&mut self) -> Option<Handler> {
        let len = self.handlers.len();
        let next = match self.cursor {
            None => 0,
            Some(i) if i >= len => return None,
            Some(i) => i + 1,
        };
        self.cursor = Some(next.min(len));
        self.handlers.get(next).cloned()
    }

    /// Moves the cursor to the end so that every later `advance` is a no-op.
    pub fn abort(&mut self) {
        self.cursor = Some(self.handlers.len());
        self.aborted = true;
    }

    /// Marks the chain as done once dispatch returns.
    ///
    /// Handlers that returned without calling `next` end the chain here.
    pub(crate) fn finish(&mut self) {
        self.cursor = Some(self.handlers.len());
    }

    /// Returns `true` if [`abort`](Self::abort) was called.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Returns the current state.
    pub fn state(&self) -> ChainState {
        match self.cursor {
            _ if self.aborted => ChainState::Aborted,
            None => ChainState::NotStarted,
            Some(i) if i >= self.handlers.len() => ChainState::Completed,
            Some(i) => ChainState::Running(i),
        }
    }

    /// Returns the number of handlers in the chain.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if the chain holds no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(Arc::from(Vec::<Handler>::new()))
    }
}
