//! Segment trie for parameterized routes.
//!
//! One tree exists per HTTP method. Each node stands for one `/`-delimited
//! segment; children are kept in insertion order.
//!
//! Matching is single-pass with no backtracking. At every level a child whose
//! literal text equals the request segment wins; failing that, the *first
//! registered* capturing child binds the segment. Consequences:
//!
//! - `/user/id` beats `/user/:id` for the request `/user/id`.
//! - Two capturing siblings such as `/a/:x/one` and `/a/:y/two` share nothing:
//!   only the first one (`:x`) is ever tried, so `/a/1/two` does not match.
//! - Once a branch is chosen a deeper miss is final, even if a sibling branch
//!   would have matched.

use super::path::{capture_name, decode, segments};
use crate::context::Params;

/// A trie node: one path segment plus an optional terminal value.
///
/// `value` is `Some` if and only if at least one registered route ends here.
#[derive(Debug)]
pub struct Node<T> {
    segment: String,
    capture: bool,
    children: Vec<Node<T>>,
    value: Option<T>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self::root()
    }
}

impl<T> Node<T> {
    /// Creates an empty root node.
    pub fn root() -> Self {
        Self::with_segment(String::new())
    }

    fn with_segment(segment: String) -> Self {
        let capture = capture_name(&segment).is_some();
        Self {
            segment,
            capture,
            children: Vec::new(),
            value: None,
        }
    }

    /// Stores `value` at `path`, creating intermediate nodes as needed.
    ///
    /// Children are matched by exact text, so `:id` and `:name` at the same
    /// level become two distinct siblings. Inserting an identical path again
    /// overwrites the previous value and returns it.
    pub fn insert(&mut self, path: &str, value: T) -> Option<T> {
        let mut current = self;
        for segment in segments(path) {
            let idx = match current.children.iter().position(|c| c.segment == segment) {
                Some(idx) => idx,
                None => {
                    current.children.push(Node::with_segment(segment.to_owned()));
                    current.children.len() - 1
                }
            };
            current = &mut current.children[idx];
        }
        current.value.replace(value)
    }

    /// Finds the value registered for the concrete request `path`.
    ///
    /// Each request segment is percent-decoded after splitting, then matched.
    /// Capture segments encountered on the way are bound into `params` in
    /// left-to-right order. A fully walked path whose final node carries no
    /// value is a miss.
    pub fn search(&self, path: &str, params: &mut Params) -> Option<&T> {
        let mut current = self;
        for raw in segments(path) {
            let segment = decode(raw);
            current = match current
                .children
                .iter()
                .find(|c| c.segment.as_str() == segment.as_ref())
            {
                Some(exact) => exact,
                None => {
                    let wild = current.children.iter().find(|c| c.capture)?;
                    params.insert(wild.param_name(), segment);
                    wild
                }
            };
        }
        current.value.as_ref()
    }

    // Name bound for a capturing node; the leading `:` or `*` is dropped.
    fn param_name(&self) -> &str {
        capture_name(&self.segment).unwrap_or(&self.segment)
    }

    /// Collects every stored value, depth first, children in insertion order.
    pub fn values(&self) -> Vec<&T> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.extend(node.value.as_ref());
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Returns `true` if no route has been inserted below this node.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }
}
