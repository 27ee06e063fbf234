// Crosscut
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Control-flow marker stacks.
//!
//! "In cflow of X" holds while a still-active activation of a join point
//! matching X sits on the current thread's stack. Markers are pushed and
//! popped by [`CflowScope`], a drop guard, so the pop happens on every
//! exit path, unwinding included.

use std::cell::RefCell;

use crosscut_core::expression::{CflowId, CflowResolver};

thread_local! {
    static MARKER_STACK: RefCell<Vec<CflowId>> = const { RefCell::new(Vec::new()) };
}

/// Scoped marker push: pushes on construction, pops on drop.
#[must_use = "dropping the scope immediately would pop the markers at once"]
pub struct CflowScope {
    pushed: usize,
}

impl CflowScope {
    pub fn enter(marks: &[CflowId]) -> Self {
        MARKER_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.extend(marks.iter().cloned());
        });
        Self { pushed: marks.len() }
    }
}

impl Drop for CflowScope {
    fn drop(&mut self) {
        MARKER_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let keep = stack.len().saturating_sub(self.pushed);
            stack.truncate(keep);
        });
    }
}

/// Resolver reading the current thread's marker stack.
pub struct ThreadCflow;

impl CflowResolver for ThreadCflow {
    fn in_cflow(&self, id: &CflowId) -> bool {
        MARKER_STACK.with(|stack| stack.borrow().iter().any(|mark| mark == id))
    }
}

/// Current marker depth on this thread.
pub fn marker_depth() -> usize {
    MARKER_STACK.with(|stack| stack.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_pushes_and_pops() {
        let id = CflowId::new("execution(* a.B.m(..))");
        assert!(!ThreadCflow.in_cflow(&id));
        {
            let _scope = CflowScope::enter(std::slice::from_ref(&id));
            assert!(ThreadCflow.in_cflow(&id));
            assert_eq!(marker_depth(), 1);
        }
        assert!(!ThreadCflow.in_cflow(&id));
        assert_eq!(marker_depth(), 0);
    }

    #[test]
    fn test_scope_pops_on_unwind() {
        let id = CflowId::new("execution(* a.B.m(..))");
        let result = std::panic::catch_unwind(|| {
            let _scope = CflowScope::enter(std::slice::from_ref(&id));
            panic!("advice body failed");
        });
        assert!(result.is_err());
        assert!(!ThreadCflow.in_cflow(&id));
    }

    #[test]
    fn test_markers_are_thread_local() {
        let id = CflowId::new("execution(* a.B.m(..))");
        let _scope = CflowScope::enter(std::slice::from_ref(&id));
        let seen_elsewhere = std::thread::spawn({
            let id = id.clone();
            move || ThreadCflow.in_cflow(&id)
        })
        .join()
        .unwrap();
        assert!(!seen_elsewhere);
        assert!(ThreadCflow.in_cflow(&id));
    }
}
