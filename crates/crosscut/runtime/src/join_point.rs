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

//! The runtime join point: one activation of an advised location.
//!
//! Allocated fresh per activation; the compiled chain it walks is shared.
//! `proceed()` advances the cursor through the around chain into the
//! original operation. The cursor is restored when a frame returns, so an
//! around advice may call `proceed()` again to re-invoke the remaining
//! chain (retry), or not at all to short-circuit it.

use std::sync::Arc;

use crosscut_core::pattern::TypePattern;
use crosscut_core::signature::{Rtti, Signature, Value};

use crate::aspect::{AdviceFn, AspectInstance};
use crate::errors::{DispatchError, DispatchFault};

/// The operation the join point wraps, supplied by the woven call site.
pub type OriginalFn = Arc<dyn Fn(&mut Rtti) -> Result<Value, DispatchFault> + Send + Sync>;

/// One advice with its aspect instance resolved for this activation.
#[derive(Clone)]
pub struct ResolvedAdvice {
    pub aspect_qualified_name: String,
    pub advice_name: String,
    pub func: AdviceFn,
    pub instance: Arc<AspectInstance>,
    pub exception_filter: Option<TypePattern>,
}

impl ResolvedAdvice {
    pub fn invoke(&self, join_point: &mut JoinPoint) -> Result<Value, DispatchFault> {
        (self.func)(&self.instance, join_point)
    }
}

/// One activation of an advised location.
pub struct JoinPoint {
    signature: Arc<Signature>,
    pub rtti: Rtti,
    arounds: Vec<ResolvedAdvice>,
    original: OriginalFn,
    cursor: usize,
    active: bool,
}

impl JoinPoint {
    pub(crate) fn new(signature: Arc<Signature>, rtti: Rtti, arounds: Vec<ResolvedAdvice>, original: OriginalFn) -> Self {
        Self {
            signature,
            rtti,
            arounds,
            original,
            cursor: 0,
            active: false,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Opens the dynamic extent: `proceed()` is legal from here until
    /// [`JoinPoint::finish`].
    pub(crate) fn begin(&mut self) {
        self.active = true;
        self.cursor = 0;
    }

    pub(crate) fn finish(&mut self) {
        self.active = false;
    }

    /// Invoke the next advice in the around chain, or the original
    /// operation once the chain is exhausted. Outside the activation's
    /// dynamic extent this is an invalid dispatch state.
    pub fn proceed(&mut self) -> Result<Value, DispatchFault> {
        if !self.active {
            return Err(DispatchError::IllegalState.into());
        }
        let frame = self.cursor;
        let result = if let Some(advice) = self.arounds.get(frame).cloned() {
            self.cursor = frame + 1;
            advice.invoke(self)
        } else {
            let original = self.original.clone();
            original(&mut self.rtti)
        };
        // Restore so a repeated proceed() from the same frame re-invokes
        // the same tail of the chain.
        self.cursor = frame;
        result
    }
}
