//! Indexable sequences and the factory entry points
//!
//! Any container with O(1) length and O(1) indexed access over `0..len`
//! can be traversed by a [`QuantizedIterator`]. The [`Quantize`] extension
//! trait adds the two constructors to every such container.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::error::LoopError;
use crate::pacing::Pacing;
use crate::quantum::QuantizedIterator;

/// Random-access sequence with contiguous zero-based indices
///
/// The sequence is read-only while it is being traversed.
pub trait IndexedSequence: Send + Sync + 'static {
    type Item;

    /// Number of elements
    fn len(&self) -> usize;

    /// Element at `index`; callers guarantee `index < len()`
    fn at(&self, index: usize) -> &Self::Item;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + Sync + 'static> IndexedSequence for Vec<T> {
    type Item = T;

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn at(&self, index: usize) -> &T {
        &self[index]
    }
}

impl<T: Send + Sync + 'static, const N: usize> IndexedSequence for [T; N] {
    type Item = T;

    fn len(&self) -> usize {
        N
    }

    fn at(&self, index: usize) -> &T {
        &self[index]
    }
}

impl<T: Send + Sync + 'static> IndexedSequence for Box<[T]> {
    type Item = T;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn at(&self, index: usize) -> &T {
        &self[index]
    }
}

impl<T: Send + Sync + 'static> IndexedSequence for Arc<[T]> {
    type Item = T;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn at(&self, index: usize) -> &T {
        &self[index]
    }
}

impl<T: Send + Sync + 'static> IndexedSequence for VecDeque<T> {
    type Item = T;

    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn at(&self, index: usize) -> &T {
        &self[index]
    }
}

/// Factory methods that turn a sequence into a [`QuantizedIterator`]
pub trait Quantize: IndexedSequence + Sized {
    /// Process at most `step` elements per quantum
    ///
    /// Fails with [`LoopError::ZeroStep`] when `step` is zero.
    fn quantize_by_count<F>(self, step: usize, routine: F) -> Result<QuantizedIterator<Self>, LoopError>
    where
        F: FnMut(&Self::Item) + Send + 'static,
    {
        let pacing = Pacing::fixed_count(step)?;
        Ok(QuantizedIterator::new(self, pacing, routine))
    }

    /// Process elements until a quantum has used up `budget`
    fn quantize_by_time<F>(self, budget: Duration, routine: F) -> QuantizedIterator<Self>
    where
        F: FnMut(&Self::Item) + Send + 'static,
    {
        QuantizedIterator::new(self, Pacing::time_budget(budget), routine)
    }
}

impl<S: IndexedSequence> Quantize for S {}
