//! Finite batch loaders and their endless cycling wrapper.

use std::fmt;
use std::sync::Arc;

/// Finite, ordered, cheaply clonable sequence of batches
#[derive(Debug)]
pub struct DataLoader<B> {
    batches: Arc<[Arc<B>]>,
}

impl<B> Clone for DataLoader<B> {
    fn clone(&self) -> Self {
        Self {
            batches: Arc::clone(&self.batches),
        }
    }
}

impl<B> DataLoader<B> {
    pub fn new(batches: Vec<B>) -> Self {
        Self {
            batches: batches.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Arc<B>> {
        self.batches.get(index).cloned()
    }

    pub fn iter(&self) -> DataLoaderIter<B> {
        self.clone().into_iter()
    }
}

impl<B> IntoIterator for DataLoader<B> {
    type Item = Arc<B>;
    type IntoIter = DataLoaderIter<B>;

    fn into_iter(self) -> Self::IntoIter {
        DataLoaderIter {
            loader: self,
            position: 0,
        }
    }
}

/// One pass over a `DataLoader`
#[derive(Debug)]
pub struct DataLoaderIter<B> {
    loader: DataLoader<B>,
    position: usize,
}

impl<B> Iterator for DataLoaderIter<B> {
    type Item = Arc<B>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.loader.get(self.position)?;
        self.position += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.loader.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl<B> ExactSizeIterator for DataLoaderIter<B> {}

/// Endless iteration over a finite source.
///
/// When the current pass is exhausted a fresh pass is started from the
/// source. No reordering happens here. Each instance owns its own cursor, so
/// parallel streams advanced in lockstep stay independent. An empty source
/// yields nothing.
pub struct InfiniteLoader<S>
where
    S: IntoIterator + Clone,
{
    source: S,
    iter: S::IntoIter,
    epoch: usize,
    batches_per_epoch: usize,
}

impl<S> InfiniteLoader<S>
where
    S: IntoIterator + Clone,
{
    pub fn new(source: S) -> Self {
        let batches_per_epoch = source.clone().into_iter().count();
        let iter = source.clone().into_iter();
        Self {
            source,
            iter,
            epoch: 0,
            batches_per_epoch,
        }
    }

    /// Completed passes over the source
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.batches_per_epoch
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S> fmt::Debug for InfiniteLoader<S>
where
    S: IntoIterator + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfiniteLoader")
            .field("epoch", &self.epoch)
            .field("batches_per_epoch", &self.batches_per_epoch)
            .finish()
    }
}

impl<S> Iterator for InfiniteLoader<S>
where
    S: IntoIterator + Clone,
{
    type Item = S::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.iter.next() {
            return Some(item);
        }
        self.iter = self.source.clone().into_iter();
        self.epoch += 1;
        self.iter.next()
    }
}
