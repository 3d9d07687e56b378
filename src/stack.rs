//! Iterator Stack
//!
//! A LIFO stack of resumable iterators. Pulling from the stack always drains the
//! top-most frame first, so pushing a directory's children while iterating turns
//! a recursive walk into a flat depth-first sequence.

/// Stack of iterator frames, itself an iterator
pub struct IteratorStack<'a, T> {
    frames: Vec<Box<dyn Iterator<Item = T> + Send + 'a>>,
}

impl<'a, T> IteratorStack<'a, T> {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Push a new frame on top of the stack
    pub fn push<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'a,
    {
        self.frames.push(Box::new(items.into_iter()));
    }

    /// Discard the top-most frame, returning whether there was one
    pub fn pop(&mut self) -> bool {
        self.frames.pop().is_some()
    }

    /// Number of frames still on the stack (exhausted ones included until pulled)
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl<T> Default for IteratorStack<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Iterator for IteratorStack<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        while let Some(top) = self.frames.last_mut() {
            match top.next() {
                Some(item) => return Some(item),
                None => {
                    self.frames.pop();
                }
            }
        }
        None
    }
}
