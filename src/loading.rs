use std::sync::atomic::{AtomicUsize, Ordering};

/// Clears a store's loading flag when a fetch ends, however it ends.
///
/// A fetch future dropped mid-await (a caller's timeout, a losing `select!`
/// branch) still decrements the counter.
pub(crate) struct Loading<'a>(&'a AtomicUsize);

impl<'a> Loading<'a> {
    pub(crate) fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Loading(counter)
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
