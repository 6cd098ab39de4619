/// Receives progress reports while a problem is being solved.
///
/// Observers are notified every `status_interval` solutions (see
/// [`Config::status_interval`]), possibly from a worker thread when the
/// search is forked. They cannot influence the search.
///
/// Any `Fn(usize) + Send + Sync` closure is an observer.
///
/// [`Config::status_interval`]: `crate::Config::status_interval`
pub trait Observer: Send + Sync {
    /// Called with the running number of solutions found so far.
    fn solutions_found(&self, count: usize);
}

impl<F> Observer for F
where
    F: Fn(usize) + Send + Sync,
{
    fn solutions_found(&self, count: usize) {
        self(count)
    }
}

/// The default observer, which writes a line to the [`log`] facade.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn solutions_found(&self, count: usize) {
        log::info!("found {count} solutions so far");
    }
}
