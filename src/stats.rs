use std::cell::Cell;

/// Allocation statistics of the current thread, for diagnosing leaks and
/// double frees.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats
{
    /// Control blocks created by `Handle` constructors.
    pub allocated: usize,

    /// Control blocks whose count reached zero and whose object was dropped.
    pub freed: usize,

    /// Casts that produced a populated handle.
    pub casts: usize,

    /// Casts that produced an empty handle from a populated one.
    pub failed_casts: usize,
}

impl Stats
{
    /// Objects currently owned by at least one handle.
    pub fn live(&self) -> usize { self.allocated.saturating_sub(self.freed) }

    /// Difference between two snapshots, `self` being the later one. Counts
    /// that went backwards, from swapped arguments, come out as zero.
    pub fn since(&self, earlier: &Stats) -> Stats
    {
        Stats {
            allocated: self.allocated.saturating_sub(earlier.allocated),
            freed: self.freed.saturating_sub(earlier.freed),
            casts: self.casts.saturating_sub(earlier.casts),
            failed_casts: self.failed_casts.saturating_sub(earlier.failed_casts),
        }
    }
}

thread_local! {
    static STATS : Cell<Stats> = Cell::new(Stats::default());
}

fn update(f: impl FnOnce(&mut Stats))
{
    STATS.with(|c| {
        let mut s = c.get();
        f(&mut s);
        c.set(s);
    })
}

pub(crate) fn allocated() { update(|s| s.allocated += 1) }
pub(crate) fn freed() { update(|s| s.freed += 1) }
pub(crate) fn cast(success: bool)
{
    update(|s| {
        if success {
            s.casts += 1
        } else {
            s.failed_casts += 1
        }
    })
}

/// Snapshot of this thread's statistics.
pub fn stats() -> Stats { STATS.with(Cell::get) }
