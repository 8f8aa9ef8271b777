//! Per-(producer, system) transform folio reassembly.
//!
//! A folio is a set of 1..=lastPage datagrams sharing a folio number. Full
//! folios replace every point a producer reports for a system; delta
//! folios are unioned into the running table with last-writer-wins by
//! `(address, priority)` key. Folios are held in a small rolling window
//! (keyed by folio number, oldest first) until either one completes or the
//! window overflows.

use crate::point::Point;
use std::collections::VecDeque;

/// One folio's pages as they arrive, in flight until every page 0..=lastPage
/// has been seen exactly once.
struct InFlightFolio {
    folio_number: u32,
    full_point_set: bool,
    pages: Vec<Option<Vec<Point>>>,
    received: usize,
}

impl InFlightFolio {
    fn new(folio_number: u32, full_point_set: bool, last_page: u16) -> Self {
        Self {
            folio_number,
            full_point_set,
            pages: vec![None; last_page as usize + 1],
            received: 0,
        }
    }

    /// Returns `false` if `page` was already recorded (an exact duplicate).
    fn accept_page(&mut self, page: u16, points: Vec<Point>) -> bool {
        let Some(slot) = self.pages.get_mut(page as usize) else {
            return false;
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(points);
        self.received += 1;
        true
    }

    fn is_complete(&self) -> bool {
        self.received == self.pages.len()
    }

    fn into_points(self) -> Vec<Point> {
        self.pages.into_iter().flatten().flatten().collect()
    }
}

/// Outcome of offering one datagram's worth of points to a [`FolioWindow`].
#[derive(Debug)]
pub enum FolioEvent {
    /// The page was buffered; no folio became ready as a result.
    Buffered,
    /// The exact `(folio, page)` pair had already been seen; dropped.
    DuplicatePage,
    /// A new folio number was rejected by the sequence window.
    SequenceRejected,
    /// A folio completed and is ready to apply.
    Promoted { full_point_set: bool, points: Vec<Point> },
    /// The window overflowed before any folio completed; the oldest
    /// in-flight folio is flushed with whatever pages it received.
    PartialFlushed { points: Vec<Point> },
}

/// The rolling reassembly window for one (producer, system) pair.
pub struct FolioWindow {
    window: u32,
    folios: VecDeque<InFlightFolio>,
}

impl FolioWindow {
    pub fn new(window: u32) -> Self {
        Self {
            window,
            folios: VecDeque::new(),
        }
    }

    /// Offer one page. `tracker` supplies the sequence-window check for
    /// folio numbers not already in flight; callers own one tracker per
    /// (producer, system) and must not share it across systems.
    pub fn ingest(
        &mut self,
        tracker: &mut super::window::SequenceTracker,
        folio_number: u32,
        page: u16,
        last_page: u16,
        full_point_set: bool,
        points: Vec<Point>,
    ) -> FolioEvent {
        if let Some(existing) = self
            .folios
            .iter_mut()
            .find(|f| f.folio_number == folio_number)
        {
            if !existing.accept_page(page, points) {
                return FolioEvent::DuplicatePage;
            }
        } else {
            if !tracker.accept_new_folio(folio_number, self.window) {
                return FolioEvent::SequenceRejected;
            }
            let mut folio = InFlightFolio::new(folio_number, full_point_set, last_page);
            folio.accept_page(page, points);
            self.folios.push_back(folio);
        }

        if let Some(pos) = self.folios.iter().rposition(InFlightFolio::is_complete) {
            let promoted = self.folios.remove(pos).expect("position just found");
            for _ in 0..pos {
                self.folios.pop_front();
            }
            return FolioEvent::Promoted {
                full_point_set: promoted.full_point_set,
                points: promoted.into_points(),
            };
        }

        if self.folios.len() as u32 > self.window {
            // Only a non-full-set (delta) folio is eligible for the partial,
            // best-effort flush (spec.md §4.3 item 3: "the oldest *non-full-set*
            // folio is flushed ... and removed with its predecessors"). A
            // full-set folio ahead of it is left in place rather than discarded.
            if let Some(idx) = self.folios.iter().position(|f| !f.full_point_set) {
                for _ in 0..idx {
                    self.folios.pop_front();
                }
                let flushed = self.folios.pop_front().expect("position just found");
                return FolioEvent::PartialFlushed {
                    points: flushed.into_points(),
                };
            }
        }

        FolioEvent::Buffered
    }

    pub fn in_flight_count(&self) -> usize {
        self.folios.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Priority};
    use crate::folio::window::SequenceTracker;

    fn point(n: u32) -> Point {
        Point::synthetic(Address::new(1, 1, n).unwrap(), Priority::default(), "p")
    }

    #[test]
    fn single_page_folio_promotes_immediately() {
        let mut w = FolioWindow::new(5);
        let mut t = SequenceTracker::new();
        let ev = w.ingest(&mut t, 1, 0, 0, true, vec![point(1)]);
        assert!(matches!(ev, FolioEvent::Promoted { full_point_set: true, .. }));
    }

    #[test]
    fn multi_page_folio_waits_for_all_pages() {
        let mut w = FolioWindow::new(5);
        let mut t = SequenceTracker::new();
        let ev = w.ingest(&mut t, 1, 0, 1, false, vec![point(1)]);
        assert!(matches!(ev, FolioEvent::Buffered));
        let ev = w.ingest(&mut t, 1, 1, 1, false, vec![point(2)]);
        match ev {
            FolioEvent::Promoted { full_point_set, points } => {
                assert!(!full_point_set);
                assert_eq!(points.len(), 2);
            }
            other => panic!("expected Promoted, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_page_is_dropped() {
        let mut w = FolioWindow::new(5);
        let mut t = SequenceTracker::new();
        w.ingest(&mut t, 1, 0, 1, false, vec![point(1)]);
        let ev = w.ingest(&mut t, 1, 0, 1, false, vec![point(1)]);
        assert!(matches!(ev, FolioEvent::DuplicatePage));
    }

    #[test]
    fn out_of_window_folio_number_is_rejected() {
        let mut w = FolioWindow::new(0);
        let mut t = SequenceTracker::new();
        w.ingest(&mut t, 100, 0, 0, true, vec![point(1)]);
        let ev = w.ingest(&mut t, 50, 0, 0, true, vec![point(2)]);
        assert!(matches!(ev, FolioEvent::SequenceRejected));
    }

    #[test]
    fn newest_complete_folio_promotes_and_discards_older_incomplete_ones() {
        let mut w = FolioWindow::new(5);
        let mut t = SequenceTracker::new();
        // Folio 1 opens but never completes (page 1 of 2 missing).
        w.ingest(&mut t, 1, 0, 1, false, vec![point(1)]);
        // Folio 2 is a single-page folio; it's newer and completes.
        let ev = w.ingest(&mut t, 2, 0, 0, false, vec![point(2)]);
        assert!(matches!(ev, FolioEvent::Promoted { .. }));
        assert_eq!(w.in_flight_count(), 0);
    }

    #[test]
    fn window_overflow_flushes_oldest_as_partial() {
        let mut w = FolioWindow::new(2);
        let mut t = SequenceTracker::new();
        // Three distinct two-page folios, each missing page 1, fill the
        // window past capacity (window=2 => overflow on the 3rd entry).
        w.ingest(&mut t, 1, 0, 1, false, vec![point(1)]);
        w.ingest(&mut t, 2, 0, 1, false, vec![point(2)]);
        let ev = w.ingest(&mut t, 3, 0, 1, false, vec![point(3)]);
        match ev {
            FolioEvent::PartialFlushed { points } => assert_eq!(points.len(), 1),
            other => panic!("expected PartialFlushed, got {other:?}"),
        }
    }

    #[test]
    fn window_overflow_skips_a_full_set_folio_and_flushes_the_next_delta() {
        let mut w = FolioWindow::new(1);
        let mut t = SequenceTracker::new();
        // Folio 1 is a full set, stuck incomplete -- must never be the
        // partial-flush victim.
        w.ingest(&mut t, 1, 0, 1, true, vec![point(1)]);
        // Folio 2 is a delta, also incomplete; overflow (window=1) should
        // flush folio 2, leaving folio 1 untouched.
        w.ingest(&mut t, 2, 0, 1, false, vec![point(2)]);
        let ev = w.ingest(&mut t, 3, 0, 1, false, vec![point(3)]);
        match ev {
            FolioEvent::PartialFlushed { points } => {
                assert_eq!(points.len(), 1);
                assert_eq!(points[0].address, point(2).address);
            }
            other => panic!("expected PartialFlushed, got {other:?}"),
        }
        assert_eq!(w.in_flight_count(), 2); // folio 1 (full-set) and folio 3 remain
    }
}
