//! Debounced style button
//!
//! The GPIO interrupt only stamps the edge into an [`EdgeSlot`]. A timer
//! task polls the pin every millisecond while a debounce window is open
//! and feeds a [`StyleController`], which acts on release: press and
//! release each have to hold for the debounce window, and only the
//! release advances the style.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::style::{ClockStyle, StyleSelector};

const LEVEL_BIT: u32 = 1 << 31;
const TIME_MASK: u32 = !LEVEL_BIT;

/// A raw edge: pin level just after the edge and when it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Edge {
    pub level: bool,
    /// Milliseconds, 31-bit wrapping
    pub at_ms: u32,
}

/// Single-slot mailbox from the edge interrupt to the debounce poll.
/// A newer edge overwrites one not yet taken.
pub struct EdgeSlot {
    word: AtomicU32,
    full: AtomicBool,
}

impl EdgeSlot {
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(0),
            full: AtomicBool::new(false),
        }
    }

    pub fn record(&self, level: bool, now_ms: u32) {
        let level = if level { LEVEL_BIT } else { 0 };
        self.word.store(level | (now_ms & TIME_MASK), Ordering::Relaxed);
        self.full.store(true, Ordering::Release);
    }

    /// Interrupt entry point. Edges are dropped while a style change is
    /// still waiting to be persisted. Returns whether the edge was kept.
    pub fn on_edge(&self, selector: &StyleSelector, level: bool, now_ms: u32) -> bool {
        if selector.is_pending() {
            return false;
        }
        self.record(level, now_ms);
        true
    }

    pub fn take(&self) -> Option<Edge> {
        if !self.full.swap(false, Ordering::Acquire) {
            return None;
        }
        let word = self.word.load(Ordering::Relaxed);
        Some(Edge {
            level: word & LEVEL_BIT != 0,
            at_ms: word & TIME_MASK,
        })
    }
}

impl Default for EdgeSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one debounce poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Debounce {
    /// No window open
    Idle,
    /// Level has not held long enough yet
    Settling,
    /// Level changed inside the window; event discarded
    Bounced,
    /// Stable HIGH after LOW
    Pressed,
    /// Stable LOW after HIGH
    Released,
    /// Stable, but same as the last confirmed level
    Unchanged,
}

/// Debounce bookkeeping, owned by the poll context
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    window_ms: u32,
    last_stable: bool,
    window: Option<Edge>,
}

impl Debouncer {
    pub const fn new(window_ms: u32) -> Self {
        Self {
            window_ms,
            last_stable: false,
            window: None,
        }
    }

    pub fn last_stable(&self) -> bool {
        self.last_stable
    }

    pub fn is_settling(&self) -> bool {
        self.window.is_some()
    }

    /// Open (or restart) the window for a fresh edge
    pub fn begin(&mut self, edge: Edge) {
        self.window = Some(edge);
    }

    pub fn poll(&mut self, level: bool, now_ms: u32) -> Debounce {
        let Some(edge) = self.window else {
            return Debounce::Idle;
        };
        if level != edge.level {
            self.window = None;
            return Debounce::Bounced;
        }
        let elapsed = (now_ms & TIME_MASK).wrapping_sub(edge.at_ms) & TIME_MASK;
        if elapsed < self.window_ms {
            return Debounce::Settling;
        }
        self.window = None;
        match (edge.level, self.last_stable) {
            (true, false) => {
                self.last_stable = true;
                Debounce::Pressed
            }
            (false, true) => {
                self.last_stable = false;
                Debounce::Released
            }
            _ => Debounce::Unchanged,
        }
    }
}

/// What the poll task should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Poll {
    /// Nothing in flight; stop polling until the next edge
    Idle,
    /// Poll again in a millisecond
    Settling,
    /// Style advanced; persistence is pending
    Changed(ClockStyle),
}

/// Turns debounced button releases into style changes
pub struct StyleController<'a> {
    selector: &'a StyleSelector,
    edges: &'a EdgeSlot,
    debouncer: Debouncer,
}

impl<'a> StyleController<'a> {
    pub fn new(selector: &'a StyleSelector, edges: &'a EdgeSlot, debounce_ms: u32) -> Self {
        Self {
            selector,
            edges,
            debouncer: Debouncer::new(debounce_ms),
        }
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Sample the live pin `level` at `now_ms`
    pub fn poll(&mut self, level: bool, now_ms: u32) -> Poll {
        if let Some(edge) = self.edges.take() {
            self.debouncer.begin(edge);
        }
        match self.debouncer.poll(level, now_ms) {
            Debounce::Settling => Poll::Settling,
            Debounce::Released => match self.selector.advance() {
                Some(style) => {
                    #[cfg(feature = "defmt")]
                    defmt::info!("clock style update pending: {}", style);
                    Poll::Changed(style)
                }
                None => Poll::Idle,
            },
            Debounce::Bounced => {
                #[cfg(feature = "defmt")]
                defmt::trace!("button bounce discarded");
                Poll::Idle
            }
            Debounce::Idle | Debounce::Pressed | Debounce::Unchanged => Poll::Idle,
        }
    }
}
