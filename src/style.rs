//! Clock style selection and persistence

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::clock::Field;

/// Visual encoding of the six fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClockStyle {
    /// One column per field, 6-bit binary
    #[default]
    Binary = 1,
    /// Two columns per field, one binary digit each
    Bcd = 2,
    /// Two columns per field, bar length per digit
    Length = 3,
}

impl ClockStyle {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ClockStyle::Binary),
            2 => Some(ClockStyle::Bcd),
            3 => Some(ClockStyle::Length),
            _ => None,
        }
    }

    /// Cycle 1 -> 2 -> 3 -> 1
    pub fn next(self) -> Self {
        match self {
            ClockStyle::Binary => ClockStyle::Bcd,
            ClockStyle::Bcd => ClockStyle::Length,
            ClockStyle::Length => ClockStyle::Binary,
        }
    }

    /// Origin column of `field` under this style
    pub fn column(self, field: Field) -> i32 {
        let columns = match self {
            ClockStyle::Binary => [1, 4, 7, 9, 12, 15],
            ClockStyle::Bcd | ClockStyle::Length => [0, 3, 6, 8, 11, 14],
        };
        columns[field.index()]
    }

    /// Parse the stored digit. Surrounding whitespace is tolerated.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().as_bytes() {
            [digit @ b'1'..=b'3'] => Self::from_u8(digit - b'0'),
            _ => None,
        }
    }
}

/// Active style plus the "not yet persisted" flag, shared between the
/// debounce poll (producer) and the render loop (consumer).
pub struct StyleSelector {
    style: AtomicU8,
    pending: AtomicBool,
}

impl StyleSelector {
    pub const fn new(style: ClockStyle) -> Self {
        Self {
            style: AtomicU8::new(style as u8),
            pending: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> ClockStyle {
        ClockStyle::from_u8(self.style.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Install the style loaded at startup. Does not raise the flag.
    pub fn restore(&self, style: ClockStyle) {
        self.style.store(style as u8, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Step to the next style unless a change is still unconsumed.
    pub fn advance(&self) -> Option<ClockStyle> {
        if self.is_pending() {
            return None;
        }
        let next = self.current().next();
        self.style.store(next as u8, Ordering::Release);
        self.pending.store(true, Ordering::Release);
        Some(next)
    }

    /// Consume the pending change, if any
    pub fn take_pending(&self) -> Option<ClockStyle> {
        if self.pending.swap(false, Ordering::AcqRel) {
            Some(self.current())
        } else {
            None
        }
    }
}

/// A single named text slot in persistent storage
pub trait ConfigSlot {
    type Error;

    /// `Ok(None)` when nothing was ever written
    fn load(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error>;

    fn save(&mut self, value: &str) -> Result<(), Self::Error>;
}

/// Errors from persisting the style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError<E> {
    Slot(E),
    Format,
}

/// Loads and saves the style digit through a [`ConfigSlot`]
pub struct StyleStore<S> {
    slot: S,
}

impl<S: ConfigSlot> StyleStore<S> {
    pub fn new(slot: S) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    /// Read the saved style. Absent, unreadable or malformed contents fall
    /// back to [`ClockStyle::Binary`], which is written back.
    pub fn load_or_default(&mut self) -> ClockStyle {
        let mut buf = [0u8; 8];
        let stored = match self.slot.load(&mut buf) {
            Ok(Some(len)) => core::str::from_utf8(&buf[..len.min(buf.len())])
                .ok()
                .and_then(ClockStyle::parse),
            Ok(None) | Err(_) => None,
        };
        match stored {
            Some(style) => style,
            None => {
                let style = ClockStyle::default();
                #[cfg(feature = "defmt")]
                defmt::info!("no saved clock style, writing default {}", style);
                if self.save(style).is_err() {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("failed to write default clock style");
                }
                style
            }
        }
    }

    pub fn save(&mut self, style: ClockStyle) -> Result<(), StoreError<S::Error>> {
        let mut buf = [0u8; 4];
        let text = format_no_std::show(&mut buf, format_args!("{}", style.as_u8()))
            .map_err(|_| StoreError::Format)?;
        self.slot.save(text).map_err(StoreError::Slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MemorySlot {
        value: Option<heapless::String<8>>,
        writes: usize,
        fail_writes: bool,
    }

    impl ConfigSlot for MemorySlot {
        type Error = ();

        fn load(&mut self, buf: &mut [u8]) -> Result<Option<usize>, ()> {
            Ok(self.value.as_ref().map(|v| {
                let len = v.len().min(buf.len());
                buf[..len].copy_from_slice(&v.as_bytes()[..len]);
                len
            }))
        }

        fn save(&mut self, value: &str) -> Result<(), ()> {
            if self.fail_writes {
                return Err(());
            }
            self.writes += 1;
            let mut stored = heapless::String::new();
            stored.push_str(value)?;
            self.value = Some(stored);
            Ok(())
        }
    }

    fn slot_with(text: &str) -> MemorySlot {
        let mut value = heapless::String::new();
        value.push_str(text).unwrap();
        MemorySlot {
            value: Some(value),
            ..Default::default()
        }
    }

    #[test]
    fn test_style_cycles_through_three() {
        let mut style = ClockStyle::Binary;
        let mut seen = [0u8; 6];
        for slot in seen.iter_mut() {
            style = style.next();
            *slot = style.as_u8();
        }
        assert_eq!(seen, [2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn test_parse_accepts_only_digits_one_to_three() {
        assert_eq!(ClockStyle::parse("1"), Some(ClockStyle::Binary));
        assert_eq!(ClockStyle::parse("3\n"), Some(ClockStyle::Length));
        assert_eq!(ClockStyle::parse("0"), None);
        assert_eq!(ClockStyle::parse("4"), None);
        assert_eq!(ClockStyle::parse("12"), None);
        assert_eq!(ClockStyle::parse(""), None);
    }

    #[test]
    fn test_layout_columns() {
        let binary: heapless::Vec<i32, 6> = Field::ALL
            .iter()
            .map(|f| ClockStyle::Binary.column(*f))
            .collect();
        assert_eq!(binary.as_slice(), &[1, 4, 7, 9, 12, 15]);
        assert_eq!(ClockStyle::Length.column(Field::Hour), 8);
        assert_eq!(ClockStyle::Bcd.column(Field::Second), 14);
    }

    #[test]
    fn test_selector_holds_one_pending_change() {
        let selector = StyleSelector::new(ClockStyle::Binary);
        assert_eq!(selector.advance(), Some(ClockStyle::Bcd));
        assert_eq!(selector.advance(), None);
        assert_eq!(selector.current(), ClockStyle::Bcd);
        assert_eq!(selector.take_pending(), Some(ClockStyle::Bcd));
        assert_eq!(selector.take_pending(), None);
        assert_eq!(selector.advance(), Some(ClockStyle::Length));
    }

    #[test]
    fn test_load_saved_style() {
        let mut store = StyleStore::new(slot_with("2"));
        assert_eq!(store.load_or_default(), ClockStyle::Bcd);
        assert_eq!(store.slot().writes, 0);
    }

    #[test]
    fn test_load_absent_writes_default() {
        let mut store = StyleStore::new(MemorySlot::default());
        assert_eq!(store.load_or_default(), ClockStyle::Binary);
        assert_eq!(store.slot().writes, 1);
        assert_eq!(store.slot().value.as_deref(), Some("1"));
    }

    #[test]
    fn test_load_corrupt_writes_default() {
        let mut store = StyleStore::new(slot_with("x7"));
        assert_eq!(store.load_or_default(), ClockStyle::Binary);
        assert_eq!(store.slot().value.as_deref(), Some("1"));
    }

    #[test]
    fn test_write_failure_is_not_fatal() {
        let mut store = StyleStore::new(MemorySlot {
            fail_writes: true,
            ..Default::default()
        });
        assert_eq!(store.load_or_default(), ClockStyle::Binary);
        assert_eq!(store.save(ClockStyle::Length), Err(StoreError::Slot(())));
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let mut store = StyleStore::new(MemorySlot::default());
        store.save(ClockStyle::Length).unwrap();
        assert_eq!(store.load_or_default(), ClockStyle::Length);
        let loaded = store.load_or_default();
        store.save(loaded).unwrap();
        assert_eq!(store.slot().value.as_deref(), Some("3"));
    }
}
