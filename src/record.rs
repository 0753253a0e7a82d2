//! On-flash layout of a config slot
//!
//! One record per slot: a magic byte, a length byte, then the value.
//! Erased flash reads as `0xFF`, so a missing magic means "never written".

/// Marks a written record
pub const MAGIC: u8 = 0xC5;

/// Longest value a record holds
pub const MAX_VALUE: usize = 16;

/// Bytes read back when loading a record
pub const RECORD_LEN: usize = 2 + MAX_VALUE;

/// Errors reading or writing a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Stored length does not fit
    Corrupted,
    /// Value longer than the record holds
    TooLong,
}

/// Copy a record out of memory-mapped storage.
///
/// The copy is owned, so a later erase of the storage cannot change it.
///
/// # Safety
///
/// `base` must be valid for reads of [`RECORD_LEN`] bytes.
pub unsafe fn snapshot(base: *const u8) -> [u8; RECORD_LEN] {
    let mut copy = [0u8; RECORD_LEN];
    for (i, byte) in copy.iter_mut().enumerate() {
        *byte = core::ptr::read_volatile(base.add(i));
    }
    copy
}

/// Extract the value of a record into `buf`
pub fn decode(record: &[u8; RECORD_LEN], buf: &mut [u8]) -> Result<Option<usize>, RecordError> {
    if record[0] != MAGIC {
        return Ok(None);
    }
    let len = usize::from(record[1]);
    if len > MAX_VALUE || len > buf.len() {
        return Err(RecordError::Corrupted);
    }
    buf[..len].copy_from_slice(&record[2..2 + len]);
    Ok(Some(len))
}

/// Write `value` as a record at the start of `page`. The rest of the
/// page is left as it was.
pub fn encode(value: &[u8], page: &mut [u8]) -> Result<(), RecordError> {
    if value.len() > MAX_VALUE || page.len() < 2 + value.len() {
        return Err(RecordError::TooLong);
    }
    page[0] = MAGIC;
    page[1] = value.len() as u8;
    page[2..2 + value.len()].copy_from_slice(value);
    Ok(())
}
