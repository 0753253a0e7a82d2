//! Serial link to the network co-processor
//!
//! The co-processor owns WiFi and HTTP. We send it one request line
//! naming the time API and read back the API's JSON body on one line.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::serial::{Read, Write};
use heapless::{String, Vec};
use serde::Deserialize;

use crate::config::TIME_API;
use crate::timesync::{TimePayload, TimeSource};

/// Poll interval while waiting for response bytes
const POLL_US: u32 = 100;

/// Longest response line accepted
pub const LINE_CAPACITY: usize = 512;

/// Errors talking to the co-processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// UART read or write failed
    Serial,
    /// No complete line within the timeout
    Timeout,
    /// Response longer than [`LINE_CAPACITY`]
    Overflow,
    /// Response is not the expected JSON object
    Json,
}

/// The subset of the time API's response we use. Other keys are skipped.
#[derive(Deserialize)]
struct WorldTime<'a> {
    datetime: &'a str,
    day_of_week: u8,
    day_of_year: u16,
    dst: bool,
}

/// Decode a time API response body
pub fn decode(body: &[u8]) -> Result<TimePayload, LinkError> {
    let (reply, _) =
        serde_json_core::from_slice::<WorldTime>(body).map_err(|_| LinkError::Json)?;
    let mut datetime = String::new();
    datetime
        .push_str(reply.datetime)
        .map_err(|_| LinkError::Overflow)?;
    Ok(TimePayload {
        datetime,
        day_of_week: reply.day_of_week,
        day_of_year: reply.day_of_year,
        dst: reply.dst,
    })
}

/// [`TimeSource`] over a byte-oriented serial port
pub struct SerialTimeSource<S, D> {
    serial: S,
    delay: D,
    timeout_ms: u32,
    line: Vec<u8, LINE_CAPACITY>,
}

impl<S, D> SerialTimeSource<S, D>
where
    S: Read<u8> + Write<u8>,
    D: DelayUs<u32>,
{
    pub fn new(serial: S, delay: D, timeout_ms: u32) -> Self {
        Self {
            serial,
            delay,
            timeout_ms,
            line: Vec::new(),
        }
    }

    pub fn release(self) -> (S, D) {
        (self.serial, self.delay)
    }

    fn send_request(&mut self) -> Result<(), LinkError> {
        for byte in b"GET ".iter().chain(TIME_API.as_bytes()).chain(b"\n") {
            nb::block!(self.serial.write(*byte)).map_err(|_| LinkError::Serial)?;
        }
        nb::block!(self.serial.flush()).map_err(|_| LinkError::Serial)
    }

    /// Drop whatever a previous, timed-out exchange left behind
    fn drain(&mut self) {
        for _ in 0..LINE_CAPACITY {
            if self.serial.read().is_err() {
                break;
            }
        }
    }

    fn read_line(&mut self) -> Result<(), LinkError> {
        self.line.clear();
        let mut budget = self.timeout_ms.saturating_mul(1000 / POLL_US);
        loop {
            match self.serial.read() {
                Ok(b'\n') => return Ok(()),
                Ok(b'\r') => {}
                Ok(byte) => self.line.push(byte).map_err(|_| LinkError::Overflow)?,
                Err(nb::Error::WouldBlock) => {
                    if budget == 0 {
                        return Err(LinkError::Timeout);
                    }
                    budget -= 1;
                    self.delay.delay_us(POLL_US);
                }
                Err(nb::Error::Other(_)) => return Err(LinkError::Serial),
            }
        }
    }
}

impl<S, D> TimeSource for SerialTimeSource<S, D>
where
    S: Read<u8> + Write<u8>,
    D: DelayUs<u32>,
{
    type Error = LinkError;

    fn fetch_time(&mut self) -> Result<TimePayload, LinkError> {
        self.drain();
        self.send_request()?;
        self.read_line()?;
        decode(&self.line)
    }
}
