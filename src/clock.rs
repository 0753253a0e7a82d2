//! Calendar values and the RTC seam

/// Full calendar value as held by the real-time clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    /// 0 = Sunday
    pub day_of_week: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// One second's worth of displayed values. The year is two-digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeSample {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Displayed fields, in the order they are laid out left to right
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Day,
    Month,
    Year,
    Hour,
    Minute,
    Second,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Day,
        Field::Month,
        Field::Year,
        Field::Hour,
        Field::Minute,
        Field::Second,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TimeSample {
    pub fn new(year: u8, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    pub fn field(&self, field: Field) -> u8 {
        match field {
            Field::Day => self.day,
            Field::Month => self.month,
            Field::Year => self.year,
            Field::Hour => self.hour,
            Field::Minute => self.minute,
            Field::Second => self.second,
        }
    }
}

impl From<&DateTime> for TimeSample {
    fn from(dt: &DateTime) -> Self {
        Self {
            year: (dt.year % 100) as u8,
            month: dt.month,
            day: dt.day,
            hour: dt.hour,
            minute: dt.minute,
            second: dt.second,
        }
    }
}

/// Real-time clock collaborator
pub trait Rtc {
    type Error;

    fn read(&mut self) -> Result<DateTime, Self::Error>;

    /// Replace the clock's time in one step
    fn commit(&mut self, datetime: &DateTime) -> Result<(), Self::Error>;
}

/// Reasons a datetime text is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// No `T` between date and time
    MissingSeparator,
    /// Date is not `YYYY-MM-DD`
    BadDate,
    /// Time is not `HH:MM:SS`
    BadTime,
    /// A component is outside its calendar range
    OutOfRange,
    /// Day of week outside 0..=6
    BadWeekday,
}

impl DateTime {
    /// Parse `YYYY-MM-DDTHH:MM:SS[.frac][offset]` into a calendar value.
    ///
    /// Fractional seconds and a trailing UTC offset are dropped; the
    /// offset is already applied to the local fields by the time API.
    pub fn parse(text: &str, day_of_week: u8) -> Result<Self, ParseError> {
        let (date, time) = text.split_once('T').ok_or(ParseError::MissingSeparator)?;

        let [year, month, day] = split_three(date, '-').ok_or(ParseError::BadDate)?;
        let year: u16 = year.parse().map_err(|_| ParseError::BadDate)?;
        let month: u8 = month.parse().map_err(|_| ParseError::BadDate)?;
        let day: u8 = day.parse().map_err(|_| ParseError::BadDate)?;

        let time = match time.find(|c: char| matches!(c, '.' | '+' | '-' | 'Z')) {
            Some(end) => &time[..end],
            None => time,
        };
        let [hour, minute, second] = split_three(time, ':').ok_or(ParseError::BadTime)?;
        let hour: u8 = hour.parse().map_err(|_| ParseError::BadTime)?;
        let minute: u8 = minute.parse().map_err(|_| ParseError::BadTime)?;
        let second: u8 = second.parse().map_err(|_| ParseError::BadTime)?;

        if !(1..=12).contains(&month)
            || !(1..=31).contains(&day)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return Err(ParseError::OutOfRange);
        }
        if day_of_week > 6 {
            return Err(ParseError::BadWeekday);
        }

        Ok(Self {
            year,
            month,
            day,
            day_of_week,
            hour,
            minute,
            second,
        })
    }
}

/// Split into exactly three non-empty parts
fn split_three(text: &str, sep: char) -> Option<[&str; 3]> {
    let mut parts = text.split(sep);
    let a = parts.next()?;
    let b = parts.next()?;
    let c = parts.next()?;
    if parts.next().is_some() || a.is_empty() || b.is_empty() || c.is_empty() {
        return None;
    }
    Some([a, b, c])
}
