use nom::{
    combinator::all_consuming,
    number::complete::{be_u16, u8},
    sequence::tuple,
    IResult,
};
use time::{Date, Month, PrimitiveDateTime, Time};

use super::{ChunkType, ParseableChunk};
use crate::error::MetadataError;

/// Last modification time, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    /// 0-60; 60 marks a leap second.
    pub second: u8,
}

impl Timestamp {
    pub(crate) fn parse(chunk_data: &[u8]) -> Result<Self, MetadataError> {
        let (_, (year, month, day, hour, minute, second)) = fields(chunk_data)
            .map_err(|_| MetadataError::malformed(ChunkType::tIME, "tIME must be 7 bytes"))?;
        let timestamp = Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        };
        timestamp.to_datetime()?;
        Ok(timestamp)
    }

    /// The timestamp as a calendar date-time. A leap second is folded into
    /// the preceding one.
    pub fn to_datetime(&self) -> Result<PrimitiveDateTime, MetadataError> {
        let month = Month::try_from(self.month).map_err(|_| MetadataError::InvalidTimestamp)?;
        let date = Date::from_calendar_date(self.year as i32, month, self.day)
            .map_err(|_| MetadataError::InvalidTimestamp)?;
        let time = Time::from_hms(self.hour, self.minute, self.second.min(59))
            .map_err(|_| MetadataError::InvalidTimestamp)?;
        if self.second > 60 {
            return Err(MetadataError::InvalidTimestamp);
        }
        Ok(PrimitiveDateTime::new(date, time))
    }
}

impl ParseableChunk for Timestamp {
    const HEADER: ChunkType = ChunkType::tIME;

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.year.to_be_bytes().to_vec();
        bytes.extend([self.month, self.day, self.hour, self.minute, self.second]);
        bytes
    }
}

fn fields(chunk_data: &[u8]) -> IResult<&[u8], (u16, u8, u8, u8, u8, u8)> {
    all_consuming(tuple((be_u16, u8, u8, u8, u8, u8)))(chunk_data)
}
