//! Form inputs the booking flow collects. Each keeps one canonical value and
//! derives the parts shown to the user from it, and back.

pub mod date;
pub mod phone;
pub mod time;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Phone number is empty")]
    EmptyPhone,

    #[error("Phone number may only contain digits, spaces, dashes, dots, brackets and a leading +")]
    InvalidPhoneCharacters,

    #[error("Unknown country calling code")]
    UnknownCallingCode,

    #[error("Phone number has the wrong number of digits")]
    InvalidPhoneLength,

    #[error("Date must look like DD/MM/YYYY")]
    DateFormat,

    #[error("{day:02}/{month:02}/{year} is not a real date")]
    InvalidDate { day: u32, month: u32, year: i32 },

    #[error("The date is in the past")]
    DateInPast,

    #[error("Bookings can be made at most {0} days ahead")]
    DateTooFar(i64),

    #[error("Time must look like 10:30 AM or 22:30")]
    TimeFormat,

    #[error("{0} is not a valid time")]
    InvalidTime(String),
}
