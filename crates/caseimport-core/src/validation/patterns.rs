//! Regex patterns shared by the value parsers.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // 15.01.2024, 15/01/24, 15-01-2024 with an optional time
    pub static ref DATE_DMY: Regex = Regex::new(
        r"^(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})(?:[\sT]+(\d{1,2}):(\d{2})(?::(\d{2}))?)?$"
    ).unwrap();

    // 2024-01-15, 2024/1/5 with an optional time
    pub static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})(?:[\sT]+(\d{1,2}):(\d{2})(?::(\d{2}))?)?$"
    ).unwrap();

    // 13 August 2017, 13 Aug 2017
    pub static ref DATE_LONG: Regex = Regex::new(
        r"(?i)^(\d{1,2})\.?\s+([a-z]+)\.?,?\s+(\d{4})$"
    ).unwrap();

    // August 13, 2017
    pub static ref DATE_LONG_MONTH_FIRST: Regex = Regex::new(
        r"(?i)^([a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})$"
    ).unwrap();

    pub static ref TIME_ONLY: Regex = Regex::new(
        r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$"
    ).unwrap();

    // 1 234,56 or 1234.56 or 1,234.56
    pub static ref AMOUNT_PATTERN: Regex = Regex::new(
        r"(\d{1,3}(?:[\s\u{00a0},]?\d{3})*)(?:[,.](\d+))?\b"
    ).unwrap();
}
