//! Reporting-period keys derived from bulletin titles

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Calendar year immediately preceding year 1 of the era (Reiwa 1 = 2019)
pub const ERA_OFFSET_YEAR: u32 = 2018;

/// Months before this belong to the next calendar year of a fiscal year
const FISCAL_YEAR_START_MONTH: u32 = 4;

/// Keys carry a four-digit year
const MAX_YEAR: u32 = 9999;

const MONTH_KEYS: [&str; 12] = [
    "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12",
];

static ERA_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+|元)年").expect("valid era year regex"));
static MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)月").expect("valid month regex"));
static SEQUENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)次").expect("valid sequence regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no era year (年) in title {0:?}")]
    MissingYear(String),
    #[error("no month (月) in title {0:?}")]
    MissingMonth(String),
    #[error("era year out of range in title {0:?}")]
    YearOutOfRange(String),
    #[error("month {month} out of range in {source_text:?}")]
    MonthOutOfRange { month: u32, source_text: String },
    #[error("invalid period key {0:?}")]
    InvalidKey(String),
}

/// Year, month and optional round number of one bulletin.
///
/// Renders as its key, `YYYYMM` or `YYYYMM_N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BulletinPeriod {
    year: u32,
    month: u32,
    sequence: Option<u32>,
}

impl BulletinPeriod {
    /// Derive the period from a bulletin page title like "令和4年度 第3次 1月入所".
    ///
    /// The title carries a fiscal-era year; January to March fall in the
    /// following calendar year.
    pub fn from_title(title: &str) -> Result<Self, ParseError> {
        let title: String = title.nfkc().collect();

        let era_year = match ERA_YEAR_RE.captures(&title) {
            Some(caps) if &caps[1] == "元" => 1,
            Some(caps) => parse_number(&caps[1], &title)?,
            None => return Err(ParseError::MissingYear(title.clone())),
        };
        let month = match MONTH_RE.captures(&title) {
            Some(caps) => parse_number(&caps[1], &title)?,
            None => return Err(ParseError::MissingMonth(title.clone())),
        };
        check_month(month, &title)?;
        let sequence = SEQUENCE_RE
            .captures(&title)
            .map(|caps| parse_number(&caps[1], &title))
            .transpose()?;

        let rollover = u32::from(month < FISCAL_YEAR_START_MONTH);
        let year = ERA_OFFSET_YEAR
            .checked_add(era_year)
            .and_then(|year| year.checked_add(rollover))
            .filter(|year| *year <= MAX_YEAR)
            .ok_or(ParseError::YearOutOfRange(title))?;

        Ok(Self {
            year,
            month,
            sequence,
        })
    }

    /// Parse a key previously produced by `Display`, e.g. a saved PDF's file stem
    pub fn from_file_stem(stem: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidKey(stem.to_string());

        let (head, sequence) = match stem.split_once('_') {
            Some((head, seq)) => (head, Some(seq.parse::<u32>().map_err(|_| invalid())?)),
            None => (stem, None),
        };
        if head.len() < 5 || !head.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = head[..4].parse::<u32>().map_err(|_| invalid())?;
        let month = head[4..].parse::<u32>().map_err(|_| invalid())?;
        check_month(month, stem)?;

        Ok(Self {
            year,
            month,
            sequence,
        })
    }

    pub fn year_str(&self) -> String {
        format!("{:04}", self.year)
    }

    /// Two-digit month, as stamped onto extracted rows
    pub fn month_str(&self) -> &'static str {
        MONTH_KEYS[(self.month - 1) as usize]
    }
}

impl fmt::Display for BulletinPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.year_str(), self.month_str())?;
        if let Some(seq) = self.sequence {
            write!(f, "_{}", seq)?;
        }
        Ok(())
    }
}

fn parse_number(digits: &str, source_text: &str) -> Result<u32, ParseError> {
    digits
        .parse()
        .map_err(|_| ParseError::InvalidKey(source_text.to_string()))
}

fn check_month(month: u32, source_text: &str) -> Result<(), ParseError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(ParseError::MonthOutOfRange {
            month,
            source_text: source_text.to_string(),
        })
    }
}
