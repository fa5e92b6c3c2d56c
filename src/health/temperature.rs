//! 体温定点数
//!
//! 以百万分之一摄氏度为单位保存，解析和输出都走十进制文本，不经过浮点数

use crate::error::MedicalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 每度对应的最小单位数
const SCALE: i64 = 1_000_000;

/// 小数位数上限
const MAX_FRACTION_DIGITS: usize = 6;

/// 体温（六位小数的定点数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Temperature(i64);

impl Temperature {
    /// 由百万分之一度创建
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// 由百分之一度创建
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths.saturating_mul(SCALE / 100))
    }

    /// 百万分之一度表示
    pub const fn micros(self) -> i64 {
        self.0
    }

    /// 与另一读数之差的绝对值（百万分之一度），任意两个读数都不会溢出
    pub fn abs_diff(self, other: Temperature) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// 与另一读数之差是否超过给定偏差
    pub fn deviates_from(self, other: Temperature, deviation: Temperature) -> bool {
        let diff = self.abs_diff(other);
        match u64::try_from(deviation.0) {
            Ok(deviation) => diff > deviation,
            // 负偏差：任何读数都算超出
            Err(_) => true,
        }
    }
}

impl FromStr for Temperature {
    type Err = MedicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MedicalError::InvalidTemperature(s.to_string());

        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > MAX_FRACTION_DIGITS || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if digits.ends_with('.') {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let fraction: i64 = if fraction.is_empty() {
            0
        } else {
            let padding = 10_i64.pow((MAX_FRACTION_DIGITS - fraction.len()) as u32);
            fraction.parse::<i64>().map_err(|_| invalid())? * padding
        };

        let value = whole
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(fraction))
            .ok_or_else(invalid)?;

        Ok(Self(if negative { -value } else { value }))
    }
}

impl TryFrom<String> for Temperature {
    type Error = MedicalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Temperature> for String {
    fn from(value: Temperature) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Temperature {
    /// 至少两位小数，多余的尾零省略
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = SCALE as u64;

        let digits = format!("{:06}", abs % scale);
        let trimmed = digits.trim_end_matches('0');
        let fraction = if trimmed.len() < 2 { &digits[..2] } else { trimmed };
        write!(f, "{}{}.{}", sign, abs / scale, fraction)
    }
}
