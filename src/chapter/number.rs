use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// 章节序号，如 `12` 或 `10.5`
///
/// 按数值排序：`10 < 10.5 < 11`。解析时去掉小数末尾的零，`10.50` 与 `10.5` 视为同一章。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChapterNumber {
    whole: u32,
    // 小数部分的数字串，无末尾零；在此前提下字典序等于数值序
    fraction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid chapter number {0:?}")]
pub struct ParseChapterNumberError(String);

impl ChapterNumber {
    pub fn new(whole: u32) -> Self {
        Self {
            whole,
            fraction: None,
        }
    }

    pub fn is_fractional(&self) -> bool {
        self.fraction.is_some()
    }

    /// 整数部分补零到三位，小数部分原样保留
    pub fn padded(&self) -> String {
        match &self.fraction {
            Some(fraction) => format!("{:03}.{}", self.whole, fraction),
            None => format!("{:03}", self.whole),
        }
    }
}

impl FromStr for ChapterNumber {
    type Err = ParseChapterNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseChapterNumberError(s.to_string());
        let trimmed = s.trim();

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (trimmed, None),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let whole = whole.parse::<u32>().map_err(|_| err())?;

        let fraction = match fraction {
            Some(f) if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) => {
                return Err(err());
            }
            Some(f) => {
                let f = f.trim_end_matches('0');
                (!f.is_empty()).then(|| f.to_string())
            }
            None => None,
        };

        Ok(Self { whole, fraction })
    }
}

impl fmt::Display for ChapterNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fraction {
            Some(fraction) => write!(f, "{}.{}", self.whole, fraction),
            None => write!(f, "{}", self.whole),
        }
    }
}
