use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the date token is rendered in output names and backup buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    /// `20150603`
    Compact,
    /// `2015-06-03`
    Dashed,
}

impl DateFormat {
    pub fn render(self, date: NaiveDate) -> String {
        match self {
            DateFormat::Compact => date.format("%Y%m%d").to_string(),
            DateFormat::Dashed => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// A filename that does not follow `device_channel_sequence_YYYYMMDD...`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedName {
    #[error("{name}: expected at least 4 '_'-separated tokens, found {found}")]
    TooFewTokens { name: String, found: usize },
    #[error("{name}: token '{token}' does not start with a YYYYMMDD date")]
    InvalidDate { name: String, token: String },
    #[error("{0}: file name is not valid UTF-8")]
    NotUtf8(PathBuf),
}

/// Identity of one output video: `(device, channel, sequence, date)`.
///
/// Derived from the filename alone, so rescanning the same directory
/// snapshot always yields the same grouping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentKey {
    pub device: String,
    pub channel: String,
    pub sequence: String,
    pub date: NaiveDate,
}

impl SegmentKey {
    /// `{device}_{channel}_{sequence}_{date}`, the output file stem.
    pub fn stem(&self, format: DateFormat) -> String {
        format!(
            "{}_{}_{}_{}",
            self.device,
            self.channel,
            self.sequence,
            format.render(self.date)
        )
    }

    /// Name of the backup subdirectory for frames of this segment.
    pub fn date_bucket(&self, format: DateFormat) -> String {
        format.render(self.date)
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem(DateFormat::Compact))
    }
}

/// One still image awaiting consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFrame {
    pub path: PathBuf,
    pub key: SegmentKey,
    /// Full `YYYYMMDDhhmmss` capture time when the token carries one.
    pub captured_at: Option<NaiveDateTime>,
}

impl SourceFrame {
    pub fn parse(path: &Path) -> Result<Self, MalformedName> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| MalformedName::NotUtf8(path.to_path_buf()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let tokens: Vec<&str> = stem.split('_').collect();
        if tokens.len() < 4 {
            return Err(MalformedName::TooFewTokens {
                name,
                found: tokens.len(),
            });
        }

        let stamp = tokens[3];
        let date = stamp
            .get(..8)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
            .ok_or_else(|| MalformedName::InvalidDate {
                name: name.clone(),
                token: stamp.to_string(),
            })?;
        let captured_at = stamp
            .get(..14)
            .and_then(|t| NaiveDateTime::parse_from_str(t, "%Y%m%d%H%M%S").ok());

        Ok(Self {
            path: path.to_path_buf(),
            key: SegmentKey {
                device: tokens[0].to_string(),
                channel: tokens[1].to_string(),
                sequence: tokens[2].to_string(),
                date,
            },
            captured_at,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_camera_filename() {
        let frame =
            SourceFrame::parse(Path::new("/in/CAM01_1_0001_20150603183804_9999.jpg")).unwrap();
        assert_eq!(frame.key.device, "CAM01");
        assert_eq!(frame.key.channel, "1");
        assert_eq!(frame.key.sequence, "0001");
        assert_eq!(frame.key.date, date(2015, 6, 3));
        assert_eq!(
            frame.captured_at,
            NaiveDate::from_ymd_opt(2015, 6, 3)
                .unwrap()
                .and_hms_opt(18, 38, 4)
        );
        assert_eq!(frame.file_name(), "CAM01_1_0001_20150603183804_9999.jpg");
    }

    #[test]
    fn test_parse_device_name_containing_parentheses() {
        // Device ids like `C4D655370473(CAM_01)` split into two tokens; the
        // key still comes from positions 0..=3.
        let frame = SourceFrame::parse(Path::new("C4D655370473(CAM_01)_1_20150603183804_3969.jpg"))
            .unwrap();
        assert_eq!(frame.key.device, "C4D655370473(CAM");
        assert_eq!(frame.key.channel, "01)");
        assert_eq!(frame.key.sequence, "1");
        assert_eq!(frame.key.date, date(2015, 6, 3));
    }

    #[test]
    fn test_date_only_token_has_no_capture_time() {
        let frame = SourceFrame::parse(Path::new("CAM01_1_0001_20150603.jpg")).unwrap();
        assert_eq!(frame.key.date, date(2015, 6, 3));
        assert!(frame.captured_at.is_none());
    }

    #[rstest]
    #[case::no_underscore("bad.jpg", 1)]
    #[case::two_tokens("CAM01_1.jpg", 2)]
    #[case::three_tokens("CAM01_1_0001.jpg", 3)]
    fn test_too_few_tokens(#[case] name: &str, #[case] found: usize) {
        let err = SourceFrame::parse(Path::new(name)).unwrap_err();
        assert_eq!(
            err,
            MalformedName::TooFewTokens {
                name: name.to_string(),
                found
            }
        );
    }

    #[rstest]
    #[case::short("CAM01_1_0001_2015.jpg")]
    #[case::letters("CAM01_1_0001_2015ABCD1200.jpg")]
    #[case::impossible_month("CAM01_1_0001_20151303120000.jpg")]
    fn test_invalid_date_token(#[case] name: &str) {
        assert!(matches!(
            SourceFrame::parse(Path::new(name)),
            Err(MalformedName::InvalidDate { .. })
        ));
    }

    #[rstest]
    #[case::compact(DateFormat::Compact, "CAM01_1_0001_20150603", "20150603")]
    #[case::dashed(DateFormat::Dashed, "CAM01_1_0001_2015-06-03", "2015-06-03")]
    fn test_stem_and_bucket(#[case] format: DateFormat, #[case] stem: &str, #[case] bucket: &str) {
        let frame = SourceFrame::parse(Path::new("CAM01_1_0001_20150603183804_9999.jpg")).unwrap();
        assert_eq!(frame.key.stem(format), stem);
        assert_eq!(frame.key.date_bucket(format), bucket);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let p = Path::new("/in/CAM02_3_0007_20160101000000_1.jpg");
        assert_eq!(SourceFrame::parse(p).unwrap(), SourceFrame::parse(p).unwrap());
    }
}
