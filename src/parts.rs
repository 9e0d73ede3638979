use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::warn;

use crate::error::Error;

/// One rendered segment of a post's video, named `<id>_part_<n>.mp4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFile {
    pub ordinal: u32,
    pub path: PathBuf,
}

/// Visibility of an uploaded part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privacy {
    Public,
    Private,
}

impl Privacy {
    pub fn as_str(self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Private => "private",
        }
    }
}

/// When and how a part goes live. Part 1 publishes immediately and public;
/// later parts upload private with a scheduled flip delegated to the
/// platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTask {
    pub privacy: Privacy,
    pub publish_at: Option<DateTime<Utc>>,
}

/// Finds the rendered parts for one post in the pending directory, sorted
/// ascending by ordinal. Files whose part number does not parse are skipped
/// with a warning; ordinals need not be contiguous.
pub fn discover(pending: &Path, post_id: &str) -> Result<Vec<PartFile>, Error> {
    let pattern = format!(r"^{}_part_(\d+)\.(?i:mp4)$", regex::escape(post_id));
    let re = Regex::new(&pattern).unwrap();

    let mut parts = Vec::new();
    for entry in fs::read_dir(pending)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(captures) = re.captures(name) else { continue };

        match captures[1].parse::<u32>() {
            Ok(0) => warn!("skipping {name}: part number must be positive"),
            Ok(ordinal) => parts.push(PartFile {
                ordinal,
                path: entry.path(),
            }),
            Err(e) => warn!("skipping {name}: unreadable part number: {e}"),
        }
    }

    if parts.is_empty() {
        return Err(Error::NoParts(post_id.to_string()));
    }
    parts.sort_by_key(|part| part.ordinal);
    Ok(parts)
}

/// Computes the publish task for one ordinal, anchored at the wall clock of
/// this call. Each call anchors independently; the batch does not share one
/// anchor, which keeps the offsets meaningful when uploads take a while.
pub fn schedule_for(ordinal: u32, interval_hours: i64) -> PublishTask {
    schedule_for_at(ordinal, interval_hours, Utc::now())
}

fn schedule_for_at(ordinal: u32, interval_hours: i64, now: DateTime<Utc>) -> PublishTask {
    if ordinal <= 1 {
        return PublishTask {
            privacy: Privacy::Public,
            publish_at: None,
        };
    }
    PublishTask {
        privacy: Privacy::Private,
        publish_at: Some(now + chrono::Duration::hours(interval_hours * (i64::from(ordinal) - 1))),
    }
}
