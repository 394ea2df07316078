// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::*;
use crate::tags::*;

/// 100 ns ticks between 1601-01-01 (FILETIME epoch) and 1970-01-01 (Unix epoch).
pub const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;

pub fn read_beginning<T: Read + Seek>(stream: &mut T, stream_size: usize, read_size: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; read_size.min(stream_size)];

    stream.seek(SeekFrom::Start(0))?;
    let read = stream.read(&mut buf)?;
    buf.resize(read, 0);
    stream.seek(SeekFrom::Start(0))?;

    Ok(buf)
}

/// Seconds since the Unix epoch, keeping the sub-second part of the 100 ns ticks.
pub fn filetime_to_unix(raw: i64) -> f64 {
    (raw - FILETIME_UNIX_EPOCH) as f64 / 10_000_000.0
}

pub fn filetime_to_datetime(raw: i64) -> Option<chrono::DateTime<chrono::Utc>> {
    if raw <= 0 {
        return None;
    }
    let ticks = raw.checked_sub(FILETIME_UNIX_EPOCH)?;
    let secs = ticks.div_euclid(10_000_000);
    let nanos = (ticks.rem_euclid(10_000_000) * 100) as u32;
    chrono::DateTime::from_timestamp(secs, nanos)
}

pub fn insert_tag(map: &mut GroupedTagMap, tag: TagDescription) {
    let group_map = map.entry(tag.group.clone()).or_insert_with(TagMap::new);
    group_map.insert(tag.id.clone(), tag);
}

#[macro_export]
macro_rules! try_block {
    ($type:ty, $body:block) => {
        (|| -> Option<$type> {
            Some($body)
        }())
    };
    ($body:block) => {
        (|| -> Option<()> {
            $body
            Some(())
        }())
    };
}
