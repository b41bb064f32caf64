//! The default transform: one `id,level` line per record and one
//! `id,object` line per named object.
//!
//! Fields are written verbatim, so an id or object name containing a comma
//! or a newline produces an ambiguous line. [`map_quoted`] is the variant
//! that quotes such fields.

use bytes::{BufMut, BytesMut};

use crate::workload::MapOutput;
use crate::{KeyedLines, Line, Record};

pub const ID_LEVEL_KEY: &str = "id_level.csv";
pub const ID_OBJECT_KEY: &str = "id_object.csv";
pub const KEYS: &[&str] = &[ID_LEVEL_KEY, ID_OBJECT_KEY];

pub fn map(record: &Record) -> MapOutput {
    Ok(build(record, |field| field.to_string()))
}

/// Like [`map`], but fields containing `,`, `"`, `\r` or `\n` are wrapped in
/// double quotes with inner quotes doubled.
pub fn map_quoted(record: &Record) -> MapOutput {
    Ok(build(record, quote))
}

fn build(record: &Record, field: impl Fn(&str) -> String) -> KeyedLines {
    let id = field(&record.id);
    let mut buf = BytesMut::new();

    let level_line = line(&mut buf, &id, &record.level.to_string());
    let object_lines = record
        .objects
        .iter()
        .map(|name| line(&mut buf, &id, &field(name)))
        .collect::<Vec<_>>();

    let mut out = KeyedLines::new();
    out.insert(ID_LEVEL_KEY.to_string(), vec![level_line]);
    out.insert(ID_OBJECT_KEY.to_string(), object_lines);
    out
}

fn line(buf: &mut BytesMut, left: &str, right: &str) -> Line {
    buf.put(left.as_bytes());
    buf.put_u8(b',');
    buf.put(right.as_bytes());
    buf.put_u8(b'\n');
    buf.split().freeze()
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
