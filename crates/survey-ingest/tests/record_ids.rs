//! Tests for audit record identifiers.

use std::io;
use std::sync::{Arc, Mutex};

use survey_ingest::{frame_from_columns, record_ids};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Buffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Buffer {
    type Writer = Buffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = Buffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    (value, buffer.contents())
}

#[test]
fn missing_id_column_warns_and_falls_back() {
    let df = frame_from_columns(vec![(
        "ST001".to_string(),
        vec![Some("1".to_string()), None],
    )])
    .unwrap();

    let (ids, logs) = capture(|| record_ids(&df, Some("CNTSTUID")));

    assert_eq!(ids, vec!["1", "2"]);
    assert!(logs.contains("WARN"));
    assert!(logs.contains("id column not found"));
    assert!(logs.contains("CNTSTUID"));
}

#[test]
fn present_id_column_is_silent() {
    let df = frame_from_columns(vec![(
        "CNTSTUID".to_string(),
        vec![Some("S1".to_string()), Some(" ".to_string())],
    )])
    .unwrap();

    let (ids, logs) = capture(|| record_ids(&df, Some("CNTSTUID")));

    assert_eq!(ids, vec!["S1", "2"]);
    assert!(logs.is_empty());
    let (ids, logs) = capture(|| record_ids(&df, None));
    assert_eq!(ids, vec!["1", "2"]);
    assert!(logs.is_empty());
}
