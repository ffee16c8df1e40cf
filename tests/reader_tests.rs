//! BoundedReader state machine, progress and resource discipline.

mod common;

use common::{MemoryFormat, memory_context, memory_source, numbered_lines, write_file};
use splitsrc::{
    BoundedSource, Datum, InterruptFlag, KvPair, ReaderState, SourceContext, SourceError,
};
use std::sync::Arc;

fn pair(key: u64, value: &str) -> KvPair {
    KvPair::new(Datum::Long(key), Datum::Text(value.to_string()))
}

// --- NoCurrentElement ---

#[test]
fn test_current_before_start_and_after_exhaustion() {
    let ctx = memory_context(Arc::new(MemoryFormat::new(vec![vec!["a"]])));
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();
    assert_eq!(reader.state(), ReaderState::NotStarted);
    assert!(matches!(reader.current(), Err(SourceError::NoCurrentElement)));

    assert!(reader.start().unwrap());
    assert_eq!(reader.current().unwrap(), &pair(0, "a"));
    assert!(!reader.advance().unwrap());
    assert_eq!(reader.state(), ReaderState::Exhausted);
    assert!(matches!(reader.current(), Err(SourceError::NoCurrentElement)));
}

#[test]
fn test_double_close() {
    let ctx = memory_context(Arc::new(MemoryFormat::new(vec![vec!["a", "b"]])));
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();
    assert!(reader.start().unwrap());
    reader.close().unwrap();
    reader.close().unwrap();
    assert_eq!(reader.state(), ReaderState::Closed);
    assert!(matches!(reader.current(), Err(SourceError::NoCurrentElement)));
}

#[test]
fn test_close_before_start() {
    let library = Arc::new(MemoryFormat::numbered(2));
    let ctx = memory_context(library.clone());
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();
    reader.close().unwrap();
    assert_eq!(library.opened(), 0);
    assert!(matches!(
        reader.start(),
        Err(SourceError::IllegalState { op: "start", .. })
    ));
}

// --- state machine ---

#[test]
fn test_out_of_order_calls() {
    let ctx = memory_context(Arc::new(MemoryFormat::numbered(2)));
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();
    assert!(matches!(
        reader.advance(),
        Err(SourceError::IllegalState { op: "advance", .. })
    ));
    assert!(reader.start().unwrap());
    assert!(matches!(
        reader.start(),
        Err(SourceError::IllegalState { op: "start", .. })
    ));
    reader.close().unwrap();
    assert!(matches!(
        reader.advance(),
        Err(SourceError::IllegalState { op: "advance", .. })
    ));
}

#[test]
fn test_reads_splits_in_order_skipping_empty_ones() {
    let library = Arc::new(MemoryFormat::new(vec![
        vec![],
        vec!["a", "b"],
        vec![],
        vec![],
        vec!["c"],
        vec![],
    ]));
    let ctx = memory_context(library.clone());
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();

    let mut values = Vec::new();
    let mut more = reader.start().unwrap();
    while more {
        values.push(reader.current().unwrap().value.clone());
        more = reader.advance().unwrap();
    }
    assert_eq!(
        values,
        vec![
            Datum::Text("a".into()),
            Datum::Text("b".into()),
            Datum::Text("c".into())
        ]
    );
    assert_eq!(library.opened(), 6);
    assert_eq!(library.closed(), 6);
}

#[test]
fn test_previous_record_survives_buffer_reuse() {
    let ctx = memory_context(Arc::new(MemoryFormat::new(vec![vec!["first", "second"]])));
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();
    assert!(reader.start().unwrap());
    let kept = reader.current().unwrap().clone();
    assert!(reader.advance().unwrap());
    assert_eq!(kept, pair(0, "first"));
    assert_eq!(reader.current().unwrap(), &pair(1, "second"));
}

#[test]
fn test_current_source() {
    let ctx = memory_context(Arc::new(MemoryFormat::numbered(1)));
    let source = memory_source();
    let reader = source.create_reader(&ctx).unwrap();
    assert_eq!(reader.current_source(), &source);
}

// --- progress ---

#[test]
fn test_fraction_consumed_is_monotonic_and_ends_at_one() {
    let library = Arc::new(MemoryFormat::new(vec![
        vec!["a", "b", "c"],
        vec!["d"],
        vec![],
        vec!["e", "f"],
    ]));
    let ctx = memory_context(library);
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();
    assert_eq!(reader.fraction_consumed(), 0.0);

    let mut fractions = Vec::new();
    let mut more = reader.start().unwrap();
    while more {
        let f = reader.fraction_consumed();
        assert!((0.0..=1.0).contains(&f));
        fractions.push(f);
        assert_eq!(reader.split_points_remaining(), 1);
        more = reader.advance().unwrap();
    }
    assert_eq!(fractions.len(), 6);
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]), "{fractions:?}");
    assert!(fractions.iter().all(|f| *f < 1.0), "{fractions:?}");
    assert_eq!(reader.fraction_consumed(), 1.0);
    assert_eq!(reader.split_points_remaining(), 0);

    reader.close().unwrap();
    assert_eq!(reader.fraction_consumed(), 1.0);
}

#[test]
fn test_fraction_without_cursor_progress() {
    let library = Arc::new(MemoryFormat {
        no_progress: true,
        ..MemoryFormat::new(vec![vec!["a", "b"], vec!["c", "d"]])
    });
    let ctx = memory_context(library);
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();
    assert!(reader.start().unwrap());
    assert_eq!(reader.fraction_consumed(), 0.0);
    assert!(reader.advance().unwrap());
    assert_eq!(reader.fraction_consumed(), 0.0);
    assert!(reader.advance().unwrap());
    assert_eq!(reader.fraction_consumed(), 0.5);

    reader.close().unwrap();
    assert_eq!(reader.fraction_consumed(), 0.5);
}

#[test]
fn test_text_reader_progress() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "a.txt", &numbered_lines(50));
    let ctx = SourceContext::builder().min_bundle_size(1).build();
    let source = BoundedSource::text(path.to_str().unwrap());

    let mut reader = source.create_reader(&ctx).unwrap();
    let mut last = reader.fraction_consumed();
    let mut count = 0;
    let mut more = reader.start().unwrap();
    while more {
        let f = reader.fraction_consumed();
        assert!(f >= last);
        last = f;
        count += 1;
        more = reader.advance().unwrap();
    }
    assert_eq!(count, 50);
    assert_eq!(reader.fraction_consumed(), 1.0);
}

#[test]
fn test_split_at_fraction_declines() {
    let ctx = memory_context(Arc::new(MemoryFormat::numbered(3)));
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();
    assert!(reader.start().unwrap());
    assert!(reader.split_at_fraction(0.5).is_none());
    assert_eq!(reader.split_points_remaining(), 1);
    assert!(reader.advance().unwrap());
}

// --- failures ---

#[test]
fn test_backend_failure_closes_cursor() {
    let library = Arc::new(MemoryFormat {
        fail_at: Some((1, 1)),
        ..MemoryFormat::new(vec![vec!["a"], vec!["b", "c"], vec!["d"]])
    });
    let ctx = memory_context(library.clone());
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();

    assert!(reader.start().unwrap());
    assert!(reader.advance().unwrap());
    let err = reader.advance().unwrap_err();
    assert!(matches!(err, SourceError::Read { .. }));
    assert!(!err.is_interrupted());
    assert!(matches!(reader.current(), Err(SourceError::NoCurrentElement)));
    assert_eq!(library.opened(), 2);
    assert_eq!(library.closed(), 2);
}

#[test]
fn test_failed_reader_does_not_resume() {
    let library = Arc::new(MemoryFormat {
        fail_at: Some((0, 1)),
        ..MemoryFormat::new(vec![vec!["a", "b"], vec!["c"]])
    });
    let ctx = memory_context(library.clone());
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();

    assert!(reader.start().unwrap());
    let before = reader.fraction_consumed();
    assert!(reader.advance().is_err());
    assert_eq!(reader.state(), ReaderState::Failed);
    assert_eq!(reader.split_points_remaining(), 0);
    assert_eq!(reader.fraction_consumed(), before);

    // The next split is never opened.
    assert!(matches!(
        reader.advance(),
        Err(SourceError::IllegalState { op: "advance", state: "failed" })
    ));
    assert_eq!(library.opened(), 1);

    reader.close().unwrap();
    assert_eq!(reader.state(), ReaderState::Closed);
    assert_eq!(reader.fraction_consumed(), before);
}

#[test]
fn test_interruption_becomes_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "a.txt", &numbered_lines(10));
    let interrupt = InterruptFlag::new();
    let ctx = SourceContext::builder().interrupt(interrupt.clone()).build();
    let source = BoundedSource::text(path.to_str().unwrap());

    let mut reader = source.create_reader(&ctx).unwrap();
    assert!(reader.start().unwrap());
    interrupt.raise();
    let err = reader.advance().unwrap_err();
    assert!(err.is_interrupted(), "{err}");
    assert!(interrupt.is_raised());
    reader.close().unwrap();
}

#[test]
fn test_interrupted_before_first_split() {
    let interrupt = InterruptFlag::new();
    interrupt.raise();
    let library = Arc::new(MemoryFormat::numbered(2));
    let ctx = SourceContext::builder()
        .format(library.clone())
        .split_decoder(common::MemorySplit::TYPE_TAG, common::MemorySplit::decode)
        .interrupt(interrupt)
        .build();
    let source = memory_source();
    let mut reader = source.create_reader(&ctx).unwrap();
    let err = reader.start().unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(library.opened(), 0);
}

#[test]
fn test_missing_file_fails_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "a.txt", "a\nb\n");
    let ctx = SourceContext::default();
    let bundle = BoundedSource::text(path.to_str().unwrap())
        .split_into_bundles(1, &ctx)
        .unwrap()
        .remove(0);
    std::fs::remove_file(&path).unwrap();

    let mut reader = bundle.create_reader(&ctx).unwrap();
    assert!(matches!(reader.start(), Err(SourceError::Read { .. })));
    assert_eq!(reader.state(), ReaderState::Failed);
}
