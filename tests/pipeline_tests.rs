//! Bundle pipeline: concurrent reads, fail-fast, and CLI settings resolution.

mod common;

use clap::Parser;
use common::{
    MemoryFormat, expected_lines, memory_context, memory_source, numbered_lines, write_file,
};
use splitsrc::engine::{Cli, CliOpts, Commands, load_bundles};
use splitsrc::pipeline::{read_bundles, tuning_for_bundles};
use splitsrc::{
    BoundedSource, Datum, InterruptFlag, RecordKind, SourceContext, SplitOrder, TypeTag, read_all,
};
use std::sync::Arc;

fn as_lines(records: Vec<splitsrc::KvPair>) -> Vec<(u64, String)> {
    let mut lines: Vec<(u64, String)> = records
        .into_iter()
        .map(|pair| match (pair.key, pair.value) {
            (Datum::Long(k), Datum::Text(v)) => (k, v),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    lines.sort();
    lines
}

// --- read_bundles ---

#[test]
fn test_read_bundles_collects_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let contents = numbered_lines(200);
    let path = write_file(dir.path(), "a.txt", &contents);
    let ctx = SourceContext::builder().min_bundle_size(1).build();
    let bundles = BoundedSource::text(path.to_str().unwrap())
        .split_into_bundles(128, &ctx)
        .unwrap();
    let bundle_count = bundles.len();
    assert!(bundle_count > 4);

    let mut records = Vec::new();
    let summary = read_bundles(bundles, &ctx, Some(3), None, |pair| {
        records.push(pair.clone());
        Ok(())
    })
    .unwrap();
    assert_eq!(summary.bundles, bundle_count);
    assert_eq!(summary.records, 200);
    assert_eq!(as_lines(records), expected_lines(&contents));
}

#[test]
fn test_read_all_with_default_threads() {
    let dir = tempfile::tempdir().unwrap();
    let first = numbered_lines(30);
    write_file(dir.path(), "part-0", &first);
    write_file(dir.path(), "part-1", &first);
    let ctx = SourceContext::builder().min_bundle_size(1).build();
    let source = BoundedSource::text(format!("{}/part-*", dir.path().display()));

    let records = read_all(&source, 50, &ctx, None).unwrap();
    assert_eq!(records.len(), 60);
}

#[test]
fn test_read_bundles_with_no_bundles() {
    let ctx = SourceContext::default();
    let summary = read_bundles(Vec::new(), &ctx, None, None, |_| Ok(())).unwrap();
    assert_eq!(summary.records, 0);
    assert_eq!(summary.bundles, 0);
}

#[test]
fn test_worker_failure_fails_the_read() {
    let library = Arc::new(MemoryFormat {
        fail_at: Some((3, 0)),
        ..MemoryFormat::numbered(8)
    });
    let ctx = memory_context(library);
    let bundles = memory_source().split_into_bundles(1, &ctx).unwrap();
    let err = read_bundles(bundles, &ctx, Some(2), None, |_| Ok(())).unwrap_err();
    assert!(err.to_string().contains("backend exploded"), "{err}");
    // Stopping the run must not leave the caller's flag raised.
    assert!(!ctx.interrupt().is_raised());
}

#[test]
fn test_context_reads_again_after_a_failed_run() {
    let library = Arc::new(MemoryFormat::numbered(6));
    let ctx = memory_context(library);
    let bundles = memory_source().split_into_bundles(1, &ctx).unwrap();

    let err = read_bundles(bundles.clone(), &ctx, Some(2), None, |_| {
        anyhow::bail!("downstream full")
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "downstream full");
    assert!(!ctx.interrupt().is_raised());

    let summary = read_bundles(bundles.clone(), &ctx, Some(2), None, |_| Ok(())).unwrap();
    assert_eq!(summary.records, 6);
    assert_eq!(summary.bundles, 6);

    // A single reader on the same context is unaffected too.
    let mut reader = bundles[0].create_reader(&ctx).unwrap();
    assert!(reader.start().unwrap());
}

#[test]
fn test_caller_interrupt_reaches_workers() {
    let library = Arc::new(MemoryFormat::numbered(4));
    let ctx = memory_context(library.clone());
    let bundles = memory_source().split_into_bundles(1, &ctx).unwrap();
    ctx.interrupt().raise();

    let err = read_bundles(bundles, &ctx, Some(2), None, |_| Ok(())).unwrap_err();
    assert!(err.to_string().contains("interrupted"), "{err}");
    assert_eq!(library.opened(), 0);
}

#[test]
fn test_child_flag_sees_parent_but_not_the_reverse() {
    let parent = InterruptFlag::new();
    let child = parent.child();
    let grandchild = child.child();
    grandchild.raise();
    assert!(grandchild.is_raised());
    assert!(!child.is_raised());
    assert!(!parent.is_raised());

    parent.raise();
    assert!(child.is_raised());
    assert!(child.child().is_raised());
}

#[test]
fn test_consumer_failure_stops_the_read() {
    let library = Arc::new(MemoryFormat::numbered(50));
    let ctx = memory_context(library);
    let bundles = memory_source().split_into_bundles(1, &ctx).unwrap();
    let mut seen = 0;
    let err = read_bundles(bundles, &ctx, Some(4), None, |_| {
        seen += 1;
        if seen == 5 {
            anyhow::bail!("downstream full");
        }
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "downstream full");
    assert_eq!(seen, 5);
}

#[test]
fn test_tuning_never_exceeds_bundles() {
    assert_eq!(tuning_for_bundles(2, Some(16)).num_threads, 2);
    assert_eq!(tuning_for_bundles(0, Some(16)).num_threads, 1);
    assert_eq!(tuning_for_bundles(100, Some(3)).num_threads, 3);
}

// --- planned bundles on disk ---

#[test]
fn test_load_bundles_from_plan_output() {
    let dir = tempfile::tempdir().unwrap();
    let contents = numbered_lines(40);
    let path = write_file(dir.path(), "data/a.txt", &contents);
    let ctx = SourceContext::builder().min_bundle_size(1).build();
    let bundles = BoundedSource::text(path.to_str().unwrap())
        .split_into_bundles(100, &ctx)
        .unwrap();
    let plan: String = bundles
        .iter()
        .map(|b| format!("{}\n\n", b.to_json().unwrap()))
        .collect();
    let plan_path = write_file(dir.path(), "plan.jsonl", &plan);

    let loaded = load_bundles(&plan_path).unwrap();
    assert_eq!(loaded, bundles);
    let mut records = Vec::new();
    read_bundles(loaded, &ctx, Some(2), None, |pair| {
        records.push(pair.clone());
        Ok(())
    })
    .unwrap();
    assert_eq!(as_lines(records), expected_lines(&contents));

    let bad = write_file(dir.path(), "bad.jsonl", "{not json}\n");
    assert!(load_bundles(&bad).is_err());
}

// --- CLI settings ---

fn common_args(args: &[&str]) -> splitsrc::engine::CommonArgs {
    match Cli::try_parse_from(args).unwrap().command {
        Commands::Size { common }
        | Commands::Plan { common, .. }
        | Commands::Read { common, .. } => common,
    }
}

#[test]
fn test_cli_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let opts = CliOpts::resolve(dir.path(), &common_args(&["splitsrc", "size", "/data"]));
    assert_eq!(opts.format, "text");
    assert_eq!(opts.key_type, TypeTag::Record(RecordKind::Long));
    assert_eq!(opts.value_type, TypeTag::Record(RecordKind::Text));
    assert_eq!(opts.split_order(), SplitOrder::Shuffle);
    assert!(opts.overrides.is_empty());
}

#[test]
fn test_cli_flags_override_config_file() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        ".splitsrc.toml",
        r#"
[settings]
format = "memory"
value_type = "bytes"
bundle_size = 4096
order = "discovery"
threads = 3

[overrides]
"fileformat.block.size" = 1024
"textformat.record.delimiter" = "|"
"#,
    );

    let from_file = CliOpts::resolve(dir.path(), &common_args(&["splitsrc", "plan", "/data"]));
    assert_eq!(from_file.format, "memory");
    assert_eq!(from_file.value_type, TypeTag::Record(RecordKind::Bytes));
    assert_eq!(from_file.bundle_size, 4096);
    assert_eq!(from_file.threads, Some(3));
    assert_eq!(from_file.split_order(), SplitOrder::Discovery);
    assert_eq!(from_file.overrides["fileformat.block.size"], "1024");
    assert_eq!(from_file.overrides["textformat.record.delimiter"], "|");

    let args = common_args(&[
        "splitsrc",
        "read",
        "/data",
        "--format",
        "text",
        "--order",
        "shuffle",
        "--seed",
        "9",
        "-b",
        "10",
        "-D",
        "fileformat.block.size=2048",
        "--suppress-remote",
    ]);
    let opts = CliOpts::resolve(dir.path(), &args);
    assert_eq!(opts.format, "text");
    assert_eq!(opts.bundle_size, 10);
    assert_eq!(opts.split_order(), SplitOrder::Seeded(9));
    assert_eq!(opts.overrides["fileformat.block.size"], "2048");
    assert!(opts.suppress_remote);

    let ctx = opts.context(InterruptFlag::new());
    assert!(ctx.suppress_remote_listing());
    assert_eq!(ctx.split_order(), SplitOrder::Seeded(9));
    assert_eq!(opts.source("/data").resource(), Some("/data"));
}

#[test]
fn test_cli_rejects_malformed_define() {
    assert!(Cli::try_parse_from(["splitsrc", "size", "/data", "-D", "novalue"]).is_err());
}
