// This file is part of LaminaDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use laminadb::engine::Appender;
use laminadb::model::{EventInput, ExpectedPosition};
use laminadb::storage::MemoryContainer;
use laminadb::Error;

use rstest::rstest;
use serde_json::json;

fn input(id: &str) -> EventInput {
    EventInput::new(id, "Ping", json!(null))
}

/// An appender over a stream that already holds `count` events.
fn seeded(count: usize) -> Appender<MemoryContainer> {
    let mut appender = Appender::new(MemoryContainer::new());
    let batch: Vec<EventInput> = (0..count).map(|i| input(&format!("seed-{i}"))).collect();
    if !batch.is_empty() {
        appender
            .append("s-1", ExpectedPosition::NoStream, &batch)
            .expect("seeding failed");
    }
    appender
}

#[rstest]
#[case::any(ExpectedPosition::Any, true)]
#[case::no_stream(ExpectedPosition::NoStream, true)]
#[case::exact_first(ExpectedPosition::Exact(1), true)]
#[case::exact_too_far(ExpectedPosition::Exact(2), false)]
fn test_expectations_against_an_empty_stream(
    #[case] expected: ExpectedPosition,
    #[case] should_succeed: bool,
) {
    let mut appender = seeded(0);
    let result = appender.append("s-1", expected, &[input("e1")]);
    assert_eq!(result.is_ok(), should_succeed, "expectation: {expected:?}");
}

#[rstest]
#[case::any(ExpectedPosition::Any, true)]
#[case::no_stream(ExpectedPosition::NoStream, false)]
#[case::exact_next(ExpectedPosition::Exact(3), true)]
#[case::exact_stale(ExpectedPosition::Exact(2), false)]
#[case::exact_ahead(ExpectedPosition::Exact(7), false)]
fn test_expectations_against_a_stream_with_two_events(
    #[case] expected: ExpectedPosition,
    #[case] should_succeed: bool,
) {
    let mut appender = seeded(2);
    let result = appender.append("s-1", expected, &[input("e1")]);
    assert_eq!(result.is_ok(), should_succeed, "expectation: {expected:?}");
}

#[test]
fn test_no_stream_violation_reports_stream_exists() {
    let mut appender = seeded(2);

    let err = appender
        .append("s-1", ExpectedPosition::NoStream, &[input("e1")])
        .unwrap_err();

    match &err {
        Error::StreamExists { stream_id, next } => {
            assert_eq!(stream_id, "s-1");
            assert_eq!(*next, 3);
        }
        other => panic!("expected StreamExists, got {other:?}"),
    }
    assert_eq!(err.code(), "STREAMEXISTS");
}

#[test]
fn test_stale_exact_reports_position_mismatch() {
    let mut appender = seeded(2);

    let err = appender
        .append("s-1", ExpectedPosition::Exact(2), &[input("e1")])
        .unwrap_err();

    match &err {
        Error::PositionMismatch {
            stream_id,
            expected,
            next,
        } => {
            assert_eq!(stream_id, "s-1");
            assert_eq!(*expected, 2);
            assert_eq!(*next, 3);
        }
        other => panic!("expected PositionMismatch, got {other:?}"),
    }
    assert_eq!(err.code(), "POSITIONNOTMATCH");
}

#[test]
fn test_failed_precondition_writes_nothing() {
    let mut appender = seeded(2);
    // 2 events + 1 metadata record.
    assert_eq!(appender.container().len(), 3);

    appender
        .append("s-1", ExpectedPosition::Exact(9), &[input("e1"), input("e2")])
        .unwrap_err();

    assert_eq!(appender.container().len(), 3);
}

#[test]
fn test_any_mode_never_fails_on_precondition() {
    let mut appender = seeded(0);
    for i in 0..5u64 {
        let receipts = appender
            .append("s-1", ExpectedPosition::Any, &[input(&format!("e{i}"))])
            .unwrap();
        assert_eq!(receipts[0].position, i + 1);
    }
}

#[test]
fn test_interleaved_writers_one_observes_stale_position() {
    // Two logical writers both read last position 1, then race their
    // appends; the second one's expectation is stale by the time it runs.
    let mut appender = seeded(1);

    appender
        .append("s-1", ExpectedPosition::Exact(2), &[input("writer-a")])
        .unwrap();
    let err = appender
        .append("s-1", ExpectedPosition::Exact(2), &[input("writer-b")])
        .unwrap_err();

    assert_eq!(err.code(), "POSITIONNOTMATCH");
    assert_eq!(appender.container().find("s-1", "Event").len(), 2);
}
