//! Actuator scheduler timing tests on the paused tokio clock

mod helpers;

use bmbb_ap::motion::{Line, MotionEnd, MotionScheduler, MotionSettings};
use bmbb_common::{Instruction, Movement};
use helpers::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Timer wheel resolution on the paused clock
const SLACK_MS: u128 = 2;

fn assert_near(actual: u128, expected: u128) {
    assert!(
        actual >= expected && actual <= expected + SLACK_MS,
        "expected ~{}ms, got {}ms",
        expected,
        actual
    );
}

fn script(items: &[(Movement, i64)]) -> Arc<[Instruction]> {
    items
        .iter()
        .map(|&(kind, ms)| Instruction::new(kind, ms))
        .collect::<Vec<_>>()
        .into()
}

fn scheduler(lines: &RecordingLines, settings: MotionSettings) -> MotionScheduler {
    let scheduler = MotionScheduler::new(Box::new(lines.clone()), settings).unwrap();
    lines.clear();
    scheduler
}

#[tokio::test(start_paused = true)]
async fn test_construction_rests_every_line() {
    let lines = RecordingLines::new();
    let _scheduler = MotionScheduler::new(Box::new(lines.clone()), MotionSettings::default()).unwrap();

    let events = lines.events();
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| !e.active));
}

#[tokio::test(start_paused = true)]
async fn test_mouth_then_release_timing() {
    let lines = RecordingLines::new();
    let mut scheduler = scheduler(&lines, MotionSettings::default());

    scheduler
        .start(
            script(&[(Movement::Mouth, 1000), (Movement::Release, 1100)]),
            Instant::now(),
        )
        .unwrap();
    let report = scheduler.wait().await.unwrap().unwrap();
    assert_eq!(report.dispatched, 2);
    assert_eq!(report.end, MotionEnd::Exhausted);

    let mouth = lines.of(Line::Mouth1);
    assert_eq!(mouth.len(), 2);
    assert!(mouth[0].active);
    assert_near(mouth[0].at_ms(), 1000);
    assert!(!mouth[1].active);
    assert_near(mouth[1].at_ms(), 1100);

    let body: Vec<_> = lines
        .events()
        .into_iter()
        .filter(|e| matches!(e.line, Line::Body0 | Line::Body1))
        .collect();
    assert_eq!(body.len(), 2);
    assert!(body.iter().all(|e| !e.active));
    assert_near(body[0].at_ms(), 1100);
}

#[tokio::test(start_paused = true)]
async fn test_head_and_tail_drive_opposing_lines() {
    let lines = RecordingLines::new();
    let mut scheduler = scheduler(&lines, MotionSettings::default());

    scheduler
        .start(
            script(&[(Movement::Head, 0), (Movement::Tail, 500)]),
            Instant::now(),
        )
        .unwrap();
    scheduler.wait().await.unwrap().unwrap();

    let steps: Vec<(Line, bool)> = lines.events().iter().map(|e| (e.line, e.active)).collect();
    assert_eq!(
        steps,
        vec![
            (Line::Body1, false),
            (Line::Body0, true),
            (Line::Body0, false),
            (Line::Body1, true),
            (Line::Body1, false),
        ]
    );
    let tail_end = lines.of(Line::Body1).last().copied().unwrap();
    assert_near(tail_end.at_ms(), 600);
}

#[tokio::test(start_paused = true)]
async fn test_negative_offsets_fire_immediately() {
    let lines = RecordingLines::new();
    let mut scheduler = scheduler(&lines, MotionSettings::default());

    scheduler
        .start(
            script(&[(Movement::Head, -150), (Movement::Release, -10)]),
            Instant::now(),
        )
        .unwrap();
    scheduler.wait().await.unwrap().unwrap();

    let events = lines.events();
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e.at_ms() == 0));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_offsets_are_not_resorted() {
    let lines = RecordingLines::new();
    let mut scheduler = scheduler(&lines, MotionSettings::default());

    scheduler
        .start(
            script(&[(Movement::Head, 800), (Movement::Release, 200)]),
            Instant::now(),
        )
        .unwrap();
    scheduler.wait().await.unwrap().unwrap();

    let events = lines.events();
    // HEAD first at 800, RELEASE already overdue right after it
    assert_eq!((events[1].line, events[1].active), (Line::Body0, true));
    assert_near(events[1].at_ms(), 800);
    assert_near(events.last().unwrap().at_ms(), 800);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_sleep_releases_lines() {
    let lines = RecordingLines::new();
    let mut scheduler = scheduler(&lines, MotionSettings::default());

    scheduler
        .start(
            script(&[(Movement::Head, 0), (Movement::Mouth, 5000)]),
            Instant::now(),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(scheduler.is_busy());

    let report = scheduler.cancel().await.unwrap().unwrap();
    assert_eq!(report.end, MotionEnd::Cancelled);
    assert_eq!(report.dispatched, 1);
    assert!(!scheduler.is_busy());

    // Sleep raced the token: nothing waited for the 5s deadline
    let last = lines.events();
    let rest = &last[last.len() - 4..];
    assert!(rest.iter().all(|e| !e.active));
    assert_near(rest[0].at_ms(), 1000);
    assert!(lines.of(Line::Mouth1).iter().all(|e| !e.active));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_hold_closes_mouth() {
    let lines = RecordingLines::new();
    let mut scheduler = scheduler(&lines, MotionSettings::default());

    scheduler
        .start(script(&[(Movement::Mouth, 0)]), Instant::now())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = scheduler.cancel().await.unwrap().unwrap();

    assert_eq!(report.end, MotionEnd::Cancelled);
    assert_eq!(report.dispatched, 1);
    let mouth = lines.of(Line::Mouth1);
    assert!(mouth[0].active);
    assert!(!mouth[1].active);
    assert_near(mouth[1].at_ms(), 50);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_without_release_leaves_lines_alone() {
    let lines = RecordingLines::new();
    let settings = MotionSettings {
        release_on_cancel: false,
        ..MotionSettings::default()
    };
    let mut scheduler = scheduler(&lines, settings);

    scheduler
        .start(
            script(&[(Movement::Head, 0), (Movement::Release, 5000)]),
            Instant::now(),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.cancel().await.unwrap().unwrap();

    let events = lines.events();
    assert_eq!(events.len(), 2);
    assert_eq!((events[1].line, events[1].active), (Line::Body0, true));
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_completion() {
    let lines = RecordingLines::new();
    let mut scheduler = scheduler(&lines, MotionSettings::default());

    scheduler
        .start(script(&[(Movement::Head, 10)]), Instant::now())
        .unwrap();
    scheduler.wait().await.unwrap().unwrap();
    scheduler
        .start(script(&[(Movement::Release, 10)]), Instant::now())
        .unwrap();
    let report = scheduler.wait().await.unwrap().unwrap();
    assert_eq!(report.dispatched, 1);
}
