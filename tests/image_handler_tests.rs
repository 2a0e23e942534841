// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for ImageHandler over temporary directories

use framefeed::errors::{HandlerError, TransformError};
use framefeed::{Frame, HandlerState, ImageHandler, Transform, filters};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    StopOthers,
    Opened,
    Frame(PathBuf, u32, u32),
    Closed,
    Failed(String),
}

type Events = Arc<Mutex<Vec<Event>>>;

/// Record every event; frames are tagged with the handler's current file
fn record(handler: &ImageHandler) -> Events {
    let events: Events = Arc::default();
    let signals = handler.signals();

    let log = Arc::clone(&events);
    signals
        .stop_other_activities
        .connect(move |_| log.lock().unwrap().push(Event::StopOthers));
    let log = Arc::clone(&events);
    signals
        .opened
        .connect(move |_| log.lock().unwrap().push(Event::Opened));
    let log = Arc::clone(&events);
    let current = handler.clone();
    signals.frame_ready.connect(move |frame| {
        let name = current.file_name().unwrap_or_default();
        log.lock()
            .unwrap()
            .push(Event::Frame(name, frame.width, frame.height))
    });
    let log = Arc::clone(&events);
    signals
        .closed
        .connect(move |_| log.lock().unwrap().push(Event::Closed));
    let log = Arc::clone(&events);
    signals
        .failed
        .connect(move |reason| log.lock().unwrap().push(Event::Failed(reason.clone())));

    events
}

fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    Frame::filled(width, height, [10, 20, 30]).save(&path).unwrap();
    path
}

fn frame_files(events: &Events) -> Vec<String> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            Event::Frame(path, ..) => Some(path.file_name()?.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn failures(events: &Events) -> Vec<String> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            Event::Failed(reason) => Some(reason.clone()),
            _ => None,
        })
        .collect()
}

fn mixed_directory() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_image(dir.path(), "c.jpg", 3, 2);
    write_image(dir.path(), "a.png", 4, 4);
    write_image(dir.path(), ".hidden.png", 4, 4);
    std::fs::write(dir.path().join("b.txt"), "plain text, no image").unwrap();
    dir
}

#[test]
fn test_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "photo.png", 8, 6);
    let handler = ImageHandler::with_path(&path);
    let events = record(&handler);
    assert_eq!(handler.file_name(), None);

    handler.start();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            Event::StopOthers,
            Event::Opened,
            Event::Frame(path.clone(), 8, 6)
        ]
    );
    assert!(!handler.is_active());
    assert_eq!(handler.file_name(), Some(path));
    assert_eq!(handler.state(), HandlerState::Idle);

    handler.stop();
    assert_eq!(events.lock().unwrap().last(), Some(&Event::Closed));
    handler.signals().disconnect_all();
}

#[test]
fn test_directory_walk_skips_hidden_and_non_images() {
    let dir = mixed_directory();
    let handler = ImageHandler::with_path(dir.path());
    let events = record(&handler);

    handler.start();

    assert_eq!(frame_files(&events), ["a.png", "c.jpg"]);
    assert!(failures(&events).is_empty());
    assert_eq!(
        handler.file_name().as_deref(),
        Some(dir.path().join("c.jpg").as_path())
    );
    handler.signals().disconnect_all();
}

#[test]
fn test_corrupt_single_file_fails_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, "definitely not a png").unwrap();
    let handler = ImageHandler::with_path(&path);
    let events = record(&handler);

    handler.start();

    assert!(!handler.is_active());
    let failed = failures(&events);
    assert_eq!(failed.len(), 1);
    assert!(failed[0].starts_with(&format!("Failed to open image at {}", path.display())));
    assert!(frame_files(&events).is_empty());
    handler.signals().disconnect_all();
}

#[test]
fn test_missing_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nowhere");
    let handler = ImageHandler::with_path(&path);
    let events = record(&handler);

    handler.start();

    assert_eq!(
        failures(&events),
        [format!("Path does not exist: {}", path.display())]
    );
    handler.signals().disconnect_all();
}

#[test]
fn test_transform_error_continues_batch() {
    let dir = mixed_directory();
    let handler = ImageHandler::with_path(dir.path());
    let events = record(&handler);
    handler.add_transform(Transform::new("square_only", |frame: Frame| {
        if frame.width == frame.height {
            Ok(frame)
        } else {
            Err(TransformError::new("not square"))
        }
    }));

    handler.start();

    assert_eq!(frame_files(&events), ["a.png"]);
    let failed = failures(&events);
    assert_eq!(failed.len(), 1);
    assert!(failed[0].contains("c.jpg"));
    assert!(failed[0].contains("not square"));
    handler.signals().disconnect_all();
}

#[test]
fn test_transform_chain_applies() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "wide.png", 8, 4);
    let handler = ImageHandler::with_path(&path);
    let events = record(&handler);
    handler.add_transform(filters::resize(2, 2));
    handler.add_transform(filters::grayscale());

    handler.start();

    assert_eq!(
        events.lock().unwrap().last(),
        Some(&Event::Frame(path, 2, 2))
    );
    handler.signals().disconnect_all();
}

#[test]
fn test_active_only_while_processing() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["1.png", "2.png"] {
        write_image(dir.path(), name, 2, 2);
    }
    let handler = ImageHandler::with_path(dir.path());
    assert!(!handler.is_active());

    let seen: Arc<Mutex<Vec<(bool, HandlerState)>>> = Arc::default();
    let log = Arc::clone(&seen);
    let observed = handler.clone();
    handler.signals().frame_ready.connect(move |_| {
        log.lock()
            .unwrap()
            .push((observed.is_active(), observed.state()))
    });

    handler.start();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(true, HandlerState::Active), (true, HandlerState::Active)]
    );
    assert!(!handler.is_active());
    assert_eq!(handler.state(), HandlerState::Idle);
    handler.signals().disconnect_all();
}

#[test]
fn test_stop_mid_batch() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["1.png", "2.png", "3.png"] {
        write_image(dir.path(), name, 2, 2);
    }
    let handler = ImageHandler::with_path(dir.path());
    let events = record(&handler);
    let stopper = handler.clone();
    handler.signals().frame_ready.connect(move |_| stopper.stop());

    handler.start();

    assert_eq!(frame_files(&events), ["1.png"]);
    assert_eq!(events.lock().unwrap().last(), Some(&Event::Closed));
    assert_eq!(handler.state(), HandlerState::Stopped);

    // Nothing left to close
    handler.stop();
    let closed = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| **e == Event::Closed)
        .count();
    assert_eq!(closed, 1);
    handler.signals().disconnect_all();
}

#[test]
fn test_start_while_processing_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write_image(dir.path(), "only.png", 2, 2);
    let handler = ImageHandler::with_path(dir.path());
    let events = record(&handler);
    let nested = handler.clone();
    handler.signals().frame_ready.connect(move |_| nested.start());

    handler.start();

    let opened = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| **e == Event::Opened)
        .count();
    assert_eq!(opened, 1);
    assert_eq!(frame_files(&events), ["only.png"]);
    handler.signals().disconnect_all();
}

#[test]
fn test_remove_transform_not_found() {
    let handler = ImageHandler::new();
    handler.add_transform(filters::mirror_horizontal());
    assert_eq!(
        handler.remove_transform(&filters::mirror_horizontal()),
        Err(HandlerError::NotFound)
    );
    assert_eq!(handler.transform_count(), 1);
}
