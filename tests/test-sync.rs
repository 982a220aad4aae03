use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tailmux::{Delivery, Error, FlushPolicy, Tail, TailConfig};
use tempfile::tempdir;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn fast_config() -> TailConfig {
    TailConfig {
        debounce: ms(50),
        step: ms(10),
        ..Default::default()
    }
}

fn append(path: &Path, content: &str) {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.sync_all().unwrap();
}

fn write_soon(path: &Path, delay: Duration, content: &'static str) -> thread::JoinHandle<()> {
    let path = path.to_path_buf();
    thread::spawn(move || {
        thread::sleep(delay);
        append(&path, content);
    })
}

fn pairs(batch: tailmux::Batch) -> Vec<(String, PathBuf)> {
    batch.into_iter().map(|l| l.into_inner()).collect()
}

fn expect_data(delivery: Delivery) -> tailmux::Batch {
    match delivery {
        Delivery::Data(batch) => batch,
        other => panic!("expected data, got {:?}", other),
    }
}

#[test]
fn test_single_fragment_delivered() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.log");
    File::create(&path).unwrap();
    let canonical = path.canonicalize().unwrap();

    let mut tail = Tail::with_config([&path], fast_config()).unwrap();
    let writer = write_soon(&path, ms(100), "dummy");

    let batch = expect_data(tail.read_next(ms(50), ms(10), ms(5000)).unwrap());
    writer.join().unwrap();

    assert_eq!(pairs(batch), vec![("dummy".to_string(), canonical)]);
}

#[test]
fn test_two_files_one_window() {
    let dir = tempdir().unwrap();
    let path1 = dir.path().join("one.log");
    let path2 = dir.path().join("two.log");
    File::create(&path1).unwrap();
    File::create(&path2).unwrap();
    let canon1 = path1.canonicalize().unwrap();
    let canon2 = path2.canonicalize().unwrap();

    let mut tail = Tail::with_config([&path1, &path2], fast_config()).unwrap();

    let writer = {
        let (path1, path2) = (path1.clone(), path2.clone());
        thread::spawn(move || {
            thread::sleep(ms(50));
            append(&path1, "a\nb\n");
            append(&path2, "c\n");
        })
    };

    // Both writes land well inside one debounce window, so a single pull
    // returns all three lines: file1's hit the disk before file2's, and each
    // polling round visits files in registration order.
    let batch = expect_data(tail.read_next(ms(500), ms(50), ms(5000)).unwrap());
    writer.join().unwrap();

    assert_eq!(
        pairs(batch),
        vec![
            ("a".to_string(), canon1.clone()),
            ("b".to_string(), canon1),
            ("c".to_string(), canon2),
        ]
    );
}

#[test]
fn test_outer_timeout_marker() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quiet.log");
    File::create(&path).unwrap();

    let mut tail = Tail::with_config([&path], fast_config()).unwrap();

    let started = Instant::now();
    let delivery = tail.read_next(ms(50), ms(10), ms(100)).unwrap();

    assert!(matches!(delivery, Delivery::Timeout));
    assert!(started.elapsed() >= ms(100));
}

#[test]
fn test_zero_timeout_waits_indefinitely() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("patient.log");
    File::create(&path).unwrap();

    let mut tail = Tail::with_config([&path], fast_config()).unwrap();

    // The write lands long after a 100ms-scale timeout would have fired; a
    // zero outer timeout must keep waiting and deliver data, never Timeout.
    let writer = write_soon(&path, ms(400), "patience\n");

    let started = Instant::now();
    let batch = expect_data(tail.read_next(ms(50), ms(10), Duration::ZERO).unwrap());
    writer.join().unwrap();

    assert!(started.elapsed() >= ms(400));
    let lines: Vec<_> = batch.iter().map(|l| l.line().to_string()).collect();
    assert_eq!(lines, vec!["patience"]);
}

#[test]
fn test_timeout_yields_empty_batch_when_configured() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quiet.log");
    File::create(&path).unwrap();

    let config = TailConfig {
        outer_timeout: ms(100),
        yield_on_timeout: true,
        ..fast_config()
    };
    let mut tail = Tail::with_config([&path], config).unwrap();

    let batch = tail.next().unwrap().unwrap();
    assert!(batch.is_empty());
}

#[test]
fn test_timeout_swallowed_by_default() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("slow.log");
    File::create(&path).unwrap();

    // The outer timeout elapses at least once before the write lands; the
    // iterator must keep polling rather than yield anything for it.
    let config = TailConfig {
        outer_timeout: ms(100),
        ..fast_config()
    };
    let mut tail = Tail::with_config([&path], config).unwrap();
    let writer = write_soon(&path, ms(300), "late\n");

    let batch = tail.next().unwrap().unwrap();
    writer.join().unwrap();

    let lines: Vec<_> = batch.iter().map(|l| l.line().to_string()).collect();
    assert_eq!(lines, vec!["late"]);
}

#[test]
fn test_interrupt_surfaces_within_a_step() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.log");
    File::create(&path).unwrap();

    let mut tail = Tail::with_config([&path], fast_config()).unwrap();
    let handle = tail.interrupt_handle();
    let tripper = thread::spawn(move || {
        thread::sleep(ms(50));
        handle.interrupt();
    });

    let started = Instant::now();
    let delivery = tail.read_next(ms(50), ms(10), ms(5000)).unwrap();
    tripper.join().unwrap();

    assert!(matches!(delivery, Delivery::Interrupted));
    assert!(started.elapsed() < ms(1000));
}

#[test]
fn test_interrupt_discards_collected_batch() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.log");
    File::create(&path).unwrap();

    let mut tail = Tail::with_config([&path], fast_config()).unwrap();
    let handle = tail.interrupt_handle();

    // Queue two lines and let the engine deliver them before the pull
    // starts, so the first polling round collects them into the batch.
    append(&path, "doomed-1\ndoomed-2\n");
    thread::sleep(ms(100));

    // With a 150ms step the first round drains at ~150ms and the second
    // checks the interrupt at ~300ms; tripping at ~225ms lands in between.
    let tripper = thread::spawn(move || {
        thread::sleep(ms(225));
        handle.interrupt();
    });

    let delivery = tail.read_next(ms(5000), ms(150), ms(5000)).unwrap();
    tripper.join().unwrap();
    assert!(matches!(delivery, Delivery::Interrupted));

    // The collected lines are gone for good; only post-interrupt content
    // shows up in the next batch.
    append(&path, "after\n");
    let batch = expect_data(tail.read_next(ms(50), ms(10), ms(5000)).unwrap());
    let lines: Vec<_> = batch.iter().map(|l| l.line().to_string()).collect();
    assert_eq!(lines, vec!["after"]);
}

#[test]
fn test_interrupt_raised_by_iterator() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.log");
    File::create(&path).unwrap();

    let mut tail = Tail::with_config([&path], fast_config()).unwrap();
    tail.interrupt_handle().interrupt();

    assert!(matches!(tail.next(), Some(Err(Error::Interrupted))));
    assert!(tail.next().is_none());
}

#[test]
fn test_interrupt_quiet_stop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.log");
    File::create(&path).unwrap();

    let config = TailConfig {
        raise_interrupt: false,
        ..fast_config()
    };
    let mut tail = Tail::with_config([&path], config).unwrap();
    tail.interrupt_handle().interrupt();

    assert!(tail.next().is_none());
}

#[test]
fn test_no_loss_no_dup_across_bursts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("burst.log");
    File::create(&path).unwrap();

    let expected: Vec<String> = (0..30).map(|i| format!("line-{}", i)).collect();

    let mut tail = Tail::with_config([&path], fast_config()).unwrap();

    let writer = {
        let path = path.clone();
        let expected = expected.clone();
        thread::spawn(move || {
            for chunk in expected.chunks(10) {
                thread::sleep(ms(150));
                let mut content = String::new();
                for line in chunk {
                    content.push_str(line);
                    content.push('\n');
                }
                append(&path, &content);
            }
        })
    };

    let mut got = Vec::new();
    for batch in &mut tail {
        for line in batch.unwrap() {
            got.push(line.line().to_string());
        }
        if got.len() >= expected.len() {
            break;
        }
    }
    writer.join().unwrap();

    assert_eq!(got, expected);
}

#[test]
fn test_unterminated_line_withheld_until_completed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.log");
    File::create(&path).unwrap();

    let config = TailConfig {
        flush: FlushPolicy::Newline,
        ..fast_config()
    };
    let mut tail = Tail::with_config([&path], config).unwrap();

    let writer = {
        let path = path.clone();
        thread::spawn(move || {
            thread::sleep(ms(30));
            append(&path, "par");
            thread::sleep(ms(300));
            append(&path, "tial\n");
        })
    };

    let batch = expect_data(tail.read_next(ms(50), ms(10), ms(5000)).unwrap());
    writer.join().unwrap();

    let lines: Vec<_> = batch.iter().map(|l| l.line().to_string()).collect();
    assert_eq!(lines, vec!["partial"]);
}

#[test]
fn test_unterminated_fragment_dropped_at_close() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.log");
    File::create(&path).unwrap();

    let config = TailConfig {
        flush: FlushPolicy::Newline,
        ..fast_config()
    };
    let mut tail = Tail::with_config([&path], config).unwrap();

    append(&path, "never-completed");
    thread::sleep(ms(100));

    // The fragment stays buffered while the tail is open...
    let delivery = tail.read_next(ms(50), ms(10), ms(200)).unwrap();
    assert!(matches!(delivery, Delivery::Timeout));

    // ...and closing drops it rather than delivering it incomplete.
    tail.close();
    assert!(matches!(
        tail.read_next(ms(50), ms(10), ms(200)),
        Err(Error::Closed)
    ));
}

#[test]
fn test_truncation_discards_unread_partial_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rotated.log");
    File::create(&path).unwrap();

    let config = TailConfig {
        flush: FlushPolicy::Newline,
        ..fast_config()
    };
    let mut tail = Tail::with_config([&path], config).unwrap();

    append(&path, "a-long-unterminated-fragment-without-any-newline");

    // Nothing complete to deliver yet; the fragment stays buffered.
    let delivery = tail.read_next(ms(50), ms(10), ms(300)).unwrap();
    assert!(matches!(delivery, Delivery::Timeout));

    File::create(&path).unwrap(); // truncate
    append(&path, "fresh\n");

    let batch = expect_data(tail.read_next(ms(50), ms(10), ms(5000)).unwrap());
    let lines: Vec<_> = batch.iter().map(|l| l.line().to_string()).collect();
    assert_eq!(lines, vec!["fresh"]);
}

#[test]
fn test_add_file_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dup.log");
    File::create(&path).unwrap();

    let mut tail = Tail::with_config([&path, &path], fast_config()).unwrap();
    tail.add_file(&path).unwrap();

    let writer = write_soon(&path, ms(50), "once\n");
    let batch = expect_data(tail.read_next(ms(50), ms(10), ms(5000)).unwrap());
    writer.join().unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch.iter().next().unwrap().line(), "once");
}

#[test]
fn test_pending_file_created_after_registration() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("later.log");

    let mut tail = Tail::with_config([&path], fast_config()).unwrap();
    let writer = write_soon(&path, ms(100), "born\n");

    let batch = expect_data(tail.read_next(ms(50), ms(10), ms(5000)).unwrap());
    writer.join().unwrap();

    let lines: Vec<_> = batch.iter().map(|l| l.line().to_string()).collect();
    assert_eq!(lines, vec!["born"]);
}

#[test]
fn test_deleted_then_recreated_file_recovers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cycle.log");
    File::create(&path).unwrap();

    let mut tail = Tail::with_config([&path], fast_config()).unwrap();

    append(&path, "one\n");
    let batch = expect_data(tail.read_next(ms(50), ms(10), ms(5000)).unwrap());
    assert_eq!(batch.iter().next().unwrap().line(), "one");

    std::fs::remove_file(&path).unwrap();
    // Give the engine a few polling rounds to observe the deletion.
    thread::sleep(ms(150));

    append(&path, "two\n");
    let batch = expect_data(tail.read_next(ms(50), ms(10), ms(5000)).unwrap());
    let lines: Vec<_> = batch.iter().map(|l| l.line().to_string()).collect();
    assert_eq!(lines, vec!["two"]);
}

#[test]
fn test_from_start_delivers_existing_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.log");
    append(&path, "old\n");

    let config = TailConfig {
        from_start: true,
        ..fast_config()
    };
    let mut tail = Tail::with_config([&path], config).unwrap();

    let batch = expect_data(tail.read_next(ms(50), ms(10), ms(5000)).unwrap());
    let lines: Vec<_> = batch.iter().map(|l| l.line().to_string()).collect();
    assert_eq!(lines, vec!["old"]);
}

#[test]
fn test_all_paths_invalid_fails_construction() {
    let dir = tempdir().unwrap();

    let missing_parent = dir.path().join("no-such-dir").join("f.log");
    assert!(matches!(
        Tail::new([&missing_parent]),
        Err(Error::NotFound { .. })
    ));

    assert!(matches!(
        Tail::new([dir.path()]),
        Err(Error::NotAFile { .. })
    ));
}

#[test]
fn test_partial_registration_failure_tolerated() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.log");
    let bad = dir.path().join("no-such-dir").join("bad.log");
    File::create(&good).unwrap();

    let mut tail = Tail::with_config([&good, &bad], fast_config()).unwrap();
    let writer = write_soon(&good, ms(50), "still-works\n");

    let batch = expect_data(tail.read_next(ms(50), ms(10), ms(5000)).unwrap());
    writer.join().unwrap();

    assert_eq!(batch.iter().next().unwrap().line(), "still-works");
}

#[test]
fn test_closed_resource_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.log");
    File::create(&path).unwrap();

    let mut tail = Tail::with_config([&path], fast_config()).unwrap();
    tail.close();
    tail.close(); // idempotent

    assert!(matches!(
        tail.read_next(ms(50), ms(10), ms(100)),
        Err(Error::Closed)
    ));
    assert!(matches!(tail.add_file(&path), Err(Error::Closed)));
    assert!(tail.next().is_none());
}
