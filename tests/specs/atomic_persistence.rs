//! P3: atomic persistence. A reader never observes a partial write.

use crate::prelude::Root;
use gaffer_core::{AgentId, ItemId, WorkItem};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn readers_see_whole_queue_versions_under_write_storm() {
    let root = Arc::new(Root::new());
    root.queue()
        .push(WorkItem::new("item-0", "task", "seed"))
        .unwrap();

    let stop = Arc::new(AtomicBool::new(false));

    // Writer: push, claim, release in a loop.
    let writer = {
        let root = Arc::clone(&root);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let queue = root.queue();
            let agent = AgentId::new("agent-w");
            for n in 1..200 {
                queue
                    .push(WorkItem::new(format!("item-{}", n), "task", "t"))
                    .unwrap();
                queue.claim(&ItemId::new(format!("item-{}", n)), &agent).unwrap();
                queue.release(&ItemId::new(format!("item-{}", n))).unwrap();
            }
            stop.store(true, Ordering::SeqCst);
        })
    };

    // Readers: every parse must succeed; a partial write would fail to
    // deserialize or drop records.
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let root = Arc::clone(&root);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let queue = root.queue();
                let mut last_len = 0;
                while !stop.load(Ordering::SeqCst) {
                    let items = queue.list_all().unwrap();
                    assert!(items.len() >= last_len, "a version never loses items");
                    last_len = items.len();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(root.queue().list_all().unwrap().len(), 200);
}

#[test]
fn no_tmp_files_survive_a_write_burst() {
    let root = Root::new();
    let queue = root.queue();
    for n in 0..50 {
        queue
            .push(WorkItem::new(format!("item-{}", n), "task", "t"))
            .unwrap();
    }

    let leftovers: Vec<_> = std::fs::read_dir(root.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "stray tmp files: {:?}", leftovers);
}

#[test]
fn mailbox_appends_are_complete_lines_under_concurrency() {
    // P4 adjacent: concurrent appenders never interleave partial lines.
    let root = Arc::new(Root::new());
    let writers = 4;
    let per_writer = 25;

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let root = Arc::clone(&root);
            thread::spawn(move || {
                let mailboxes = root.mailboxes();
                for n in 0..per_writer {
                    let message = gaffer_core::Message::new(
                        format!("m-{}-{}", w, n),
                        "gastown/witness",
                        "gastown/packer",
                        "subject",
                        "body",
                    );
                    mailboxes.append("gastown/packer", &message).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let inbox = root.mailboxes().read_all("gastown/packer").unwrap();
    assert_eq!(inbox.len(), writers * per_writer, "every append exactly once");
}
