//! Many workers hitting one dispatcher at once.

use std::fs;
use std::sync::Arc;
use std::thread;

use mirrorfs_core::{FilesystemOps, MirrorFs, read_all};
use nix::libc;
use tempfile::TempDir;

const WORKERS: u64 = 16;
const ROUNDS: u64 = 50;

#[test]
fn parallel_open_read_release() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("shared.txt");
    fs::write(&path, "shared contents").unwrap();
    let fs = Arc::new(MirrorFs::new());

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let fs = Arc::clone(&fs);
            let path = path.clone();
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    let fh = worker * ROUNDS + round + 1;
                    fs.open(&path, libc::O_RDONLY, fh).unwrap();
                    let mut buf = [0u8; 64];
                    let n = fs.read(fh, &mut buf, 0).unwrap();
                    assert_eq!(&buf[..n], b"shared contents");
                    fs.release(fh);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert!(fs.handles().is_empty());
}

#[test]
fn parallel_writes_to_disjoint_ranges() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("striped.bin");
    fs::write(&path, "").unwrap();
    let fs = Arc::new(MirrorFs::new());
    fs.open(&path, libc::O_RDWR, 1).unwrap();

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                let stripe = [b'a' + worker as u8; 32];
                fs.write(1, &stripe, worker * 32).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    fs.release(1);
    let data = fs::read(&path).unwrap();
    assert_eq!(data.len() as u64, WORKERS * 32);
    for (i, chunk) in data.chunks(32).enumerate() {
        assert!(chunk.iter().all(|&b| b == b'a' + i as u8));
    }
}

#[test]
fn release_while_other_handles_in_use() {
    let tmp = TempDir::new().unwrap();
    for i in 0..8 {
        fs::write(tmp.path().join(format!("f{i}")), "").unwrap();
    }
    let fs = Arc::new(MirrorFs::new());
    for fh in 1..=WORKERS {
        fs.opendir(tmp.path(), fh).unwrap();
    }

    let workers: Vec<_> = (1..=WORKERS)
        .map(|fh| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                let entries = read_all(fs.as_ref(), fh).unwrap();
                assert_eq!(entries.len(), 10);
                fs.releasedir(fh);
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert!(fs.handles().is_empty());
}
