use std::{sync::Arc, thread};

use super::*;

#[test]
fn test_spinlock() {
    let spin = Arc::new(Spinlock::new(0_u64));
    let (n_writers, n_readers, n_incrs) = (8_u64, 8_u64, 1000_u64);

    let mut writers = vec![];
    for _ in 0..n_writers {
        let spin = Arc::clone(&spin);
        writers.push(thread::spawn(move || {
            for _ in 0..n_incrs {
                *spin.write() += 1;
            }
        }));
    }

    let mut readers = vec![];
    for _ in 0..n_readers {
        let spin = Arc::clone(&spin);
        readers.push(thread::spawn(move || {
            let mut prev = 0;
            for _ in 0..n_incrs {
                let val = *spin.read();
                assert!(val >= prev, "value went back {} {}", val, prev);
                prev = val;
            }
        }));
    }

    for handle in writers.into_iter().chain(readers.into_iter()) {
        handle.join().unwrap();
    }

    assert_eq!(*spin.read(), n_writers * n_incrs);
    println!("test_spinlock stats {}", spin.to_stats().unwrap());
}
