//! End-to-end behaviour of the elastic queue across real threads.

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use nexus_elastic::{Builder, RecvError, TryRecvError, channel, channel_with_config};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// FIFO
// ============================================================================

#[test]
fn fifo_single_producer_across_growth() {
    init_tracing();
    const N: u64 = 2000;

    // Tiny handoffs and overflow force the buffer to grow many times.
    let (tx, rx) = channel_with_config::<u64>(2, 2, 4);

    for i in 0..N {
        tx.send(i).unwrap();
    }
    tx.close();

    let received: Vec<u64> = rx.iter().collect();
    assert_eq!(received, (0..N).collect::<Vec<_>>());
}

#[test]
fn fifo_across_recycled_bursts() {
    init_tracing();

    let (tx, rx) = Builder::new()
        .input_capacity(2)
        .output_capacity(2)
        .overflow_capacity(4)
        .retain_limit(8)
        .build::<u64>();

    // Each burst outgrows the retain limit and drains completely, so the
    // worker swaps its buffer between bursts.
    let mut next = 0u64;
    for burst in 1..=10u64 {
        let start = next;
        for _ in 0..burst * 200 {
            tx.send(next).unwrap();
            next += 1;
        }
        for expected in start..next {
            assert_eq!(rx.recv(), Ok(expected), "FIFO order violated");
        }
    }
    tx.close();
    assert_eq!(rx.recv(), Err(RecvError));
}

#[test]
fn fifo_cross_thread() {
    init_tracing();
    const N: u64 = 100_000;

    let (tx, rx) = channel_with_config::<u64>(16, 16, 64);

    let consumer = thread::spawn(move || {
        let mut expected = 0u64;
        for v in rx {
            assert_eq!(v, expected, "FIFO order violated");
            expected += 1;
        }
        expected
    });

    for i in 0..N {
        tx.send(i).unwrap();
    }
    drop(tx);

    assert_eq!(consumer.join().unwrap(), N);
}

#[test]
fn zero_items() {
    let (tx, rx) = channel::<u64>();

    tx.close();

    assert_eq!(rx.iter().count(), 0);
}

// ============================================================================
// No Loss
// ============================================================================

#[test]
fn no_loss_or_duplication() {
    init_tracing();
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 5_000;

    let (tx, rx) = channel_with_config::<u64>(4, 4, 16);

    let consumer = thread::spawn(move || {
        let mut got: Vec<u64> = Vec::new();
        while let Ok(v) = rx.recv() {
            got.push(v);
            if got.len() % 1000 == 0 {
                // Let the overflow build up now and then.
                thread::sleep(Duration::from_millis(1));
            }
        }
        got
    });

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let tx = tx.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    tx.send(p * PER_PRODUCER + i).unwrap();
                }
            })
        })
        .collect();

    for h in producers {
        h.join().unwrap();
    }
    tx.close();

    let mut got = consumer.join().unwrap();
    got.sort_unstable();
    assert_eq!(got, (0..PRODUCERS * PER_PRODUCER).collect::<Vec<_>>());
}

// ============================================================================
// Closure
// ============================================================================

#[test]
fn closed_and_drained_is_terminal() {
    let (tx, rx) = channel::<u64>();

    tx.send(1).unwrap();
    tx.close();
    assert_eq!(rx.recv(), Ok(1));

    let start = Instant::now();
    for _ in 0..1000 {
        assert_eq!(rx.recv(), Err(RecvError));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
    }
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn close_immediately_after_create() {
    let (tx, rx) = channel::<u64>();

    tx.close();

    assert_eq!(rx.recv(), Err(RecvError));
}

#[test]
fn sends_racing_close_are_all_or_nothing() {
    init_tracing();

    for _ in 0..20 {
        let (tx, rx) = channel_with_config::<(usize, u64)>(1, 1, 2);

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let tx = tx.clone();
                thread::spawn(move || {
                    let mut accepted = 0u64;
                    for i in 0..2_000 {
                        if tx.send((p, i)).is_err() {
                            break;
                        }
                        accepted += 1;
                    }
                    accepted
                })
            })
            .collect();

        thread::yield_now();
        tx.close();

        let accepted: Vec<u64> = producers.into_iter().map(|h| h.join().unwrap()).collect();

        let mut delivered: HashMap<usize, u64> = HashMap::new();
        for (p, i) in rx.iter() {
            let next = delivered.entry(p).or_default();
            assert_eq!(i, *next, "producer {p} out of order");
            *next += 1;
        }

        for (p, &count) in accepted.iter().enumerate() {
            assert_eq!(delivered.get(&p).copied().unwrap_or(0), count);
        }
    }
}

// ============================================================================
// Unbounded Absorption
// ============================================================================

#[test]
fn producer_not_blocked_by_paused_consumer() {
    init_tracing();
    const M: u64 = 100_000;

    let (tx, rx) = channel_with_config::<u64>(8, 8, 16);

    // Nobody receives until every send has returned.
    let start = Instant::now();
    for i in 0..M {
        tx.send(i).unwrap();
    }
    let elapsed = start.elapsed();
    tx.close();

    assert!(
        elapsed < Duration::from_secs(30),
        "sending took {elapsed:?}"
    );

    let mut expected = 0u64;
    for v in &rx {
        assert_eq!(v, expected);
        expected += 1;
    }
    assert_eq!(expected, M);
}

// ============================================================================
// Concurrent Producers
// ============================================================================

#[test]
fn per_producer_order_preserved() {
    init_tracing();
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: u64 = 10_000;

    let (tx, rx) = channel_with_config::<(usize, u64)>(4, 4, 8);

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let tx = tx.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    tx.send((p, i)).unwrap();
                }
            })
        })
        .collect();
    drop(tx);

    let mut next = [0u64; PRODUCERS];
    for (p, i) in rx {
        assert_eq!(i, next[p], "producer {p} out of order");
        next[p] += 1;
    }

    for h in producers {
        h.join().unwrap();
    }
    assert!(next.iter().all(|&n| n == PER_PRODUCER));
}

#[test]
fn small_fixed_interleave() {
    let (tx, rx) = channel::<&'static str>();
    let tx_b = tx.clone();

    let a = thread::spawn(move || {
        for item in ["a1", "a2", "a3"] {
            tx.send(item).unwrap();
        }
    });
    let b = thread::spawn(move || {
        for item in ["b1", "b2"] {
            tx_b.send(item).unwrap();
        }
    });
    a.join().unwrap();
    b.join().unwrap();

    let got: Vec<_> = rx.iter().collect();
    let only_a: Vec<_> = got.iter().filter(|s| s.starts_with('a')).copied().collect();
    let only_b: Vec<_> = got.iter().filter(|s| s.starts_with('b')).copied().collect();

    assert_eq!(got.len(), 5);
    assert_eq!(only_a, ["a1", "a2", "a3"]);
    assert_eq!(only_b, ["b1", "b2"]);
}

// ============================================================================
// Receiver Drop
// ============================================================================

#[test]
fn receiver_drop_unblocks_producers() {
    init_tracing();

    let (tx, rx) = channel_with_config::<u64>(1, 1, 1);

    tx.send(0).unwrap();
    drop(rx);

    let producer = thread::spawn(move || {
        let mut i = 1;
        while tx.send(i).is_ok() {
            i += 1;
        }
        i
    });

    // Should complete, not hang
    assert!(producer.join().unwrap() >= 1);
}
