use phold::ConfigBuilder;
use phold::PholdError;

/// Minimal two-LP run, everything local.
#[test]
fn minimal_two_lp_run_stays_local_and_balanced() {
    let cfg = ConfigBuilder::new()
        .number(2)
        .events(1)
        .remote(0.0)
        .minimum(1)
        .average(9.0)
        .stop(1_000)
        .partitions(1)
        .build()
        .unwrap();

    let report = phold::run(&cfg).expect("minimal run succeeds");

    let expected = 200i64;
    assert!(
        (report.send_total as i64 - expected).abs() <= 16,
        "send_total {} far from expected ~{}",
        report.send_total,
        expected
    );
    assert!(
        (report.recv_total as i64 - expected).abs() <= 16,
        "recv_total {} far from expected ~{}",
        report.recv_total,
        expected
    );
}

/// Every generated event crosses LPs.
#[test]
fn fully_remote_run_gives_every_lp_receives() {
    let cfg = ConfigBuilder::new()
        .number(4)
        .events(2)
        .remote(1.0)
        .minimum(1)
        .average(9.0)
        .stop(100)
        .partitions(2)
        .build()
        .unwrap();

    let report = phold::run(&cfg).expect("fully remote run succeeds");
    for lp in &report.lps {
        assert!(lp.recv_count > 0, "lp {} never received anything", lp.id);
    }
}

/// Determinism across partition counts.
#[test]
fn determinism_holds_across_partition_counts() {
    let base = ConfigBuilder::new()
        .number(2)
        .events(1)
        .remote(0.0)
        .minimum(1)
        .average(9.0)
        .stop(1_000);

    let cfg_p1 = base.clone().partitions(1).build().unwrap();
    let cfg_p2 = base.partitions(2).build().unwrap();

    let report_p1 = phold::run(&cfg_p1).expect("P=1 run succeeds");
    let report_p2 = phold::run(&cfg_p2).expect("P=2 run succeeds");

    assert_eq!(report_p1.send_total, report_p2.send_total);
    assert_eq!(report_p1.recv_total, report_p2.recv_total);
    for (a, b) in report_p1.lps.iter().zip(report_p2.lps.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.send_count, b.send_count);
        assert_eq!(a.recv_count, b.recv_count);
    }
}

/// Collective correctness over an unbalanced tree.
#[test]
fn collective_correctness_over_seven_lps() {
    let cfg = ConfigBuilder::new()
        .number(7)
        .events(2)
        .remote(0.5)
        .minimum(1)
        .average(9.0)
        .stop(500)
        .partitions(1)
        .build()
        .unwrap();

    let report = phold::run(&cfg).expect("run over 7 LPs succeeds");
    assert_eq!(report.lps.len(), 7);
    let ids: Vec<u64> = report.lps.iter().map(|lp| lp.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6]);
}

/// Stop reached without a live event is a fatal, distinguishable condition
/// rather than a silent empty run.
#[test]
fn stop_without_live_event_is_fatal() {
    let cfg = ConfigBuilder::new()
        .number(2)
        .events(1)
        .remote(0.0)
        .minimum(1_000)
        .average(1_000.0)
        .stop(1)
        .partitions(1)
        .build()
        .unwrap();

    let err = phold::run(&cfg).unwrap_err();
    assert!(matches!(err, PholdError::StopReachedWithoutLiveEvent { .. }));
    assert_eq!(err.exit_code(), 3);
}

/// Causality holds under a tight lookahead with multiple partitions, and
/// the end-of-time residue stays bounded.
#[test]
fn causality_holds_under_tight_lookahead() {
    let cfg = ConfigBuilder::new()
        .number(8)
        .events(2)
        .remote(0.5)
        .minimum(1)
        .average(1.0)
        .stop(10_000)
        .partitions(4)
        .build()
        .unwrap();

    let report = phold::run(&cfg).expect("tight-lookahead run does not fault");
    assert!(
        report.error.unsigned_abs() <= cfg.partitions as u64,
        "end-of-time residue {} exceeds partition count {}",
        report.error,
        cfg.partitions
    );
}
