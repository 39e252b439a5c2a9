//! Integration coverage for the pid-table / scheduler invariants that
//! `syscall::execute` and `sched::on_tick` lean on, exercised here without
//! the hand-written asm context-switch path (`switch_to`, `enter_user`,
//! `save_return_point`) those two are not reachable on a host target.

use trios_kernel::process::table;
use trios_kernel::sched;
use trios_kernel::terminal::NUM_TERMINALS;

/// `process::table` and `sched` both hold process-wide static state; tests
/// run concurrently on separate threads within this binary, so each test
/// resets both before asserting on them, the same convention `table`'s own
/// `#[cfg(test)]` module uses.
fn reset() {
    table::init();
    sched::init();
}

#[test]
fn live_count_crosses_the_base_shell_threshold_at_num_terminals() {
    reset();
    let mut pids = Vec::new();
    for terminal in 0..NUM_TERMINALS {
        assert!(
            table::live_count() < NUM_TERMINALS,
            "terminal {terminal} should still be eligible for a base shell"
        );
        let pid = table::alloc_pid(0, terminal).unwrap();
        sched::rebind_terminal(terminal, pid);
        pids.push(pid);
    }

    assert_eq!(table::live_count(), NUM_TERMINALS);
    assert!(
        !(table::live_count() < NUM_TERMINALS),
        "a fourth process should no longer take the base-shell branch"
    );

    for pid in pids {
        table::free_pid(pid);
    }
}

#[test]
fn rebind_and_lookup_round_trip_per_terminal() {
    reset();
    let mut pids = [0u8; NUM_TERMINALS];
    for terminal in 0..NUM_TERMINALS {
        let pid = table::alloc_pid(0, terminal).unwrap();
        sched::rebind_terminal(terminal, pid);
        pids[terminal] = pid;
    }

    for terminal in 0..NUM_TERMINALS {
        assert_eq!(sched::pid_for_terminal(terminal), pids[terminal]);
    }

    for pid in pids {
        table::free_pid(pid);
    }
}

#[test]
fn clearing_a_terminal_slot_drops_it_back_to_unbooted() {
    reset();
    let pid = table::alloc_pid(0, 0).unwrap();
    sched::rebind_terminal(0, pid);
    assert_eq!(sched::pid_for_terminal(0), pid);

    sched::clear_terminal_slot(0);
    assert_eq!(sched::pid_for_terminal(0), 0);

    table::free_pid(pid);
}

#[test]
fn freeing_a_child_makes_live_count_eligible_for_a_new_base_shell() {
    reset();
    let mut pids = Vec::new();
    for terminal in 0..NUM_TERMINALS {
        let pid = table::alloc_pid(0, terminal).unwrap();
        sched::rebind_terminal(terminal, pid);
        pids.push(pid);
    }

    let child = table::alloc_pid(pids[0], 0).unwrap();
    assert!(!(table::live_count() < NUM_TERMINALS));

    table::free_pid(child);
    assert!(table::live_count() < NUM_TERMINALS);

    for pid in pids {
        table::free_pid(pid);
    }
}

#[test]
fn pid_allocation_is_bounded_by_max_processes() {
    reset();
    let mut pids = Vec::new();
    loop {
        match table::alloc_pid(0, 0) {
            Some(pid) => pids.push(pid),
            None => break,
        }
    }
    assert!(!pids.is_empty());
    assert!(table::alloc_pid(0, 0).is_none());
    for pid in pids {
        table::free_pid(pid);
    }
}
