//! Integration tests for the six worked scenarios and the quantified
//! invariants.

use corelib::{Error, Network};

const ROUNDS: usize = 16;

#[test]
fn lone_ring_owns_the_whole_space_and_round_trips() {
    let net = Network::create(4, &[0]).unwrap();
    assert_eq!(net.node_count(), 1);

    let snap = net.snapshot(0).unwrap();
    assert_eq!(snap.successor, 0);
    assert_eq!(snap.predecessor, None);
    assert!(snap.fingers.iter().all(|&f| f == 0));

    let key = net.put(b"hello").unwrap();
    assert_eq!(net.get(b"hello").unwrap(), b"hello");
    assert!(net.owns(0, key).unwrap());

    // the only node can't leave
    assert_eq!(net.delete_node(0), Err(Error::EmptyNetwork));
}

#[test]
fn four_node_ring_converges_to_correct_links_and_fingers() {
    let net = Network::create(4, &[0, 4, 8, 12]).unwrap();
    net.stabilize_to_quiescence(ROUNDS);

    let snap0 = net.snapshot(0).unwrap();
    assert_eq!(snap0.successor, 4);
    assert_eq!(snap0.predecessor, Some(12));
    assert_eq!(snap0.fingers, vec![4, 4, 4, 8]);

    assert_eq!(net.find_successor(0, 5).unwrap(), 8);
    assert_eq!(net.find_successor(0, 12).unwrap(), 12);

    let health = net.health_check();
    assert!(health.is_healthy(), "{:?}", health);
}

#[test]
fn join_migrates_only_the_keys_the_new_node_now_owns() {
    let net = Network::create(4, &[0, 4, 8, 12]).unwrap();
    net.stabilize_to_quiescence(ROUNDS);

    // key 2 is owned by node 4 before node 2 exists: (0, 4] contains 2.
    assert_eq!(net.find_successor(0, 2).unwrap(), 4);
    net.local_put(4, 2, b"z").unwrap();

    net.insert_node(2).unwrap();
    net.stabilize_to_quiescence(ROUNDS);

    assert_eq!(net.find_successor(0, 2).unwrap(), 2);
    assert_eq!(net.local_get(2, 2).unwrap().as_deref(), Some(&b"z"[..]));
    assert_eq!(net.local_get(4, 2).unwrap(), None);

    let health = net.health_check();
    assert!(health.is_healthy(), "{:?}", health);
}

#[test]
fn graceful_leave_hands_everything_back_to_the_successor() {
    let net = Network::create(4, &[0, 4, 8, 12]).unwrap();
    net.stabilize_to_quiescence(ROUNDS);
    net.insert_node(2).unwrap();
    net.stabilize_to_quiescence(ROUNDS);
    net.local_put(2, 2, b"z").unwrap();

    net.delete_node(2).unwrap();
    net.stabilize_to_quiescence(ROUNDS);

    assert_eq!(net.node_count(), 4);
    assert_eq!(net.snapshot(0).unwrap().successor, 4);
    assert_eq!(net.local_get(4, 2).unwrap().as_deref(), Some(&b"z"[..]));

    let health = net.health_check();
    assert!(health.is_healthy(), "{:?}", health);
}

#[test]
fn finger_table_matches_hand_worked_example() {
    let net = Network::create(4, &[0, 1, 3, 7]).unwrap();
    net.stabilize_to_quiescence(ROUNDS);

    assert_eq!(net.snapshot(0).unwrap().fingers, vec![1, 3, 7, 0]);
    // The answer is correct regardless of which finger hop gets there.
    assert_eq!(net.find_successor(0, 6).unwrap(), 7);
}

#[test]
fn lookup_for_a_key_never_stored_is_reported_as_not_found() {
    let net = Network::create(4, &[0, 4, 8, 12]).unwrap();
    net.stabilize_to_quiescence(ROUNDS);
    assert_eq!(net.get(b"nothing-stored-under-this"), Err(Error::KeyNotFound));
}

#[test]
fn create_rejects_empty_duplicate_and_out_of_range_ids() {
    assert_eq!(Network::create(4, &[]).unwrap_err(), Error::EmptyNetwork);
    assert_eq!(
        Network::create(4, &[1, 1]).unwrap_err(),
        Error::DuplicateNodeId(1)
    );
    assert_eq!(
        Network::create(4, &[16]).unwrap_err(),
        Error::InvalidNodeId(16)
    );
}

#[test]
fn insert_node_rejects_duplicates_and_delete_rejects_unknown_ids() {
    let net = Network::create(4, &[0]).unwrap();
    assert_eq!(net.insert_node(0), Err(Error::DuplicateNodeId(0)));
    assert_eq!(net.delete_node(9), Err(Error::NodeNotFound(9)));
}

#[test]
fn put_is_idempotent_under_repeated_identical_writes() {
    let net = Network::create(4, &[0]).unwrap();
    let k1 = net.put(b"same-value").unwrap();
    let k2 = net.put(b"same-value").unwrap();
    assert_eq!(k1, k2);
    assert_eq!(net.get(b"same-value").unwrap(), b"same-value");
}

#[test]
fn every_stored_key_is_owned_by_the_node_holding_it() {
    let net = Network::create(4, &[0, 4, 8, 12]).unwrap();
    net.stabilize_to_quiescence(ROUNDS);

    for data in [&b"a"[..], b"bb", b"ccc", b"dddd", b"eeeee"] {
        let key = net.put(data).unwrap();
        let owner = net.find_successor(0, key).unwrap();
        assert!(net.owns(owner, key).unwrap());
    }
}

#[test]
fn cleanup_empties_the_network() {
    let net = Network::create(4, &[0, 4, 8, 12]).unwrap();
    net.cleanup();
    assert_eq!(net.node_count(), 0);
    assert_eq!(net.put(b"x"), Err(Error::EmptyNetwork));
}

#[test]
fn simulated_failure_recovers_data_from_the_successors_backup() {
    let net = Network::create(4, &[0, 4, 8, 12]).unwrap();
    net.stabilize_to_quiescence(ROUNDS);
    net.local_put(8, 6, b"payload").unwrap();
    net.backup_to_successor(8).unwrap();

    net.simulate_node_failure(8).unwrap();
    assert_eq!(net.node_count(), 3);
    assert_eq!(net.local_get(12, 6).unwrap().as_deref(), Some(&b"payload"[..]));

    net.stabilize_to_quiescence(ROUNDS);
    let health = net.health_check();
    assert!(health.is_healthy(), "{:?}", health);
}
