use super::*;
use crate::{ExecutorId, JobId};

#[test]
fn new_ids_carry_the_right_prefix() {
    let eid = ExecutorId::new();
    assert!(eid.as_str().starts_with("exec-"));

    let jid = JobId::new();
    assert!(jid.as_str().starts_with("job-"));
}

#[test]
fn generated_ids_are_unique() {
    let a = JobId::new();
    let b = JobId::new();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips_through_display() {
    let id = JobId::from_string("job-abc123");
    assert_eq!(id.to_string(), "job-abc123");
    assert_eq!(id.as_str(), "job-abc123");
}

#[test]
fn idbuf_borrow_matches_hashmap_lookup_by_str() {
    use std::collections::HashMap;

    let id = JobId::new();
    let mut map: HashMap<JobId, u32> = HashMap::new();
    map.insert(id, 7);
    assert_eq!(map.get(&id), Some(&7));
}

#[test]
fn idbuf_debug_quotes_the_string() {
    let buf = IdBuf::new("job-xyz");
    assert_eq!(format!("{:?}", buf), "\"job-xyz\"");
}
