use super::*;

// =============================================================
// In-flight image requests
// =============================================================

#[test]
fn settled_requests_are_released() {
    let pending: InFlight<u32> = InFlight::default();
    assert!(pending.insert("hero", 1).is_none());
    assert!(pending.insert("tiles", 2).is_none());
    assert_eq!(pending.len(), 2);

    assert_eq!(pending.settle("hero"), Some(1));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending.settle("hero"), None);
}

#[test]
fn handlers_share_the_loader_table() {
    let loader_side: InFlight<u32> = InFlight::default();
    let handler_side = loader_side.clone();
    loader_side.insert("bg", 7);

    assert_eq!(handler_side.settle("bg"), Some(7));
    assert_eq!(loader_side.len(), 0);
}

#[test]
fn reloading_a_name_supersedes_the_old_request() {
    let pending: InFlight<u32> = InFlight::default();
    pending.insert("bg", 1);
    assert_eq!(pending.insert("bg", 2), Some(1));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending.settle("bg"), Some(2));
}

#[test]
fn new_loader_has_nothing_in_flight() {
    assert_eq!(DomImageLoader::new().in_flight(), 0);
}
