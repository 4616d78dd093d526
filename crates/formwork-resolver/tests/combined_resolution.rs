//! Combined mapping resolution across sync and async slots

use formwork_resolver::{resolve_map, MapResolution, ResolveOptions, SlotOutput};
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn sync_and_deferred_slots_emit_once_together() {
    let slots = vec![
        ("instant".to_string(), SlotOutput::ready(json!("now"))),
        (
            "delayed".to_string(),
            SlotOutput::deferred(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                json!("later")
            }),
        ),
    ];

    let started = tokio::time::Instant::now();
    let mut stream = match resolve_map(slots, &ResolveOptions::new()) {
        MapResolution::Pending(stream) => stream,
        MapResolution::Ready(_) => panic!("deferred slot must force the async path"),
    };

    let first = stream.next().await.expect("one combined emission");
    assert!(started.elapsed() >= Duration::from_millis(10));
    assert_eq!(first.get("instant"), Some(&json!("now")));
    assert_eq!(first.get("delayed"), Some(&json!("later")));

    // Single-shot slots produce exactly one combined snapshot.
    assert!(stream.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn slow_slot_warns_but_still_contributes() {
    let slots = vec![
        ("fast".to_string(), SlotOutput::ready(json!(1))),
        (
            "slow".to_string(),
            SlotOutput::deferred(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                json!(2)
            }),
        ),
    ];

    // Grace period shorter than the slot's latency: the warning fires, the
    // resolution still completes with the late value.
    let options = ResolveOptions::new().with_grace_period(Duration::from_millis(5));
    let combined = resolve_map(slots, &options).finish().await;
    assert_eq!(combined.get("fast"), Some(&json!(1)));
    assert_eq!(combined.get("slow"), Some(&json!(2)));
}

#[tokio::test]
async fn sync_only_mapping_never_hits_the_async_path() {
    let slots = vec![
        ("a".to_string(), SlotOutput::ready(json!(true))),
        ("b".to_string(), SlotOutput::ready(json!([1, 2]))),
    ];
    let resolved = resolve_map(slots, &ResolveOptions::new());
    assert!(resolved.is_ready());
    let map = resolved.finish().await;
    assert_eq!(map.get("b"), Some(&json!([1, 2])));
}
