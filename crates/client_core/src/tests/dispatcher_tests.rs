use super::*;
use serde_json::json;
use shared::protocol::TypingStartPayload;

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Callback) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let make = move |label: &'static str| -> Callback {
        let sink = Arc::clone(&sink);
        Box::new(move |_payload: &Value| sink.lock().expect("lock").push(label.to_string()))
    };
    (seen, make)
}

#[test]
fn dispatches_in_registration_order() {
    let dispatcher = EventDispatcher::new();
    let (seen, make) = recorder();
    let first = make("first");
    let second = make("second");
    let _a = dispatcher.register(EventKind::MessageCreate, move |p| first(p));
    let _b = dispatcher.register(EventKind::MessageCreate, move |p| second(p));

    let delivered = dispatcher.dispatch(EventKind::MessageCreate, &json!({}));

    assert_eq!(delivered, 2);
    assert_eq!(*seen.lock().expect("lock"), vec!["first", "second"]);
}

#[test]
fn events_without_listeners_are_dropped() {
    let dispatcher = EventDispatcher::new();
    assert_eq!(dispatcher.dispatch(EventKind::ChannelCreate, &json!({})), 0);
}

#[test]
fn disposed_listener_never_runs_again_and_double_dispose_is_noop() {
    let dispatcher = EventDispatcher::new();
    let (seen, make) = recorder();
    let kept = make("kept");
    let removed = make("removed");
    let _keep = dispatcher.register(EventKind::MessageDelete, move |p| kept(p));
    let disposer = dispatcher.register(EventKind::MessageDelete, move |p| removed(p));

    dispatcher.dispatch(EventKind::MessageDelete, &json!({}));
    disposer.dispose();
    disposer.dispose();
    assert!(disposer.is_disposed());
    dispatcher.dispatch(EventKind::MessageDelete, &json!({}));

    assert_eq!(
        *seen.lock().expect("lock"),
        vec!["kept", "removed", "kept"]
    );
    assert_eq!(dispatcher.listener_count(EventKind::MessageDelete), 1);
}

#[test]
fn disposer_only_removes_its_own_identical_callback() {
    let dispatcher = EventDispatcher::new();
    let count = Arc::new(Mutex::new(0));
    let register = |count: Arc<Mutex<u32>>| {
        dispatcher.register(EventKind::TypingStart, move |_| {
            *count.lock().expect("lock") += 1;
        })
    };
    let first = register(Arc::clone(&count));
    let _second = register(Arc::clone(&count));

    first.dispose();
    dispatcher.dispatch(EventKind::TypingStart, &json!({}));

    assert_eq!(*count.lock().expect("lock"), 1);
}

#[test]
fn panicking_listener_does_not_stop_the_rest() {
    let dispatcher = EventDispatcher::new();
    let (seen, make) = recorder();
    let after = make("after");
    let _boom = dispatcher.register(EventKind::PresenceUpdate, |_| panic!("listener failure"));
    let _after = dispatcher.register(EventKind::PresenceUpdate, move |p| after(p));

    let delivered = dispatcher.dispatch(EventKind::PresenceUpdate, &json!({}));

    assert_eq!(delivered, 2);
    assert_eq!(*seen.lock().expect("lock"), vec!["after"]);
}

#[test]
fn listener_disposed_mid_dispatch_is_skipped() {
    let dispatcher = EventDispatcher::new();
    let (seen, make) = recorder();
    let victim = make("victim");
    let slot: Arc<Mutex<Option<Disposer>>> = Arc::new(Mutex::new(None));

    let slot_for_first = Arc::clone(&slot);
    let _first = dispatcher.register(EventKind::MessageUpdate, move |_| {
        if let Some(disposer) = slot_for_first.lock().expect("lock").as_ref() {
            disposer.dispose();
        }
    });
    let second = dispatcher.register(EventKind::MessageUpdate, move |p| victim(p));
    *slot.lock().expect("lock") = Some(second);

    dispatcher.dispatch(EventKind::MessageUpdate, &json!({}));

    assert!(seen.lock().expect("lock").is_empty());
}

#[test]
fn typed_listener_skips_mismatched_payloads() {
    let dispatcher = EventDispatcher::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let _typed = dispatcher.register_typed(EventKind::TypingStart, move |p: TypingStartPayload| {
        sink.lock().expect("lock").push(p.user_id.to_string());
    });

    dispatcher.dispatch(EventKind::TypingStart, &json!({"unexpected": true}));
    dispatcher.dispatch(
        EventKind::TypingStart,
        &json!({"user_id": "u7", "channel_id": "c1"}),
    );

    assert_eq!(*received.lock().expect("lock"), vec!["u7"]);
}

#[test]
fn disposer_outliving_dispatcher_is_harmless() {
    let dispatcher = EventDispatcher::new();
    let disposer = dispatcher.register(EventKind::LfgCreate, |_| {});
    drop(dispatcher);
    disposer.dispose();
    assert!(disposer.is_disposed());
}
