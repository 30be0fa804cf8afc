#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};

use serde_json::json;

use cqlink_client::config::ReceiveFormat;
use cqlink_client::dispatch::{Dispatcher, Event, Routing};
use cqlink_core::protocol::segment::Segment;
use cqlink_core::protocol::Message;

type Log = Arc<Mutex<Vec<String>>>;

fn record(d: &Dispatcher, log: &Log, path: &str) {
    let log = Arc::clone(log);
    let tag = path.to_string();
    d.bus().on(path, move |_| log.lock().unwrap().push(tag.clone()));
}

fn group_poke() -> serde_json::Value {
    json!({
        "time": 1700000000,
        "self_id": 10001,
        "post_type": "notice",
        "notice_type": "notify",
        "sub_type": "poke",
        "group_id": 20002,
        "user_id": 30003,
        "target_id": 10001
    })
}

#[test]
fn group_poke_reaches_specific_then_general() {
    let d = Dispatcher::new(None);
    let log: Log = Arc::default();
    record(&d, &log, "notice");
    record(&d, &log, "notice.notify.poke.friend");
    record(&d, &log, "notice.notify.poke.group");
    record(&d, &log, "notice.notify");

    let routing = d.dispatch(group_poke());
    assert_eq!(
        routing,
        Routing::Delivered {
            path: "notice.notify.poke.group".into()
        }
    );
    assert_eq!(
        *log.lock().unwrap(),
        vec!["notice.notify.poke.group", "notice.notify", "notice"]
    );
}

#[test]
fn poke_without_group_is_a_friend_poke() {
    let d = Dispatcher::new(None);
    let log: Log = Arc::default();
    record(&d, &log, "notice.notify.poke.friend");

    let mut ev = group_poke();
    ev.as_object_mut().unwrap().remove("group_id");
    d.dispatch(ev);
    assert_eq!(*log.lock().unwrap(), vec!["notice.notify.poke.friend"]);
}

#[test]
fn unknown_post_type_invokes_nobody() {
    let d = Dispatcher::new(None);
    let log: Log = Arc::default();
    for p in ["message", "notice", "request", "meta_event", "mystery"] {
        record(&d, &log, p);
    }

    let routing = d.dispatch(json!({"post_type": "mystery", "self_id": 1}));
    assert_eq!(
        routing,
        Routing::Unclassified {
            field: "post_type",
            value: "mystery".into()
        }
    );
    assert!(log.lock().unwrap().is_empty());

    let missing = d.dispatch(json!({"self_id": 1}));
    assert!(matches!(missing, Routing::Unclassified { field: "post_type", .. }));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn unknown_notify_sub_kind_stops_at_the_parent_path() {
    let d = Dispatcher::new(None);
    let log: Log = Arc::default();
    record(&d, &log, "notice");
    record(&d, &log, "notice.notify");
    record(&d, &log, "notice.notify.poke.group");

    let mut ev = group_poke();
    ev["sub_type"] = json!("profile_like");
    assert_eq!(
        d.dispatch(ev),
        Routing::Partial {
            path: "notice.notify".into(),
            field: "sub_type",
            value: "profile_like".into()
        }
    );
    assert_eq!(*log.lock().unwrap(), vec!["notice.notify", "notice"]);

    let seen: Arc<Mutex<Option<String>>> = Arc::default();
    let s = Arc::clone(&seen);
    d.bus().on("notice.notify", move |ev| {
        *s.lock().unwrap() = ev.as_notice().and_then(|n| n.sub_type.clone());
    });
    let mut ev = group_poke();
    ev["sub_type"] = json!("input_status");
    d.dispatch(ev);
    assert_eq!(seen.lock().unwrap().as_deref(), Some("input_status"));
}

#[test]
fn unknown_notice_type_invokes_nobody() {
    let d = Dispatcher::new(None);
    let log: Log = Arc::default();
    record(&d, &log, "notice");

    let mut ev = group_poke();
    ev["notice_type"] = json!("group_card_v2");
    assert!(matches!(
        d.dispatch(ev),
        Routing::Unclassified { field: "notice_type", .. }
    ));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn group_message_is_typed_and_keeps_big_ids() {
    let d = Dispatcher::new(Some(ReceiveFormat::Segments));
    let seen: Arc<Mutex<Vec<Message>>> = Arc::default();
    let s = Arc::clone(&seen);
    d.bus().on("message.group", move |ev| {
        let m = ev.as_message().expect("message payload");
        assert_eq!(m.group_id, Some(1_234_567_890_123_456_789));
        s.lock().unwrap().push(m.message.clone());
    });

    let text = r#"{"post_type":"message","message_type":"group","sub_type":"normal",
        "message_id":-7,"user_id":42,"group_id":1234567890123456789,
        "message":"[CQ:at,qq=10001] hi","raw_message":"[CQ:at,qq=10001] hi",
        "font":0,"sender":{"user_id":42,"nickname":"n","role":"member"},"self_id":10001,"time":1}"#;
    let routing = d.dispatch_text(text).unwrap();
    assert_eq!(
        routing,
        Routing::Delivered {
            path: "message.group".into()
        }
    );
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Message::Segments(vec![
            Segment::at(10001),
            Segment::text(" hi")
        ])]
    );
}

#[test]
fn meta_events_replace_the_status_snapshot() {
    let d = Dispatcher::new(None);
    assert!(d.status().is_none());

    let heartbeat = |online: bool| {
        json!({
            "post_type": "meta_event",
            "meta_event_type": "heartbeat",
            "self_id": 10001,
            "time": 1,
            "interval": 5000,
            "status": {
                "self": {"platform": "qq", "user_id": 10001},
                "online": online,
                "good": true,
                "qq.status": "online"
            }
        })
    };

    d.dispatch(heartbeat(true));
    assert!(d.status().unwrap().online);
    d.dispatch(heartbeat(false));
    let status = d.status().unwrap();
    assert!(!status.online);
    assert_eq!(status.self_info.user_id, 10001);
}

#[test]
fn malformed_envelope_is_dropped() {
    let d = Dispatcher::new(None);
    let log: Log = Arc::default();
    record(&d, &log, "request");

    let routing = d.dispatch(json!({
        "post_type": "request",
        "request_type": "friend",
        "user_id": [42],
        "flag": "f1"
    }));
    assert!(matches!(routing, Routing::Malformed { .. }), "{routing:?}");
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn listeners_may_subscribe_while_being_invoked() {
    let d = Arc::new(Dispatcher::new(None));
    let log: Log = Arc::default();

    let (d2, log2) = (Arc::clone(&d), Arc::clone(&log));
    d.bus().on("notice", move |_| {
        log2.lock().unwrap().push("outer".into());
        let log3 = Arc::clone(&log2);
        d2.bus()
            .once("notice", move |_| log3.lock().unwrap().push("inner".into()));
    });

    d.dispatch(group_poke());
    assert_eq!(*log.lock().unwrap(), vec!["outer"]);

    d.dispatch(group_poke());
    assert_eq!(*log.lock().unwrap(), vec!["outer", "outer", "inner"]);
}

#[test]
fn custom_events_propagate_like_classified_ones() {
    let d = Dispatcher::new(None);
    let log: Log = Arc::default();
    record(&d, &log, "plugin.reload");
    record(&d, &log, "plugin");

    let n = d.bus().publish("plugin.reload.all", &Event::Custom(json!({"force": true})));
    assert_eq!(n, 2);
    assert_eq!(*log.lock().unwrap(), vec!["plugin.reload", "plugin"]);
}
