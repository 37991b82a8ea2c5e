//! Subscription, signal, and served-method behaviour as seen by a plugin.

mod support;

use std::rc::Rc;

use serde_json::json;

use beacon_api::{PayloadSchema, UnloadDecision};
use beacon_core::BusEvent;
use beacon_framework::LoopEvent;
use support::{Ack, Harness, MockPlugin};

/// A plugin requiring `svcA` that subscribes to `luna://svcA/events` on
/// start, recording replies, and unloads itself when a reply carries
/// `{"quit": true}`.
fn add_subscriber(harness: &Harness) {
    harness.add_plugin(
        "p",
        "p",
        &["svcA"],
        UnloadDecision::Unload,
        Some(Rc::new(|plugin: &MockPlugin| {
            let manager = Rc::clone(&plugin.manager);
            let events = Rc::clone(&plugin.events);
            plugin
                .manager
                .subscribe_to_method(
                    "events",
                    "luna://svcA/events",
                    json!({}),
                    Rc::new(move |previous, current| {
                        events.borrow_mut().push(format!(
                            "reply:{}:{}",
                            previous.map_or("-".to_string(), |p| p["n"].to_string()),
                            current["n"]
                        ));
                        if current["quit"] == json!(true) {
                            manager.unload_plugin();
                        }
                    }),
                    PayloadSchema::any(),
                )
                .unwrap();
        })),
    );
    harness.start();
    harness.first_locale();
    harness.service_status("svcA", true);
}

#[test]
fn test_replies_carry_previous_value_in_order() {
    let harness = Harness::new();
    add_subscriber(&harness);

    harness.reply("svcA/events", json!({"n": 1}));
    harness.reply("svcA/events", json!({"n": 2}));

    assert_eq!(harness.event_count("reply:-:1"), 1);
    assert_eq!(harness.event_count("reply:1:2"), 1);
}

#[test]
fn test_unload_requested_inside_callback_is_processed_after_the_frame() {
    let harness = Harness::new();
    add_subscriber(&harness);

    let token = harness.bus.token_for("svcA/events");
    harness.reply("svcA/events", json!({"n": 1}));
    harness.reply("svcA/events", json!({"n": 2, "quit": true}));

    // The callback returned normally, then the adapter was reaped.
    assert_eq!(harness.event_count("reply:1:2"), 1);
    assert_eq!(harness.event_count("drop:p"), 1);
    assert!(!harness.manager.is_loaded("p"));

    // A reply already in flight for the dead subscription is dropped.
    harness.dispatch(LoopEvent::Bus(BusEvent::Reply {
        token,
        payload: json!({"n": 3}).to_string(),
    }));
    assert_eq!(harness.event_count("reply:2:3"), 0);
}

#[test]
fn test_resubscribing_the_same_id_keeps_exactly_one_subscription() {
    let harness = Harness::new();
    harness.add_plugin(
        "p",
        "p",
        &["svcA"],
        UnloadDecision::Unload,
        Some(Rc::new(|plugin: &MockPlugin| {
            for round in 0..2 {
                let events = Rc::clone(&plugin.events);
                plugin
                    .manager
                    .subscribe_to_method(
                        "dup",
                        "luna://svcA/events",
                        json!({"round": round}),
                        Rc::new(move |_, current| {
                            events
                                .borrow_mut()
                                .push(format!("reply:{round}:{}", current["n"]));
                        }),
                        PayloadSchema::any(),
                    )
                    .unwrap();
            }
        })),
    );
    harness.start();
    harness.first_locale();
    harness.service_status("svcA", true);

    // The first subscription was cancelled when the id was reused.
    let live: Vec<_> = harness
        .bus
        .streams
        .borrow()
        .values()
        .filter(|(url, _)| url.contains("svcA/events"))
        .cloned()
        .collect();
    assert_eq!(live.len(), 1);
    assert!(live[0].1.contains("\"round\":1"));

    harness.reply("svcA/events", json!({"n": 1}));
    assert_eq!(harness.event_count("reply:1:1"), 1);
    assert_eq!(harness.event_count("reply:0:1"), 0);
}

#[test]
fn test_signal_subscription_failure_is_synchronous_and_leaves_no_residue() {
    let harness = Harness::new();
    harness.add_plugin(
        "p",
        "p",
        &["svcA"],
        UnloadDecision::Unload,
        Some(Rc::new(|plugin: &MockPlugin| {
            let result = plugin.manager.subscribe_to_signal(
                "battery",
                "/com/palm/power",
                "batteryStatus",
                Rc::new(|_, _| {}),
                PayloadSchema::any(),
            );
            plugin.push(format!("signal-rejected:{}", result.is_err()));
        })),
    );
    harness.bus.script_ack(Ack::Denied);
    harness.start();
    harness.first_locale();

    let baseline = harness.gateway.subscription_count();
    harness.service_status("svcA", true);

    assert_eq!(harness.event_count("signal-rejected:true"), 1);
    assert_eq!(harness.gateway.subscription_count(), baseline);
}

#[test]
fn test_signal_subscription_delivers_after_acknowledgement() {
    let harness = Harness::new();
    harness.add_plugin(
        "p",
        "p",
        &["svcA"],
        UnloadDecision::Unload,
        Some(Rc::new(|plugin: &MockPlugin| {
            let events = Rc::clone(&plugin.events);
            plugin
                .manager
                .subscribe_to_signal(
                    "battery",
                    "/com/palm/power",
                    "batteryStatus",
                    Rc::new(move |previous, current| {
                        events.borrow_mut().push(format!(
                            "signal:{}:{}",
                            previous.is_some(),
                            current["percent"]
                        ));
                    }),
                    PayloadSchema::any(),
                )
                .unwrap();
        })),
    );
    harness.start();
    harness.first_locale();
    harness.service_status("svcA", true);

    let (_, payload) = harness
        .bus
        .streams
        .borrow()
        .values()
        .find(|(url, _)| url.contains("addmatch"))
        .cloned()
        .expect("addmatch stream");
    assert!(payload.contains("/com/palm/power"));
    assert!(payload.contains("batteryStatus"));

    // The acknowledgement was consumed; the first forwarded signal reply has
    // no previous value.
    harness.reply("addmatch", json!({"percent": 40}));
    assert_eq!(harness.event_count("signal:false:40"), 1);
}

#[test]
fn test_registered_method_serves_requests_until_unload() {
    let harness = Harness::new();
    harness.add_plugin(
        "p",
        "p",
        &["svcA"],
        UnloadDecision::Unload,
        Some(Rc::new(|plugin: &MockPlugin| {
            let url = plugin
                .manager
                .register_method(
                    "/mock",
                    "getEvents",
                    Rc::new(|params| json!({"returnValue": true, "echo": params["n"]})),
                    PayloadSchema::object().required("n", beacon_api::FieldKind::Number),
                )
                .unwrap();
            plugin.push(format!("registered:{url}"));
        })),
    );
    harness.start();
    harness.first_locale();
    harness.service_status("svcA", true);

    assert_eq!(
        harness.event_count("registered:luna://com.webos.service.beacon/mock/getEvents"),
        1
    );

    let (response, responder) = support::capture_responder();
    harness.dispatch(LoopEvent::Bus(BusEvent::MethodCall {
        category: "/mock".to_string(),
        name: "getEvents".to_string(),
        payload: json!({"n": 7}).to_string(),
        responder,
    }));
    let body: serde_json::Value =
        serde_json::from_str(response.lock().unwrap().as_ref().unwrap()).unwrap();
    assert_eq!(body["echo"], json!(7));

    // Schema failures answer with the fixed error shape.
    let (response, responder) = support::capture_responder();
    harness.dispatch(LoopEvent::Bus(BusEvent::MethodCall {
        category: "/mock".to_string(),
        name: "getEvents".to_string(),
        payload: json!({"n": "seven"}).to_string(),
        responder,
    }));
    let body: serde_json::Value =
        serde_json::from_str(response.lock().unwrap().as_ref().unwrap()).unwrap();
    assert_eq!(body["errorCode"], json!(2));

    // After the plugin is gone the path still answers, with "method removed".
    harness.service_status("svcA", false);
    let (response, responder) = support::capture_responder();
    harness.dispatch(LoopEvent::Bus(BusEvent::MethodCall {
        category: "/mock".to_string(),
        name: "getEvents".to_string(),
        payload: json!({"n": 7}).to_string(),
        responder,
    }));
    let body: serde_json::Value =
        serde_json::from_str(response.lock().unwrap().as_ref().unwrap()).unwrap();
    assert_eq!(body["errorCode"], json!(1));
    assert_eq!(body["errorMessage"], json!("Method removed."));
}

#[test]
fn test_toast_and_alert_round_trip() {
    let harness = Harness::new();
    harness.bus.script_call_reply(
        "luna://com.webos.notification/createAlert",
        r#"{"returnValue":true,"alertId":"ext-1"}"#,
    );
    harness.add_plugin(
        "p",
        "p",
        &["svcA"],
        UnloadDecision::Unload,
        Some(Rc::new(|plugin: &MockPlugin| {
            plugin
                .manager
                .create_toast("hello", Some("icon.png"), None)
                .unwrap();
            plugin
                .manager
                .create_alert(
                    "warn",
                    "Title",
                    "Body",
                    true,
                    None,
                    json!([{"label": "OK"}]),
                    None,
                )
                .unwrap();
            plugin.push(format!(
                "alert-open:{}",
                plugin.manager.close_alert("warn").unwrap()
            ));
            plugin.push(format!(
                "alert-reclose:{}",
                plugin.manager.close_alert("warn").unwrap()
            ));
        })),
    );
    harness.start();
    harness.first_locale();
    harness.service_status("svcA", true);

    let posts = harness.bus.posts.borrow();
    let (toast_url, toast_payload) = &posts[0];
    assert_eq!(toast_url, "luna://com.webos.notification/createToast");
    let toast: serde_json::Value = serde_json::from_str(toast_payload).unwrap();
    assert_eq!(toast["sourceId"], json!("com.webos.service.beacon-p"));
    assert_eq!(toast["iconUrl"], json!("icon.png"));
    drop(posts);

    assert_eq!(harness.event_count("alert-open:true"), 1);
    assert_eq!(harness.event_count("alert-reclose:false"), 1);

    let calls = harness.bus.calls.borrow();
    let close = calls
        .iter()
        .find(|(url, _)| url.contains("closeAlert"))
        .expect("closeAlert call");
    assert!(close.1.contains("ext-1"));
}
