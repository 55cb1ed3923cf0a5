// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drover_core::{SessionId, TaskId};

fn touched(id: &str) -> Event {
    Event::SessionTouched {
        id: SessionId::new(id),
        at_ms: 0,
    }
}

#[tokio::test]
async fn subscribers_see_events_in_publish_order() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    bus.publish(touched("a"));
    bus.publish(touched("b"));

    assert_eq!(rx.recv().await.unwrap().log_summary(), "session:touched id=a");
    assert_eq!(rx.recv().await.unwrap().log_summary(), "session:touched id=b");
}

#[tokio::test]
async fn publish_without_subscribers_is_silent() {
    let bus = EventBus::new();
    bus.publish(touched("a")); // must not panic or block
}

#[tokio::test]
async fn each_subscriber_gets_every_event() {
    let bus = EventBus::new();
    let mut rx1 = bus.subscribe();
    let mut rx2 = bus.subscribe();

    bus.publish(Event::TaskDeleted {
        id: TaskId::new("t-1"),
    });

    assert_eq!(rx1.recv().await.unwrap().name(), "task:deleted");
    assert_eq!(rx2.recv().await.unwrap().name(), "task:deleted");
}

#[tokio::test]
async fn late_subscribers_miss_earlier_events() {
    let bus = EventBus::new();
    bus.publish(touched("early"));

    let mut rx = bus.subscribe();
    bus.publish(touched("late"));
    assert_eq!(rx.recv().await.unwrap().log_summary(), "session:touched id=late");
}
