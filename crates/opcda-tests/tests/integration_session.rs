// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Session Integration Tests
//!
//! End-to-end behavior of [`Session`] over a simulated provider.
//!
//! ## Test Categories
//!
//! - Connection lifecycle
//! - Groups and items
//! - Subscriptions and data-change routing
//! - Teardown and stale handles
//! - Read, write and browse

use std::sync::Arc;
use std::time::Duration;

use opcda_bridge::router::{self, LiveHandle};
use opcda_bridge::{DaProvider, LinkState, Session, SubscriptionState};
use opcda_core::{
    BridgeError, EventKind, EventKinds, EventPayload, HResult, Quality, SessionConfig, Value,
    Variant,
};
use opcda_tests::common::*;

fn data_change() -> EventKinds {
    EventKinds::only(EventKind::DataChange)
}

fn harness_with_group(harness: &BridgeHarness) {
    init_test_logging();
    harness.session.create_group("G", 1000, 0.0).unwrap();
    harness.session.add_item("G", "Tag1").unwrap();
}

// =============================================================================
// Connection Lifecycle
// =============================================================================

mod connection_tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_publishes_one_connect_event() {
        let mut harness = BridgeHarness::new();

        let init = harness.connection.expect(EventKind::Init).await;
        assert!(matches!(init.payload, EventPayload::Init { connected: false }));

        assert!(harness.connect().await);
        let event = harness.connection.expect(EventKind::Connect).await;
        assert!(matches!(event.payload, EventPayload::Connect { success: true, error: None }));

        harness.connection.assert_quiet().await;
        assert!(harness.session.is_connected());
        assert_eq!(harness.session.link_state(), LinkState::Connected);
        assert_eq!(harness.provider.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_publishes_unsuccessful_connect() {
        let mut harness =
            BridgeHarness::with_provider(ProviderFixtures::unreachable(), SessionConfig::default());
        harness.connection.expect(EventKind::Init).await;

        assert!(!harness.connect().await);
        let event = harness.connection.expect(EventKind::Connect).await;
        assert!(matches!(event.payload, EventPayload::Connect { success: false, .. }));
        assert!(event.reason().unwrap().starts_with("Connection failed"));

        assert!(!harness.session.is_connected());
        assert_eq!(harness.session.link_state(), LinkState::Idle);
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_arguments() {
        let harness = BridgeHarness::new();
        assert!(matches!(
            harness.session.connect("", "prog.id"),
            Err(BridgeError::Validation { .. })
        ));
        assert!(matches!(
            harness.session.connect("host", " "),
            Err(BridgeError::Validation { .. })
        ));
        assert_eq!(harness.provider.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_client_disconnect() {
        let mut harness = BridgeHarness::connected().await;

        harness.session.disconnect();
        let event = harness.connection.expect(EventKind::Disconnect).await;
        assert_eq!(event.reason(), Some("Disconnected by client"));

        assert!(!harness.session.is_connected());
        assert!(!harness.provider.is_connected());
    }

    #[tokio::test]
    async fn test_server_disconnect_stops_data_changes() {
        let mut harness = BridgeHarness::connected().await;
        harness_with_group(&harness);
        let mut events = harness.subscribe("G", data_change());

        assert!(harness.provider.fire_disconnect(HResult::RPC_E_DISCONNECTED));
        let event = harness.connection.expect(EventKind::Disconnect).await;
        assert!(event.reason().unwrap().starts_with("Server disconnected"));
        harness.connection.assert_quiet().await;

        harness
            .provider
            .fire_data_change("G", "Tag1", &ItemStateFixtures::good_int(1), HResult::S_OK);
        events.assert_quiet().await;
        assert_eq!(harness.session.link_state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_after_server_disconnect() {
        let mut harness = BridgeHarness::connected().await;
        harness.provider.fire_disconnect(HResult::RPC_E_DISCONNECTED);
        harness.connection.expect(EventKind::Disconnect).await;

        assert!(harness.connect().await);
        harness.connection.expect(EventKind::Connect).await;
        assert!(harness.session.is_connected());
    }
}

// =============================================================================
// Groups and Items
// =============================================================================

mod group_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_group_and_add_items() {
        let harness = BridgeHarness::new();

        let handle = harness.session.create_group("G", 1000, 0.0).unwrap();
        assert_eq!(harness.session.group("G"), Some(handle));
        harness.session.add_item("G", "Tag1").unwrap();
        assert_eq!(harness.provider.items("G"), vec!["Tag1".to_string()]);

        let err = harness.session.add_item("Missing", "Tag1").unwrap_err();
        assert!(matches!(err, BridgeError::NotFound { .. }));
        assert_eq!(harness.provider.add_count(), 1);
    }

    #[tokio::test]
    async fn test_group_name_rules() {
        let harness = BridgeHarness::new();

        assert!(matches!(
            harness.session.create_group("", 1000, 0.0),
            Err(BridgeError::Validation { .. })
        ));
        assert!(matches!(
            harness.session.create_group("connection", 1000, 0.0),
            Err(BridgeError::Validation { .. })
        ));

        harness.session.create_group("G", 1000, 0.0).unwrap();
        assert!(matches!(
            harness.session.create_group("G", 500, 0.0),
            Err(BridgeError::Creation { .. })
        ));
        assert_eq!(harness.provider.group_count(), 1);
    }

    #[tokio::test]
    async fn test_group_parameters_out_of_range() {
        let harness = BridgeHarness::new();

        assert!(matches!(
            harness.session.create_group("G", 0, 0.0),
            Err(BridgeError::Creation { .. })
        ));
        assert!(matches!(
            harness.session.create_group("G", 1000, 150.0),
            Err(BridgeError::Creation { .. })
        ));
        assert!(matches!(
            harness.session.create_group("G", 1000, f32::NAN),
            Err(BridgeError::Creation { .. })
        ));
        assert!(harness.session.group_names().is_empty());
    }

    #[tokio::test]
    async fn test_provider_refusals_carry_code() {
        let harness = BridgeHarness::new();

        harness.provider.set_fail_create_group(true);
        let err = harness.session.create_group("G", 1000, 0.0).unwrap_err();
        assert!(matches!(err, BridgeError::Creation { .. }));
        assert_eq!(err.provider_code(), Some(HResult::E_FAIL));
        assert!(harness.session.group("G").is_none());

        harness.provider.set_fail_create_group(false);
        harness.session.create_group("G", 1000, 0.0).unwrap();
        let err = harness.session.add_item("G", "!bad").unwrap_err();
        assert!(matches!(err, BridgeError::Add { .. }));
        assert_eq!(err.provider_code(), Some(HResult::OPC_E_INVALIDITEMID));
    }

    #[tokio::test]
    async fn test_provision() {
        let harness = BridgeHarness::new();
        harness.session.provision(&ConfigFixtures::groups()).unwrap();

        assert_eq!(harness.session.group_names(), vec!["Fast", "Slow"]);
        assert_eq!(harness.provider.items("Fast").len(), 2);
        assert_eq!(harness.provider.items("Slow"), vec!["Random.String".to_string()]);
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

mod subscription_tests {
    use super::*;

    #[tokio::test]
    async fn test_data_change_delivered() {
        let harness = BridgeHarness::connected().await;
        harness_with_group(&harness);
        let mut events = harness.subscribe("G", data_change());

        assert!(harness.provider.has_data_change_callback("G"));
        assert!(harness.provider.fire_data_change(
            "G",
            "Tag1",
            &ItemStateFixtures::good_int(7),
            HResult::S_OK
        ));

        let event = events.expect(EventKind::DataChange).await;
        let update = event.item().unwrap();
        assert_eq!(update.item, "Tag1");
        assert_eq!(update.value, Value::Int32(7));
        assert_eq!(update.quality, Quality::Good);
        events.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_data_change_before_connect_is_delivered() {
        let harness = BridgeHarness::new();
        harness_with_group(&harness);
        let mut events = harness.subscribe("G", data_change());

        harness
            .provider
            .fire_data_change("G", "Tag1", &ItemStateFixtures::good_real(1.5), HResult::S_OK);
        let event = events.expect(EventKind::DataChange).await;
        assert_eq!(event.item().unwrap().value, Value::Float64(1.5));
    }

    #[tokio::test]
    async fn test_unreachable_source_becomes_disconnect() {
        let harness = BridgeHarness::connected().await;
        harness_with_group(&harness);
        let kinds = EventKinds::from([EventKind::DataChange, EventKind::Disconnect]);
        let mut events = harness.subscribe("G", kinds);

        harness
            .provider
            .fire_data_change("G", "Tag1", &ItemStateFixtures::not_connected(), HResult::S_OK);
        let event = events.expect(EventKind::Disconnect).await;
        assert!(event.reason().unwrap().starts_with("Data source unreachable"));
        assert_eq!(event.item().unwrap().item, "Tag1");

        harness
            .provider
            .fire_data_change("G", "Tag1", &ItemStateFixtures::good_int(3), HResult::E_FAIL);
        let event = events.expect(EventKind::Disconnect).await;
        assert!(event.reason().unwrap().starts_with("Connection lost via data change"));

        // The session-level link is unaffected.
        assert!(harness.session.is_connected());
    }

    #[tokio::test]
    async fn test_events_outside_kinds_are_filtered() {
        let harness = BridgeHarness::connected().await;
        harness_with_group(&harness);
        let mut events = harness.subscribe("G", data_change());

        harness
            .provider
            .fire_data_change("G", "Tag1", &ItemStateFixtures::comm_failure(2.0), HResult::S_OK);
        events.assert_quiet().await;
        assert_eq!(harness.session.stats().callbacks_ignored, 1);
    }

    #[tokio::test]
    async fn test_subscribe_unknown_targets() {
        let harness = BridgeHarness::new();
        let recorder = EventRecorder::new();

        assert!(matches!(
            harness.session.subscribe("Missing", recorder.handler(), data_change()),
            Err(BridgeError::NotFound { .. })
        ));
        assert!(matches!(
            harness.session.subscribe("", recorder.handler(), data_change()),
            Err(BridgeError::Validation { .. })
        ));
        assert_eq!(
            harness.session.subscription_state("Missing"),
            SubscriptionState::Unregistered
        );
    }

    #[tokio::test]
    async fn test_empty_kinds_use_default() {
        let harness = BridgeHarness::new();
        harness_with_group(&harness);
        let _events = harness.subscribe("G", EventKinds::empty());

        assert_eq!(harness.session.subscribed_kinds("G"), data_change());
        assert_eq!(
            harness.session.subscription_state("G"),
            SubscriptionState::RegisteredActive
        );
    }

    #[tokio::test]
    async fn test_resubscribe_is_noop() {
        let harness = BridgeHarness::connected().await;
        harness_with_group(&harness);
        let mut first = harness.subscribe("G", data_change());
        let mut second = harness.subscribe("G", EventKinds::from([EventKind::Error]));

        assert_eq!(harness.session.subscribed_kinds("G"), data_change());

        harness
            .provider
            .fire_data_change("G", "Tag1", &ItemStateFixtures::good_int(1), HResult::S_OK);
        first.expect(EventKind::DataChange).await;
        second.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_partial_unsubscribe_keeps_channel() {
        let harness = BridgeHarness::connected().await;
        harness_with_group(&harness);
        let kinds = EventKinds::from([EventKind::DataChange, EventKind::Disconnect]);
        let mut events = harness.subscribe("G", kinds);

        harness
            .session
            .unsubscribe("G", EventKinds::only(EventKind::Disconnect))
            .unwrap();
        assert_eq!(harness.session.subscribed_kinds("G"), data_change());
        assert!(harness.provider.has_data_change_callback("G"));

        harness
            .provider
            .fire_data_change("G", "Tag1", &ItemStateFixtures::good_int(5), HResult::S_OK);
        events.expect(EventKind::DataChange).await;

        harness.session.unsubscribe("G", data_change()).unwrap();
        assert_eq!(
            harness.session.subscription_state("G"),
            SubscriptionState::Unregistered
        );
        assert!(!harness.provider.has_data_change_callback("G"));
        assert!(!harness.provider.fire_data_change(
            "G",
            "Tag1",
            &ItemStateFixtures::good_int(6),
            HResult::S_OK
        ));
        events.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_is_ignored() {
        let harness = BridgeHarness::new();
        assert!(harness.session.unsubscribe("Nobody", EventKinds::empty()).is_ok());
    }

    #[tokio::test]
    async fn test_synthetic_connect_when_already_connected() {
        let harness = BridgeHarness::connected().await;
        harness.session.unsubscribe_connection();
        assert_eq!(
            harness.session.subscription_state("connection"),
            SubscriptionState::Unregistered
        );

        let kinds = EventKinds::from([EventKind::Connect, EventKind::Disconnect]);
        let mut events = harness.subscribe("connection", kinds);
        let first = events.expect(EventKind::Connect).await;
        assert!(matches!(first.payload, EventPayload::Connect { success: true, .. }));

        harness.session.disconnect();
        events.expect(EventKind::Disconnect).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_provider_thread_events_keep_order() {
        let config = SessionConfig::builder().with_channel_capacity(4).build().unwrap();
        let harness = BridgeHarness::with_provider(ProviderFixtures::simulation(), config);
        harness_with_group(&harness);
        let mut events = harness.subscribe("G", data_change());

        let provider = Arc::clone(&harness.provider);
        let producer = std::thread::spawn(move || {
            for i in 0..32 {
                provider.fire_data_change("G", "Tag1", &ItemStateFixtures::good_int(i), HResult::S_OK);
            }
        });

        for i in 0..32 {
            let event = events.expect(EventKind::DataChange).await;
            assert_eq!(event.item().unwrap().value, Value::Int32(i));
        }

        tokio::task::spawn_blocking(move || producer.join().unwrap())
            .await
            .unwrap();
    }
}

// =============================================================================
// Teardown
// =============================================================================

mod teardown_tests {
    use super::*;

    #[tokio::test]
    async fn test_close_releases_everything() {
        let harness = BridgeHarness::connected().await;
        harness_with_group(&harness);
        let mut events = harness.subscribe("G", data_change());
        let group = harness.session.group("G").unwrap();
        let client = harness.session.client_handle();

        harness.session.close();
        harness.session.close();

        assert!(harness.session.is_closed());
        assert!(!router::is_live(LiveHandle::Group(group)));
        assert!(!router::is_live(LiveHandle::Client(client)));
        assert!(!harness.provider.has_disconnect_callback());
        assert_eq!(harness.provider.group_count(), 0);
        assert_eq!(harness.provider.released_groups(), 1);
        assert_eq!(harness.provider.disconnect_count(), 1);

        // Late callbacks with the old handles are no-ops.
        router::on_data_change(group, "Tag1", &ItemStateFixtures::good_int(1), HResult::S_OK);
        router::on_disconnect(client, HResult::RPC_E_DISCONNECTED);
        events.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_drop_unregisters_handles() {
        let provider = ProviderFixtures::simulation();
        let (group, client) = {
            let session = Session::new(Arc::clone(&provider) as _).unwrap();
            let group = session.create_group("G", 1000, 0.0).unwrap();
            assert!(router::is_live(LiveHandle::Group(group)));
            (group, session.client_handle())
        };

        assert!(!router::is_live(LiveHandle::Group(group)));
        assert!(!router::is_live(LiveHandle::Client(client)));
        router::on_data_change(group, "Tag1", &ItemStateFixtures::good_int(1), HResult::S_OK);
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let harness = BridgeHarness::new();
        harness.session.close();

        assert!(harness.session.read("Random.Int4").is_err());
        assert!(harness.session.create_group("G", 1000, 0.0).is_err());
        assert!(harness.session.connect("localhost", "prog.id").is_err());
        assert_eq!(harness.provider.read_count(), 0);
    }

    #[tokio::test]
    async fn test_tasks_in_flight_finish_after_close() {
        let mut harness = BridgeHarness::new();
        harness.connection.expect(EventKind::Init).await;
        harness.provider.set_call_delay(Duration::from_millis(200));

        let connect = harness
            .session
            .connect(ProviderFixtures::HOST, ProviderFixtures::PROG_ID)
            .unwrap();
        let read = harness.session.read("Random.Int4").unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        harness.session.close();

        assert_eq!(read.await.unwrap(), Value::Int32(42));
        assert!(!connect.await.unwrap());

        harness.connection.assert_quiet().await;
        assert_eq!(harness.provider.connect_count(), 1);
        assert!(!harness.provider.is_connected());
        assert_eq!(harness.provider.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_after_drop_is_disconnected() {
        let provider = ProviderFixtures::simulation();
        provider.set_call_delay(Duration::from_millis(100));

        let (connect, read) = {
            let session = Session::new(Arc::clone(&provider) as _).unwrap();
            let connect = session
                .connect(ProviderFixtures::HOST, ProviderFixtures::PROG_ID)
                .unwrap();
            let read = session.read("Random.Real8").unwrap();
            (connect, read)
        };

        assert!(!connect.await.unwrap());
        assert_eq!(read.await.unwrap(), Value::Float64(21.5));
        assert!(!provider.is_connected());
        assert_eq!(provider.disconnect_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_racing_group_creation_leaves_nothing_live() {
        let harness = BridgeHarness::new();
        let session = &harness.session;

        let created = std::thread::scope(|scope| {
            let creator = scope.spawn(|| {
                (0..200)
                    .filter_map(|i| session.create_group(&format!("G{}", i), 1000, 0.0).ok())
                    .collect::<Vec<_>>()
            });
            std::thread::sleep(Duration::from_millis(1));
            session.close();
            creator.join().unwrap()
        });

        for handle in created {
            assert!(!router::is_live(LiveHandle::Group(handle)), "{} still routed", handle);
        }
        assert!(session.group_names().is_empty());
        assert_eq!(harness.provider.group_count(), 0);
    }
}

// =============================================================================
// Read, Write and Browse
// =============================================================================

mod io_tests {
    use super::*;

    #[tokio::test]
    async fn test_read() {
        let harness = BridgeHarness::connected().await;

        let value = harness.session.read("Random.Int4").unwrap().await.unwrap();
        assert_eq!(value, Value::Int32(42));

        let value = harness.session.read("Random.ArrayOfReal8").unwrap().await.unwrap();
        assert!(value.is_unsupported());

        let err = harness.session.read("Nope").unwrap().await.unwrap_err();
        assert!(matches!(err, BridgeError::Read { .. }));
        assert_eq!(err.provider_code(), Some(HResult::OPC_E_UNKNOWNITEMID));
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let harness = BridgeHarness::connected().await;

        for value in ValueFixtures::writable() {
            harness.session.write("Bucket.Value", value.clone()).unwrap().await.unwrap();
            let read = harness.session.read("Bucket.Value").unwrap().await.unwrap();
            assert_eq!(read, value);
        }
        assert_eq!(
            harness.provider.write_history().len(),
            ValueFixtures::writable().len()
        );
    }

    #[tokio::test]
    async fn test_unwritable_shapes_never_reach_provider() {
        let harness = BridgeHarness::connected().await;

        for value in ValueFixtures::unwritable() {
            let err = harness.session.write("Bucket.Value", value).unwrap().await.unwrap_err();
            assert!(matches!(err, BridgeError::Write { .. }));
        }
        assert_eq!(harness.provider.write_count(), 0);
    }

    #[tokio::test]
    async fn test_write_rejected_by_provider() {
        let harness = BridgeHarness::connected().await;
        harness.provider.set_fail_writes(true);

        let err = harness
            .session
            .write("Random.Int4", Value::Int32(1))
            .unwrap()
            .await
            .unwrap_err();
        assert_eq!(err.provider_code(), Some(HResult::OPC_E_BADRIGHTS));
        assert_eq!(harness.provider.value("Random.Int4"), Some(Variant::I4(42)));
    }

    #[tokio::test]
    async fn test_browse() {
        let harness = BridgeHarness::connected().await;

        let root = harness.session.browse(None).unwrap().await.unwrap();
        assert_eq!(root, vec!["Random", "Bucket Brigade", "Write Only"]);

        let children = harness.session.browse(Some("Random")).unwrap().await.unwrap();
        assert_eq!(children.len(), 3);

        let err = harness.session.browse(Some("Nope")).unwrap().await.unwrap_err();
        assert!(matches!(err, BridgeError::Browse { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_reads() {
        let harness = BridgeHarness::connected().await;

        let tasks: Vec<_> = (0..16)
            .map(|_| harness.session.read("Random.Real8").unwrap())
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), Value::Float64(21.5));
        }

        let stats = harness.session.stats();
        assert_eq!(stats.tasks_in_flight(), 0);
        assert_eq!(harness.provider.read_count(), 16);
    }
}
