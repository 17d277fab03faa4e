//! Update loop tests with a scripted transport.
//!
//! Run with: cargo test --test dispatcher_test

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{press_update, test_config, text_update, update, vehicle, Delivery, MockStorage, MockTransport, ADMIN};
use fleetbot::config::{Config, DispatchConfig};
use fleetbot::telegram::dispatcher::process;
use fleetbot::telegram::{ConversationId, MessageId, TransportError, UpdateKind};
use fleetbot::{Dispatcher, Engine};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

const CARLA: i64 = 300;
const BORIS: i64 = 400;

fn fast_dispatch(workers: usize) -> DispatchConfig {
    DispatchConfig {
        workers,
        retry_delay_secs: 0,
        ..DispatchConfig::default()
    }
}

fn seeded_storage() -> Arc<MockStorage> {
    let storage = Arc::new(MockStorage::new());
    storage.insert_user(ADMIN, "Anna Admin", true);
    storage.insert_user(CARLA, "Carla", true);
    storage.insert_user(BORIS, "Boris", true);
    storage.insert_vehicle(vehicle(7, "KAMAZ 5490", "A123BC77", 120_000));
    storage
}

/// Runs the dispatcher until the script is exhausted and every lane drained.
async fn run_script(
    storage: Arc<MockStorage>,
    config: &Config,
    script: Vec<Result<Vec<fleetbot::telegram::Update>, TransportError>>,
) -> Arc<MockTransport> {
    let shutdown = CancellationToken::new();
    let transport = Arc::new(MockTransport::new(script, shutdown.clone()));
    let engine = Arc::new(Engine::new(storage, config));
    let dispatcher = Dispatcher::new(transport.clone(), engine, &config.dispatch);

    tokio::time::timeout(Duration::from_secs(10), dispatcher.run(shutdown))
        .await
        .expect("dispatcher did not stop");
    transport
}

fn sent_to(transport: &MockTransport, user_id: i64) -> Vec<String> {
    transport
        .deliveries()
        .into_iter()
        .filter_map(|d| match d {
            Delivery::Send { conversation, text, .. } if conversation == ConversationId(user_id) => Some(text),
            _ => None,
        })
        .collect()
}

fn repair_dialog(first_id: i64, user_id: i64, description: &str) -> Vec<fleetbot::telegram::Update> {
    vec![
        press_update(first_id, user_id, "add_repair_7"),
        text_update(first_id + 1, user_id, "15.03.2025"),
        text_update(first_id + 2, user_id, "45000"),
        text_update(first_id + 3, user_id, description),
        text_update(first_id + 4, user_id, "1500"),
    ]
}

#[tokio::test]
async fn test_conversations_are_handled_in_order() {
    let storage = seeded_storage();
    let config = Config {
        dispatch: fast_dispatch(4),
        ..test_config()
    };

    // Two dialogs interleaved within one batch, the rest in a second batch
    let carla = repair_dialog(1, CARLA, "clutch");
    let boris = repair_dialog(101, BORIS, "mirror");
    let mut first_batch = Vec::new();
    for (c, b) in carla.iter().zip(&boris).take(3) {
        first_batch.push(c.clone());
        first_batch.push(b.clone());
    }
    let second_batch: Vec<_> = carla[3..].iter().chain(&boris[3..]).cloned().collect();

    let transport = run_script(storage.clone(), &config, vec![Ok(first_batch), Ok(second_batch)]).await;

    let mut descriptions: Vec<String> = storage.repairs().into_iter().map(|r| r.description).collect();
    descriptions.sort();
    assert_eq!(descriptions, vec!["clutch", "mirror"]);

    let carla_sent = sent_to(&transport, CARLA);
    assert!(carla_sent[0].contains("Enter the mileage at repair"));
    assert!(carla_sent[1].contains("Describe the repair"));
    assert!(carla_sent[2].contains("Enter the repair cost"));
    assert_eq!(carla_sent[3], "✅ Repair recorded.");

    // Offsets start at 0, then move one past the highest id of each batch
    assert_eq!(transport.offsets(), vec![0, 104, 106]);
}

#[tokio::test]
async fn test_unsupported_updates_only_move_the_offset() {
    let storage = seeded_storage();
    let config = Config {
        dispatch: fast_dispatch(2),
        ..test_config()
    };
    let script = vec![Ok(vec![update(41, CARLA, UpdateKind::Unsupported)])];

    let transport = run_script(storage.clone(), &config, script).await;

    assert!(transport.deliveries().is_empty());
    assert!(storage.writes().is_empty());
    assert_eq!(transport.offsets(), vec![0, 42]);
}

#[tokio::test]
async fn test_polling_errors_are_retried() {
    let storage = seeded_storage();
    let config = Config {
        dispatch: fast_dispatch(1),
        ..test_config()
    };
    let script = vec![
        Err(TransportError::Network("connection reset".into())),
        Ok(vec![text_update(5, CARLA, "/start")]),
    ];

    let transport = run_script(storage, &config, script).await;

    assert_eq!(transport.offsets(), vec![0, 0, 6]);
    assert_eq!(sent_to(&transport, CARLA).len(), 1);
}

#[tokio::test]
async fn test_every_callback_is_answered_once() {
    let storage = seeded_storage();
    let config = Config {
        dispatch: fast_dispatch(2),
        ..test_config()
    };
    let script = vec![Ok(vec![
        press_update(1, CARLA, "vehicle_7"),
        press_update(2, CARLA, "definitely_not_a_button"),
        press_update(3, CARLA, "noop"),
    ])];

    let transport = run_script(storage, &config, script).await;

    assert_eq!(
        transport.answers(),
        vec![
            Delivery::Answer {
                query_id: "q1".into(),
                text: None,
                alert: false
            },
            Delivery::Answer {
                query_id: "q2".into(),
                text: Some("This button is no longer valid".into()),
                alert: false
            },
            Delivery::Answer {
                query_id: "q3".into(),
                text: None,
                alert: false
            },
        ]
    );
    // The vehicle card replaced the pressed message
    assert!(transport.deliveries().iter().any(|d| matches!(
        d,
        Delivery::Edit { message_id: MessageId(77), text, .. } if text.contains("KAMAZ 5490")
    )));
}

#[tokio::test]
async fn test_denied_press_is_answered_with_an_alert() {
    let storage = seeded_storage();
    storage.insert_user(CARLA, "Carla", false);
    let engine = Engine::new(storage, &test_config());
    let transport = MockTransport::new(Vec::new(), CancellationToken::new());

    process(&engine, &transport, &press_update(9, CARLA, "add_repair_7")).await;

    assert_eq!(
        transport.deliveries(),
        vec![Delivery::Answer {
            query_id: "q9".into(),
            text: Some("⛔ Only admins can do this.".into()),
            alert: true
        }]
    );
}

#[tokio::test]
async fn test_cancel_answers_with_notice_and_shows_screen() {
    let storage = seeded_storage();
    let engine = Engine::new(storage, &test_config());
    let transport = MockTransport::new(Vec::new(), CancellationToken::new());

    process(&engine, &transport, &press_update(1, CARLA, "add_repair_7")).await;
    process(&engine, &transport, &press_update(2, CARLA, "cancel")).await;

    let answers = transport.answers();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[1].text(), Some("❌ Cancelled"));
    let last = transport.deliveries().pop().unwrap();
    assert!(matches!(last, Delivery::Edit { ref text, .. } if text.contains("KAMAZ 5490")));
}

#[tokio::test]
async fn test_failed_edit_falls_back_to_send() {
    let storage = seeded_storage();
    let engine = Engine::new(storage, &test_config());
    let transport = MockTransport::new(Vec::new(), CancellationToken::new());
    transport.fail_edits();

    process(&engine, &transport, &press_update(1, CARLA, "vehicle_7")).await;

    let sent = sent_to(&transport, CARLA);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("KAMAZ 5490"));
}

#[tokio::test]
async fn test_notices_outside_button_presses_become_messages() {
    let storage = seeded_storage();
    let engine = Engine::new(storage, &test_config());
    let transport = MockTransport::new(Vec::new(), CancellationToken::new());

    process(&engine, &transport, &text_update(1, CARLA, "hello")).await;

    assert!(transport.answers().is_empty());
    assert_eq!(sent_to(&transport, CARLA).len(), 1);
}

#[tokio::test]
async fn test_idle_flows_expire() {
    let storage = seeded_storage();
    let mut config = test_config();
    config.dispatch.flow_idle_timeout_secs = 1;
    let engine = Engine::new(storage.clone(), &config);
    let transport = MockTransport::new(Vec::new(), CancellationToken::new());

    process(&engine, &transport, &press_update(1, CARLA, "add_repair_7")).await;
    assert!(!engine.state(ConversationId(CARLA)).is_idle());

    tokio::time::sleep(Duration::from_millis(1200)).await;
    process(&engine, &transport, &text_update(2, CARLA, "15.03.2025")).await;

    assert!(engine.state(ConversationId(CARLA)).is_idle());
    let sent = sent_to(&transport, CARLA);
    assert!(sent.last().unwrap().contains("Use the menu buttons"));
    assert!(storage.writes().is_empty());
    assert_eq!(storage.repairs().len(), 0);
}
