// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end dashboard sessions over the in-memory broker and mock API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use soporte_core::{Collection, ConnectionStatus, EntityId, Role, ScopeId, TicketStatus};
use soporte_realtime::{OpenView, ViewKind};
use soporte_sync::{
    Action, DashboardSession, OrchestratorSettings, REQUEST_SYNC_EVENT, SessionSettings,
    is_temporary,
};
use soporte_test_utils::{MemoryBroker, MockTicketApi, mint_expired_token, mint_valid_token};

fn settings(refresh_on_event: bool) -> SessionSettings {
    SessionSettings {
        handshake_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(2),
        optimistic_match_window: Duration::from_secs(30),
        notification_capacity: 100,
        polling: None,
        orchestrator: OrchestratorSettings {
            refresh_on_event,
            reconcile_debounce: Duration::from_millis(20),
        },
    }
}

fn dashboard(
    role: Role,
    user_id: &str,
    api: &Arc<MockTicketApi>,
    broker: &MemoryBroker,
    refresh_on_event: bool,
) -> DashboardSession {
    DashboardSession::new(
        &mint_valid_token(user_id, role),
        api.clone(),
        Arc::new(broker.clone()),
        settings(refresh_on_event),
    )
    .expect("valid session")
}

const POLLS: usize = 200;
const POLL_EVERY: Duration = Duration::from_millis(10);

async fn wait_for_members(broker: &MemoryBroker, scope: &ScopeId, members: usize) {
    for _ in 0..POLLS {
        if broker.members(scope) == members {
            return;
        }
        tokio::time::sleep(POLL_EVERY).await;
    }
    panic!("{scope} never reached {members} members");
}

async fn wait_for_ticket(
    session: &DashboardSession,
    id: i64,
    what: &str,
    check: impl Fn(&Value) -> bool,
) {
    for _ in 0..POLLS {
        if ticket(session, id).await.is_some_and(|t| check(&t)) {
            return;
        }
        tokio::time::sleep(POLL_EVERY).await;
    }
    panic!("timed out waiting for {what}");
}

async fn wait_for_notification(session: &DashboardSession, name: &str) {
    for _ in 0..POLLS {
        if session.recent_notifications(50).iter().any(|n| n.name == name) {
            return;
        }
        tokio::time::sleep(POLL_EVERY).await;
    }
    panic!("{name} never arrived");
}

async fn ticket(session: &DashboardSession, id: i64) -> Option<Value> {
    session
        .store()
        .get(Collection::Tickets, &EntityId::Int(id))
        .await
        .map(|t| t.into_value())
}

#[tokio::test]
async fn supervisor_assignment_is_optimistic_and_survives_the_late_event() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![
        json!({"id": 42, "estado": "en_espera", "prioridad": "alta", "asignacion_actual": null}),
    ]));
    api.add_analyst(json!({"id": 7, "nombre": "Ana"}));
    let broker = MemoryBroker::new();
    let supervisor = dashboard(Role::Supervisor, "1", &api, &broker, true);
    supervisor.start().await.unwrap();
    let scope = ScopeId::new("ticket:42");
    wait_for_members(&broker, &scope, 1).await;

    api.set_delay(Duration::from_millis(300));
    let pending = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.perform(Action::assign(42, 7)).await }
    });

    wait_for_ticket(&supervisor, 42, "optimistic assignment", |t| {
        t["asignacion_actual"]["id_analista"] == 7
    })
    .await;
    assert!(!pending.is_finished(), "assignment shown before confirmation");

    let confirmed = pending.await.unwrap().unwrap();
    assert_eq!(confirmed.get("estado"), Some(&json!("en_espera")));
    api.set_delay(Duration::ZERO);

    let emitted = broker.emitted_named("ticket_asignado");
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].scope, Some(scope.clone()));
    assert_eq!(emitted[0].payload["ticket"]["asignacion_actual"]["id_analista"], 7);

    broker.publish(
        &scope,
        "ticket_asignado",
        json!({"ticket_id": 42, "analista_id": 7}),
    );
    wait_for_notification(&supervisor, "ticket_asignado").await;

    let tickets = supervisor.store().list(Collection::Tickets).await;
    assert_eq!(tickets.len(), 1);
    let t = ticket(&supervisor, 42).await.unwrap();
    assert_eq!(t["estado"], "en_espera");
    assert_eq!(t["prioridad"], "alta");
    assert_eq!(
        t["asignacion_actual"],
        json!({"id_analista": 7, "es_reasignacion": false})
    );

    supervisor.stop().await;
}

#[tokio::test]
async fn two_dashboards_converge_on_a_solved_ticket() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![json!({
        "id": 42,
        "estado": "en_proceso",
        "asignacion_actual": {"id_analista": 7},
    })]));
    let broker = MemoryBroker::new();
    let analyst = dashboard(Role::Analista, "7", &api, &broker, true);
    let supervisor = dashboard(Role::Supervisor, "1", &api, &broker, true);
    analyst.start().await.unwrap();
    supervisor.start().await.unwrap();
    let scope = ScopeId::new("ticket:42");
    wait_for_members(&broker, &scope, 2).await;

    analyst
        .perform(Action::change_status(42, TicketStatus::Solucionado))
        .await
        .unwrap();

    wait_for_ticket(&supervisor, 42, "supervisor convergence", |t| {
        t["estado"] == "solucionado"
    })
    .await;
    assert!(
        supervisor
            .recent_notifications(10)
            .iter()
            .any(|n| n.name == "ticket_solucionado")
    );
    assert_eq!(ticket(&analyst, 42).await.unwrap()["estado"], "solucionado");

    analyst.stop().await;
    supervisor.stop().await;
}

#[tokio::test]
async fn failed_actions_roll_back_to_the_exact_snapshot() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![
        json!({"id": 41, "estado": "creado"}),
        json!({"id": 42, "estado": "en_espera", "asignacion_actual": null}),
    ]));
    let broker = MemoryBroker::new();
    let supervisor = dashboard(Role::Supervisor, "1", &api, &broker, false);
    supervisor.start().await.unwrap();
    let before = supervisor.store().snapshot().await;

    api.set_failure(Some(500));
    let err = supervisor.perform(Action::assign(42, 7)).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(supervisor.store().snapshot().await, before);

    supervisor
        .perform(Action::comment(42, "reinicie el equipo"))
        .await
        .unwrap_err();
    assert_eq!(supervisor.store().snapshot().await, before);
    assert!(broker.emitted().is_empty());

    supervisor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn action_timeout_rolls_back() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 5, "estado": "en_proceso"})]));
    let broker = MemoryBroker::new();
    let analyst = dashboard(Role::Analista, "7", &api, &broker, false);
    analyst.start().await.unwrap();
    let before = analyst.store().snapshot().await;

    api.set_delay(Duration::from_secs(60));
    let err = analyst
        .perform(Action::change_status(5, TicketStatus::Escalado))
        .await
        .unwrap_err();
    assert!(matches!(err, soporte_core::SoporteError::Timeout { .. }));
    assert_eq!(analyst.store().snapshot().await, before);
}

#[tokio::test(start_paused = true)]
async fn overlapping_failed_actions_restore_the_first_snapshot() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 5, "estado": "en_proceso"})]));
    let broker = MemoryBroker::new();
    let analyst = dashboard(Role::Analista, "7", &api, &broker, false);
    analyst.start().await.unwrap();
    let before = analyst.store().snapshot().await;

    api.set_failure(Some(500));
    api.set_delay(Duration::from_millis(100));
    let first = tokio::spawn({
        let analyst = analyst.clone();
        async move { analyst.perform(Action::change_status(5, TicketStatus::Escalado)).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = analyst
        .perform(Action::change_status(5, TicketStatus::Solucionado))
        .await;

    assert!(first.await.unwrap().is_err());
    assert!(second.is_err());
    assert_eq!(ticket(&analyst, 5).await.unwrap()["estado"], "en_proceso");
    assert_eq!(analyst.store().snapshot().await, before);
}

#[tokio::test(start_paused = true)]
async fn failure_after_an_overlapping_confirmation_keeps_the_server_record() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 5, "estado": "en_proceso"})]));
    let broker = MemoryBroker::new();
    let analyst = dashboard(Role::Analista, "7", &api, &broker, false);
    analyst.start().await.unwrap();

    api.set_delay(Duration::from_millis(100));
    let first = tokio::spawn({
        let analyst = analyst.clone();
        async move { analyst.perform(Action::change_status(5, TicketStatus::Escalado)).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = tokio::spawn({
        let analyst = analyst.clone();
        async move { analyst.perform(Action::change_status(5, TicketStatus::Solucionado)).await }
    });
    tokio::time::sleep(Duration::from_millis(90)).await;
    api.set_failure(Some(500));

    let confirmed = first.await.unwrap().unwrap();
    assert_eq!(confirmed.get("estado"), Some(&json!("escalado")));
    assert!(second.await.unwrap().is_err());
    assert_eq!(ticket(&analyst, 5).await.unwrap()["estado"], "escalado");
}

/// Runs one status change on ticket 42 while the server broadcasts the
/// updated record, delivering the broadcast before or after the REST
/// confirmation, and returns the settled ticket list.
async fn status_change_racing_its_broadcast(broadcast_first: bool) -> Vec<Value> {
    let api = Arc::new(MockTicketApi::with_tickets(vec![
        json!({"id": 42, "estado": "en_espera", "prioridad": "alta", "titulo": "VPN caída"}),
        json!({"id": 43, "estado": "creado"}),
    ]));
    let broker = MemoryBroker::new();
    let analyst = dashboard(Role::Analista, "7", &api, &broker, false);
    analyst.start().await.unwrap();
    let scope = ScopeId::new("ticket:42");
    wait_for_members(&broker, &scope, 1).await;

    let server_record = json!({
        "id": 42, "estado": "en_proceso", "prioridad": "alta", "titulo": "VPN caída",
    });
    let broadcast = || {
        broker.publish(
            &scope,
            "ticket_updated",
            json!({"ticket_id": 42, "ticket": server_record.clone()}),
        )
    };

    api.set_delay(Duration::from_millis(200));
    let pending = tokio::spawn({
        let analyst = analyst.clone();
        async move { analyst.perform(Action::change_status(42, TicketStatus::EnProceso)).await }
    });
    wait_for_ticket(&analyst, 42, "optimistic status", |t| t["estado"] == "en_proceso").await;

    if broadcast_first {
        broadcast();
        wait_for_notification(&analyst, "ticket_updated").await;
        assert!(!pending.is_finished(), "broadcast arrived after the confirmation");
        pending.await.unwrap().unwrap();
        api.set_delay(Duration::ZERO);
    } else {
        pending.await.unwrap().unwrap();
        api.set_delay(Duration::ZERO);
        broadcast();
        wait_for_notification(&analyst, "ticket_updated").await;
    }
    // Let the debounced reconciling refresh land.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let tickets = analyst
        .store()
        .list(Collection::Tickets)
        .await
        .into_iter()
        .map(|t| t.into_value())
        .collect();
    analyst.stop().await;
    tickets
}

#[tokio::test]
async fn confirmation_and_broadcast_converge_in_either_order() {
    let broadcast_first = status_change_racing_its_broadcast(true).await;
    let confirmation_first = status_change_racing_its_broadcast(false).await;

    assert_eq!(broadcast_first, confirmation_first);
    assert_eq!(
        broadcast_first,
        vec![
            json!({"id": 42, "estado": "en_proceso", "prioridad": "alta", "titulo": "VPN caída"}),
            json!({"id": 43, "estado": "creado"}),
        ]
    );
}

#[tokio::test]
async fn connecting_twice_does_not_duplicate_subscriptions() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 1, "estado": "creado"})]));
    let broker = MemoryBroker::new();
    let supervisor = dashboard(Role::Supervisor, "1", &api, &broker, false);

    let first = supervisor.start().await.unwrap();
    let second = supervisor.connect().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(broker.open_count(), 1);
    assert_eq!(broker.join_count(&ScopeId::new("role:supervisor")), 1);
    assert_eq!(broker.join_count(&ScopeId::new("ticket:1")), 1);
    assert_eq!(first.listener_count(), 1);
}

#[tokio::test]
async fn flat_events_patch_and_embedded_events_replace() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![
        json!({"id": 1, "estado": "en_espera", "prioridad": "alta"}),
    ]));
    let broker = MemoryBroker::new();
    let supervisor = dashboard(Role::Supervisor, "1", &api, &broker, false);
    supervisor.start().await.unwrap();
    let scope = ScopeId::new("ticket:1");
    wait_for_members(&broker, &scope, 1).await;

    broker.publish(
        &scope,
        "ticket_updated",
        json!({"ticket_id": 1, "ticket_estado": "en_proceso"}),
    );
    wait_for_ticket(&supervisor, 1, "flat patch", |t| {
        *t == json!({"id": 1, "estado": "en_proceso", "prioridad": "alta"})
    })
    .await;

    broker.publish(
        &scope,
        "ticket_cerrado",
        json!({"ticket_id": 1, "ticket": {"id": 1, "estado": "cerrado"}}),
    );
    wait_for_ticket(&supervisor, 1, "full replacement", |t| {
        *t == json!({"id": 1, "estado": "cerrado"})
    })
    .await;
}

#[tokio::test]
async fn persisted_comment_event_takes_over_the_optimistic_one() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 42, "estado": "en_proceso"})]));
    let broker = MemoryBroker::new();
    let analyst = dashboard(Role::Analista, "7", &api, &broker, false);
    analyst.start().await.unwrap();
    let scope = ScopeId::new("ticket:42");
    wait_for_members(&broker, &scope, 1).await;

    api.set_delay(Duration::from_millis(300));
    let pending = tokio::spawn({
        let analyst = analyst.clone();
        async move { analyst.perform(Action::comment(42, "hola")).await }
    });
    let mut shown = false;
    for _ in 0..POLLS {
        let comments = analyst.store().list(Collection::Comments).await;
        if comments.iter().any(|c| is_temporary(c.id())) {
            shown = true;
            break;
        }
        tokio::time::sleep(POLL_EVERY).await;
    }
    assert!(shown, "optimistic comment never shown");

    // The mock hands out comment ids from 1000.
    broker.publish(
        &scope,
        "nuevo_comentario",
        json!({"comentario": {"id": 1000, "id_ticket": 42, "texto": "hola"}}),
    );
    let confirmed = pending.await.unwrap().unwrap();
    assert_eq!(confirmed.id(), &EntityId::Int(1000));

    let comments = analyst.store().list(Collection::Comments).await;
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id(), &EntityId::Int(1000));
}

#[tokio::test]
async fn reconnect_rejoins_every_scope() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 42, "estado": "en_espera"})]));
    let broker = MemoryBroker::new();
    let supervisor = dashboard(Role::Supervisor, "1", &api, &broker, false);
    let first = supervisor.start().await.unwrap();
    let scope = ScopeId::new("ticket:42");
    wait_for_members(&broker, &scope, 1).await;

    broker.drop_all_clients();
    let mut status = supervisor.connection().watch_status();
    status
        .wait_for(|s| *s == ConnectionStatus::Disconnected)
        .await
        .unwrap();

    let second = supervisor.reconnect().await.unwrap();
    assert!(second.generation() > first.generation());
    assert_eq!(broker.members(&scope), 1);
    assert_eq!(broker.members(&ScopeId::new("global:tickets")), 1);

    broker.publish(&scope, "ticket_escalado", json!({"ticket_id": 42}));
    wait_for_ticket(&supervisor, 42, "event on the new connection", |t| {
        t["estado"] == "escalado"
    })
    .await;
}

#[tokio::test]
async fn manual_sync_asks_the_server_for_a_total_push() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 1, "estado": "creado"})]));
    let broker = MemoryBroker::new();
    let supervisor = dashboard(Role::Supervisor, "1", &api, &broker, false);
    supervisor.start().await.unwrap();
    let loads = api.call_count("list_tickets");

    supervisor.manual_sync().await;

    assert_eq!(api.call_count("list_tickets"), loads + 1);
    let requests = broker.emitted_named(REQUEST_SYNC_EVENT);
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].payload,
        json!({"role": "supervisor", "user_id": "1", "sync_type": "total"})
    );
}

#[tokio::test]
async fn views_join_and_leave_their_scopes() {
    let api = Arc::new(MockTicketApi::with_tickets(vec![json!({"id": 42, "estado": "en_proceso"})]));
    api.add_comment(json!({"id": 9, "id_ticket": 42, "texto": "primero"}));
    let broker = MemoryBroker::new();
    let client = dashboard(Role::Cliente, "3", &api, &broker, false);
    client.start().await.unwrap();

    let chat = OpenView::new(EntityId::Int(42), ViewKind::ChatAnalistaCliente);
    client.open_view(chat.clone()).await;
    let chat_scope = ScopeId::new("chat_analista_cliente:42");
    assert_eq!(broker.members(&chat_scope), 1);
    assert_eq!(
        client.store().detail(Collection::Tickets).await.map(|d| d.id().clone()),
        Some(EntityId::Int(42))
    );

    let comments = OpenView::new(EntityId::Int(42), ViewKind::Comments);
    client.open_view(comments.clone()).await;
    assert_eq!(client.store().list(Collection::Comments).await.len(), 1);

    client.close_view(&chat).await;
    assert_eq!(broker.members(&chat_scope), 0);
    assert_eq!(broker.members(&ScopeId::new("ticket:42")), 1);
    assert!(client.store().detail(Collection::Tickets).await.is_some());
    client.close_view(&comments).await;
    assert!(client.store().detail(Collection::Tickets).await.is_none());
}

#[tokio::test]
async fn expired_credentials_never_start_a_session() {
    let api = Arc::new(MockTicketApi::new());
    let err = DashboardSession::new(
        &mint_expired_token("1", Role::Supervisor),
        api,
        Arc::new(MemoryBroker::new()),
        settings(false),
    )
    .unwrap_err();
    assert!(err.forces_logout());
}
