//! WebSocket upgrade + game loop. Each connection owns one `Game`; client
//! messages and frame ticks are serialized through a single `select!` loop,
//! so the game is never touched concurrently.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, Instrument};
use uuid::Uuid;

use crate::bus::{BusPayload, EventBus, OVERLAY_REQUESTED, PHASE_READY};
use crate::game::Game;
use crate::presenter::RecordingPresenter;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

type Outbox = Arc<Mutex<Vec<ServerWsMessage>>>;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!(target: "reef_quiz", "WebSocket upgrade requested");
    ws.on_upgrade(move |socket| {
        let conn = Uuid::new_v4();
        handle_ws(socket, state).instrument(tracing::info_span!("game", %conn))
    })
}

/// Relay the bus topics the host cares about into the connection outbox.
fn relay_bus(bus: &EventBus, outbox: &Outbox) {
    let sink = Arc::clone(outbox);
    bus.subscribe(PHASE_READY, move |payload| {
        if let BusPayload::Phase(handle) = payload {
            push(&sink, ServerWsMessage::PhaseReady { handle: *handle });
        }
    });
    let sink = Arc::clone(outbox);
    bus.subscribe(OVERLAY_REQUESTED, move |_| push(&sink, ServerWsMessage::OverlayRequested));
}

fn push(outbox: &Outbox, msg: ServerWsMessage) {
    outbox.lock().unwrap_or_else(|p| p.into_inner()).push(msg);
}

/// Everything queued since the last flush: bus events first, then presentation.
fn pending(outbox: &Outbox, game: &mut Game<RecordingPresenter>) -> Vec<ServerWsMessage> {
    let mut out = std::mem::take(&mut *outbox.lock().unwrap_or_else(|p| p.into_inner()));
    let commands = game.presenter_mut().drain();
    if !commands.is_empty() {
        out.push(ServerWsMessage::Present { commands });
    }
    out
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
    let out = serde_json::to_string(msg).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });
    socket.send(Message::Text(out)).await
}

async fn flush(socket: &mut WebSocket, outbox: &Outbox, game: &mut Game<RecordingPresenter>) -> Result<(), axum::Error> {
    for msg in pending(outbox, game) {
        send(socket, &msg).await?;
    }
    Ok(())
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let live = state.game_opened();
    info!(target: "reef_quiz", live_games = live, "WebSocket connected");

    let outbox: Outbox = Arc::new(Mutex::new(Vec::new()));
    let bus = EventBus::new();
    relay_bus(&bus, &outbox);

    let mut game = match Game::new(&state.config, Arc::clone(&state.bank), bus, RecordingPresenter::default()) {
        Ok(game) => game,
        Err(e) => {
            error!(target: "reef_quiz", error = %e, "Game refused its configuration");
            let _ = send(&mut socket, &ServerWsMessage::Error { message: e.to_string() }).await;
            state.game_closed();
            return;
        }
    };
    game.boot();

    let mut ticker = interval(state.config.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    if let Err(e) = flush(&mut socket, &outbox, &mut game).await {
        error!(target: "reef_quiz", error = %e, "WS send error");
    } else {
        loop {
            tokio::select! {
                msg = socket.recv() => {
                    let Some(Ok(msg)) = msg else { break };
                    match msg {
                        Message::Text(txt) => {
                            // Parse, dispatch, then flush whatever the game produced.
                            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
                                Ok(incoming) => {
                                    debug!(target: "reef_quiz", "WS received: {:?}", &incoming);
                                    handle_client_ws(incoming, &mut game)
                                }
                                Err(e) => Some(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }),
                            };

                            let mut result = flush(&mut socket, &outbox, &mut game).await;
                            if let (true, Some(reply)) = (result.is_ok(), reply) {
                                result = send(&mut socket, &reply).await;
                            }
                            if let Err(e) = result {
                                error!(target: "reef_quiz", error = %e, "WS send error");
                                break;
                            }
                        }
                        Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                now = ticker.tick() => {
                    game.update(elapsed_since(&mut last, now));
                    if let Err(e) = flush(&mut socket, &outbox, &mut game).await {
                        error!(target: "reef_quiz", error = %e, "WS send error");
                        break;
                    }
                }
            }
        }
    }

    let live = state.game_closed();
    info!(target: "reef_quiz", live_games = live, sessions = game.session(), final_phase = ?game.phase(), "WebSocket disconnected");
}

fn elapsed_since(last: &mut Instant, now: Instant) -> Duration {
    let dt = now.saturating_duration_since(*last);
    *last = now;
    dt
}

/// Apply one client message. Returns a direct reply, if the message has one.
fn handle_client_ws(msg: ClientWsMessage, game: &mut Game<RecordingPresenter>) -> Option<ServerWsMessage> {
    match msg {
        ClientWsMessage::Ping => Some(ServerWsMessage::Pong),
        ClientWsMessage::Proximity { object_id } => {
            let outcome = game.on_proximity(object_id);
            debug!(target: "challenge", object = %object_id, ?outcome, "WS proximity handled");
            None
        }
        ClientWsMessage::SelectAnswer { region_id } => {
            let outcome = game.on_answer_selected(region_id);
            debug!(target: "challenge", object = %region_id.object, index = region_id.index, ?outcome, "WS selection handled");
            None
        }
        ClientWsMessage::Move { direction } => {
            game.on_movement_input(direction);
            None
        }
        ClientWsMessage::RequestOverlay => {
            game.request_overlay();
            None
        }
        ClientWsMessage::Start => {
            game.start();
            None
        }
        ClientWsMessage::Abandon => {
            game.abandon();
            None
        }
        ClientWsMessage::Restart => {
            game.restart();
            None
        }
        ClientWsMessage::Snapshot => Some(ServerWsMessage::Snapshot { snapshot: game.snapshot() }),
    }
}
