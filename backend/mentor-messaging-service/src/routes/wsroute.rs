use std::time::Instant;

use actix::{
    Actor, ActorContext, ActorFutureExt, Addr, AsyncContext, Handler, Message as ActixMessage,
    StreamHandler, WrapFuture,
};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::middleware::User;
use crate::services::{MessagingService, SendMessage};
use crate::state::AppState;
use crate::websocket::{ClientEvent, ConnectionHandle, ServerEvent};

// Server event addressed to this connection only
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct Reply(ServerEvent);

/// One live real-time channel.
///
/// Outbound events arrive already serialized on the connection's queue and
/// are written to the socket in order. Inbound `send_message` frames are
/// handed to a per-session queue drained by a single task, so this
/// connection's sends commit in the order they were received while the
/// actor keeps writing outbound events.
struct WsSession {
    user_id: Uuid,
    handle: ConnectionHandle,
    outbound: Option<mpsc::Receiver<String>>,
    pending_sends: Option<mpsc::Sender<SendMessage>>,
    state: AppState,
    hb: Instant,
}

impl WsSession {
    fn new(
        user_id: Uuid,
        handle: ConnectionHandle,
        outbound: mpsc::Receiver<String>,
        state: AppState,
    ) -> Self {
        Self {
            user_id,
            handle,
            outbound: Some(outbound),
            pending_sends: None,
            state,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let interval = self.state.config.realtime.heartbeat_interval();
        let timeout = self.state.config.realtime.client_timeout();
        ctx.run_interval(interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > timeout {
                warn!(
                    user_id = %act.user_id,
                    connection = %act.handle,
                    "WebSocket heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_event(&mut self, event: ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        match event {
            ClientEvent::Ping => send_event(ctx, &ServerEvent::Pong),

            ClientEvent::SendMessage {
                thread_id,
                content,
                receiver_id,
                client_message_id,
            } => {
                let cmd = SendMessage {
                    thread_id,
                    receiver_id,
                    content,
                    client_message_id,
                };
                let Some(pending) = &self.pending_sends else {
                    return;
                };
                if let Err(e) = pending.try_send(cmd) {
                    let reason = match &e {
                        TrySendError::Full(_) => "too many pending sends",
                        TrySendError::Closed(_) => "session is closing",
                    };
                    let cmd = e.into_inner();
                    send_event(
                        ctx,
                        &ServerEvent::SendFailed {
                            client_message_id: cmd.client_message_id,
                            thread_id: cmd.thread_id,
                            error: reason.to_string(),
                            retryable: true,
                        },
                    );
                }
            }

            ClientEvent::MarkRead { thread_id } => {
                let read_state = self.state.read_state.clone();
                let user_id = self.user_id;

                ctx.spawn(
                    async move { read_state.mark_read(thread_id, user_id).await }
                        .into_actor(self)
                        .map(|result, _act, ctx| {
                            if let Err(e) = result {
                                send_event(
                                    ctx,
                                    &ServerEvent::Error {
                                        code: e.code().to_string(),
                                        message: e.public_message(),
                                    },
                                );
                            }
                        }),
                );
            }
        }
    }
}

/// Commit queued sends one at a time. Failures go back to the originating
/// session as `send_failed`.
async fn drain_sends(
    messaging: MessagingService,
    user_id: Uuid,
    mut pending: mpsc::Receiver<SendMessage>,
    session: Addr<WsSession>,
) {
    while let Some(cmd) = pending.recv().await {
        let client_message_id = cmd.client_message_id.clone();
        let thread_id = cmd.thread_id;
        if let Err(e) = messaging.send(user_id, cmd).await {
            warn!(user_id = %user_id, error = %e, "send over WebSocket failed");
            session.do_send(Reply(ServerEvent::SendFailed {
                client_message_id,
                thread_id,
                error: e.public_message(),
                retryable: e.is_retryable(),
            }));
        }
    }
}

fn send_event(ctx: &mut ws::WebsocketContext<WsSession>, event: &ServerEvent) {
    match event.to_json() {
        Ok(text) => ctx.text(text),
        Err(e) => tracing::error!(error = %e, event = event.event_type(), "failed to serialize event"),
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            user_id = %self.user_id,
            connection = %self.handle,
            "WebSocket session started"
        );

        self.hb(ctx);

        if let Some(rx) = self.outbound.take() {
            ctx.add_stream(ReceiverStream::new(rx));
        }

        let (tx, rx) = mpsc::channel(self.state.config.realtime.connection_buffer);
        self.pending_sends = Some(tx);
        actix::spawn(drain_sends(
            self.state.messaging.clone(),
            self.user_id,
            rx,
            ctx.address(),
        ));

        send_event(
            ctx,
            &ServerEvent::Connected {
                connection_id: self.handle.0,
                user_id: self.user_id,
            },
        );
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(
            user_id = %self.user_id,
            connection = %self.handle,
            "WebSocket session stopped"
        );

        let registry = self.state.registry.clone();
        let handle = self.handle;
        actix::spawn(async move {
            registry.unregister(handle).await;
        });
    }
}

impl Handler<Reply> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: Reply, ctx: &mut Self::Context) {
        send_event(ctx, &msg.0);
    }
}

// Events published to this connection
impl StreamHandler<String> for WsSession {
    fn handle(&mut self, payload: String, ctx: &mut Self::Context) {
        ctx.text(payload);
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        // The broadcaster dropped this connection as unresponsive.
        debug!(connection = %self.handle, "outbound queue closed");
        ctx.stop();
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                match ClientEvent::from_json(&text) {
                    Ok(event) => self.handle_event(event, ctx),
                    Err(e) => {
                        debug!(connection = %self.handle, error = %e, "malformed frame");
                        send_event(
                            ctx,
                            &ServerEvent::Error {
                                code: "INVALID_EVENT".to_string(),
                                message: e.to_string(),
                            },
                        );
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                warn!(connection = %self.handle, "Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                debug!(connection = %self.handle, ?reason, "WebSocket close received");
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!(connection = %self.handle, error = %e, "WebSocket protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, Error> {
    let (handle, rx) = state.registry.register(user.id).await;
    let session = WsSession::new(user.id, handle, rx, state.get_ref().clone());

    match ws::start(session, &req, stream) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            state.registry.unregister(handle).await;
            Err(e)
        }
    }
}

