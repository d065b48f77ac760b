use std::time::{Duration, Instant};

use actix::{
    fut, Actor, ActorContext, ActorFutureExt, Addr, AsyncContext, Running, StreamHandler,
    WrapFuture,
};
use actix_web_actors::ws;
use message_bus::{topics, Outbox};
use room_core::{Action, RoomId, UserId};
use tracing::{info, warn};

use crate::{
    hub::{ClientHub, Register, Unregister},
    protocol::{ClientFrame, ServerFrame},
};

type Ctx = ws::WebsocketContext<ClientSession>;

fn send_err(ctx: &mut Ctx, message: &str) {
    if let Some(text) = (ServerFrame::Error {
        message: message.to_string(),
    })
    .to_text()
    {
        ctx.text(text);
    }
}

/// One client connected to one room.
pub struct ClientSession {
    room_id: RoomId,
    user_id: UserId,
    hub: Addr<ClientHub>,
    outbox: Outbox,
    registered: bool,
    exited: bool,
    hb: Instant,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl ClientSession {
    pub fn new(
        room_id: RoomId,
        user_id: UserId,
        hub: Addr<ClientHub>,
        outbox: Outbox,
        heartbeat_interval: Duration,
        client_timeout: Duration,
    ) -> Self {
        Self {
            room_id,
            user_id,
            hub,
            outbox,
            registered: false,
            exited: false,
            hb: Instant::now(),
            heartbeat_interval,
            client_timeout,
        }
    }

    fn hb(&self, ctx: &mut Ctx) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.client_timeout {
                info!("[{}] Client {} heartbeat timed out", act.room_id, act.user_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn publish(&self, action: Action) {
        match serde_json::to_string(&action.to_request()) {
            Ok(payload) => self.outbox.send(topics::room_action(self.room_id), payload),
            Err(e) => warn!("Failed to serialize action: {}", e),
        }
    }

    fn handle_text(&mut self, ctx: &mut Ctx, text: &str) {
        if self.exited {
            return;
        }
        match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => {
                let action = frame.into_action(self.user_id);
                if let Action::Exit { .. } = action {
                    self.exited = true;
                }
                self.publish(action);
            }
            Err(e) => {
                metrics::ABNORMAL_UNKNOWN_TYPE_TOTAL.inc();
                warn!("[{}] Bad frame from {}: {}", self.room_id, self.user_id, e);
                send_err(ctx, "Invalid message format");
            }
        }
    }
}

impl Actor for ClientSession {
    type Context = Ctx;

    fn started(&mut self, ctx: &mut Self::Context) {
        metrics::ACTIVE_WS_CONNECTIONS.inc();
        self.hb(ctx);

        let register = self.hub.send(Register {
            room_id: self.room_id,
            client_id: self.user_id,
        });
        ctx.wait(register.into_actor(self).then(|res, act, ctx| {
            match res {
                Ok(Ok(frames)) => {
                    act.registered = true;
                    ctx.add_stream(frames);
                    // snapshot first so our own join arrives as an increment
                    act.publish(Action::InitSnapshot { user_id: act.user_id });
                    act.publish(Action::Join { user_id: act.user_id });
                    info!("[{}] Client {} connected", act.room_id, act.user_id);
                }
                Ok(Err(e)) => {
                    warn!("[{}] Rejecting connection: {}", act.room_id, e);
                    send_err(ctx, &e.to_string());
                    ctx.stop();
                }
                Err(e) => {
                    warn!("[{}] Hub unavailable: {}", act.room_id, e);
                    ctx.stop();
                }
            }
            fut::ready(())
        }));
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        if self.registered {
            if !self.exited {
                self.exited = true;
                self.publish(Action::Exit { user_id: self.user_id });
            }
            self.hub.do_send(Unregister {
                room_id: self.room_id,
                client_id: self.user_id,
            });
            self.registered = false;
        }
        Running::Stop
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        metrics::ACTIVE_WS_CONNECTIONS.dec();
        info!("[{}] Client {} disconnected", self.room_id, self.user_id);
    }
}

/// Frames routed to us by the hub.
impl StreamHandler<String> for ClientSession {
    fn handle(&mut self, frame: String, ctx: &mut Self::Context) {
        ctx.text(frame);
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        // hub dropped us
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ClientSession {
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
                self.handle_text(ctx, &text);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => ctx.stop(),
        }
    }
}
