use crate::error::RoomError;
use crate::person::{OccupantId, Person, PersonAction};
use crate::room::{Room, TickObserver, TickSubscription};
use presence_shared::protocol::PersonWire;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Settings every room loop is started with.
#[derive(Debug, Clone)]
pub struct RoomLoopConfig {
    pub tick_rate_hz: u32,
    pub broadcast_every_n_ticks: u64,
    /// Capacity of each room's outbound event channel
    pub event_capacity: usize,
}

impl Default for RoomLoopConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: presence_shared::config::TICK_RATE_HZ,
            broadcast_every_n_ticks: 2,
            event_capacity: 64,
        }
    }
}

/// Commands from sessions and the registry to a room loop
pub enum RoomCommand {
    AddOccupant {
        occupant_id: OccupantId,
        person: Person,
        response: oneshot::Sender<()>,
    },
    RemoveOccupant {
        occupant_id: OccupantId,
        response: oneshot::Sender<Removal>,
    },
    Apply {
        occupant_id: OccupantId,
        action: PersonAction,
    },
    Subscribe {
        observer: TickObserver,
        response: oneshot::Sender<TickSubscription>,
    },
    Unsubscribe {
        subscription: TickSubscription,
    },
    Snapshot {
        response: oneshot::Sender<RoomSnapshot>,
    },
    Stop,
}

/// Outcome of removing an occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub removed: bool,
    pub remaining: usize,
}

impl Removal {
    /// The removal emptied the room, so its loop has ended.
    pub fn emptied_room(&self) -> bool {
        self.removed && self.remaining == 0
    }
}

/// Broadcasts from a room loop to every connection in the room
#[derive(Debug, Clone)]
pub enum RoomEvent {
    PeopleState {
        server_time: u64,
        people: Vec<PersonWire>,
    },
    Connected {
        occupant_id: OccupantId,
    },
    Disconnected {
        occupant_id: OccupantId,
    },
    PersonYaw {
        occupant_id: OccupantId,
        yaw: f64,
    },
    PersonPitch {
        occupant_id: OccupantId,
        pitch: f64,
    },
    Username {
        occupant_id: OccupantId,
        username: String,
    },
}

impl RoomEvent {
    /// Occupant this event is about, who should not receive it. `None` means
    /// everyone in the room receives it.
    pub fn origin(&self) -> Option<&str> {
        match self {
            RoomEvent::PeopleState { .. } => None,
            RoomEvent::Connected { occupant_id }
            | RoomEvent::Disconnected { occupant_id }
            | RoomEvent::PersonYaw { occupant_id, .. }
            | RoomEvent::PersonPitch { occupant_id, .. }
            | RoomEvent::Username { occupant_id, .. } => Some(occupant_id),
        }
    }
}

/// Point-in-time copy of a room.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub server_time: u64,
    pub people: Vec<PersonWire>,
}

/// Cloneable handle to a running room loop.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: Arc<str>,
    commands: mpsc::UnboundedSender<RoomCommand>,
    events: broadcast::Sender<RoomEvent>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Receive this room's outbound events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// True once the loop has ended.
    pub fn is_stopped(&self) -> bool {
        self.commands.is_closed()
    }

    /// Both handles drive the same room instance.
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.commands.same_channel(&other.commands)
    }

    /// Queue a person change; it lands before the next tick.
    pub fn apply(&self, occupant_id: &str, action: PersonAction) -> Result<(), RoomError> {
        self.send(RoomCommand::Apply {
            occupant_id: occupant_id.to_string(),
            action,
        })
    }

    pub async fn on_tick(&self, observer: TickObserver) -> Result<TickSubscription, RoomError> {
        let (response, rx) = oneshot::channel();
        self.send(RoomCommand::Subscribe { observer, response })?;
        rx.await.map_err(|_| self.stopped())
    }

    pub fn off_tick(&self, subscription: TickSubscription) -> Result<(), RoomError> {
        self.send(RoomCommand::Unsubscribe { subscription })
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (response, rx) = oneshot::channel();
        self.send(RoomCommand::Snapshot { response })?;
        rx.await.map_err(|_| self.stopped())
    }

    /// Halt the loop. Safe to call any number of times.
    pub fn stop(&self) {
        let _ = self.commands.send(RoomCommand::Stop);
    }

    pub(crate) async fn add_occupant(
        &self,
        occupant_id: &str,
        person: Person,
    ) -> Result<(), RoomError> {
        let (response, rx) = oneshot::channel();
        self.send(RoomCommand::AddOccupant {
            occupant_id: occupant_id.to_string(),
            person,
            response,
        })?;
        rx.await.map_err(|_| self.stopped())
    }

    pub(crate) async fn remove_occupant(&self, occupant_id: &str) -> Result<Removal, RoomError> {
        let (response, rx) = oneshot::channel();
        self.send(RoomCommand::RemoveOccupant {
            occupant_id: occupant_id.to_string(),
            response,
        })?;
        rx.await.map_err(|_| self.stopped())
    }

    fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.commands.send(cmd).map_err(|_| self.stopped())
    }

    fn stopped(&self) -> RoomError {
        RoomError::Stopped(self.room_id.to_string())
    }
}

impl Room {
    /// Start the fixed-rate loop for this room. The loop owns the room from
    /// here on; everything else reaches it through the returned handle.
    pub fn start(mut self, room_id: &str, config: &RoomLoopConfig) -> RoomHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(config.event_capacity);

        self.on_tick(people_state_observer(
            events_tx.clone(),
            config.broadcast_every_n_ticks,
        ));

        let handle = RoomHandle {
            room_id: Arc::from(room_id),
            commands: cmd_tx,
            events: events_tx.clone(),
        };

        let room_id = room_id.to_string();
        let tick_rate_hz = config.tick_rate_hz;
        tokio::spawn(async move {
            run_room_loop(room_id, self, cmd_rx, events_tx, tick_rate_hz).await;
        });

        handle
    }
}

/// Tick observer that sends every occupant's record to the room on ticks
/// where `server_time` is a multiple of `every_n`.
pub fn people_state_observer(events: broadcast::Sender<RoomEvent>, every_n: u64) -> TickObserver {
    Box::new(move |room: &Room| {
        if room.server_time() % every_n != 0 || room.is_empty() {
            return;
        }
        let _ = events.send(RoomEvent::PeopleState {
            server_time: room.server_time(),
            people: room.people_wire(),
        });
    })
}

/// Run one room until it is stopped or empties. Owns the room's state.
async fn run_room_loop(
    room_id: String,
    mut room: Room,
    mut cmd_rx: mpsc::UnboundedReceiver<RoomCommand>,
    events_tx: broadcast::Sender<RoomEvent>,
    tick_rate_hz: u32,
) {
    let dt = 1.0 / tick_rate_hz as f64;
    let tick_duration = Duration::from_secs_f64(dt);

    let start = tokio::time::Instant::now() + tick_duration;
    let mut tick_interval = tokio::time::interval_at(start, tick_duration);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(room = %room_id, gravity = room.gravity(), "Room loop started");

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                room.tick(dt);
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    RoomCommand::AddOccupant { occupant_id, person, response } => {
                        room.add_person(occupant_id.clone(), person);
                        let _ = events_tx.send(RoomEvent::Connected { occupant_id });
                        let _ = response.send(());
                    }
                    RoomCommand::RemoveOccupant { occupant_id, response } => {
                        let removed = room.remove_person(&occupant_id).is_some();
                        if removed {
                            let _ = events_tx.send(RoomEvent::Disconnected { occupant_id });
                        }
                        let removal = Removal { removed, remaining: room.len() };
                        let _ = response.send(removal);
                        if removal.emptied_room() {
                            break;
                        }
                    }
                    RoomCommand::Apply { occupant_id, action } => {
                        apply_action(&mut room, &events_tx, occupant_id, action);
                    }
                    RoomCommand::Subscribe { observer, response } => {
                        let _ = response.send(room.on_tick(observer));
                    }
                    RoomCommand::Unsubscribe { subscription } => {
                        room.off_tick(subscription);
                    }
                    RoomCommand::Snapshot { response } => {
                        let _ = response.send(RoomSnapshot {
                            room_id: room_id.clone(),
                            server_time: room.server_time(),
                            people: room.people_wire(),
                        });
                    }
                    RoomCommand::Stop => break,
                }
            }
        }
    }

    tracing::info!(room = %room_id, server_time = room.server_time(), "Room loop ended");
}

fn apply_action(
    room: &mut Room,
    events_tx: &broadcast::Sender<RoomEvent>,
    occupant_id: OccupantId,
    action: PersonAction,
) {
    let Some(person) = room.person_mut(&occupant_id) else {
        tracing::debug!(occupant = %occupant_id, ?action, "Action for absent occupant dropped");
        return;
    };

    let event = match &action {
        PersonAction::SetYaw(yaw) => Some(RoomEvent::PersonYaw {
            occupant_id: occupant_id.clone(),
            yaw: *yaw,
        }),
        PersonAction::SetPitch(pitch) => Some(RoomEvent::PersonPitch {
            occupant_id: occupant_id.clone(),
            pitch: *pitch,
        }),
        PersonAction::SetUsername(username) => Some(RoomEvent::Username {
            occupant_id: occupant_id.clone(),
            username: username.clone(),
        }),
        _ => None,
    };

    person.apply(action);

    if let Some(event) = event {
        let _ = events_tx.send(event);
    }
}
