use crate::person::{OccupantId, Person};
use presence_shared::protocol::PersonWire;
use std::collections::HashMap;

/// Callback run once per tick, after physics, with the finished room.
pub type TickObserver = Box<dyn FnMut(&Room) + Send>;

/// Handle returned by [`Room::on_tick`], used to unregister that observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickSubscription(u64);

/// One independently simulated space.
///
/// A `Room` is plain state; once started it is owned by its room loop task
/// (see [`crate::room_loop`]), which is the only thing that ticks it.
pub struct Room {
    people: HashMap<OccupantId, Person>,
    gravity: f64,
    server_time: u64,
    observers: Vec<(TickSubscription, TickObserver)>,
    next_subscription: u64,
}

impl Room {
    pub fn new(gravity: f64) -> Self {
        Self {
            people: HashMap::new(),
            gravity,
            server_time: 0,
            observers: Vec::new(),
            next_subscription: 1,
        }
    }

    pub fn gravity(&self) -> f64 {
        self.gravity
    }

    /// Ticks completed since the room was created.
    pub fn server_time(&self) -> u64 {
        self.server_time
    }

    pub fn people(&self) -> &HashMap<OccupantId, Person> {
        &self.people
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.people.get(id)
    }

    pub fn person_mut(&mut self, id: &str) -> Option<&mut Person> {
        self.people.get_mut(id)
    }

    /// Insert or replace the person for `id`.
    pub fn add_person(&mut self, id: OccupantId, person: Person) {
        self.people.insert(id, person);
    }

    pub fn remove_person(&mut self, id: &str) -> Option<Person> {
        self.people.remove(id)
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn on_tick(&mut self, observer: TickObserver) -> TickSubscription {
        let subscription = TickSubscription(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((subscription, observer));
        subscription
    }

    /// Returns false if nothing was registered under `subscription`.
    pub fn off_tick(&mut self, subscription: TickSubscription) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(s, _)| *s != subscription);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Wire records for every occupant, ordered by id.
    pub fn people_wire(&self) -> Vec<PersonWire> {
        let mut people: Vec<PersonWire> = self
            .people
            .iter()
            .map(|(id, person)| person.to_wire(id))
            .collect();
        people.sort_by(|a, b| a.id.cmp(&b.id));
        people
    }

    /// Advance the simulation by one fixed step and notify observers.
    pub(crate) fn tick(&mut self, dt: f64) {
        for person in self.people.values_mut() {
            person.step(self.gravity, dt);
        }
        self.server_time += 1;

        // Observers see `&Room`, so they are detached while they run.
        let mut observers = std::mem::take(&mut self.observers);
        for (_, observer) in observers.iter_mut() {
            observer(self);
        }
        self.observers = observers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_shared::config::FLOOR_Y;
    use presence_shared::vec3::vec3;
    use std::sync::{Arc, Mutex};

    const DT: f64 = 1.0 / 60.0;
    const GRAVITY: f64 = 9.8;

    fn room_with(id: &str, person: Person) -> Room {
        let mut room = Room::new(GRAVITY);
        room.add_person(id.to_string(), person);
        room
    }

    #[test]
    fn new_room_starts_at_time_zero() {
        let room = Room::new(GRAVITY);
        assert_eq!(room.server_time(), 0);
        assert!(room.is_empty());
        assert_eq!(room.gravity(), GRAVITY);
    }

    #[test]
    fn server_time_increments_once_per_tick() {
        let mut room = Room::new(GRAVITY);
        for expected in 1..=10 {
            room.tick(DT);
            assert_eq!(room.server_time(), expected);
        }
    }

    #[test]
    fn gravity_accumulates_linearly_until_floor() {
        let mut room = room_with(
            "a",
            Person {
                position: vec3(0.0, 1000.0, 0.0),
                velocity: vec3(0.0, 3.0, 0.0),
                ..Default::default()
            },
        );
        let n = 30;
        for _ in 0..n {
            room.tick(DT);
        }
        let vy = room.person("a").unwrap().velocity.y;
        let expected = 3.0 - GRAVITY * DT * n as f64;
        assert!((vy - expected).abs() < 1e-9, "{} vs {}", vy, expected);
    }

    #[test]
    fn nobody_ends_a_tick_below_the_floor() {
        let mut room = Room::new(GRAVITY);
        for (i, vy) in [-50.0, -1.0, 0.0, 4.0].into_iter().enumerate() {
            room.add_person(
                format!("p{}", i),
                Person {
                    position: vec3(0.0, 0.5, 0.0),
                    velocity: vec3(0.0, vy, 0.0),
                    ..Default::default()
                },
            );
        }
        for _ in 0..240 {
            room.tick(DT);
            for person in room.people().values() {
                assert!(person.position.y >= FLOOR_Y);
            }
        }
    }

    #[test]
    fn clamped_person_has_zero_vertical_velocity_that_tick() {
        let mut room = room_with(
            "a",
            Person {
                position: vec3(0.0, 0.1, 0.0),
                velocity: vec3(0.5, -30.0, 0.0),
                ..Default::default()
            },
        );
        room.tick(DT);
        let p = room.person("a").unwrap();
        assert_eq!(p.position.y, FLOOR_Y);
        assert_eq!(p.velocity.y, 0.0);
    }

    #[test]
    fn flying_person_keeps_vertical_velocity_for_100_ticks() {
        let mut room = room_with(
            "a",
            Person {
                flying: true,
                position: vec3(0.0, 2.0, 0.0),
                velocity: vec3(0.0, 0.25, 0.0),
                ..Default::default()
            },
        );
        for _ in 0..100 {
            room.tick(DT);
        }
        let p = room.person("a").unwrap();
        assert_eq!(p.velocity.y, 0.25);
        assert!((p.position.y - (2.0 + 0.25 * DT * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn observers_run_in_registration_order_after_physics() {
        let mut room = room_with(
            "a",
            Person {
                position: vec3(0.0, 10.0, 0.0),
                ..Default::default()
            },
        );
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        room.on_tick(Box::new(move |room: &Room| {
            let y = room.person("a").map(|p| p.position.y).unwrap_or_default();
            log.lock().unwrap().push(("first", room.server_time(), y));
        }));
        let log = Arc::clone(&seen);
        room.on_tick(Box::new(move |room: &Room| {
            let y = room.person("a").map(|p| p.position.y).unwrap_or_default();
            log.lock().unwrap().push(("second", room.server_time(), y));
        }));

        room.tick(DT);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "first");
        assert_eq!(seen[1].0, "second");
        // Both saw the integrated position and the incremented clock.
        assert_eq!(seen[0].1, 1);
        assert!(seen[0].2 < 10.0);
        assert_eq!(seen[0].2, seen[1].2);
    }

    #[test]
    fn off_tick_removes_only_that_subscription() {
        let mut room = Room::new(GRAVITY);
        let count = Arc::new(Mutex::new((0u32, 0u32)));

        let c = Arc::clone(&count);
        let first = room.on_tick(Box::new(move |_: &Room| c.lock().unwrap().0 += 1));
        let c = Arc::clone(&count);
        room.on_tick(Box::new(move |_: &Room| c.lock().unwrap().1 += 1));

        room.tick(DT);
        assert!(room.off_tick(first));
        assert!(!room.off_tick(first));
        room.tick(DT);

        assert_eq!(*count.lock().unwrap(), (1, 2));
        assert_eq!(room.observer_count(), 1);
    }

    #[test]
    fn people_wire_is_sorted_by_id() {
        let mut room = Room::new(GRAVITY);
        room.add_person("b".to_string(), Person::default());
        room.add_person("a".to_string(), Person::default());
        let ids: Vec<String> = room.people_wire().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn remove_person_empties_room() {
        let mut room = room_with("a", Person::default());
        assert_eq!(room.len(), 1);
        assert!(room.remove_person("a").is_some());
        assert!(room.remove_person("a").is_none());
        assert!(room.is_empty());
    }
}
