use crate::error::RoomError;
use crate::person::Person;
use crate::room::Room;
use crate::room_loop::{RoomHandle, RoomLoopConfig};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Map of room id to running room, with create-on-first-join and
/// teardown-on-empty. Constructed once and shared by reference; there is no
/// process-global instance.
///
/// Every operation holds the map lock until the room loop has answered, so
/// creation, membership and teardown are serialized across all rooms.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, RoomHandle>>,
    config: RoomLoopConfig,
}

impl RoomRegistry {
    pub fn new(config: RoomLoopConfig) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The running room for `room_id`, started with `gravity` if absent.
    pub async fn ensure_room(&self, room_id: &str, gravity: f64) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;
        self.ensure_locked(&mut rooms, room_id, gravity)
    }

    /// Add a person to a room that already exists.
    pub async fn add_occupant(
        &self,
        room_id: &str,
        occupant_id: &str,
        person: Person,
    ) -> Result<(), RoomError> {
        let rooms = self.rooms.lock().await;
        let handle = rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        handle.add_occupant(occupant_id, person).await
    }

    /// Ensure the room and add the person under one lock, so a concurrent
    /// teardown cannot land in between.
    pub async fn join_room(
        &self,
        room_id: &str,
        gravity: f64,
        occupant_id: &str,
        person: Person,
    ) -> Result<RoomHandle, RoomError> {
        let mut rooms = self.rooms.lock().await;
        let handle = self.ensure_locked(&mut rooms, room_id, gravity);
        handle.add_occupant(occupant_id, person).await?;
        Ok(handle)
    }

    /// Remove a person. Tears the room down if that left it empty. Missing
    /// rooms and occupants are ignored.
    pub async fn remove_occupant(&self, room_id: &str, occupant_id: &str) {
        let mut rooms = self.rooms.lock().await;
        let Some(handle) = rooms.get(room_id).cloned() else {
            return;
        };
        match handle.remove_occupant(occupant_id).await {
            Ok(removal) if removal.emptied_room() => {
                rooms.remove(room_id);
                tracing::info!(room = %room_id, "Room emptied and torn down");
            }
            Ok(_) => {}
            Err(RoomError::Stopped(_)) | Err(RoomError::NotFound(_)) => {
                rooms.remove(room_id);
            }
        }
    }

    pub async fn room(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Stop and forget every room.
    pub async fn stop_all(&self) {
        let mut rooms = self.rooms.lock().await;
        for (room_id, handle) in rooms.drain() {
            handle.stop();
            tracing::info!(room = %room_id, "Room stopped");
        }
    }

    fn ensure_locked(
        &self,
        rooms: &mut HashMap<String, RoomHandle>,
        room_id: &str,
        gravity: f64,
    ) -> RoomHandle {
        if let Some(handle) = rooms.get(room_id) {
            if !handle.is_stopped() {
                return handle.clone();
            }
        }
        let handle = Room::new(gravity).start(room_id, &self.config);
        rooms.insert(room_id.to_string(), handle.clone());
        tracing::info!(room = %room_id, gravity, "Room created");
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(RoomLoopConfig {
            tick_rate_hz: 200,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn ensure_room_reuses_running_room() {
        let registry = registry();
        let a = registry.ensure_room("A", 9.8).await;
        let b = registry.ensure_room("A", 1.0).await;
        assert!(a.same_room(&b));
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_ensure_creates_one_room() {
        let registry = Arc::new(registry());
        let (a, b) = tokio::join!(
            registry.ensure_room("A", 9.8),
            registry.ensure_room("A", 9.8)
        );
        assert!(a.same_room(&b));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.ensure_room("B", 9.8).await
            }));
        }
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        assert!(handles.iter().all(|h| h.same_room(&handles[0])));
        assert_eq!(registry.room_count().await, 2);
    }

    #[tokio::test]
    async fn add_occupant_requires_existing_room() {
        let registry = registry();
        let err = registry
            .add_occupant("missing", "a", Person::default())
            .await
            .unwrap_err();
        assert_eq!(err, RoomError::NotFound("missing".to_string()));
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn add_after_ensure_succeeds() {
        let registry = registry();
        let handle = registry.ensure_room("A", 9.8).await;
        registry
            .add_occupant("A", "a", Person::default())
            .await
            .unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.people.len(), 1);
        assert_eq!(snapshot.room_id, "A");
    }

    #[tokio::test]
    async fn last_leave_tears_down_and_silences_room() {
        let registry = registry();
        let handle = registry
            .join_room("A", 9.8, "a", Person::default())
            .await
            .unwrap();
        registry
            .add_occupant("A", "b", Person::default())
            .await
            .unwrap();

        let ticks = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&ticks);
        handle
            .on_tick(Box::new(move |_: &Room| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        registry.remove_occupant("A", "a").await;
        assert!(registry.room("A").await.is_some());

        registry.remove_occupant("A", "b").await;
        assert!(registry.room("A").await.is_none());

        let seen = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn rejoin_after_teardown_gets_fresh_room() {
        let registry = registry();
        let old = registry
            .join_room("A", 9.8, "a", Person::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let old_time = old.snapshot().await.unwrap().server_time;
        assert!(old_time > 0);

        registry.remove_occupant("A", "a").await;

        let fresh = registry
            .join_room("A", 9.8, "a", Person::default())
            .await
            .unwrap();
        assert!(!fresh.same_room(&old));
        let fresh_time = fresh.snapshot().await.unwrap().server_time;
        assert!(fresh_time < old_time, "{} vs {}", fresh_time, old_time);
    }

    #[tokio::test]
    async fn remove_missing_room_or_occupant_is_noop() {
        let registry = registry();
        registry.remove_occupant("nowhere", "a").await;

        registry
            .join_room("A", 9.8, "a", Person::default())
            .await
            .unwrap();
        registry.remove_occupant("A", "ghost").await;
        assert!(registry.room("A").await.is_some());
    }

    #[tokio::test]
    async fn externally_stopped_room_is_replaced() {
        let registry = registry();
        let old = registry.ensure_room("A", 9.8).await;
        old.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fresh = registry.ensure_room("A", 9.8).await;
        assert!(!fresh.same_room(&old));
        assert!(!fresh.is_stopped());
    }

    #[tokio::test]
    async fn stop_all_clears_registry() {
        let registry = registry();
        let a = registry.ensure_room("A", 9.8).await;
        registry.ensure_room("B", 9.8).await;
        registry.stop_all().await;
        assert_eq!(registry.room_count().await, 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(a.is_stopped());
    }
}
