use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use scrawl_core::net::messages::{ServerMessage, TimerUpdateData};

use crate::room::{PhaseTimer, Room, broadcast};
use crate::state::AppState;

/// Start the room's phase timer, replacing (and cancelling) any previous one.
///
/// A dedicated task broadcasts `timer_update` once per second and, at the
/// deadline, runs `on_expire` in a fresh task so the timer task can exit.
/// Explicit cancellation never runs the callback. Before touching the room's
/// timer slot the task checks its generation id: a stale task must not turn
/// off a timer it did not start.
pub async fn start<F, Fut>(state: &AppState, room: &Arc<Room>, duration: Duration, on_expire: F)
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    cancel(state, room).await;

    let (token, generation) = {
        let mut st = room.state.write().await;
        let generation = st.next_timer_generation();
        let token = CancellationToken::new();
        st.timer = Some(PhaseTimer {
            generation,
            started_at: Instant::now(),
            duration,
            active: true,
            cancel: token.clone(),
        });
        (token, generation)
    };
    tracing::debug!(room = %room.id, ?duration, generation, "Timer started");

    let state = state.clone();
    let room = Arc::clone(room);
    tokio::spawn(async move {
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + Duration::from_secs(1),
            Duration::from_secs(1),
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    deactivate_if_current(&room, generation).await;
                    tracing::debug!(room = %room.id, generation, "Timer cancelled");
                    return;
                }
                _ = &mut deadline => {
                    deactivate_if_current(&room, generation).await;
                    tracing::debug!(room = %room.id, generation, "Timer expired");
                    tokio::spawn(on_expire());
                    return;
                }
                _ = ticker.tick() => {
                    broadcast_timer_update(&state, &room).await;
                }
            }
        }
    });
}

/// Mark the room timer inactive, but only if it is still the one this task
/// installed.
async fn deactivate_if_current(room: &Room, generation: u64) {
    let mut st = room.state.write().await;
    if let Some(timer) = st.timer.as_mut()
        && timer.generation == generation
    {
        timer.active = false;
    }
}

/// Send the derived remaining time to the whole room.
pub async fn broadcast_timer_update(state: &AppState, room: &Arc<Room>) {
    let update = {
        let st = room.state.read().await;
        let Some(timer) = st.timer.as_ref().filter(|t| t.active) else {
            return;
        };
        TimerUpdateData {
            time_remaining_ms: timer.remaining().as_millis() as u64,
            phase: st.phase,
            is_active: true,
        }
    };
    broadcast(state, room, &ServerMessage::TimerUpdate(update)).await;
}

/// Cancel the active timer, if any, and tell the room it stopped.
/// Cancelling an already-cancelled (or absent) timer is a no-op.
pub async fn cancel(state: &AppState, room: &Arc<Room>) {
    let update = {
        let mut st = room.state.write().await;
        let Some(timer) = st.timer.as_mut().filter(|t| t.active) else {
            return;
        };
        timer.cancel.cancel();
        timer.active = false;
        TimerUpdateData {
            time_remaining_ms: 0,
            phase: st.phase,
            is_active: false,
        }
    };
    tracing::debug!(room = %room.id, "Timer cancelled");
    broadcast(state, room, &ServerMessage::TimerUpdate(update)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::ServerConfig;

    fn test_state() -> AppState {
        AppState::new(ServerConfig::default())
    }

    fn empty_room() -> Arc<Room> {
        Arc::new(Room::new("timer-test".to_string(), 3))
    }

    #[tokio::test]
    async fn expiry_runs_callback_once() {
        let state = test_state();
        let room = empty_room();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        start(&state, &room, Duration::from_millis(20), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!room.state.read().await.timer.as_ref().unwrap().active);
    }

    #[tokio::test]
    async fn cancel_prevents_callback() {
        let state = test_state();
        let room = empty_room();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        start(&state, &room, Duration::from_millis(50), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        cancel(&state, &room).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_without_timer_is_noop() {
        let state = test_state();
        let room = empty_room();
        cancel(&state, &room).await;
        cancel(&state, &room).await;
        assert!(room.state.read().await.timer.is_none());
    }

    #[tokio::test]
    async fn cancelling_twice_is_noop() {
        let state = test_state();
        let room = empty_room();
        start(&state, &room, Duration::from_secs(30), || async {}).await;
        cancel(&state, &room).await;
        cancel(&state, &room).await;
        let st = room.state.read().await;
        assert!(!st.timer.as_ref().unwrap().active);
    }

    #[tokio::test]
    async fn replacement_cancels_the_previous_timer() {
        let state = test_state();
        let room = empty_room();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        start(&state, &room, Duration::from_millis(40), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        let counter = Arc::clone(&second);
        start(&state, &room, Duration::from_millis(40), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0, "replaced timer must not fire");
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_task_does_not_deactivate_newer_timer() {
        let state = test_state();
        let room = empty_room();

        start(&state, &room, Duration::from_millis(10), || async {}).await;
        let first_generation = room.state.read().await.timer.as_ref().unwrap().generation;

        start(&state, &room, Duration::from_secs(30), || async {}).await;

        // Simulate the first task's late completion racing the second timer.
        deactivate_if_current(&room, first_generation).await;

        let st = room.state.read().await;
        let timer = st.timer.as_ref().unwrap();
        assert_ne!(timer.generation, first_generation);
        assert!(timer.active, "newer timer must stay active");
    }

    #[tokio::test]
    async fn remaining_time_decreases() {
        let state = test_state();
        let room = empty_room();
        start(&state, &room, Duration::from_secs(10), || async {}).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let remaining = room.state.read().await.timer_remaining_ms();
        assert!(remaining < 10_000);
        assert!(remaining > 9_000);
    }
}
