use std::sync::Arc;

use scrawl_core::canvas::{self, PixelKind, PixelMessage};
use scrawl_core::net::messages::{CanvasClearedData, DrawingPermissionData, ServerMessage};
use scrawl_core::phase::GamePhase;
use scrawl_core::time::now_ms;

use crate::room::{Room, RoomState, broadcast, broadcast_except};
use crate::state::AppState;

/// Drawer gating shared by all drawing inputs: drawing phase, sender is the
/// current drawer, and permission is granted.
fn sender_may_draw(st: &RoomState, player_id: &str) -> bool {
    st.phase == GamePhase::Drawing
        && st.current_drawer.as_deref() == Some(player_id)
        && st.players.get(player_id).is_some_and(|p| p.can_draw)
}

/// Apply a drawing operation from the current drawer and fan it out to the
/// rest of the room. Anything out of phase, from a non-drawer, or failing
/// validation is silently dropped.
pub async fn handle_pixel_draw(
    state: &AppState,
    room: &Arc<Room>,
    player_id: &str,
    op: PixelMessage,
) {
    let fanout = {
        let mut st = room.state.write().await;
        if !sender_may_draw(&st, player_id) {
            tracing::debug!(room = %room.id, player_id = %player_id, "Draw without permission dropped");
            return;
        }
        let Some(player) = st.players.get(player_id) else {
            return;
        };
        let (client_w, client_h) = (player.canvas_width, player.canvas_height);
        let Some(op) = canvas::prepare(op, client_w, client_h, now_ms()) else {
            tracing::debug!(room = %room.id, player_id = %player_id, "Invalid draw operation dropped");
            return;
        };
        canvas::apply(&mut st.canvas_state, &op);
        match op.kind {
            PixelKind::Pixel => ServerMessage::Pixel(op),
            PixelKind::Erase => ServerMessage::Erase(op),
            PixelKind::BatchPlace => ServerMessage::BatchPlace(op),
            PixelKind::BatchErase => ServerMessage::BatchErase(op),
        }
    };

    broadcast_except(state, room, &fanout, player_id).await;
}

/// Clear the canvas, honored only for the current drawer during drawing.
pub async fn clear_canvas(state: &AppState, room: &Arc<Room>, player_id: &str) {
    let cleared = {
        let mut st = room.state.write().await;
        if !sender_may_draw(&st, player_id) {
            tracing::debug!(room = %room.id, player_id = %player_id, "Canvas clear without permission dropped");
            return;
        }
        let pixels = st.canvas_state.len();
        st.canvas_state.clear();
        tracing::debug!(room = %room.id, player_id = %player_id, pixels, "Canvas cleared");
        CanvasClearedData {
            room_id: room.id.clone(),
            player_id: player_id.to_string(),
            timestamp: now_ms(),
        }
    };

    broadcast_except(state, room, &ServerMessage::CanvasCleared(cleared), player_id).await;
}

/// Recompute `can_draw` for every player from the current phase and drawer,
/// then announce the holder of the pen.
pub async fn update_drawing_permissions(state: &AppState, room: &Arc<Room>) {
    let update = {
        let mut st = room.state.write().await;
        for p in st.players.values_mut() {
            p.can_draw = false;
        }
        let mut drawer_id = String::new();
        let mut drawer_name = String::new();
        if st.phase == GamePhase::Drawing
            && let Some(id) = st.current_drawer.clone()
            && let Some(drawer) = st.players.get_mut(&id)
        {
            drawer.can_draw = true;
            drawer_id = drawer.id.clone();
            drawer_name = drawer.username.clone();
        }
        DrawingPermissionData {
            room_id: room.id.clone(),
            player_id: drawer_id,
            message: format!("{drawer_name} is now going to draw."),
        }
    };

    broadcast(state, room, &ServerMessage::DrawingPermissionUpdated(update)).await;
}
