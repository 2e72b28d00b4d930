use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Canonical server grid: every draw operation is normalized into this space.
pub const GRID_WIDTH: i32 = 35;
pub const GRID_HEIGHT: i32 = 20;

/// Kind of pixel operation. Doubles as the envelope type when an operation is
/// fanned out to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelKind {
    Pixel,
    Erase,
    BatchPlace,
    BatchErase,
}

/// A single cell in the grid, as sent by clients for batch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    #[serde(rename = "gridX")]
    pub grid_x: i32,
    #[serde(rename = "gridY")]
    pub grid_y: i32,
}

/// One drawing operation. Single-pixel kinds carry `x`/`y` and a color; batch
/// kinds carry `pixels`. The server stamps `timestamp` when the client left it
/// unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelMessage {
    #[serde(rename = "type")]
    pub kind: PixelKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pixels: Vec<GridPosition>,
}

/// Convert client-space coordinates to grid coordinates, clamped to bounds.
pub fn normalize(x: i32, y: i32, client_width: i32, client_height: i32) -> (i32, i32) {
    let gx = (f64::from(x) * f64::from(GRID_WIDTH) / f64::from(client_width)).floor() as i32;
    let gy = (f64::from(y) * f64::from(GRID_HEIGHT) / f64::from(client_height)).floor() as i32;
    (gx.clamp(0, GRID_WIDTH - 1), gy.clamp(0, GRID_HEIGHT - 1))
}

fn in_grid(p: &GridPosition) -> bool {
    (0..GRID_WIDTH).contains(&p.grid_x) && (0..GRID_HEIGHT).contains(&p.grid_y)
}

/// Validate and normalize an inbound operation.
///
/// Single-pixel kinds must carry both coordinates. Batch kinds keep only the
/// entries already inside the grid; a batch left empty is dropped. Surviving
/// coordinates are normalized from the sender's canvas dimensions, and a
/// server timestamp is stamped if the client omitted one. Returns `None` when
/// there is nothing left to apply.
pub fn prepare(
    mut op: PixelMessage,
    client_width: i32,
    client_height: i32,
    now_ms: u64,
) -> Option<PixelMessage> {
    if client_width <= 0 || client_height <= 0 {
        return None;
    }
    match op.kind {
        PixelKind::Pixel | PixelKind::Erase => {
            let (x, y) = (op.x?, op.y?);
            let (gx, gy) = normalize(x, y, client_width, client_height);
            op.x = Some(gx);
            op.y = Some(gy);
        },
        PixelKind::BatchPlace | PixelKind::BatchErase => {
            op.pixels.retain(in_grid);
            if op.pixels.is_empty() {
                return None;
            }
            for p in &mut op.pixels {
                let (gx, gy) = normalize(p.grid_x, p.grid_y, client_width, client_height);
                p.grid_x = gx;
                p.grid_y = gy;
            }
        },
    }
    if op.timestamp == 0 {
        op.timestamp = now_ms;
    }
    Some(op)
}

/// Apply a prepared operation to the canvas log.
///
/// Placements append. Erases walk the log and drop prior single-pixel
/// placements at the erased positions; batch placements are retained, so the
/// log stays cheap to replay for late joiners.
pub fn apply(canvas: &mut Vec<PixelMessage>, op: &PixelMessage) {
    match op.kind {
        PixelKind::Pixel | PixelKind::BatchPlace => canvas.push(op.clone()),
        PixelKind::Erase => {
            canvas.retain(|e| {
                !(e.kind == PixelKind::Pixel && e.x == op.x && e.y == op.y)
            });
        },
        PixelKind::BatchErase => {
            let erased: HashSet<(i32, i32)> =
                op.pixels.iter().map(|p| (p.grid_x, p.grid_y)).collect();
            canvas.retain(|e| match (e.kind, e.x, e.y) {
                (PixelKind::Pixel, Some(x), Some(y)) => !erased.contains(&(x, y)),
                _ => true,
            });
        },
    }
}
