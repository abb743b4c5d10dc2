//! Grid ray marching (DDA).
//!
//! Walks a ray through the maze one cell boundary at a time and reports the
//! first wall it enters. The renderer uses the full result for wall columns
//! and texture sampling; movement code only cares about `hit`/`distance`.

use crate::math::Vec2;
use crate::maze::{Cell, Maze};

/// Result of marching a ray through the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub hit: bool,
    /// True when the ray entered the wall through a vertical (east/west)
    /// face; used by renderers to shade the two face orientations apart.
    pub vertical: bool,
    pub distance: f32,
    /// Fractional part of the hit point along the axis orthogonal to the
    /// hit face, for texture column lookup.
    pub face_fraction: f32,
}

/// Marches from `pos` (which must lie inside the grid) at `angle` radians
/// until a wall cell is entered or the traveled distance exceeds the maze
/// width.
pub fn raycast(maze: &Maze, pos: Vec2, angle: f32) -> Ray {
    let dir = Vec2::from_angle(angle);

    // Distance along the ray per one grid unit on each axis. A zero
    // direction component divides to infinity, so that axis never wins
    // the advance comparison below.
    let unit_step = Vec2::new(
        (1.0 + (dir.y / dir.x) * (dir.y / dir.x)).sqrt(),
        (1.0 + (dir.x / dir.y) * (dir.x / dir.y)).sqrt(),
    );

    let mut cell = (pos.x as isize, pos.y as isize);
    let mut length = Vec2::ZERO;
    let mut step = (0isize, 0isize);

    // Initial partial steps to the first grid line on each axis.
    if dir.x < 0.0 {
        step.0 = -1;
        length.x = (pos.x - cell.0 as f32) * unit_step.x;
    } else {
        step.0 = 1;
        length.x = (cell.0 as f32 + 1.0 - pos.x) * unit_step.x;
    }

    if dir.y < 0.0 {
        step.1 = -1;
        length.y = (pos.y - cell.1 as f32) * unit_step.y;
    } else {
        step.1 = 1;
        length.y = (cell.1 as f32 + 1.0 - pos.y) * unit_step.y;
    }

    let max_distance = maze.width() as f32;
    let mut distance = 0.0;
    let mut hit = false;
    let mut vertical = false;

    while !hit && distance < max_distance {
        // Advance along whichever axis has accumulated less length.
        if length.x < length.y {
            cell.0 += step.0;
            distance = length.x;
            length.x += unit_step.x;
            vertical = true;
        } else {
            cell.1 += step.1;
            distance = length.y;
            length.y += unit_step.y;
            vertical = false;
        }

        if cell.0 >= 0
            && (cell.0 as usize) < maze.width()
            && cell.1 >= 0
            && (cell.1 as usize) < maze.height()
            && maze.cell(cell.0 as usize, cell.1 as usize) == Cell::Wall
        {
            hit = true;
        }
    }

    let hit_pos = pos + dir * distance;
    let along_face = if vertical { hit_pos.y } else { hit_pos.x };

    Ray {
        hit,
        vertical,
        distance,
        face_fraction: along_face - along_face.floor(),
    }
}
