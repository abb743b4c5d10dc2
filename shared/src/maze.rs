//! Maze generation and cell queries.
//!
//! The world is a `(2*MAZE_WIDTH + 1) x (2*MAZE_HEIGHT + 1)` grid where every
//! even row and column is wall and the odd/odd cells are carved into a
//! spanning tree by a randomized depth-first backtracker, so any two cells
//! are connected by exactly one path. One extra boundary cell is carved as
//! the exit. The same grid backs server collision, bullet culling and client
//! rendering queries.

use crate::math::Vec2;
use crate::{MAZE_HEIGHT, MAZE_WIDTH, WORLD_HEIGHT, WORLD_WIDTH};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Wall,
}

impl Cell {
    pub fn as_byte(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Wall => 1,
        }
    }

    /// Anything that isn't an empty marker counts as wall.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Cell::Empty,
            _ => Cell::Wall,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Maze {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Maze {
    /// Generates a random perfect maze of the default world size.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng>(rng: &mut R) -> Self {
        // Grid lines are walls, odd/odd cells are rooms.
        let mut cells = vec![Cell::Empty; WORLD_WIDTH * WORLD_HEIGHT];
        for y in 0..WORLD_HEIGHT {
            for x in 0..WORLD_WIDTH {
                if y % 2 == 0 || x % 2 == 0 {
                    cells[y * WORLD_WIDTH + x] = Cell::Wall;
                }
            }
        }

        let mut maze = Self {
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            cells,
        };

        let mut visited = vec![false; MAZE_WIDTH * MAZE_HEIGHT];
        let mut visited_count = 1;
        let mut stack = Vec::new();

        let first = (
            rng.gen_range(0..MAZE_WIDTH) * 2 + 1,
            rng.gen_range(0..MAZE_HEIGHT) * 2 + 1,
        );
        visited[(first.1 / 2) * MAZE_WIDTH + first.0 / 2] = true;
        stack.push(first);

        while visited_count < MAZE_WIDTH * MAZE_HEIGHT {
            let Some(&(x, y)) = stack.last() else { break };

            // Unvisited rooms two cells away in each direction.
            let mut neighbors: Vec<(isize, isize)> = Vec::new();
            for (dx, dy) in [(0, -2), (0, 2), (-2, 0), (2, 0)] {
                let (nx, ny) = (x as isize + dx, y as isize + dy);
                if nx < 1
                    || ny < 1
                    || nx >= WORLD_WIDTH as isize - 1
                    || ny >= WORLD_HEIGHT as isize - 1
                {
                    continue;
                }
                if !visited[(ny as usize / 2) * MAZE_WIDTH + nx as usize / 2] {
                    neighbors.push((dx, dy));
                }
            }

            if neighbors.is_empty() {
                stack.pop();
            } else {
                let (dx, dy) = neighbors[rng.gen_range(0..neighbors.len())];
                // Carve the wall between the current room and the neighbor.
                let wall = (
                    (x as isize + dx / 2) as usize,
                    (y as isize + dy / 2) as usize,
                );
                maze.cells[wall.1 * WORLD_WIDTH + wall.0] = Cell::Empty;

                let next = ((x as isize + dx) as usize, (y as isize + dy) as usize);
                visited[(next.1 / 2) * MAZE_WIDTH + next.0 / 2] = true;
                visited_count += 1;
                stack.push(next);
            }
        }

        // Carve the single boundary exit.
        maze.cells[(WORLD_HEIGHT - 2) * WORLD_WIDTH + (WORLD_WIDTH - 1)] = Cell::Empty;

        maze
    }

    /// Builds a maze from explicit cells, e.g. a grid received over the wire.
    pub fn from_cells(width: usize, height: usize, cells: Vec<Cell>) -> Self {
        assert_eq!(cells.len(), width * height);
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn from_bytes(width: usize, height: usize, bytes: &[u8]) -> Self {
        Self::from_cells(
            width,
            height,
            bytes.iter().map(|&b| Cell::from_byte(b)).collect(),
        )
    }

    /// Row-major cell bytes, as sent in the match bootstrap sequence.
    pub fn as_bytes(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.as_byte()).collect()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell(&self, x: usize, y: usize) -> Cell {
        self.cells[y * self.width + x]
    }

    pub fn in_bounds(&self, pos: Vec2) -> bool {
        pos.x >= 0.0
            && pos.y >= 0.0
            && pos.x < self.width as f32
            && pos.y < self.height as f32
    }

    /// Whether the cell containing a world position is a wall.
    /// Positions outside the grid count as wall.
    pub fn is_wall_at(&self, pos: Vec2) -> bool {
        if !self.in_bounds(pos) {
            return true;
        }
        self.cell(pos.x as usize, pos.y as usize) == Cell::Wall
    }

    /// Center of a uniformly random empty cell, used for spawn points.
    pub fn random_empty_cell<R: Rng>(&self, rng: &mut R) -> Vec2 {
        loop {
            let x = rng.gen_range(0..self.width);
            let y = rng.gen_range(0..self.height);
            if self.cell(x, y) == Cell::Empty {
                return Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flood-fills from `start` and returns the number of reachable
    /// empty cells inside the grid.
    fn reachable_empty_cells(maze: &Maze, start: (usize, usize)) -> usize {
        let mut seen = vec![false; maze.width() * maze.height()];
        let mut stack = vec![start];
        let mut count = 0;

        while let Some((x, y)) = stack.pop() {
            if seen[y * maze.width() + x] || maze.cell(x, y) == Cell::Wall {
                continue;
            }
            seen[y * maze.width() + x] = true;
            count += 1;

            if x > 0 {
                stack.push((x - 1, y));
            }
            if y > 0 {
                stack.push((x, y - 1));
            }
            if x + 1 < maze.width() {
                stack.push((x + 1, y));
            }
            if y + 1 < maze.height() {
                stack.push((x, y + 1));
            }
        }

        count
    }

    #[test]
    fn test_every_empty_cell_is_reachable() {
        for _ in 0..20 {
            let maze = Maze::generate();

            let total_empty = (0..maze.height())
                .flat_map(|y| (0..maze.width()).map(move |x| (x, y)))
                .filter(|&(x, y)| maze.cell(x, y) == Cell::Empty)
                .count();

            assert_eq!(reachable_empty_cells(&maze, (1, 1)), total_empty);
        }
    }

    #[test]
    fn test_grid_lines_are_walls_except_exit() {
        let maze = Maze::generate();
        let mut boundary_exits = 0;

        for y in 0..maze.height() {
            for x in 0..maze.width() {
                let on_boundary = x == 0
                    || y == 0
                    || x == maze.width() - 1
                    || y == maze.height() - 1;
                if on_boundary && maze.cell(x, y) == Cell::Empty {
                    boundary_exits += 1;
                }
            }
        }

        assert_eq!(boundary_exits, 1);
        assert_eq!(
            maze.cell(maze.width() - 1, maze.height() - 2),
            Cell::Empty
        );
    }

    #[test]
    fn test_rooms_are_empty() {
        let maze = Maze::generate();
        for y in (1..maze.height()).step_by(2) {
            for x in (1..maze.width()).step_by(2) {
                assert_eq!(maze.cell(x, y), Cell::Empty);
            }
        }
    }

    #[test]
    fn test_byte_roundtrip() {
        let maze = Maze::generate();
        let bytes = maze.as_bytes();
        assert_eq!(bytes.len(), maze.width() * maze.height());

        let rebuilt = Maze::from_bytes(maze.width(), maze.height(), &bytes);
        for y in 0..maze.height() {
            for x in 0..maze.width() {
                assert_eq!(rebuilt.cell(x, y), maze.cell(x, y));
            }
        }
    }

    #[test]
    fn test_wall_query_outside_grid() {
        let maze = Maze::generate();
        assert!(maze.is_wall_at(Vec2::new(-0.5, 1.5)));
        assert!(maze.is_wall_at(Vec2::new(1.5, maze.height() as f32 + 1.0)));
        assert!(!maze.is_wall_at(Vec2::new(1.5, 1.5)));
    }

    #[test]
    fn test_random_empty_cell_is_empty_center() {
        let maze = Maze::generate();
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let pos = maze.random_empty_cell(&mut rng);
            assert!(!maze.is_wall_at(pos));
            assert_eq!(pos.x.fract(), 0.5);
            assert_eq!(pos.y.fract(), 0.5);
        }
    }
}
