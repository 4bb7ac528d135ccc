//! Grid model: coordinate math, collision predicates, and food placement.
//!
//! Pure over its inputs so the whole module runs under plain `cargo test`;
//! randomness arrives as seed material expanded with SHA-256.

use crate::types::{Cell, Direction, GRID_SIZE, TOTAL_CELLS};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

/// Candidate draws before falling back to a deterministic scan. The grid has
/// 400 cells and the snake rarely covers more than a fraction of them, so the
/// fallback is effectively unreachable in real games.
const MAX_SPAWN_ATTEMPTS: u32 = 128;

/// Advance one cell in `direction`. `None` when the move leaves the grid.
pub fn step(cell: Cell, direction: Direction) -> Option<Cell> {
    let (dx, dy) = direction.delta();
    let nx = cell.x as i16 + dx;
    let ny = cell.y as i16 + dy;

    if nx < 0 || ny < 0 || nx >= GRID_SIZE as i16 || ny >= GRID_SIZE as i16 {
        return None;
    }

    Some(Cell::new(nx as u8, ny as u8))
}

pub fn occupies(snake: &VecDeque<Cell>, cell: Cell) -> bool {
    snake.iter().any(|&c| c == cell)
}

/// Derive a candidate cell from seed material. SHA256(seed || nonce || attempt)
/// gives independent draws per attempt without consuming fresh entropy.
fn derive_candidate(material: &[u8; 32], nonce: u64, attempt: u32) -> Cell {
    let mut hasher = Sha256::new();
    hasher.update(material);
    hasher.update(nonce.to_be_bytes());
    hasher.update(attempt.to_be_bytes());
    let hash = hasher.finalize();

    let x = u64::from_be_bytes(hash[0..8].try_into().expect("hash is 32 bytes")) % GRID_SIZE as u64;
    let y =
        u64::from_be_bytes(hash[8..16].try_into().expect("hash is 32 bytes")) % GRID_SIZE as u64;
    Cell::new(x as u8, y as u8)
}

/// Place food on a uniformly random free cell.
///
/// Bounded iterative retry: a fixed number of seeded draws, then a
/// deterministic scan of the remaining free cells. `None` only when the snake
/// fills the entire grid.
pub fn spawn_food(snake: &VecDeque<Cell>, material: &[u8; 32], nonce: u64) -> Option<Cell> {
    if snake.len() >= TOTAL_CELLS {
        return None;
    }

    for attempt in 0..MAX_SPAWN_ATTEMPTS {
        let candidate = derive_candidate(material, nonce, attempt);
        if !occupies(snake, candidate) {
            return Some(candidate);
        }
    }

    // Dense board: start the scan at a seeded offset so the fallback does not
    // always favor the top-left corner.
    let start = derive_candidate(material, nonce, MAX_SPAWN_ATTEMPTS);
    let start_idx = start.y as usize * GRID_SIZE as usize + start.x as usize;
    for i in 0..TOTAL_CELLS {
        let idx = (start_idx + i) % TOTAL_CELLS;
        let cell = Cell::new(
            (idx % GRID_SIZE as usize) as u8,
            (idx / GRID_SIZE as usize) as u8,
        );
        if !occupies(snake, cell) {
            return Some(cell);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snake_of(cells: &[(u8, u8)]) -> VecDeque<Cell> {
        cells.iter().map(|&(x, y)| Cell::new(x, y)).collect()
    }

    #[test]
    fn test_step_moves_one_cell() {
        let c = Cell::new(10, 10);
        assert_eq!(step(c, Direction::Up), Some(Cell::new(10, 9)));
        assert_eq!(step(c, Direction::Down), Some(Cell::new(10, 11)));
        assert_eq!(step(c, Direction::Left), Some(Cell::new(9, 10)));
        assert_eq!(step(c, Direction::Right), Some(Cell::new(11, 10)));
    }

    #[test]
    fn test_step_detects_every_wall() {
        assert_eq!(step(Cell::new(0, 0), Direction::Left), None);
        assert_eq!(step(Cell::new(0, 0), Direction::Up), None);
        assert_eq!(step(Cell::new(GRID_SIZE - 1, 5), Direction::Right), None);
        assert_eq!(step(Cell::new(5, GRID_SIZE - 1), Direction::Down), None);
    }

    #[test]
    fn test_spawn_food_avoids_snake() {
        let snake = snake_of(&[(11, 10), (10, 10)]);
        for nonce in 0..200 {
            let food = spawn_food(&snake, &[7u8; 32], nonce).expect("grid is nearly empty");
            assert!(!occupies(&snake, food));
            assert!(food.x < GRID_SIZE && food.y < GRID_SIZE);
        }
    }

    #[test]
    fn test_spawn_food_on_dense_grid_finds_the_free_cell() {
        // Fill everything except one cell.
        let mut snake = VecDeque::new();
        for y in 0..GRID_SIZE {
            for x in 0..GRID_SIZE {
                if (x, y) != (13, 7) {
                    snake.push_back(Cell::new(x, y));
                }
            }
        }
        let food = spawn_food(&snake, &[42u8; 32], 1).expect("one cell is free");
        assert_eq!(food, Cell::new(13, 7));
    }

    #[test]
    fn test_spawn_food_none_when_grid_is_full() {
        let mut snake = VecDeque::new();
        for y in 0..GRID_SIZE {
            for x in 0..GRID_SIZE {
                snake.push_back(Cell::new(x, y));
            }
        }
        assert_eq!(spawn_food(&snake, &[0u8; 32], 0), None);
    }

    #[test]
    fn test_derive_candidate_varies_with_nonce() {
        let a: Vec<Cell> = (0..16).map(|n| derive_candidate(&[1u8; 32], n, 0)).collect();
        let distinct: std::collections::HashSet<_> = a.iter().collect();
        // Not a uniformity proof, just a degenerate-stream guard.
        assert!(distinct.len() > 4);
    }
}
