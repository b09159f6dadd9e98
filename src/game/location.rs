//! Grid geometry: locations, directions and distances.

use serde::ser::{Serialize, SerializeTuple, Serializer};

/// A square on the game grid, addressed as (row, column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    /// Row index (0 at the top).
    pub row: i32,
    /// Column index (0 at the left).
    pub col: i32,
}

impl Location {
    /// Create a new location.
    #[must_use]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

// Locations travel on the wire and in the replay as a `[row, col]` pair.
impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.row)?;
        tuple.serialize_element(&self.col)?;
        tuple.end()
    }
}

/// A single-step compass direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// One row up.
    North,
    /// One column right.
    East,
    /// One row down.
    South,
    /// One column left.
    West,
}

impl Direction {
    /// The (row, col) offset of one step in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (-1, 0),
            Direction::East => (0, 1),
            Direction::South => (1, 0),
            Direction::West => (0, -1),
        }
    }

    /// The single-letter form used in order histories and diagnostics.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Direction::North => 'n',
            Direction::East => 'e',
            Direction::South => 's',
            Direction::West => 'w',
        }
    }
}

/// The game grid: dimensions plus the wraparound flag.
///
/// All distance math lives here so that cyclic maps are handled in exactly
/// one place.
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    /// Number of rows.
    pub rows: i32,
    /// Number of columns.
    pub cols: i32,
    /// Whether the map wraps around at the edges.
    pub cyclic: bool,
}

impl Grid {
    /// Create a new grid.
    #[must_use]
    pub const fn new(rows: i32, cols: i32, cyclic: bool) -> Self {
        Self { rows, cols, cyclic }
    }

    /// Manhattan distance between two locations, shortest-way on cyclic maps.
    #[must_use]
    pub fn manhattan_distance(&self, a: Location, b: Location) -> i32 {
        let mut d_row = (a.row - b.row).abs();
        let mut d_col = (a.col - b.col).abs();
        if self.cyclic {
            d_row = d_row.min(self.rows - d_row);
            d_col = d_col.min(self.cols - d_col);
        }
        d_row + d_col
    }

    /// Squared euclidean distance between two locations.
    #[must_use]
    pub fn distance_squared(&self, a: Location, b: Location) -> i32 {
        let mut d_row = (a.row - b.row).abs();
        let mut d_col = (a.col - b.col).abs();
        if self.cyclic {
            d_row = d_row.min(self.rows - d_row);
            d_col = d_col.min(self.cols - d_col);
        }
        d_row * d_row + d_col * d_col
    }

    /// The location one step away in `direction`, wrapping at the edges.
    ///
    /// On non-cyclic maps the wrapped result is still produced; callers
    /// detect the illegal wrap by checking that the step stayed adjacent
    /// (see [`Grid::walk`]).
    #[must_use]
    pub fn destination(&self, location: Location, direction: Direction) -> Location {
        let (d_row, d_col) = direction.offset();
        Location::new(
            (location.row + d_row).rem_euclid(self.rows),
            (location.col + d_col).rem_euclid(self.cols),
        )
    }

    /// Whether `location` lies within the circle of squared radius
    /// `radius2` around `center`. Circles do not wrap.
    #[must_use]
    pub fn in_circle(center: Location, radius2: i32, location: Location) -> bool {
        let d_row = center.row - location.row;
        let d_col = center.col - location.col;
        d_row * d_row + d_col * d_col <= radius2
    }

    /// Step-by-step directions from `a` to `b`, taking the short way around
    /// on cyclic maps. Returns an empty path when the locations coincide.
    #[must_use]
    pub fn direction_letters(&self, a: Location, b: Location) -> Vec<Direction> {
        let (mut row, mut col) = (a.row, a.col);
        let half_rows = self.rows / 2;
        let half_cols = self.cols / 2;
        let distance = self.manhattan_distance(a, b);

        let mut path = Vec::with_capacity(usize::try_from(distance).unwrap_or(0));
        for _ in 0..distance {
            if row < b.row {
                if self.cyclic && b.row - row >= half_rows {
                    path.push(Direction::North);
                    row -= 1;
                    continue;
                }
                path.push(Direction::South);
                row += 1;
                continue;
            }
            if b.row < row {
                if self.cyclic && row - b.row >= half_rows {
                    path.push(Direction::South);
                    row += 1;
                    continue;
                }
                path.push(Direction::North);
                row -= 1;
                continue;
            }
            if col < b.col {
                if self.cyclic && b.col - col >= half_cols {
                    path.push(Direction::West);
                    col -= 1;
                    continue;
                }
                path.push(Direction::East);
                col += 1;
                continue;
            }
            if b.col < col {
                if self.cyclic && col - b.col >= half_cols {
                    path.push(Direction::East);
                    col += 1;
                    continue;
                }
                path.push(Direction::West);
                col -= 1;
                continue;
            }
        }
        path
    }

    /// Follow `path` from `from`, one step at a time.
    ///
    /// On non-cyclic maps a step that would leave the grid is detected by
    /// the wrap (the stepped-to square is no longer adjacent) and reported
    /// as the rejected step.
    ///
    /// # Errors
    ///
    /// Returns the location and direction of the first illegal step.
    pub fn walk(&self, from: Location, path: &[Direction]) -> Result<Location, (Location, Direction)> {
        let mut current = from;
        for &direction in path {
            let next = self.destination(current, direction);
            if !self.cyclic && self.manhattan_distance(current, next) > 1 {
                return Err((current, direction));
            }
            current = next;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manhattan_distance_plain() {
        let grid = Grid::new(10, 10, false);
        let d = grid.manhattan_distance(Location::new(0, 0), Location::new(3, 4));
        assert_eq!(d, 7);
    }

    #[test]
    fn test_manhattan_distance_cyclic_wraps() {
        let grid = Grid::new(10, 10, true);
        let d = grid.manhattan_distance(Location::new(0, 0), Location::new(9, 9));
        assert_eq!(d, 2);
    }

    #[test]
    fn test_distance_squared() {
        let grid = Grid::new(10, 10, false);
        let d = grid.distance_squared(Location::new(1, 1), Location::new(4, 5));
        assert_eq!(d, 25);
    }

    #[test]
    fn test_destination_wraps() {
        let grid = Grid::new(10, 10, true);
        let loc = grid.destination(Location::new(0, 0), Direction::North);
        assert_eq!(loc, Location::new(9, 0));
    }

    #[test]
    fn test_in_circle() {
        let center = Location::new(5, 5);
        assert!(Grid::in_circle(center, 4, Location::new(5, 7)));
        assert!(!Grid::in_circle(center, 4, Location::new(5, 8)));
    }

    #[test]
    fn test_direction_letters_straight() {
        let grid = Grid::new(10, 10, false);
        let path = grid.direction_letters(Location::new(2, 2), Location::new(4, 2));
        assert_eq!(path, vec![Direction::South, Direction::South]);
    }

    #[test]
    fn test_direction_letters_same_square() {
        let grid = Grid::new(10, 10, false);
        assert!(grid.direction_letters(Location::new(2, 2), Location::new(2, 2)).is_empty());
    }

    #[test]
    fn test_direction_letters_cyclic_short_way() {
        let grid = Grid::new(10, 10, true);
        let path = grid.direction_letters(Location::new(0, 0), Location::new(9, 0));
        assert_eq!(path, vec![Direction::North]);
    }

    #[test]
    fn test_walk_rejects_leaving_map() {
        let grid = Grid::new(10, 10, false);
        let result = grid.walk(Location::new(0, 0), &[Direction::North]);
        assert_eq!(result, Err((Location::new(0, 0), Direction::North)));
    }

    #[test]
    fn test_walk_cyclic_allows_wrap() {
        let grid = Grid::new(10, 10, true);
        let result = grid.walk(Location::new(0, 0), &[Direction::North]);
        assert_eq!(result, Ok(Location::new(9, 0)));
    }
}
