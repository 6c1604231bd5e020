use thiserror::Error;

use crate::geometry::{Direction8, Point};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrajectoryError {
    #[error("invalid direction '{digit}' at position {position} in path \"{path}\"")]
    InvalidDirection {
        path: String,
        position: usize,
        digit: char,
    },
    #[error("malformed trajectory \"{text}\": expected pairs of integers")]
    Malformed { text: String },
}

/// Parses a path string of direction digits `0`..`7`.
pub fn parse_path(path: &str) -> Result<Vec<Direction8>, TrajectoryError> {
    path.chars()
        .enumerate()
        .map(|(position, digit)| {
            Direction8::from_digit(digit).ok_or_else(|| TrajectoryError::InvalidDirection {
                path: path.to_string(),
                position,
                digit,
            })
        })
        .collect()
}

/// Ordered list of pixel translations applied one per step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trajectory {
    steps: Vec<Point>,
}

impl Trajectory {
    pub fn new(steps: Vec<Point>) -> Self {
        Self { steps }
    }

    /// Parses whitespace separated `dx dy` pairs, e.g. `"1 0  1 1  0 1"`.
    pub fn parse(text: &str) -> Result<Self, TrajectoryError> {
        let values = text
            .split_whitespace()
            .map(str::parse::<i32>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| TrajectoryError::Malformed {
                text: text.to_string(),
            })?;
        if values.len() % 2 != 0 {
            return Err(TrajectoryError::Malformed {
                text: text.to_string(),
            });
        }
        Ok(Self::new(
            values
                .chunks_exact(2)
                .map(|pair| Point::new(pair[0], pair[1]))
                .collect(),
        ))
    }

    /// One single-pixel step per direction digit.
    pub fn from_path(path: &str) -> Result<Self, TrajectoryError> {
        Ok(Self::new(
            parse_path(path)?
                .into_iter()
                .map(Direction8::delta)
                .collect(),
        ))
    }

    pub fn straight(direction: Direction8, length: usize) -> Self {
        Self::new(vec![direction.delta(); length])
    }

    pub fn steps(&self) -> &[Point] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
