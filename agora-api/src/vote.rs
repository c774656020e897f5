use crate::Error;

/// Tri-state vote of one user on one comment, serialized as -1, 0 or 1
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Vote {
    Down,
    #[default]
    Neutral,
    Up,
}

/// The direction of a vote button; a cast never carries "no vote"
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Direction {
    Up,
    Down,
}

impl Vote {
    pub fn value(self) -> i64 {
        match self {
            Vote::Down => -1,
            Vote::Neutral => 0,
            Vote::Up => 1,
        }
    }

    /// Vote resulting from pressing the `direction` button: pressing the
    /// button of the current vote retracts it
    pub fn toggle(self, direction: Direction) -> Vote {
        let pressed = Vote::from(direction);
        if self == pressed {
            Vote::Neutral
        } else {
            pressed
        }
    }

    /// Change to apply to a vote aggregate when this vote becomes `next`
    pub fn delta_to(self, next: Vote) -> i64 {
        next.value() - self.value()
    }
}

impl From<Direction> for Vote {
    fn from(d: Direction) -> Vote {
        match d {
            Direction::Up => Vote::Up,
            Direction::Down => Vote::Down,
        }
    }
}

impl From<Vote> for i64 {
    fn from(v: Vote) -> i64 {
        v.value()
    }
}

impl TryFrom<i64> for Vote {
    type Error = Error;

    fn try_from(v: i64) -> Result<Vote, Error> {
        match v {
            -1 => Ok(Vote::Down),
            0 => Ok(Vote::Neutral),
            1 => Ok(Vote::Up),
            _ => Err(Error::InvalidVote(v)),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct VoteRequest {
    pub vote: Vote,
}
