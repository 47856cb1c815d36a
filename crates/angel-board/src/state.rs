use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    Init,
    Idle,
    Flying,
    Stationary,
    Fault,
    Cleanup,
    Done,
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BoardState::Init => "INIT",
            BoardState::Idle => "IDLE",
            BoardState::Flying => "FLYING",
            BoardState::Stationary => "STATIONARY",
            BoardState::Fault => "FAULT",
            BoardState::Cleanup => "CLEANUP",
            BoardState::Done => "DONE",
        };
        f.write_str(s)
    }
}
