pub mod callback;
pub mod loop_player;
pub mod performance;
