//! 游戏领域：数据模型与创建

pub mod create;
pub mod model;

pub use create::{new_game, CreateGameParams};
pub use model::{Agent, Answer, DebateMessage, Game, GameStatus, JudgeVerdict, Round, Vote};
