//! 核心层：错误分类与优雅关闭

pub mod error;
pub mod shutdown;

pub use error::GameError;
pub use shutdown::{ShutdownManager, ShutdownReason};
