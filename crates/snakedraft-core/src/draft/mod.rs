pub mod item;
pub mod pool;
pub mod roster;
pub mod session;
pub mod split;
pub mod turn;
