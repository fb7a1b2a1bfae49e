pub mod agent;
pub mod moderation;
pub mod session;
pub mod turn;
