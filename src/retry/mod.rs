pub mod attempts;
pub mod consumer;
pub mod dead_letter;
pub mod producer;
pub mod scheduler;
pub mod sink;
