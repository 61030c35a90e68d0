// src/procedures/mod.rs

//! Ready-made procedures.

pub mod block;
pub mod command;
pub mod delay;
pub mod group;
pub mod transform;

pub use block::BlockProcedure;
pub use command::CommandProcedure;
pub use delay::DelayProcedure;
pub use group::GroupProcedure;
pub use transform::TransformProcedure;
