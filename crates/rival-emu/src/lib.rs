#![allow(clippy::too_many_arguments, clippy::collapsible_if)]

pub mod task;
pub mod proxy;
pub mod tracker;
pub mod abnorm;
pub mod emulate;
pub mod crowd_control;
pub mod desync;
pub mod lockon;
pub mod smooth_block;
pub mod debug_log;
pub mod shell;
