#![allow(clippy::too_many_arguments, clippy::collapsible_if)]

pub mod skill_id;
pub mod geom;
pub mod ring;
pub mod timer;
pub mod hooks;
pub mod wire;
pub mod packets;
pub mod codec;
pub mod settings;
pub mod sysmsg;
