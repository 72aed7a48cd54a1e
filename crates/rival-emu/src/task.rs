// task.rs -- deferred work
//
// Every cooperative suspension point in the interceptor is a task on the
// proxy's timer queue. Tasks carry plain data; the pump in proxy.rs matches
// on the variant and calls back into the owning component. Tasks that
// belong to a skill execution carry its generation id so a superseded
// execution's continuations fall dead.

use rival_common::geom::Vec3;
use rival_common::packets::{CCancelSkill, CStartSkill};

#[derive(Debug, Clone)]
pub enum Task {
    /// Release + emulate a held skill start.
    ExecuteSkill { exec: u64 },
    /// One retry iteration of a released skill start.
    SkillRetry { exec: u64, attempt: u32 },
    /// Emit the next synthetic action stage of the running emulation.
    SendActionStage { exec: u64, skill: u32, stage: i32, continuation: bool },
    /// Grant the charge skill and buffer the original outbound.
    ChargeGrant { exec: u64, moving_ab: bool },
    /// Release a held cancel request to the server.
    ReleaseCancel { pkt: CCancelSkill },
    /// Start an abnormality on schedule (stage-apply entries).
    AbnormStart { id: u32, source_skill: u32, duration_override: Option<i64> },
    /// End an abnormality. `tracked` entries own the per-id timeout slot.
    AbnormEnd { id: u32, tracked: bool },
    /// Compare emulated abnormality state with the server view and heal.
    AbnormRevert { id: u32, ending: bool },
    /// Pre-emptive end of a forced reaction animation.
    ReactionEnd { action_id: u32, skill: u32, loc: Vec3, w: f32 },
    /// Step the position tracker along a reaction animation.
    PositionTick { distance: f32 },
    /// Periodic ping probe.
    PingProbe,
    /// Re-execute a defence-gated skill start.
    DefenceChain { pkt: CStartSkill },
}
