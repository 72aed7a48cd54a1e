// crowd_control.rs -- early termination of forced animations
//
// Stuns, sleeps, knockdowns and fears all hold the client hostage for a
// round trip. This component ends them locally ahead of the server: a
// pre-emptive action end fires at (reaction duration - ping), the real end
// that follows is swallowed by action id, and the stun sentinel stage is
// shortened to the driving abnormality's remaining duration.

use rival_common::hooks::HookFlow;
use rival_common::packets::{Packet, PacketEvent, SActionEnd};

use rival_game::data::SkillType;

use crate::proxy::Rival;
use crate::task::Task;

/// animSeq head marking an indefinite stun/sleep stage. Preserved exactly
/// as the client ships it.
pub const STUN_SENTINEL_DURATION: i32 = 89_000_000;
pub const STUN_SENTINEL_DISTANCE: f32 = -1.0;

/// Abnormality kind for fear.
const FEAR_KIND: i32 = 232;

const END_TYPE_FEAR: i32 = 16;

#[derive(Debug, Default)]
pub struct CrowdControl {
    /// Action id whose real S_ACTION_END we already emulated.
    pending_end: Option<u32>,
}

impl CrowdControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub fn on_skill_result(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SEachSkillResult(p) => p.clone(),
        _ => return HookFlow::Continue,
    };
    if !rival.settings.enabled
        || !pkt.reaction.enable
        || pkt.source == rival.player.game_id
        || pkt.target != rival.player.game_id
    {
        return HookFlow::Continue;
    }

    // a retaliate in progress overrides the reaction entirely
    let retaliating = rival
        .action
        .current_skill()
        .and_then(|s| rival.data.skill(s))
        .is_some_and(|t| t.kind == SkillType::Counter);
    if retaliating {
        return HookFlow::Suppress;
    }

    let total: i64 = pkt.reaction.anim_seq.iter().map(|s| s.duration as i64).sum();
    let early = (total - rival.ping_ms()).max(0);
    rival.cc.pending_end = Some(pkt.action_id);
    let (loc, w) = (rival.position.loc, rival.position.w);
    rival.timers.schedule(
        rival.now,
        early,
        Task::ReactionEnd { action_id: pkt.action_id, skill: pkt.skill, loc, w },
    );
    HookFlow::Continue
}

/// Fires the pre-emptive end of a reaction animation.
pub fn reaction_end(rival: &mut Rival, action_id: u32, skill: u32, loc: rival_common::geom::Vec3, w: f32) {
    if rival.cc.pending_end != Some(action_id) {
        return;
    }
    rival.send_fake(Packet::SActionEnd(SActionEnd {
        game_id: rival.player.game_id,
        loc,
        w,
        template_id: rival.player.template_id,
        skill,
        end_type: 0,
        action_id,
    }));
}

/// The real end of a reaction we already terminated is swallowed.
pub fn on_action_end(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SActionEnd(pkt) = &ev.packet {
        if rival.player.is_me(pkt.game_id) && rival.cc.pending_end == Some(pkt.action_id) {
            rival.cc.pending_end = None;
            return HookFlow::Suppress;
        }
    }
    HookFlow::Continue
}

/// Stun/sleep stages arrive with a sentinel animSeq head and no end time.
/// The oldest active abnormality is what actually holds us, so its
/// remaining duration drives an early end.
pub fn on_action_stage(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SActionStage(p) => p.clone(),
        _ => return HookFlow::Continue,
    };
    if !rival.settings.enabled || !rival.player.is_me(pkt.game_id) {
        return HookFlow::Continue;
    }
    let sentinel = pkt.anim_seq.first().is_some_and(|s| {
        s.duration == STUN_SENTINEL_DURATION && s.distance == STUN_SENTINEL_DISTANCE
    });
    if !sentinel {
        return HookFlow::Continue;
    }
    if let Some(oldest) = rival.effects.oldest_active() {
        let remaining = (oldest.start_time + oldest.duration_ms - rival.now).max(0);
        let early = (remaining - rival.ping_ms()).max(0);
        rival.cc.pending_end = Some(pkt.action_id);
        let (loc, w) = (pkt.loc, pkt.w);
        rival.timers.schedule(
            rival.now,
            early,
            Task::ReactionEnd { action_id: pkt.action_id, skill: pkt.skill, loc, w },
        );
    }
    HookFlow::Continue
}

/// Fear puts us in a forced walk; end it the moment it lands.
pub fn on_abnormality_begin(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SAbnormalityBegin(p) => *p,
        _ => return HookFlow::Continue,
    };
    if !rival.settings.enabled || !rival.player.is_me(pkt.target) {
        return HookFlow::Continue;
    }
    let fear = rival.data.abnormality(pkt.id).is_some_and(|d| d.kind == FEAR_KIND);
    if fear && rival.action.in_action {
        let stage = rival.action.stage.as_ref().map(|s| (s.skill, s.action_id));
        if let Some((skill, action_id)) = stage {
            let (loc, w) = (rival.position.loc, rival.position.w);
            rival.send_fake(Packet::SActionEnd(SActionEnd {
                game_id: rival.player.game_id,
                loc,
                w,
                template_id: rival.player.template_id,
                skill,
                end_type: END_TYPE_FEAR,
                action_id,
            }));
        }
    }
    HookFlow::Continue
}
