// desync.rs -- client/server position divergence correction
//
// While the server believes we are mid-skill, it advances our position
// along the stage's animation offsets. If the client drifted further from
// that replayed position than its own stage displacement allows, the
// client is desynchronized: outbound skill locations are rewritten to the
// server's expectation, free-move location reports are suppressed, and
// in-action notifies get a configurable back-correction.

use rival_common::geom::{apply_distance, Vec3};
use rival_common::hooks::HookFlow;
use rival_common::packets::{Packet, PacketEvent};

use rival_game::data::SkillType;

use crate::proxy::Rival;

/// Server actions older than this no longer pin our position.
const MAX_SERVER_ACTION_AGE_MS: i64 = 2500;

/// Where the server expects us to be, replayed from the current server
/// action stage. None when no recent server action pins the position.
pub fn server_expected(rival: &Rival) -> Option<Vec3> {
    if !rival.action.in_action_server {
        return None;
    }
    let stage = rival.action.stage_server.as_ref()?;
    if rival.now - stage.stage_time > MAX_SERVER_ACTION_AGE_MS {
        return None;
    }
    if stage.anim_seq.is_empty() {
        return None;
    }
    let template = rival.data.skill(stage.skill)?;
    if template.kind == SkillType::Dash {
        return None;
    }
    let w = stage.w + template.dir_modifier(stage.stage);
    let mut loc = stage.loc;
    for step in &stage.anim_seq {
        loc = apply_distance(loc, w, step.distance);
    }
    Some(loc)
}

/// The divergence test: the claimed client location is desynchronized when
/// it sits further from the server's expectation than the client's own
/// stage displacement explains. Returns the server-expected location.
pub fn check(rival: &Rival, client_loc: Vec3) -> Option<Vec3> {
    let expected = server_expected(rival)?;
    let own_displacement = match rival.action.stage.as_ref() {
        Some(s) => s.loc.dist2d(&rival.position.loc),
        None => 0.0,
    };
    if client_loc.dist2d(&expected) > own_displacement {
        Some(expected)
    } else {
        None
    }
}

pub fn on_skill_start_out(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if !rival.settings.enabled {
        return HookFlow::Continue;
    }
    let claimed = match &ev.packet {
        Packet::SkillStart(p) => p.loc,
        _ => return HookFlow::Continue,
    };
    if let Some(expected) = check(rival, claimed) {
        if let Packet::SkillStart(p) = &mut ev.packet {
            p.loc = expected;
        }
        if rival.settings.debug.packets {
            rival.debug.push(rival.now, "desync: rewrote skill start location".into());
        }
    }
    HookFlow::Continue
}

pub fn on_player_location_out(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if !rival.settings.enabled {
        return HookFlow::Continue;
    }
    let claimed = match &ev.packet {
        Packet::CPlayerLocation(p) => p.loc,
        _ => return HookFlow::Continue,
    };
    if check(rival, claimed).is_some() {
        return HookFlow::Suppress;
    }
    HookFlow::Continue
}

pub fn on_notify_location_out(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if !rival.settings.enabled {
        return HookFlow::Continue;
    }
    let back = rival.settings.desync.back_correction;
    if back == 0.0 {
        return HookFlow::Continue;
    }
    let claimed = match &ev.packet {
        Packet::CNotifyLocationInAction(p) => p.loc,
        _ => return HookFlow::Continue,
    };
    if check(rival, claimed).is_some() {
        if let Packet::CNotifyLocationInAction(p) = &mut ev.packet {
            p.loc = apply_distance(p.loc, p.w, back);
        }
    }
    HookFlow::Continue
}
