// tracker.rs -- pipeline adapters for the state stores
//
// Every store mutates only from here: one adapter per subscription, each a
// thin shim that unpacks the record and calls the store. Session lifecycle
// (login reset, zone clear, death) also lands here because it is just
// another subscription.

use rival_common::hooks::HookFlow;
use rival_common::packets::{Packet, PacketEvent};

use rival_game::data::SkillType;
use rival_game::effects::View;

use crate::proxy::Rival;

const CREST_COOLDOWN_RESET: i32 = 6;

// ------------------------------------------------------------
// Action tracker
// ------------------------------------------------------------

pub fn on_stage_client(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if ev.silenced {
        return HookFlow::Continue;
    }
    if let Packet::SActionStage(pkt) = &ev.packet {
        if rival.player.is_me(pkt.game_id) {
            let (speed, fx) = {
                let ctx = rival.cast_ctx();
                let speed = rival.skills.get_speed(pkt.skill, &ctx);
                let fx = rival.effects.get_applied(pkt.skill, &rival.data);
                (speed, fx)
            };
            let moving_charge = rival
                .data
                .skill(pkt.skill)
                .is_some_and(|t| t.kind == SkillType::MovingCharge);
            let pkt = pkt.clone();
            let now = rival.now;
            rival.action.on_stage_client(&pkt, now, speed, fx, moving_charge);
            rival.last.record_stage(&pkt, now);
            rival.position.update(pkt.loc, pkt.w, now);
        }
    }
    HookFlow::Continue
}

pub fn on_end_client(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if ev.silenced {
        return HookFlow::Continue;
    }
    if let Packet::SActionEnd(pkt) = &ev.packet {
        if rival.player.is_me(pkt.game_id) {
            let pkt = *pkt;
            let now = rival.now;
            rival.action.on_end_client(&pkt, now);
            rival.last.record_end(&pkt, now);
            rival.position.update(pkt.loc, pkt.w, now);
        }
    }
    HookFlow::Continue
}

pub fn on_result_client(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if ev.silenced {
        return HookFlow::Continue;
    }
    if let Packet::SEachSkillResult(pkt) = &ev.packet {
        let pkt = pkt.clone();
        let now = rival.now;
        let me = rival.player.game_id;
        rival.action.on_skill_result(&pkt, me, now);
        rival.last.record_result(&pkt, now);
    }
    HookFlow::Continue
}

pub fn on_stage_server(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SActionStage(pkt) = &ev.packet {
        if rival.player.is_me(pkt.game_id) {
            let (speed, fx) = {
                let ctx = rival.cast_ctx();
                let speed = rival.skills.get_speed(pkt.skill, &ctx);
                let fx = rival.effects.get_applied(pkt.skill, &rival.data);
                (speed, fx)
            };
            let pkt = pkt.clone();
            let now = rival.now;
            rival.action.on_stage_server(&pkt, now, speed, fx);
        }
    }
    HookFlow::Continue
}

pub fn on_end_server(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SActionEnd(pkt) = &ev.packet {
        if rival.player.is_me(pkt.game_id) {
            let pkt = *pkt;
            let now = rival.now;
            rival.action.on_end_server(&pkt, now);
        }
    }
    HookFlow::Continue
}

// ------------------------------------------------------------
// Session lifecycle
// ------------------------------------------------------------

pub fn on_login(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SLogin(pkt) = &ev.packet {
        let pkt = pkt.clone();
        rival.player.on_login(&pkt);
        rival.entities.reset();
        rival.action.reset();
        rival.cooldowns.reset();
        rival.effects.reset();
        rival.last.reset();
        rival.position.reset();
        rival.ping.reset();
        rival.emu.reset();
        rival.abnorm.reset();
        rival.cc.reset();
        rival.lockon.reset();
    }
    HookFlow::Continue
}

pub fn on_load_topo(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SLoadTopo(_) = &ev.packet {
        rival.entities.reset();
        rival.player.on_load_topo();
    }
    HookFlow::Continue
}

pub fn on_spawn_me(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SSpawnMe(pkt) = &ev.packet {
        let pkt = *pkt;
        rival.player.on_spawn_me(&pkt);
        rival.position.update(pkt.loc, pkt.w, rival.now);
    }
    HookFlow::Continue
}

pub fn on_creature_life(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SCreatureLife(pkt) = &ev.packet {
        let pkt = *pkt;
        if rival.player.is_me(pkt.target) {
            rival.player.on_creature_life(pkt.alive);
            if !pkt.alive {
                rival.effects.on_death();
            }
        } else {
            rival.entities.on_creature_life(&pkt);
        }
    }
    HookFlow::Continue
}

// ------------------------------------------------------------
// Entities and stats
// ------------------------------------------------------------

pub fn on_change_hp(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SCreatureChangeHp(pkt) = &ev.packet {
        rival.entities.on_change_hp(pkt);
    }
    HookFlow::Continue
}

pub fn on_stat_update(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SPlayerStatUpdate(pkt) = &ev.packet {
        rival.player.on_stat_update(pkt);
    }
    HookFlow::Continue
}

pub fn on_spawn_user(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SSpawnUser(pkt) = &ev.packet {
        rival.entities.on_spawn_user(pkt);
    }
    HookFlow::Continue
}

pub fn on_spawn_npc(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SSpawnNpc(pkt) = &ev.packet {
        rival.entities.on_spawn_npc(pkt);
    }
    HookFlow::Continue
}

pub fn on_despawn(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SDespawn(pkt) = &ev.packet {
        rival.entities.on_despawn(pkt);
    }
    HookFlow::Continue
}

pub fn on_user_location(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SUserLocation(pkt) = &ev.packet {
        rival.entities.on_user_location(pkt);
    }
    HookFlow::Continue
}

pub fn on_npc_location(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SNpcLocation(pkt) = &ev.packet {
        rival.entities.on_npc_location(pkt);
    }
    HookFlow::Continue
}

pub fn on_instant_move(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if ev.silenced {
        return HookFlow::Continue;
    }
    if let Packet::SInstantMove(pkt) = &ev.packet {
        let pkt = *pkt;
        if rival.player.is_me(pkt.game_id) {
            rival.position.update(pkt.loc, pkt.w, rival.now);
            rival.last.record_instant_move(&pkt, rival.now);
        } else {
            rival.entities.on_instant_move(&pkt);
        }
    }
    HookFlow::Continue
}

// ------------------------------------------------------------
// Cooldowns
// ------------------------------------------------------------

pub fn on_start_cooltime(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SStartCooltimeSkill(pkt) = &ev.packet {
        let pkt = *pkt;
        let now = rival.now;
        rival.cooldowns.register(
            pkt.skill,
            pkt.cooldown_ms as i64,
            pkt.used_stacks,
            pkt.max_stacks,
            pkt.next_stack_cooldown_ms as i64,
            &rival.data,
            now,
        );
    }
    HookFlow::Continue
}

pub fn on_decrease_cooltime(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SDecreaseCooltimeSkill(pkt) = &ev.packet {
        let pkt = *pkt;
        let now = rival.now;
        rival
            .cooldowns
            .register(pkt.skill, pkt.cooldown_ms as i64, 0, 0, 0, &rival.data, now);
    }
    HookFlow::Continue
}

pub fn on_crest_message(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SCrestMessage(pkt) = &ev.packet {
        if pkt.kind == CREST_COOLDOWN_RESET {
            let skill = pkt.skill;
            let from_server = !ev.fake;
            let now = rival.now;
            rival.cooldowns.on_reset(skill, from_server, now);
        }
    }
    HookFlow::Continue
}

// ------------------------------------------------------------
// Effects store
// ------------------------------------------------------------

pub fn on_crest_info(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SCrestInfo(pkt) = &ev.packet {
        rival.effects.on_crest_info(pkt);
    }
    HookFlow::Continue
}

pub fn on_crest_apply(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SCrestApply(pkt) = &ev.packet {
        rival.effects.on_crest_apply(pkt);
    }
    HookFlow::Continue
}

pub fn on_hold_add(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SHoldAbnormalityAdd(pkt) = &ev.packet {
        rival.effects.on_hold_add(pkt);
    }
    HookFlow::Continue
}

pub fn on_hold_del(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SHoldAbnormalityDel(pkt) = &ev.packet {
        rival.effects.on_hold_del(pkt);
    }
    HookFlow::Continue
}

pub fn on_ep_perks(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SLoadEpPerkInfo(pkt) = &ev.packet {
        rival.effects.on_ep_perks(pkt);
    }
    HookFlow::Continue
}

pub fn on_polishing(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SSkillPolishingList(pkt) = &ev.packet {
        rival.effects.on_polishing(pkt);
    }
    HookFlow::Continue
}

pub fn on_skill_category(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SSkillCategory(pkt) = &ev.packet {
        rival.effects.on_skill_category(pkt);
    }
    HookFlow::Continue
}

pub fn on_armor_rolls(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SArmorRollList(pkt) = &ev.packet {
        rival.effects.on_armor_rolls(pkt);
    }
    HookFlow::Continue
}

pub fn on_abnorm_begin_client(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if ev.silenced {
        return HookFlow::Continue;
    }
    if let Packet::SAbnormalityBegin(pkt) = &ev.packet {
        if rival.player.is_me(pkt.target) {
            let (id, stacks, dur, fake) = (pkt.id, pkt.stacks, pkt.duration_ms, ev.fake);
            let now = rival.now;
            rival.effects.begin(View::Client, id, stacks, dur, now, fake);
        }
    }
    HookFlow::Continue
}

pub fn on_abnorm_refresh_client(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if ev.silenced {
        return HookFlow::Continue;
    }
    if let Packet::SAbnormalityRefresh(pkt) = &ev.packet {
        if rival.player.is_me(pkt.target) {
            let (id, stacks, dur, fake) = (pkt.id, pkt.stacks, pkt.duration_ms, ev.fake);
            let now = rival.now;
            rival.effects.begin(View::Client, id, stacks, dur, now, fake);
        }
    }
    HookFlow::Continue
}

pub fn on_abnorm_end_client(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if ev.silenced {
        return HookFlow::Continue;
    }
    if let Packet::SAbnormalityEnd(pkt) = &ev.packet {
        if rival.player.is_me(pkt.target) {
            let id = pkt.id;
            rival.effects.end(View::Client, id);
        }
    }
    HookFlow::Continue
}

pub fn on_abnorm_begin_server(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SAbnormalityBegin(pkt) = &ev.packet {
        if rival.player.is_me(pkt.target) {
            let (id, stacks, dur) = (pkt.id, pkt.stacks, pkt.duration_ms);
            let now = rival.now;
            rival.effects.begin(View::Server, id, stacks, dur, now, false);
        }
    }
    HookFlow::Continue
}

pub fn on_abnorm_refresh_server(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SAbnormalityRefresh(pkt) = &ev.packet {
        if rival.player.is_me(pkt.target) {
            let (id, stacks, dur) = (pkt.id, pkt.stacks, pkt.duration_ms);
            let now = rival.now;
            rival.effects.begin(View::Server, id, stacks, dur, now, false);
        }
    }
    HookFlow::Continue
}

pub fn on_abnorm_end_server(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SAbnormalityEnd(pkt) = &ev.packet {
        if rival.player.is_me(pkt.target) {
            let id = pkt.id;
            rival.effects.end(View::Server, id);
        }
    }
    HookFlow::Continue
}

// ------------------------------------------------------------
// Party, mount, outbound movement, ping
// ------------------------------------------------------------

pub fn on_party_list(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SPartyMemberList(pkt) = &ev.packet {
        rival.player.on_party_list(pkt);
    }
    HookFlow::Continue
}

pub fn on_leave_party(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SLeaveParty(_) = &ev.packet {
        rival.player.on_leave_party();
    }
    HookFlow::Continue
}

pub fn on_mount(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SMountVehicle(pkt) = &ev.packet {
        rival.player.on_mount(pkt);
    }
    HookFlow::Continue
}

pub fn on_unmount(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SUnmountVehicle(pkt) = &ev.packet {
        rival.player.on_unmount(pkt);
    }
    HookFlow::Continue
}

pub fn on_skill_start_out(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SkillStart(pkt) = &ev.packet {
        let pkt = pkt.clone();
        let now = rival.now;
        rival.last.record_start(&pkt, now);
    }
    HookFlow::Continue
}

pub fn on_player_location_out(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if ev.silenced {
        return HookFlow::Continue;
    }
    if let Packet::CPlayerLocation(pkt) = &ev.packet {
        let pkt = *pkt;
        let now = rival.now;
        rival.position.update(pkt.loc, pkt.w, now);
        rival.last.record_player_location(&pkt, now);
    }
    HookFlow::Continue
}

pub fn on_notify_location_out(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if ev.silenced {
        return HookFlow::Continue;
    }
    if let Packet::CNotifyLocationInAction(pkt) = &ev.packet {
        let (loc, w) = (pkt.loc, pkt.w);
        let now = rival.now;
        rival.position.update(loc, w, now);
    }
    HookFlow::Continue
}

pub fn on_pong(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SResponseGamestatPong(_) = &ev.packet {
        let now = rival.now;
        if let Some(rtt) = rival.ping.pong_received(now) {
            if rival.settings.debug.ping {
                rival.debug.push(now, format!("ping sample {}ms", rtt));
            }
        }
        // the probe was ours; the client never asked
        return HookFlow::Suppress;
    }
    HookFlow::Continue
}
