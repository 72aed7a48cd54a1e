// lockon.rs -- multi-target lockon validation
//
// The server's own lockon verdicts are too slow to be useful, so they are
// suppressed outright and the rules are evaluated locally: per-action
// target list, per-class admission counts, and the effect-store lockon
// bonus. The outbound request still goes to the server so it can apply
// the hits.

use rival_common::hooks::HookFlow;
use rival_common::packets::{Packet, PacketEvent, SCanLockonTarget};

use rival_game::data::LockonClass;
use rival_game::entity_list::EntityRecord;

use crate::proxy::Rival;

/// Admission cap when a skill carries no lockon rules at all.
const DEFAULT_MAX_TARGETS: usize = 50;

#[derive(Debug, Default)]
pub struct LockonManager {
    targets: Vec<u64>,
    last_action_start: i64,
}

impl LockonManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub fn on_can_lockon_server(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if !rival.settings.enabled {
        return HookFlow::Continue;
    }
    if let Packet::SCanLockonTarget(_) = &ev.packet {
        return HookFlow::Suppress;
    }
    HookFlow::Continue
}

fn admit(rule_class: LockonClass, entity: &EntityRecord, rival: &Rival) -> bool {
    match rule_class {
        LockonClass::EnemyOrPvp => entity.is_enemy_or_pvp(),
        LockonClass::AllyExceptMe => entity.is_friendly_player() && entity.id != rival.player.game_id,
        LockonClass::Raid => match (entity.server_id, entity.player_id) {
            (Some(s), Some(p)) => rival.player.in_party(s, p),
            _ => false,
        },
        LockonClass::RaidExceptMe => match (entity.server_id, entity.player_id) {
            (Some(s), Some(p)) => rival.player.in_party(s, p) && entity.id != rival.player.game_id,
            _ => false,
        },
    }
}

pub fn on_can_lockon_client(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::CCanLockonTarget(p) => *p,
        _ => return HookFlow::Continue,
    };
    if !rival.settings.enabled {
        return HookFlow::Continue;
    }

    // a new action means a fresh target list; later stages of the same
    // action keep it (start_time is the action identity, stage_time moves
    // with every stage)
    let action_start = rival.action.stage.as_ref().map_or(0, |s| s.start_time);
    if action_start != rival.lockon.last_action_start {
        rival.lockon.targets.clear();
        rival.lockon.last_action_start = action_start;
    }

    if rival.lockon.targets.contains(&pkt.target) {
        return HookFlow::Suppress;
    }

    let rules = rival
        .data
        .skill(pkt.skill)
        .map(|t| t.lockon.clone())
        .unwrap_or_default();
    let bonus = rival
        .action
        .stage
        .as_ref()
        .map_or(0, |s| s.effects.lockon)
        .max(0) as usize;
    let max = if rules.is_empty() {
        DEFAULT_MAX_TARGETS
    } else {
        rules.iter().map(|r| r.count as usize).sum::<usize>() + bonus
    };

    let verdict = if rival.lockon.targets.len() >= max {
        false
    } else {
        match rival.entities.get(pkt.target) {
            Some(entity) => rules.iter().any(|r| admit(r.class, entity, rival)),
            None => false,
        }
    };

    if verdict {
        rival.lockon.targets.push(pkt.target);
    }
    rival.send_fake(Packet::SCanLockonTarget(SCanLockonTarget {
        target: pkt.target,
        skill: pkt.skill,
        success: verdict,
    }));
    HookFlow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use rival_common::codec::Codec;
    use rival_common::packets::{CCanLockonTarget, Direction, SActionStage, SSpawnNpc};
    use rival_common::settings::Settings;
    use rival_game::data::{GameDataFile, LockonRule, SkillTemplate};
    use rival_game::effects::AppliedEffects;
    use rival_game::skills::SpeedInfo;

    fn rival_with_lockon_skill() -> Rival {
        let mut r = Rival::new(Settings::default(), Codec::new(100, None));
        r.player.game_id = 1;
        r.player.alive = true;
        r.data.load(GameDataFile {
            skills: vec![SkillTemplate {
                id: 410100,
                lockon: vec![LockonRule { class: LockonClass::EnemyOrPvp, count: 2 }],
                ..Default::default()
            }],
            abnormalities: vec![],
            npcs: vec![],
        });
        r.entities.on_spawn_npc(&SSpawnNpc {
            game_id: 50,
            template_id: 9,
            hunting_zone_id: 1,
            relation: 12,
            villager: false,
            ..Default::default()
        });
        r.entities.on_spawn_npc(&SSpawnNpc {
            game_id: 51,
            template_id: 9,
            hunting_zone_id: 1,
            relation: 12,
            villager: false,
            ..Default::default()
        });
        r.entities.on_spawn_npc(&SSpawnNpc {
            game_id: 52,
            template_id: 9,
            hunting_zone_id: 1,
            relation: 12,
            villager: false,
            ..Default::default()
        });
        r
    }

    fn request(r: &mut Rival, target: u64) -> Vec<SCanLockonTarget> {
        r.process_real(Packet::CCanLockonTarget(CCanLockonTarget { target, skill: 410100 }));
        r.drain_deliveries()
            .into_iter()
            .filter_map(|d| match d.event.packet {
                Packet::SCanLockonTarget(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn action_stage(r: &mut Rival, stage: i32, now: i64) {
        let pkt = SActionStage {
            game_id: 1,
            skill: 410100,
            stage,
            ..Default::default()
        };
        r.action
            .on_stage_client(&pkt, now, SpeedInfo::default(), AppliedEffects::default(), false);
    }

    #[test]
    fn test_admits_up_to_rule_count() {
        let mut r = rival_with_lockon_skill();
        assert!(request(&mut r, 50)[0].success);
        assert!(request(&mut r, 51)[0].success);
        // third target exceeds the count of 2
        assert!(!request(&mut r, 52)[0].success);
    }

    #[test]
    fn test_target_list_survives_stage_transition() {
        let mut r = rival_with_lockon_skill();
        action_stage(&mut r, 0, 0);
        assert!(request(&mut r, 50)[0].success);

        // stage 1 of the same action: the admission count carries over
        action_stage(&mut r, 1, 400);
        assert!(request(&mut r, 51)[0].success);
        assert!(!request(&mut r, 52)[0].success, "cap still counts the stage-0 admission");

        // a fresh action (new stage 0, new start time) resets the list
        action_stage(&mut r, 0, 1000);
        assert!(request(&mut r, 52)[0].success);
    }

    #[test]
    fn test_duplicate_target_dropped_silently() {
        let mut r = rival_with_lockon_skill();
        assert_eq!(request(&mut r, 50).len(), 1);
        // same target again: no synthetic response at all
        assert_eq!(request(&mut r, 50).len(), 0);
    }

    #[test]
    fn test_unknown_entity_fails() {
        let mut r = rival_with_lockon_skill();
        let responses = request(&mut r, 999);
        assert!(!responses[0].success);
    }

    #[test]
    fn test_server_verdicts_suppressed() {
        let mut r = rival_with_lockon_skill();
        let delivered = r.process_real(Packet::SCanLockonTarget(SCanLockonTarget {
            target: 50,
            skill: 410100,
            success: true,
        }));
        assert!(!delivered);
    }

    #[test]
    fn test_outbound_request_still_forwarded() {
        let mut r = rival_with_lockon_skill();
        r.process_real(Packet::CCanLockonTarget(CCanLockonTarget { target: 50, skill: 410100 }));
        let out: Vec<_> = r
            .drain_deliveries()
            .into_iter()
            .filter(|d| d.dir == Direction::ToServer)
            .collect();
        assert_eq!(out.len(), 1);
    }
}
