// action.rs -- dual client/server action state
//
// The reconciliation point for all prediction. The client view includes
// synthetic stages and ends; the server view only what the wire delivered.
// Reactions (forced animations from incoming hits) surface as events and
// flip the special-action flag instead of the normal stage records.

use rival_common::geom::Vec3;
use rival_common::packets::{AnimSeq, SActionEnd, SActionStage, SEachSkillResult};

use crate::effects::AppliedEffects;
use crate::skills::SpeedInfo;

#[derive(Debug, Clone)]
pub struct StageRecord {
    pub skill: u32,
    pub stage: i32,
    pub loc: Vec3,
    pub w: f32,
    pub anim_seq: Vec<AnimSeq>,
    /// Arrival time of stage 0 of this action (inherited by later stages).
    pub start_time: i64,
    /// Arrival time of this stage.
    pub stage_time: i64,
    pub action_id: u32,
    pub speed: SpeedInfo,
    pub effects: AppliedEffects,
}

#[derive(Debug, Clone, Copy)]
pub struct EndRecord {
    pub skill: u32,
    pub end_type: i32,
    pub loc: Vec3,
    pub w: f32,
    pub received_at: i64,
}

/// A reaction the action tracker saw on a skill result.
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    pub source: u64,
    pub skill: u32,
    pub action_id: u32,
    pub push: bool,
    pub air: bool,
    pub anim_seq: Vec<AnimSeq>,
    pub received_at: i64,
}

#[derive(Debug, Default)]
pub struct ActionTracker {
    pub in_action: bool,
    pub in_special_action: bool,
    pub stage: Option<StageRecord>,
    pub end: Option<EndRecord>,
    /// Stage the player held before a moving-charge stage replaced it.
    pub kept_moving_charge: Option<i32>,

    pub in_action_server: bool,
    pub stage_server: Option<StageRecord>,
    pub end_server: Option<EndRecord>,

    events: Vec<ReactionEvent>,
}

impl ActionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn on_stage_client(
        &mut self,
        pkt: &SActionStage,
        now: i64,
        speed: SpeedInfo,
        effects: AppliedEffects,
        is_moving_charge: bool,
    ) {
        let start_time = if pkt.stage == 0 {
            now
        } else {
            self.stage
                .as_ref()
                .filter(|s| s.skill == pkt.skill)
                .map_or(now, |s| s.start_time)
        };
        if is_moving_charge {
            self.kept_moving_charge = self.stage.as_ref().map(|s| s.stage);
        }
        self.stage = Some(StageRecord {
            skill: pkt.skill,
            stage: pkt.stage,
            loc: pkt.loc,
            w: pkt.w,
            anim_seq: pkt.anim_seq.clone(),
            start_time,
            stage_time: now,
            action_id: pkt.action_id,
            speed,
            effects,
        });
        self.in_action = true;
        self.in_special_action = false;
    }

    pub fn on_end_client(&mut self, pkt: &SActionEnd, now: i64) {
        self.in_action = false;
        self.in_special_action = false;
        self.end = Some(EndRecord {
            skill: pkt.skill,
            end_type: pkt.end_type,
            loc: pkt.loc,
            w: pkt.w,
            received_at: now,
        });
    }

    pub fn on_stage_server(
        &mut self,
        pkt: &SActionStage,
        now: i64,
        speed: SpeedInfo,
        effects: AppliedEffects,
    ) {
        let start_time = if pkt.stage == 0 {
            now
        } else {
            self.stage_server
                .as_ref()
                .filter(|s| s.skill == pkt.skill)
                .map_or(now, |s| s.start_time)
        };
        self.stage_server = Some(StageRecord {
            skill: pkt.skill,
            stage: pkt.stage,
            loc: pkt.loc,
            w: pkt.w,
            anim_seq: pkt.anim_seq.clone(),
            start_time,
            stage_time: now,
            action_id: pkt.action_id,
            speed,
            effects,
        });
        self.in_action_server = true;
    }

    pub fn on_end_server(&mut self, pkt: &SActionEnd, now: i64) {
        self.in_action_server = false;
        self.end_server = Some(EndRecord {
            skill: pkt.skill,
            end_type: pkt.end_type,
            loc: pkt.loc,
            w: pkt.w,
            received_at: now,
        });
    }

    /// Reactions force an animation on us: flag the special action and
    /// surface the event. `self_id` is the player's game id.
    pub fn on_skill_result(&mut self, pkt: &SEachSkillResult, self_id: u64, now: i64) {
        if !pkt.reaction.enable || pkt.source == self_id || pkt.target != self_id {
            return;
        }
        self.in_special_action = true;
        self.events.push(ReactionEvent {
            source: pkt.source,
            skill: pkt.skill,
            action_id: pkt.action_id,
            push: pkt.reaction.push,
            air: pkt.reaction.air,
            anim_seq: pkt.reaction.anim_seq.clone(),
            received_at: now,
        });
    }

    /// Drain pending reaction events. Single consumer: the proxy pump.
    pub fn drain_events(&mut self) -> Vec<ReactionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn current_skill(&self) -> Option<u32> {
        if self.in_action {
            self.stage.as_ref().map(|s| s.skill)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rival_common::packets::Reaction;

    fn stage(skill: u32, stage: i32) -> SActionStage {
        SActionStage { skill, stage, ..Default::default() }
    }

    fn speed() -> SpeedInfo {
        SpeedInfo { variable: 1.0, fixed: 1.0 }
    }

    #[test]
    fn test_stage_zero_sets_start_time() {
        let mut t = ActionTracker::new();
        t.on_stage_client(&stage(100, 0), 1000, speed(), AppliedEffects::default(), false);
        assert!(t.in_action);
        assert_eq!(t.stage.as_ref().unwrap().start_time, 1000);
    }

    #[test]
    fn test_later_stage_inherits_start_time() {
        let mut t = ActionTracker::new();
        t.on_stage_client(&stage(100, 0), 1000, speed(), AppliedEffects::default(), false);
        t.on_stage_client(&stage(100, 1), 1500, speed(), AppliedEffects::default(), false);
        let s = t.stage.as_ref().unwrap();
        assert_eq!(s.start_time, 1000);
        assert_eq!(s.stage_time, 1500);
    }

    #[test]
    fn test_new_action_resets_start_time() {
        let mut t = ActionTracker::new();
        t.on_stage_client(&stage(100, 0), 1000, speed(), AppliedEffects::default(), false);
        t.on_stage_client(&stage(200, 0), 2000, speed(), AppliedEffects::default(), false);
        assert_eq!(t.stage.as_ref().unwrap().start_time, 2000);
    }

    #[test]
    fn test_end_clears_in_action() {
        let mut t = ActionTracker::new();
        t.on_stage_client(&stage(100, 0), 1000, speed(), AppliedEffects::default(), false);
        t.on_end_client(&SActionEnd { skill: 100, end_type: 0, ..Default::default() }, 1500);
        assert!(!t.in_action);
        assert_eq!(t.end.unwrap().end_type, 0);
        assert_eq!(t.current_skill(), None);
    }

    #[test]
    fn test_views_independent() {
        let mut t = ActionTracker::new();
        t.on_stage_client(&stage(100, 0), 1000, speed(), AppliedEffects::default(), false);
        assert!(t.in_action);
        assert!(!t.in_action_server);
        t.on_stage_server(&stage(100, 0), 1100, speed(), AppliedEffects::default());
        assert!(t.in_action_server);
        t.on_end_server(&SActionEnd { skill: 100, ..Default::default() }, 1600);
        assert!(!t.in_action_server);
        assert!(t.in_action);
    }

    #[test]
    fn test_moving_charge_keeps_previous_stage() {
        let mut t = ActionTracker::new();
        t.on_stage_client(&stage(100, 2), 1000, speed(), AppliedEffects::default(), false);
        t.on_stage_client(&stage(100, 3), 1200, speed(), AppliedEffects::default(), true);
        assert_eq!(t.kept_moving_charge, Some(2));
    }

    #[test]
    fn test_reaction_event() {
        let mut t = ActionTracker::new();
        let pkt = SEachSkillResult {
            source: 2,
            target: 1,
            skill: 999,
            action_id: 50,
            reaction: Reaction {
                enable: true,
                push: false,
                air: false,
                anim_seq: vec![AnimSeq { duration: 800, distance: 0.0 }],
            },
            ..Default::default()
        };
        t.on_skill_result(&pkt, 1, 100);
        assert!(t.in_special_action);
        let evs = t.drain_events();
        assert_eq!(evs.len(), 1);
        assert_eq!(evs[0].action_id, 50);
        assert!(t.drain_events().is_empty());
    }

    #[test]
    fn test_own_hits_do_not_react() {
        let mut t = ActionTracker::new();
        let pkt = SEachSkillResult {
            source: 1,
            target: 1,
            reaction: Reaction { enable: true, ..Default::default() },
            ..Default::default()
        };
        t.on_skill_result(&pkt, 1, 100);
        assert!(!t.in_special_action);
        assert!(t.drain_events().is_empty());
    }
}
