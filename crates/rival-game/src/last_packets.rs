// last_packets.rs -- most-recent packet cache
//
// Dedup windows and reconciliation need "when did we last see X for skill
// Y". Each cached packet is wrapped with its arrival time.

use std::collections::HashMap;

use rival_common::packets::{
    CPlayerLocation, CStartSkill, SActionEnd, SActionStage, SEachSkillResult, SInstantMove,
};

#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub pkt: T,
    pub received_at: i64,
}

#[derive(Debug, Default)]
pub struct LastPackets {
    stage_by_skill: HashMap<u32, Cached<SActionStage>>,
    end_by_skill: HashMap<u32, Cached<SActionEnd>>,
    result_by_skill: HashMap<u32, Cached<SEachSkillResult>>,
    latest_stage: Option<Cached<SActionStage>>,
    latest_end: Option<Cached<SActionEnd>>,
    latest_start: Option<Cached<CStartSkill>>,
    latest_player_location: Option<Cached<CPlayerLocation>>,
    latest_instant_move: Option<Cached<SInstantMove>>,
}

impl LastPackets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_stage(&mut self, pkt: &SActionStage, now: i64) {
        let cached = Cached { pkt: pkt.clone(), received_at: now };
        self.stage_by_skill.insert(pkt.skill, cached.clone());
        self.latest_stage = Some(cached);
    }

    pub fn record_end(&mut self, pkt: &SActionEnd, now: i64) {
        let cached = Cached { pkt: *pkt, received_at: now };
        self.end_by_skill.insert(pkt.skill, cached.clone());
        self.latest_end = Some(cached);
    }

    pub fn record_result(&mut self, pkt: &SEachSkillResult, now: i64) {
        self.result_by_skill
            .insert(pkt.skill, Cached { pkt: pkt.clone(), received_at: now });
    }

    pub fn record_start(&mut self, pkt: &CStartSkill, now: i64) {
        self.latest_start = Some(Cached { pkt: pkt.clone(), received_at: now });
    }

    pub fn record_player_location(&mut self, pkt: &CPlayerLocation, now: i64) {
        self.latest_player_location = Some(Cached { pkt: *pkt, received_at: now });
    }

    pub fn record_instant_move(&mut self, pkt: &SInstantMove, now: i64) {
        self.latest_instant_move = Some(Cached { pkt: *pkt, received_at: now });
    }

    pub fn stage_of(&self, skill: u32) -> Option<&Cached<SActionStage>> {
        self.stage_by_skill.get(&skill)
    }

    pub fn end_of(&self, skill: u32) -> Option<&Cached<SActionEnd>> {
        self.end_by_skill.get(&skill)
    }

    pub fn result_of(&self, skill: u32) -> Option<&Cached<SEachSkillResult>> {
        self.result_by_skill.get(&skill)
    }

    pub fn latest_stage(&self) -> Option<&Cached<SActionStage>> {
        self.latest_stage.as_ref()
    }

    pub fn latest_end(&self) -> Option<&Cached<SActionEnd>> {
        self.latest_end.as_ref()
    }

    pub fn latest_start(&self) -> Option<&Cached<CStartSkill>> {
        self.latest_start.as_ref()
    }

    pub fn latest_player_location(&self) -> Option<&Cached<CPlayerLocation>> {
        self.latest_player_location.as_ref()
    }
}
