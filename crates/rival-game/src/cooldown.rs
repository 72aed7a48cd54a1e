// cooldown.rs -- per-skill, per-stack and per-group cooldowns
//
// Every cooldown event writes an entry under the raw id and the normalized
// (sub 0) id. Multi-stage skills that are not special-typed additionally
// write their family's group key, which is what lets a family share one
// cooldown across its stages. Cooldowns persist across death and reset on
// login.

use std::collections::HashMap;

use rival_common::skill_id::SkillId;

use crate::data::GameData;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooldownEntry {
    pub start_time: i64,
    pub cooldown_ms: i64,
    pub used_stacks: i32,
    pub max_stacks: i32,
    pub next_stack_cooldown_ms: i64,
}

impl CooldownEntry {
    fn expired(&self, now: i64) -> bool {
        now >= self.start_time + self.cooldown_ms
    }
}

/// A cooldown reset observed via crest message, surfaced to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetEvent {
    pub skill: u32,
    pub from_server: bool,
}

#[derive(Debug, Default)]
pub struct CooldownLedger {
    by_id: HashMap<u32, CooldownEntry>,
    by_group: HashMap<String, CooldownEntry>,
    by_id_server: HashMap<u32, CooldownEntry>,
    by_group_server: HashMap<String, CooldownEntry>,
    events: Vec<ResetEvent>,
}

impl CooldownLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record a cooldown start (or decrease; the entry is simply replaced).
    /// Both views are written: a cooldown we predicted is one the server is
    /// about to confirm, and the group veto must see it either way.
    pub fn register(
        &mut self,
        skill: u32,
        cooldown_ms: i64,
        used_stacks: i32,
        max_stacks: i32,
        next_stack_cooldown_ms: i64,
        data: &GameData,
        now: i64,
    ) {
        let info = SkillId::parse(skill, true);
        let entry = CooldownEntry {
            start_time: now,
            cooldown_ms,
            used_stacks,
            max_stacks,
            next_stack_cooldown_ms,
        };

        self.by_id.insert(info.id, entry);
        self.by_id.insert(info.normalized(), entry);
        self.by_id_server.insert(info.id, entry);
        self.by_id_server.insert(info.normalized(), entry);

        let template = data.skill(info.id).or_else(|| data.skill(info.normalized()));
        if let Some(t) = template {
            if t.is_multi_stage() && !t.kind.is_special() {
                self.by_group.insert(info.group_key(), entry);
                self.by_group_server.insert(info.group_key(), entry);
            }
        }
    }

    /// Crest message kind 6: the skill's cooldown is gone.
    pub fn on_reset(&mut self, skill: u32, from_server: bool, now: i64) {
        let info = SkillId::parse(skill, true);
        for key in [info.id, info.normalized()] {
            if let Some(e) = self.by_id.get_mut(&key) {
                e.cooldown_ms = 0;
                e.start_time = now;
                e.used_stacks = 0;
            }
            if let Some(e) = self.by_id_server.get_mut(&key) {
                e.cooldown_ms = 0;
                e.start_time = now;
                e.used_stacks = 0;
            }
        }
        self.events.push(ResetEvent { skill, from_server });
    }

    /// Drain pending reset events. Single consumer: the proxy pump.
    pub fn drain_events(&mut self) -> Vec<ResetEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn entry(&self, skill: u32) -> Option<&CooldownEntry> {
        self.by_id.get(&skill)
    }

    pub fn group_entry(&self, key: &str) -> Option<&CooldownEntry> {
        self.by_group.get(key)
    }

    fn stack_blocked(entry: &CooldownEntry, now: i64) -> bool {
        let regained = if now >= entry.start_time + entry.next_stack_cooldown_ms { 1 } else { 0 };
        let effective = entry.used_stacks - regained;
        effective >= entry.max_stacks
    }

    /// The three-rule cooldown check.
    ///
    /// 1. Stack data on `stack_skill` decides by effective stacks.
    /// 2. Otherwise the plain window on `skill` decides.
    /// 3. For non-special skills that are not themselves a group key, the
    ///    group entry is OR-combined when the player is idle or acting
    ///    within the same family.
    pub fn is_on_cooldown(
        &self,
        skill: u32,
        stack_skill: u32,
        data: &GameData,
        in_action_skill: Option<u32>,
        now: i64,
    ) -> bool {
        let mut on = false;

        if let Some(entry) = self.by_id.get(&stack_skill).filter(|e| e.max_stacks > 0) {
            on = Self::stack_blocked(entry, now);
        } else if let Some(entry) = self.by_id.get(&skill) {
            on = !entry.expired(now);
        }

        let info = SkillId::parse(skill, true);
        let template = data.skill(info.id).or_else(|| data.skill(info.normalized()));
        let special = template.is_some_and(|t| t.kind.is_special());
        if !special {
            let same_group = match in_action_skill {
                None => true,
                Some(active) => SkillId::parse(active, true).skill == info.skill,
            };
            if same_group {
                if let Some(group) = self.by_group.get(&info.group_key()) {
                    on = on || !group.expired(now);
                }
            }
        }

        on
    }
}
