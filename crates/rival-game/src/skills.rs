// skills.rs -- per-skill behavioral metadata service
//
// Resolves what a skill request actually means (chain redirects, charge
// grants, press releases), how long its stages animate at the player's
// current speed, and whether the cast can go through at all. The cast gate
// answers with an integer code; see the constants below for the policy
// each code carries.

use rival_common::skill_id::SkillId;

use crate::action::ActionTracker;
use crate::cooldown::CooldownLedger;
use crate::data::{GameData, SkillType};
use crate::effects::Effects;
use crate::player::Player;

/// Cast succeeded.
pub const CAST_OK: i32 = 0;
/// Request arrived while the current animation is still playing; it will
/// be queued, not refused.
pub const CAST_FUTURE: i32 = -2;
/// Release to the server without any local animation and stay silent.
pub const CAST_PRESS_SPECIAL: i32 = -4;
/// Not enough MP or HP.
pub const CAST_NO_RESOURCE: i32 = -5;
/// Unknown skill or a chain requirement the current state does not meet.
pub const CAST_BAD_CHAIN: i32 = -10;
/// Skill handling disabled by settings.
pub const CAST_DISABLED: i32 = -11;
/// On cooldown.
pub const CAST_COOLDOWN: i32 = -12;
/// Player is dead.
pub const CAST_DEAD: i32 = -17;
/// Player is mounted.
pub const CAST_MOUNTED: i32 = -999;
/// A category of the skill is server-locked.
pub const CAST_CATEGORY_LOCKED: i32 = -3737;

/// Codes for which the outbound request is swallowed entirely: no release,
/// no animation, no failure packet.
pub fn is_excluded_cast_error(code: i32) -> bool {
    matches!(code, CAST_DISABLED | CAST_CATEGORY_LOCKED | CAST_DEAD | CAST_MOUNTED)
}

/// Animation speed pair: `variable` tracks attack speed and buffs, `fixed`
/// only time-dilation buffs (fixed-rate stages ignore attack speed).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedInfo {
    pub variable: f32,
    pub fixed: f32,
}

impl Default for SpeedInfo {
    fn default() -> Self {
        Self { variable: 1.0, fixed: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CastOptions {
    /// The request came in response to an S_GRANT_SKILL we issued.
    pub by_grant: bool,
    /// Press flag of the request packet.
    pub press: bool,
    /// The request arrived on C_PRESS_SKILL.
    pub press_packet: bool,
}

/// A skill request resolved against current state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewSkillData {
    pub info: SkillId,
    pub kind: SkillType,
    pub known: bool,
    /// Resolution failed: no template behind the request.
    pub failed: bool,
    /// The request is a press release that cancels the running action.
    pub cancel: bool,
    /// The previous animation is still playing.
    pub future: bool,
    /// `now` minus the predicted end of the current client action; negative
    /// while the animation still plays. None when not in an action.
    pub time: Option<i64>,
}

impl NewSkillData {
    pub fn skill_id(&self) -> u32 {
        self.info.id
    }

    /// Identity tuple used to detect state drift between the start decision
    /// and the deferred execution.
    pub fn signature(&self) -> (SkillType, u32, bool) {
        (self.kind, self.info.id, self.failed)
    }
}

/// Read-only state snapshot the metadata service resolves against.
pub struct CastContext<'a> {
    pub data: &'a GameData,
    pub player: &'a Player,
    pub effects: &'a Effects,
    pub action: &'a ActionTracker,
    pub cooldowns: &'a CooldownLedger,
    pub skills_enabled: bool,
    /// A qualifying defence success is inside its timing window.
    pub recent_defence: bool,
    pub now: i64,
}

#[derive(Debug, Default)]
pub struct SkillMeta {
    counter: u32,
}

impl SkillMeta {
    pub fn new() -> Self {
        Self { counter: 1_000_000 }
    }

    /// Action id for the next synthetic stage. Monotonic within a session.
    pub fn next_action_id(&mut self) -> u32 {
        self.counter = self.counter.wrapping_add(1);
        self.counter
    }

    /// Most recently issued synthetic action id.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn get_speed(&self, skill_id: u32, ctx: &CastContext) -> SpeedInfo {
        let fx = ctx.effects.get_applied(skill_id, ctx.data);
        SpeedInfo {
            variable: ctx.player.attack_speed_mult()
                * fx.abnorm_speed
                * fx.passive_speed
                * fx.attack_speed,
            fixed: fx.abnorm_speed,
        }
    }

    /// Unscaled total animation length; 0 for unknown or stage-less skills.
    pub fn raw_animation_length(&self, skill_id: u32, data: &GameData) -> i64 {
        data.skill(skill_id)
            .map(|t| t.stages.iter().map(|s| s.duration_ms as i64).sum())
            .unwrap_or(0)
    }

    /// Scaled length of one stage; -1 when the stage does not exist (the
    /// chain pump stops there).
    pub fn animation_length(
        &self,
        skill_id: u32,
        stage: i32,
        speed: &SpeedInfo,
        data: &GameData,
    ) -> i64 {
        let template = match data.skill(skill_id) {
            Some(t) => t,
            None => return -1,
        };
        let def = match usize::try_from(stage).ok().and_then(|i| template.stages.get(i)) {
            Some(d) => d,
            None => return -1,
        };
        let rate = (def.anim_rate * speed.variable).max(0.01);
        (def.duration_ms as f32 / rate) as i64
    }

    pub fn stage_delay(&self, skill_id: u32, data: &GameData) -> i64 {
        data.skill(skill_id).map_or(0, |t| t.stage_delay_ms)
    }

    pub fn skill_delay(&self, skill_id: u32, data: &GameData) -> i64 {
        data.skill(skill_id).map_or(0, |t| t.start_delay_ms)
    }

    pub fn retry_count(&self, skill_id: u32, data: &GameData) -> u32 {
        data.skill(skill_id).map_or(0, |t| t.retries.count)
    }

    pub fn retry_delay(&self, skill_id: u32, data: &GameData) -> i64 {
        data.skill(skill_id).map_or(25, |t| t.retries.delay_ms)
    }

    pub fn allow_through_future_retry(&self, skill_id: u32, data: &GameData) -> bool {
        data.skill(skill_id).map_or(false, |t| t.retries.allow_through_future)
    }

    /// Does `next_skill` accept a chain from `prev_skill` ending with
    /// `prev_end_type`?
    pub fn is_chained(
        &self,
        prev_skill: u32,
        prev_end_type: i32,
        next_skill: u32,
        data: &GameData,
    ) -> bool {
        let prev = SkillId::parse(prev_skill, true);
        data.skill(next_skill).is_some_and(|t| {
            t.chains
                .iter()
                .any(|c| c.from_group == prev.skill && c.end_types.contains(&prev_end_type))
        })
    }

    /// Resolve a raw request id to the skill that will actually run.
    pub fn get_new_skill_data(&self, raw: u32, opts: CastOptions, ctx: &CastContext) -> NewSkillData {
        let mut info = SkillId::parse(raw, true);
        let mut template = ctx.data.skill(info.id);

        // chain redirect off the most recent client action end
        if let (Some(t), Some(end)) = (template, ctx.action.end.as_ref()) {
            let prev = SkillId::parse(end.skill, true);
            if let Some(chain) = t
                .chains
                .iter()
                .find(|c| c.from_group == prev.skill && c.end_types.contains(&end.end_type))
            {
                let redirected = SkillId::base_id(info.skill, info.level, chain.to_sub);
                if let Some(rt) = ctx.data.skill(redirected) {
                    info = SkillId::parse(redirected, false);
                    template = Some(rt);
                }
            }
        }

        // charge grant redirect
        if opts.by_grant {
            if let Some(t) = template {
                if t.grant_skill != 0 {
                    if let Some(gt) = ctx.data.skill(t.grant_skill) {
                        info = SkillId::parse(t.grant_skill, false);
                        template = Some(gt);
                    }
                }
            }
        }

        let known = template.is_some();
        let kind = template.map(|t| t.kind).unwrap_or_default();
        let cancel = opts.press_packet
            && !opts.press
            && matches!(kind, SkillType::Hold | SkillType::PressHit);

        let time = if ctx.action.in_action {
            ctx.action.stage.as_ref().map(|s| {
                let len = self.animation_length(s.skill, s.stage, &s.speed, ctx.data);
                if len < 0 {
                    0
                } else {
                    ctx.now - (s.stage_time + len)
                }
            })
        } else {
            None
        };
        let future = time.is_some_and(|t| t < 0);

        NewSkillData {
            info,
            kind,
            known,
            failed: !known,
            cancel,
            future,
            time,
        }
    }

    /// The cast gate. Checks run from hard exclusions down to soft ones so
    /// the most informative code wins.
    pub fn can_cast(&self, nd: &NewSkillData, ctx: &CastContext) -> i32 {
        if !ctx.skills_enabled {
            return CAST_DISABLED;
        }
        if !ctx.player.alive {
            return CAST_DEAD;
        }
        if ctx.player.mounted {
            return CAST_MOUNTED;
        }
        let template = ctx.data.skill(nd.info.id);
        if let Some(t) = template {
            if t.categories.iter().any(|c| !ctx.effects.category_enabled(*c)) {
                return CAST_CATEGORY_LOCKED;
            }
        }
        if !nd.known {
            return CAST_BAD_CHAIN;
        }
        if ctx.cooldowns.is_on_cooldown(
            nd.info.id,
            nd.info.id,
            ctx.data,
            ctx.action.current_skill(),
            ctx.now,
        ) {
            return CAST_COOLDOWN;
        }
        if let Some(t) = template {
            if t.mp_cost > ctx.player.mp || (t.hp_cost > 0 && t.hp_cost as i64 >= ctx.player.hp) {
                return CAST_NO_RESOURCE;
            }
            if t.only_after_defence && !ctx.recent_defence {
                return CAST_PRESS_SPECIAL;
            }
        }
        if nd.future {
            return CAST_FUTURE;
        }
        CAST_OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ChainDef, SkillTemplate, StageDef};
    use crate::effects::AppliedEffects;
    use rival_common::packets::{SActionEnd, SActionStage};

    fn template(id: u32) -> SkillTemplate {
        SkillTemplate {
            id,
            stages: vec![StageDef { duration_ms: 500, anim_rate: 1.0, movable: false, distance: 0.0 }],
            ..Default::default()
        }
    }

    fn ready_player() -> Player {
        let mut p = Player::new();
        p.game_id = 1;
        p.alive = true;
        p.mp = 1000;
        p.hp = 1000;
        p
    }

    struct Stores {
        data: GameData,
        player: Player,
        effects: Effects,
        action: ActionTracker,
        cooldowns: CooldownLedger,
    }

    impl Stores {
        fn new(skills: Vec<SkillTemplate>) -> Self {
            Self {
                data: GameData::from_parts(skills, vec![]),
                player: ready_player(),
                effects: Effects::new(),
                action: ActionTracker::new(),
                cooldowns: CooldownLedger::new(),
            }
        }

        fn ctx(&self, now: i64) -> CastContext<'_> {
            CastContext {
                data: &self.data,
                player: &self.player,
                effects: &self.effects,
                action: &self.action,
                cooldowns: &self.cooldowns,
                skills_enabled: true,
                recent_defence: false,
                now,
            }
        }
    }

    #[test]
    fn test_ok_cast() {
        let meta = SkillMeta::new();
        let stores = Stores::new(vec![template(200200)]);
        let ctx = stores.ctx(0);
        let nd = meta.get_new_skill_data(200200, CastOptions::default(), &ctx);
        assert!(nd.known);
        assert!(!nd.failed);
        assert_eq!(meta.can_cast(&nd, &ctx), CAST_OK);
    }

    #[test]
    fn test_disabled_dead_mounted() {
        let meta = SkillMeta::new();
        let mut stores = Stores::new(vec![template(200200)]);
        let nd = meta.get_new_skill_data(200200, CastOptions::default(), &stores.ctx(0));

        let mut ctx = stores.ctx(0);
        ctx.skills_enabled = false;
        assert_eq!(meta.can_cast(&nd, &ctx), CAST_DISABLED);

        stores.player.alive = false;
        assert_eq!(meta.can_cast(&nd, &stores.ctx(0)), CAST_DEAD);

        stores.player.alive = true;
        stores.player.mounted = true;
        assert_eq!(meta.can_cast(&nd, &stores.ctx(0)), CAST_MOUNTED);
    }

    #[test]
    fn test_cooldown_code() {
        let meta = SkillMeta::new();
        let mut stores = Stores::new(vec![template(359076)]);
        stores.cooldowns.register(359076, 5000, 0, 0, 0, &stores.data, 0);
        let ctx = stores.ctx(1000);
        let nd = meta.get_new_skill_data(359076, CastOptions::default(), &ctx);
        assert_eq!(meta.can_cast(&nd, &ctx), CAST_COOLDOWN);
    }

    #[test]
    fn test_resource_code() {
        let meta = SkillMeta::new();
        let mut tpl = template(200200);
        tpl.mp_cost = 500;
        let mut stores = Stores::new(vec![tpl]);
        stores.player.mp = 100;
        let ctx = stores.ctx(0);
        let nd = meta.get_new_skill_data(200200, CastOptions::default(), &ctx);
        assert_eq!(meta.can_cast(&nd, &ctx), CAST_NO_RESOURCE);
    }

    #[test]
    fn test_unknown_skill_fails() {
        let meta = SkillMeta::new();
        let stores = Stores::new(vec![]);
        let ctx = stores.ctx(0);
        let nd = meta.get_new_skill_data(123456, CastOptions::default(), &ctx);
        assert!(nd.failed);
        assert_eq!(meta.can_cast(&nd, &ctx), CAST_BAD_CHAIN);
    }

    #[test]
    fn test_chain_redirect() {
        let meta = SkillMeta::new();
        let mut second = template(200201);
        second.id = 200201;
        let mut first = template(200200);
        first.chains = vec![ChainDef { from_group: 35, end_types: vec![0], to_sub: 1 }];
        let mut stores = Stores::new(vec![first, second]);
        stores
            .action
            .on_end_client(&SActionEnd { skill: 359076, end_type: 0, ..Default::default() }, 0);
        let ctx = stores.ctx(10);
        let nd = meta.get_new_skill_data(200200, CastOptions::default(), &ctx);
        assert_eq!(nd.info.id, 200201);
        assert!(meta.is_chained(359076, 0, 200200, &stores.data));
        assert!(!meta.is_chained(359076, 4, 200200, &stores.data));
    }

    #[test]
    fn test_grant_redirect() {
        let meta = SkillMeta::new();
        let mut base = template(200200);
        base.grant_skill = 200230;
        let granted = template(200230);
        let stores = Stores::new(vec![base, granted]);
        let ctx = stores.ctx(0);
        let nd = meta.get_new_skill_data(
            200200,
            CastOptions { by_grant: true, ..Default::default() },
            &ctx,
        );
        assert_eq!(nd.info.id, 200230);
    }

    #[test]
    fn test_future_while_animating() {
        let meta = SkillMeta::new();
        let mut stores = Stores::new(vec![template(200200)]);
        stores.action.on_stage_client(
            &SActionStage { skill: 200200, stage: 0, ..Default::default() },
            1000,
            SpeedInfo::default(),
            AppliedEffects::default(),
            false,
        );
        // stage lasts 500ms from t=1000; at 1200 we are 300ms early
        let ctx = stores.ctx(1200);
        let nd = meta.get_new_skill_data(200200, CastOptions::default(), &ctx);
        assert!(nd.future);
        assert_eq!(nd.time, Some(-300));
        assert_eq!(meta.can_cast(&nd, &ctx), CAST_FUTURE);

        // past the animation end it is no longer future
        let ctx = stores.ctx(1600);
        let nd = meta.get_new_skill_data(200200, CastOptions::default(), &ctx);
        assert!(!nd.future);
        assert_eq!(nd.time, Some(100));
    }

    #[test]
    fn test_animation_length_scales_with_speed() {
        let meta = SkillMeta::new();
        let data = GameData::from_parts(vec![template(200200)], vec![]);
        let speed = SpeedInfo { variable: 2.0, fixed: 1.0 };
        assert_eq!(meta.animation_length(200200, 0, &speed, &data), 250);
        assert_eq!(meta.animation_length(200200, 1, &speed, &data), -1);
    }

    #[test]
    fn test_press_release_cancels() {
        let meta = SkillMeta::new();
        let mut tpl = template(300100);
        tpl.kind = SkillType::Hold;
        let stores = Stores::new(vec![tpl]);
        let ctx = stores.ctx(0);
        let nd = meta.get_new_skill_data(
            300100,
            CastOptions { press: false, press_packet: true, ..Default::default() },
            &ctx,
        );
        assert!(nd.cancel);
    }

    #[test]
    fn test_excluded_error_set() {
        for code in [CAST_DISABLED, CAST_CATEGORY_LOCKED, CAST_DEAD, CAST_MOUNTED] {
            assert!(is_excluded_cast_error(code));
        }
        for code in [CAST_OK, CAST_FUTURE, CAST_PRESS_SPECIAL, CAST_COOLDOWN, CAST_NO_RESOURCE] {
            assert!(!is_excluded_cast_error(code));
        }
    }
}
