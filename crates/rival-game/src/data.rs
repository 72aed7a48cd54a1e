// data.rs -- immutable per-session game data
//
// Skill templates, abnormality definitions and NPC info are loaded from one
// JSON document when the client is ready and never mutate afterwards.
// Everything here is plain serde with defaults so partial data files (test
// fixtures, trimmed dumps) still load.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("game data io: {0}")]
    Io(#[from] std::io::Error),
    #[error("game data parse: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum SkillType {
    #[default]
    Normal,
    Projectile,
    Drain,
    Lockon,
    MovingSkill,
    MovingCharge,
    Dash,
    Defence,
    MovingDefence,
    PressHit,
    Hold,
    Reaction,
    Combo,
    Counter,
}

impl SkillType {
    /// Special types are excluded from group-cooldown bookkeeping.
    pub fn is_special(&self) -> bool {
        matches!(
            self,
            SkillType::Projectile | SkillType::Drain | SkillType::Lockon | SkillType::MovingSkill
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct StageDef {
    pub duration_ms: i32,
    pub anim_rate: f32,
    pub movable: bool,
    /// Ground displacement the stage animation carries.
    pub distance: f32,
}

impl Default for StageDef {
    fn default() -> Self {
        Self {
            duration_ms: 0,
            anim_rate: 1.0,
            movable: false,
            distance: 0.0,
        }
    }
}

/// An abnormality hook on a skill: applied or consumed at a stage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AbnormHook {
    pub id: u32,
    pub delay_ms: i64,
    /// Scale the delay by fixed animation speed instead of variable speed.
    pub fixed_speed: bool,
    pub duration_override: Option<i64>,
    /// Schedule with a fresh untracked timeout.
    pub no_timer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum LockonClass {
    EnemyOrPvp,
    AllyExceptMe,
    Raid,
    RaidExceptMe,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LockonRule {
    pub class: LockonClass,
    pub count: u32,
}

/// Allowed transition into this skill: the previous action must belong to
/// `from_group` and have ended with one of `end_types`; the request is then
/// redirected to sub-skill `to_sub`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ChainDef {
    pub from_group: u32,
    pub end_types: Vec<i32>,
    pub to_sub: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryDef {
    pub count: u32,
    pub delay_ms: i64,
    pub allow_through_future: bool,
}

impl Default for RetryDef {
    fn default() -> Self {
        Self {
            count: 0,
            delay_ms: 25,
            allow_through_future: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct DirModifier {
    pub stage: i32,
    pub w_offset: f32,
}

/// Where an applied-effect contribution is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EffectSource {
    /// Active in the client abnormality view.
    Abnormal,
    /// Glyph (crest) slot enabled.
    Passivity,
    /// Skill-polishing effect present.
    Polishing,
    /// EP talent perk learned.
    Talent,
}

/// Which field of the applied-effect bundle the contribution lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EffectField {
    AbnormSpeed,
    PassiveSpeed,
    ChargeSpeed,
    Lockon,
    Block,
    Stamina,
    AttackSpeed,
    Reset,
    Dist,
    Noct,
    Transform,
    EffectScale,
}

/// One row of a skill's applied-effects table: when `ref_id` is active in
/// `source`, fold `value` into `field`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AppliedEffectDef {
    pub source: EffectSource,
    pub ref_id: u32,
    pub field: EffectField,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SkillTemplate {
    pub id: u32,
    pub kind: SkillType,
    pub stages: Vec<StageDef>,
    pub cooldown_ms: i64,
    pub mp_cost: i32,
    pub hp_cost: i32,
    pub lockon: Vec<LockonRule>,
    pub chains: Vec<ChainDef>,
    pub abnormality_apply: Vec<AbnormHook>,
    pub abnormality_consume_stage: Vec<AbnormHook>,
    pub abnormality_consume_end: Vec<AbnormHook>,
    /// Non-zero means the skill is one stage of a multi-stage family.
    pub next_skill: u32,
    pub retries: RetryDef,
    pub only_after_defence: bool,
    pub hold_if_not_moving: bool,
    pub categories: Vec<u32>,
    pub dir_modifiers: Vec<DirModifier>,
    pub applied_effects: Vec<AppliedEffectDef>,
    /// Delay between the start decision and the first synthetic stage.
    pub stage_delay_ms: i64,
    /// Extra per-skill outbound delay.
    pub start_delay_ms: i64,
    /// End type the client expects when this skill is interrupted by a new
    /// start (0 when the skill has no special end).
    pub end_type: i32,
    /// Granted skill id for charge releases, 0 when not chargeable.
    pub grant_skill: u32,
    /// Connect-arrow target skill id, 0 when none.
    pub arrow_skill: u32,
}

impl SkillTemplate {
    pub fn is_multi_stage(&self) -> bool {
        self.next_skill != 0
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn dir_modifier(&self, stage: i32) -> f32 {
        self.dir_modifiers
            .iter()
            .find(|m| m.stage == stage)
            .map_or(0.0, |m| m.w_offset)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AbnormalityDef {
    pub id: u32,
    pub time_ms: i64,
    /// Behavior code. 28/236 scale skill distance, 29 adds charge speed,
    /// 327 converts moving-charge, 232 is the fear reaction.
    pub kind: i32,
    pub value: f64,
    pub by_categories: Vec<u32>,
    pub infinite: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct NpcInfo {
    pub hunting_zone_id: u32,
    pub template_id: u32,
    pub boss: bool,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameDataFile {
    pub skills: Vec<SkillTemplate>,
    pub abnormalities: Vec<AbnormalityDef>,
    pub npcs: Vec<NpcInfo>,
}

/// The loaded store. `load` may only meaningfully happen once per session;
/// a second call replaces the tables wholesale (relog with a new data set).
#[derive(Debug, Default)]
pub struct GameData {
    skills: HashMap<u32, SkillTemplate>,
    abnormalities: HashMap<u32, AbnormalityDef>,
    npcs: HashMap<(u32, u32), NpcInfo>,
    loaded: bool,
}

impl GameData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), DataError> {
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text)
    }

    pub fn load_str(&mut self, text: &str) -> Result<(), DataError> {
        let file: GameDataFile = serde_json::from_str(text)?;
        self.load(file);
        Ok(())
    }

    pub fn load(&mut self, file: GameDataFile) {
        self.skills = file.skills.into_iter().map(|s| (s.id, s)).collect();
        self.abnormalities = file.abnormalities.into_iter().map(|a| (a.id, a)).collect();
        self.npcs = file
            .npcs
            .into_iter()
            .map(|n| ((n.hunting_zone_id, n.template_id), n))
            .collect();
        self.loaded = true;
        log::info!(
            "game data loaded: {} skills, {} abnormalities, {} npcs",
            self.skills.len(),
            self.abnormalities.len(),
            self.npcs.len()
        );
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn skill(&self, id: u32) -> Option<&SkillTemplate> {
        self.skills.get(&id)
    }

    pub fn abnormality(&self, id: u32) -> Option<&AbnormalityDef> {
        self.abnormalities.get(&id)
    }

    pub fn npc(&self, hunting_zone_id: u32, template_id: u32) -> Option<&NpcInfo> {
        self.npcs.get(&(hunting_zone_id, template_id))
    }

    pub fn abnormalities(&self) -> impl Iterator<Item = &AbnormalityDef> {
        self.abnormalities.values()
    }

    /// Test helper used across the workspace: a store with the given skills
    /// and abnormality definitions already in place.
    pub fn from_parts(skills: Vec<SkillTemplate>, abnormalities: Vec<AbnormalityDef>) -> Self {
        let mut data = Self::new();
        data.load(GameDataFile {
            skills,
            abnormalities,
            npcs: Vec::new(),
        });
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_json() {
        let mut data = GameData::new();
        data.load_str(
            r#"{
                "skills": [
                    { "id": 200200, "kind": "Normal", "cooldown_ms": 5000,
                      "stages": [ { "duration_ms": 500 } ] }
                ],
                "abnormalities": [
                    { "id": 103104, "time_ms": 5000, "kind": 28, "value": 1.25 }
                ]
            }"#,
        )
        .unwrap();
        assert!(data.is_loaded());
        let skill = data.skill(200200).unwrap();
        assert_eq!(skill.cooldown_ms, 5000);
        assert_eq!(skill.stages[0].duration_ms, 500);
        assert_eq!(skill.stages[0].anim_rate, 1.0);
        assert_eq!(data.abnormality(103104).unwrap().kind, 28);
    }

    #[test]
    fn test_special_types() {
        assert!(SkillType::Projectile.is_special());
        assert!(SkillType::Drain.is_special());
        assert!(SkillType::Lockon.is_special());
        assert!(SkillType::MovingSkill.is_special());
        assert!(!SkillType::MovingCharge.is_special());
        assert!(!SkillType::Normal.is_special());
    }

    #[test]
    fn test_dir_modifier_lookup() {
        let tpl = SkillTemplate {
            dir_modifiers: vec![DirModifier { stage: 1, w_offset: 0.5 }],
            ..Default::default()
        };
        assert_eq!(tpl.dir_modifier(1), 0.5);
        assert_eq!(tpl.dir_modifier(0), 0.0);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        let mut data = GameData::new();
        assert!(data.load_str("{ skills: oops }").is_err());
        assert!(!data.is_loaded());
    }
}
