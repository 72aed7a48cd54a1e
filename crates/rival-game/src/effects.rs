// effects.rs -- active abnormalities, glyphs, perks and the applied-effect fold
//
// Two abnormality maps: the client view includes local emulation, the server
// view only wire-received state. Death clears both abnormality maps; glyph,
// perk and polishing state survives death.

use std::collections::{HashMap, HashSet};

use rival_common::packets::{
    SArmorRollList, SCrestApply, SCrestInfo, SHoldAbnormalityAdd, SHoldAbnormalityDel,
    SLoadEpPerkInfo, SSkillCategory, SSkillPolishingList,
};

use crate::data::{EffectField, EffectSource, GameData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveAbnormality {
    pub id: u32,
    pub stacks: i32,
    pub duration_ms: i64,
    pub start_time: i64,
    pub fake: bool,
}

/// Per-skill modifier bundle, folded from every active effect that touches
/// the skill. Field defaults are the identity for their operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedEffects {
    pub abnorm_speed: f32,
    pub passive_speed: f32,
    pub charge_speed: f32,
    pub lockon: i32,
    pub block: bool,
    pub stamina: i32,
    pub attack_speed: f32,
    pub reset: bool,
    pub dist: f32,
    pub noct: f32,
    pub transform: i32,
    pub effect_scale: f32,
}

impl Default for AppliedEffects {
    fn default() -> Self {
        Self {
            abnorm_speed: 1.0,
            passive_speed: 1.0,
            charge_speed: 0.0,
            lockon: 0,
            block: false,
            stamina: 0,
            attack_speed: 1.0,
            reset: false,
            dist: 1.0,
            noct: 1.0,
            transform: 0,
            effect_scale: 1.0,
        }
    }
}

/// Abnormality kinds that contribute through category matching.
const KIND_DIST_SCALE: i32 = 28;
const KIND_CHARGE_SPEED: i32 = 29;
const KIND_DIST_SCALE_ALT: i32 = 236;

#[derive(Debug, Default)]
pub struct Effects {
    client_abnormality: HashMap<u32, ActiveAbnormality>,
    server_abnormality: HashMap<u32, ActiveAbnormality>,
    glyphs: HashMap<u32, bool>,
    held_buffs: HashSet<u32>,
    talents: HashMap<u32, u32>,
    skill_polishing: HashSet<u32>,
    category_enabled: HashMap<u32, bool>,
    armor_rolls: HashMap<u32, bool>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // ------------------------------------------------------------
    // Abnormality views
    // ------------------------------------------------------------

    fn view_mut(&mut self, view: View) -> &mut HashMap<u32, ActiveAbnormality> {
        match view {
            View::Client => &mut self.client_abnormality,
            View::Server => &mut self.server_abnormality,
        }
    }

    fn view(&self, view: View) -> &HashMap<u32, ActiveAbnormality> {
        match view {
            View::Client => &self.client_abnormality,
            View::Server => &self.server_abnormality,
        }
    }

    pub fn begin(&mut self, view: View, id: u32, stacks: i32, duration_ms: i64, now: i64, fake: bool) {
        self.view_mut(view).insert(
            id,
            ActiveAbnormality {
                id,
                stacks,
                duration_ms,
                start_time: now,
                fake,
            },
        );
    }

    pub fn end(&mut self, view: View, id: u32) {
        self.view_mut(view).remove(&id);
    }

    pub fn get(&self, view: View, id: u32) -> Option<&ActiveAbnormality> {
        self.view(view).get(&id)
    }

    pub fn has(&self, view: View, id: u32) -> bool {
        self.view(view).contains_key(&id)
    }

    pub fn active(&self, view: View) -> impl Iterator<Item = &ActiveAbnormality> {
        self.view(view).values()
    }

    /// Player death wipes active abnormalities in both views. Everything
    /// else persists.
    pub fn on_death(&mut self) {
        self.client_abnormality.clear();
        self.server_abnormality.clear();
    }

    // ------------------------------------------------------------
    // Glyphs, perks, polishing, held buffs, categories
    // ------------------------------------------------------------

    pub fn on_crest_info(&mut self, pkt: &SCrestInfo) {
        self.glyphs = pkt.crests.iter().map(|c| (c.id, c.enable)).collect();
    }

    pub fn on_crest_apply(&mut self, pkt: &SCrestApply) {
        self.glyphs.insert(pkt.id, pkt.enable);
    }

    pub fn on_hold_add(&mut self, pkt: &SHoldAbnormalityAdd) {
        self.held_buffs.insert(pkt.id);
    }

    pub fn on_hold_del(&mut self, pkt: &SHoldAbnormalityDel) {
        self.held_buffs.remove(&pkt.id);
    }

    pub fn on_ep_perks(&mut self, pkt: &SLoadEpPerkInfo) {
        self.talents = pkt.perks.iter().map(|p| (p.id, p.level)).collect();
    }

    pub fn on_polishing(&mut self, pkt: &SSkillPolishingList) {
        self.skill_polishing = pkt.effects.iter().copied().collect();
    }

    pub fn on_armor_rolls(&mut self, pkt: &SArmorRollList) {
        self.armor_rolls = pkt.rolls.iter().map(|r| (r.id, r.enable)).collect();
    }

    pub fn on_skill_category(&mut self, pkt: &SSkillCategory) {
        self.category_enabled.insert(pkt.category, pkt.enabled);
    }

    /// Categories default to enabled until the server says otherwise.
    pub fn category_enabled(&self, category: u32) -> bool {
        self.category_enabled.get(&category).copied().unwrap_or(true)
    }

    pub fn glyph_enabled(&self, id: u32) -> bool {
        self.glyphs.get(&id).copied().unwrap_or(false)
    }

    pub fn armor_roll_active(&self, id: u32) -> bool {
        self.armor_rolls.get(&id).copied().unwrap_or(false)
    }

    pub fn has_held_buff(&self, id: u32) -> bool {
        self.held_buffs.contains(&id)
    }

    // ------------------------------------------------------------
    // Applied-effect fold
    // ------------------------------------------------------------

    fn source_active(&self, source: EffectSource, ref_id: u32) -> bool {
        match source {
            // held buffs are abnormalities the server maintains across zones
            EffectSource::Abnormal => {
                self.client_abnormality.contains_key(&ref_id) || self.has_held_buff(ref_id)
            }
            // a rolled armor line activates a passivity the same way a
            // glyph slot does
            EffectSource::Passivity => self.glyph_enabled(ref_id) || self.armor_roll_active(ref_id),
            EffectSource::Polishing => self.skill_polishing.contains(&ref_id),
            EffectSource::Talent => self.talents.contains_key(&ref_id),
        }
    }

    /// Build the modifier bundle for `skill_id`: the skill's applied-effects
    /// table plus any active abnormality whose categories overlap the
    /// skill's and whose kind contributes distance or charge speed.
    pub fn get_applied(&self, skill_id: u32, data: &GameData) -> AppliedEffects {
        let mut out = AppliedEffects::default();
        let template = match data.skill(skill_id) {
            Some(t) => t,
            None => return out,
        };

        for def in &template.applied_effects {
            if !self.source_active(def.source, def.ref_id) {
                continue;
            }
            let v = def.value as f32;
            match def.field {
                EffectField::AbnormSpeed => out.abnorm_speed *= v,
                EffectField::PassiveSpeed => out.passive_speed *= v,
                EffectField::ChargeSpeed => out.charge_speed += v,
                EffectField::Lockon => out.lockon += def.value as i32,
                EffectField::Block => out.block = true,
                EffectField::Stamina => out.stamina += def.value as i32,
                EffectField::AttackSpeed => out.attack_speed *= v,
                EffectField::Reset => out.reset = true,
                EffectField::Dist => out.dist *= v,
                EffectField::Noct => out.noct *= v,
                EffectField::Transform => out.transform = def.value as i32,
                EffectField::EffectScale => out.effect_scale *= v,
            }
        }

        for active in self.client_abnormality.values() {
            let def = match data.abnormality(active.id) {
                Some(d) => d,
                None => continue,
            };
            if !def.by_categories.iter().any(|c| template.categories.contains(c)) {
                continue;
            }
            match def.kind {
                KIND_DIST_SCALE | KIND_DIST_SCALE_ALT => out.dist *= def.value as f32,
                KIND_CHARGE_SPEED => out.charge_speed += def.value as f32,
                _ => {}
            }
        }

        out
    }

    /// True when any active client-view abnormality of `kind` matches one of
    /// the skill's categories.
    pub fn category_abnormality_active(&self, skill_id: u32, kind: i32, data: &GameData) -> bool {
        let template = match data.skill(skill_id) {
            Some(t) => t,
            None => return false,
        };
        self.client_abnormality.values().any(|active| {
            data.abnormality(active.id).is_some_and(|def| {
                def.kind == kind
                    && def.by_categories.iter().any(|c| template.categories.contains(c))
            })
        })
    }

    /// Oldest active client-view abnormality, used by the stun early-end.
    pub fn oldest_active(&self) -> Option<&ActiveAbnormality> {
        self.client_abnormality.values().min_by_key(|a| a.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AbnormalityDef, AppliedEffectDef, SkillTemplate};
    use rival_common::packets::{ArmorRollSlot, CrestSlot, PerkSlot};

    fn data_with(skill: SkillTemplate, abnorms: Vec<AbnormalityDef>) -> GameData {
        GameData::from_parts(vec![skill], abnorms)
    }

    #[test]
    fn test_identity_bundle_for_unknown_skill() {
        let fx = Effects::new();
        let data = GameData::new();
        let b = fx.get_applied(123, &data);
        assert_eq!(b, AppliedEffects::default());
    }

    #[test]
    fn test_views_are_independent() {
        let mut fx = Effects::new();
        fx.begin(View::Client, 1000, 1, 5000, 0, true);
        assert!(fx.has(View::Client, 1000));
        assert!(!fx.has(View::Server, 1000));
        fx.begin(View::Server, 1000, 1, 5000, 100, false);
        fx.end(View::Client, 1000);
        assert!(fx.has(View::Server, 1000));
    }

    #[test]
    fn test_death_clears_abnormalities_only() {
        let mut fx = Effects::new();
        fx.begin(View::Client, 1000, 1, 5000, 0, false);
        fx.begin(View::Server, 1000, 1, 5000, 0, false);
        fx.on_crest_info(&SCrestInfo {
            crests: vec![CrestSlot { id: 21010, enable: true }],
        });
        fx.on_death();
        assert!(!fx.has(View::Client, 1000));
        assert!(!fx.has(View::Server, 1000));
        assert!(fx.glyph_enabled(21010));
    }

    #[test]
    fn test_applied_effects_table_fold() {
        let skill = SkillTemplate {
            id: 200200,
            applied_effects: vec![
                AppliedEffectDef {
                    source: EffectSource::Abnormal,
                    ref_id: 1000,
                    field: EffectField::AbnormSpeed,
                    value: 1.3,
                },
                AppliedEffectDef {
                    source: EffectSource::Passivity,
                    ref_id: 21010,
                    field: EffectField::Lockon,
                    value: 2.0,
                },
                AppliedEffectDef {
                    source: EffectSource::Talent,
                    ref_id: 5,
                    field: EffectField::Dist,
                    value: 1.1,
                },
            ],
            ..Default::default()
        };
        let data = data_with(skill, vec![]);
        let mut fx = Effects::new();

        // inactive sources contribute nothing
        assert_eq!(fx.get_applied(200200, &data), AppliedEffects::default());

        fx.begin(View::Client, 1000, 1, 5000, 0, false);
        fx.on_crest_apply(&SCrestApply { id: 21010, enable: true });
        fx.on_ep_perks(&SLoadEpPerkInfo {
            perks: vec![PerkSlot { id: 5, level: 1 }],
        });
        let b = fx.get_applied(200200, &data);
        assert!((b.abnorm_speed - 1.3).abs() < 1e-6);
        assert_eq!(b.lockon, 2);
        assert!((b.dist - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_category_matched_abnormality_contributes() {
        let skill = SkillTemplate {
            id: 200200,
            categories: vec![77],
            ..Default::default()
        };
        let abnorm = AbnormalityDef {
            id: 2222,
            kind: 28,
            value: 1.25,
            by_categories: vec![77],
            ..Default::default()
        };
        let data = data_with(skill, vec![abnorm]);
        let mut fx = Effects::new();
        fx.begin(View::Client, 2222, 1, 10000, 0, false);
        let b = fx.get_applied(200200, &data);
        assert!((b.dist - 1.25).abs() < 1e-6);
        assert!(fx.category_abnormality_active(200200, 28, &data));
        assert!(!fx.category_abnormality_active(200200, 327, &data));
    }

    #[test]
    fn test_armor_rolls_tracked_and_survive_death() {
        let mut fx = Effects::new();
        assert!(!fx.armor_roll_active(7700));
        fx.on_armor_rolls(&SArmorRollList {
            rolls: vec![
                ArmorRollSlot { id: 7700, enable: true },
                ArmorRollSlot { id: 7701, enable: false },
            ],
        });
        assert!(fx.armor_roll_active(7700));
        assert!(!fx.armor_roll_active(7701));
        fx.on_death();
        assert!(fx.armor_roll_active(7700));
        // a fresh list replaces the old one wholesale
        fx.on_armor_rolls(&SArmorRollList { rolls: vec![] });
        assert!(!fx.armor_roll_active(7700));
    }

    #[test]
    fn test_armor_roll_activates_passivity_source() {
        let skill = SkillTemplate {
            id: 200200,
            applied_effects: vec![AppliedEffectDef {
                source: EffectSource::Passivity,
                ref_id: 7700,
                field: EffectField::PassiveSpeed,
                value: 1.2,
            }],
            ..Default::default()
        };
        let data = data_with(skill, vec![]);
        let mut fx = Effects::new();
        assert_eq!(fx.get_applied(200200, &data), AppliedEffects::default());
        fx.on_armor_rolls(&SArmorRollList {
            rolls: vec![ArmorRollSlot { id: 7700, enable: true }],
        });
        let b = fx.get_applied(200200, &data);
        assert!((b.passive_speed - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_category_toggle() {
        let mut fx = Effects::new();
        assert!(fx.category_enabled(4));
        fx.on_skill_category(&SSkillCategory { category: 4, enabled: false });
        assert!(!fx.category_enabled(4));
    }

    #[test]
    fn test_oldest_active() {
        let mut fx = Effects::new();
        fx.begin(View::Client, 1, 1, 1000, 500, false);
        fx.begin(View::Client, 2, 1, 1000, 100, false);
        assert_eq!(fx.oldest_active().unwrap().id, 2);
    }
}
