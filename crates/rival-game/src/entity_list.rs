// entity_list.rs -- visible entity registry
//
// Tracks every spawned player, mob and NPC with position, relation and HP.
// Reset on login, cleared on zone change. The self player is tracked in
// player.rs, not here.

use std::collections::HashMap;

use rival_common::geom::Vec3;
use rival_common::packets::{
    SCreatureChangeHp, SCreatureLife, SDespawn, SInstantMove, SNpcLocation, SSpawnNpc, SSpawnUser,
    SUserLocation,
};

/// Relation code the server reports for friendly players.
pub const RELATION_FRIENDLY: i32 = 10;
/// Relation code for players flagged for PvP against us.
pub const RELATION_PVP: i32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityVariant {
    Player,
    Mob,
    Npc,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub id: u64,
    pub template_id: u32,
    pub hunting_zone_id: u32,
    pub loc: Vec3,
    pub w: f32,
    pub relation: i32,
    pub visible: bool,
    pub variant: EntityVariant,
    pub hp: i64,
    pub max_hp: i64,
    pub server_id: Option<u32>,
    pub player_id: Option<u32>,
}

#[derive(Debug, Default)]
pub struct EntityList {
    entities: HashMap<u64, EntityRecord>,
}

impl EntityList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.entities.clear();
    }

    pub fn get(&self, id: u64) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn on_spawn_user(&mut self, pkt: &SSpawnUser) {
        self.entities.insert(
            pkt.game_id,
            EntityRecord {
                id: pkt.game_id,
                template_id: pkt.template_id,
                hunting_zone_id: 0,
                loc: pkt.loc,
                w: pkt.w,
                relation: pkt.relation,
                visible: true,
                variant: EntityVariant::Player,
                hp: 0,
                max_hp: 0,
                server_id: Some(pkt.server_id),
                player_id: Some(pkt.player_id),
            },
        );
    }

    pub fn on_spawn_npc(&mut self, pkt: &SSpawnNpc) {
        let variant = if pkt.villager { EntityVariant::Npc } else { EntityVariant::Mob };
        self.entities.insert(
            pkt.game_id,
            EntityRecord {
                id: pkt.game_id,
                template_id: pkt.template_id,
                hunting_zone_id: pkt.hunting_zone_id,
                loc: pkt.loc,
                w: pkt.w,
                relation: pkt.relation,
                visible: true,
                variant,
                hp: 0,
                max_hp: 0,
                server_id: None,
                player_id: None,
            },
        );
    }

    pub fn on_despawn(&mut self, pkt: &SDespawn) {
        self.entities.remove(&pkt.game_id);
    }

    pub fn on_user_location(&mut self, pkt: &SUserLocation) {
        if let Some(e) = self.entities.get_mut(&pkt.game_id) {
            e.loc = pkt.loc;
            e.w = pkt.w;
        }
    }

    pub fn on_npc_location(&mut self, pkt: &SNpcLocation) {
        if let Some(e) = self.entities.get_mut(&pkt.game_id) {
            e.loc = pkt.loc;
            e.w = pkt.w;
        }
    }

    pub fn on_instant_move(&mut self, pkt: &SInstantMove) {
        if let Some(e) = self.entities.get_mut(&pkt.game_id) {
            e.loc = pkt.loc;
            e.w = pkt.w;
        }
    }

    pub fn on_change_hp(&mut self, pkt: &SCreatureChangeHp) {
        if let Some(e) = self.entities.get_mut(&pkt.target) {
            e.hp = pkt.hp;
            e.max_hp = pkt.max_hp;
        }
    }

    pub fn on_creature_life(&mut self, pkt: &SCreatureLife) {
        if let Some(e) = self.entities.get_mut(&pkt.target) {
            e.visible = pkt.alive;
            e.loc = pkt.loc;
            if !pkt.alive {
                e.hp = 0;
            }
        }
    }
}

impl EntityRecord {
    /// A valid offensive lockon target: any mob, or a player flagged for PvP.
    pub fn is_enemy_or_pvp(&self) -> bool {
        match self.variant {
            EntityVariant::Mob => true,
            EntityVariant::Player => self.relation >= RELATION_PVP,
            _ => false,
        }
    }

    pub fn is_friendly_player(&self) -> bool {
        self.variant == EntityVariant::Player && self.relation == RELATION_FRIENDLY
    }
}
