// player.rs -- self-player state
//
// Identity, stats, party, mount and loading flags. Everything the cast
// gate needs to answer "can the player act right now".

use rival_common::packets::{
    PartyMember, SLogin, SMountVehicle, SPartyMemberList, SPlayerStatUpdate, SSpawnMe,
    SUnmountVehicle,
};

/// Attack speed stat value that corresponds to a 1.0 animation multiplier.
const BASE_ATTACK_SPEED: f32 = 100.0;

#[derive(Debug, Default)]
pub struct Player {
    pub game_id: u64,
    pub server_id: u32,
    pub player_id: u32,
    pub template_id: u32,
    pub name: String,
    pub level: i32,

    pub alive: bool,
    pub mounted: bool,
    pub in_loading_screen: bool,

    pub hp: i64,
    pub max_hp: i64,
    pub mp: i32,
    pub max_mp: i32,
    pub stamina: i32,
    pub attack_speed: f32,

    pub party: Vec<PartyMember>,
}

impl Player {
    pub fn new() -> Self {
        Self {
            attack_speed: BASE_ATTACK_SPEED,
            ..Default::default()
        }
    }

    pub fn on_login(&mut self, pkt: &SLogin) {
        *self = Self::new();
        self.game_id = pkt.game_id;
        self.server_id = pkt.server_id;
        self.player_id = pkt.player_id;
        self.template_id = pkt.template_id;
        self.name = pkt.name.clone();
        self.level = pkt.level;
        self.in_loading_screen = true;
    }

    pub fn on_load_topo(&mut self) {
        self.in_loading_screen = true;
    }

    pub fn on_spawn_me(&mut self, pkt: &SSpawnMe) {
        self.alive = pkt.alive;
        self.in_loading_screen = false;
    }

    pub fn on_creature_life(&mut self, alive: bool) {
        self.alive = alive;
    }

    pub fn on_stat_update(&mut self, pkt: &SPlayerStatUpdate) {
        self.hp = pkt.hp;
        self.max_hp = pkt.max_hp;
        self.mp = pkt.mp;
        self.max_mp = pkt.max_mp;
        self.stamina = pkt.stamina;
        self.attack_speed = pkt.attack_speed + pkt.attack_speed_bonus;
    }

    pub fn on_mount(&mut self, pkt: &SMountVehicle) {
        if pkt.game_id == self.game_id {
            self.mounted = true;
        }
    }

    pub fn on_unmount(&mut self, pkt: &SUnmountVehicle) {
        if pkt.game_id == self.game_id {
            self.mounted = false;
        }
    }

    pub fn on_party_list(&mut self, pkt: &SPartyMemberList) {
        self.party = pkt.members.clone();
    }

    pub fn on_leave_party(&mut self) {
        self.party.clear();
    }

    pub fn is_me(&self, game_id: u64) -> bool {
        self.game_id != 0 && self.game_id == game_id
    }

    pub fn in_party(&self, server_id: u32, player_id: u32) -> bool {
        self.party
            .iter()
            .any(|m| m.server_id == server_id && m.player_id == player_id)
    }

    /// Attack speed as an animation multiplier.
    pub fn attack_speed_mult(&self) -> f32 {
        self.attack_speed / BASE_ATTACK_SPEED
    }

    /// The hard gate in front of every skill request.
    pub fn can_act(&self) -> bool {
        self.alive && !self.mounted && !self.in_loading_screen
    }
}
