// packets.rs -- structured packet records
//
// Every packet the interceptor reads or writes has a record type here plus
// a field-level wire conversion. Anything not listed passes through the
// relay untouched. Server-bound names start with C_, client-bound with S_.

use bitflags::bitflags;

use crate::geom::Vec3;
use crate::wire::{decode_vec, encode_vec, Wire, WireError, WireReader, WireWriter};

// ============================================================
// Names and direction
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Server → client.
    ToClient,
    /// Client → server.
    ToServer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketName {
    SLogin,
    SLoadTopo,
    SSpawnMe,
    SCreatureLife,
    SCreatureChangeHp,
    SPlayerStatUpdate,
    SSpawnUser,
    SSpawnNpc,
    SDespawn,
    SUserLocation,
    SNpcLocation,
    SInstantMove,
    SActionStage,
    SActionEnd,
    SEachSkillResult,
    SStartCooltimeSkill,
    SDecreaseCooltimeSkill,
    SCrestMessage,
    SCrestInfo,
    SCrestApply,
    SAbnormalityBegin,
    SAbnormalityRefresh,
    SAbnormalityEnd,
    SHoldAbnormalityAdd,
    SHoldAbnormalityDel,
    SGrantSkill,
    SConnectSkillArrow,
    SCanLockonTarget,
    SCannotStartSkill,
    SDefendSuccess,
    SMountVehicle,
    SUnmountVehicle,
    SResponseGamestatPong,
    SChat,
    SPartyMemberList,
    SLeaveParty,
    SSkillCategory,
    SLoadEpPerkInfo,
    SSkillPolishingList,
    SArmorRollList,
    CStartSkill,
    CStartTargetedSkill,
    CStartComboInstantSkill,
    CStartInstanceSkill,
    CStartInstanceSkillEx,
    CPressSkill,
    CNotimelineSkill,
    CCancelSkill,
    CPlayerLocation,
    CNotifyLocationInAction,
    CCanLockonTarget,
    CChat,
    CRequestGamestatPing,
}

impl PacketName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketName::SLogin => "S_LOGIN",
            PacketName::SLoadTopo => "S_LOAD_TOPO",
            PacketName::SSpawnMe => "S_SPAWN_ME",
            PacketName::SCreatureLife => "S_CREATURE_LIFE",
            PacketName::SCreatureChangeHp => "S_CREATURE_CHANGE_HP",
            PacketName::SPlayerStatUpdate => "S_PLAYER_STAT_UPDATE",
            PacketName::SSpawnUser => "S_SPAWN_USER",
            PacketName::SSpawnNpc => "S_SPAWN_NPC",
            PacketName::SDespawn => "S_DESPAWN",
            PacketName::SUserLocation => "S_USER_LOCATION",
            PacketName::SNpcLocation => "S_NPC_LOCATION",
            PacketName::SInstantMove => "S_INSTANT_MOVE",
            PacketName::SActionStage => "S_ACTION_STAGE",
            PacketName::SActionEnd => "S_ACTION_END",
            PacketName::SEachSkillResult => "S_EACH_SKILL_RESULT",
            PacketName::SStartCooltimeSkill => "S_START_COOLTIME_SKILL",
            PacketName::SDecreaseCooltimeSkill => "S_DECREASE_COOLTIME_SKILL",
            PacketName::SCrestMessage => "S_CREST_MESSAGE",
            PacketName::SCrestInfo => "S_CREST_INFO",
            PacketName::SCrestApply => "S_CREST_APPLY",
            PacketName::SAbnormalityBegin => "S_ABNORMALITY_BEGIN",
            PacketName::SAbnormalityRefresh => "S_ABNORMALITY_REFRESH",
            PacketName::SAbnormalityEnd => "S_ABNORMALITY_END",
            PacketName::SHoldAbnormalityAdd => "S_HOLD_ABNORMALITY_ADD",
            PacketName::SHoldAbnormalityDel => "S_HOLD_ABNORMALITY_DEL",
            PacketName::SGrantSkill => "S_GRANT_SKILL",
            PacketName::SConnectSkillArrow => "S_CONNECT_SKILL_ARROW",
            PacketName::SCanLockonTarget => "S_CAN_LOCKON_TARGET",
            PacketName::SCannotStartSkill => "S_CANNOT_START_SKILL",
            PacketName::SDefendSuccess => "S_DEFEND_SUCCESS",
            PacketName::SMountVehicle => "S_MOUNT_VEHICLE",
            PacketName::SUnmountVehicle => "S_UNMOUNT_VEHICLE",
            PacketName::SResponseGamestatPong => "S_RESPONSE_GAMESTAT_PONG",
            PacketName::SChat => "S_CHAT",
            PacketName::SPartyMemberList => "S_PARTY_MEMBER_LIST",
            PacketName::SLeaveParty => "S_LEAVE_PARTY",
            PacketName::SSkillCategory => "S_SKILL_CATEGORY",
            PacketName::SLoadEpPerkInfo => "S_LOAD_EP_PERK_INFO",
            PacketName::SSkillPolishingList => "S_SKILL_POLISHING_LIST",
            PacketName::SArmorRollList => "S_ARMOR_ROLL_LIST",
            PacketName::CStartSkill => "C_START_SKILL",
            PacketName::CStartTargetedSkill => "C_START_TARGETED_SKILL",
            PacketName::CStartComboInstantSkill => "C_START_COMBO_INSTANT_SKILL",
            PacketName::CStartInstanceSkill => "C_START_INSTANCE_SKILL",
            PacketName::CStartInstanceSkillEx => "C_START_INSTANCE_SKILL_EX",
            PacketName::CPressSkill => "C_PRESS_SKILL",
            PacketName::CNotimelineSkill => "C_NOTIMELINE_SKILL",
            PacketName::CCancelSkill => "C_CANCEL_SKILL",
            PacketName::CPlayerLocation => "C_PLAYER_LOCATION",
            PacketName::CNotifyLocationInAction => "C_NOTIFY_LOCATION_IN_ACTION",
            PacketName::CCanLockonTarget => "C_CAN_LOCKON_TARGET",
            PacketName::CChat => "C_CHAT",
            PacketName::CRequestGamestatPing => "C_REQUEST_GAMESTAT_PING",
        }
    }

    pub fn from_str(name: &str) -> Option<PacketName> {
        ALL_NAMES.iter().find(|n| n.as_str() == name).copied()
    }

    pub fn direction(&self) -> Direction {
        if self.as_str().starts_with("C_") {
            Direction::ToServer
        } else {
            Direction::ToClient
        }
    }

    /// True for every member of the skill-start request family.
    pub fn is_skill_start(&self) -> bool {
        matches!(
            self,
            PacketName::CStartSkill
                | PacketName::CStartTargetedSkill
                | PacketName::CStartComboInstantSkill
                | PacketName::CStartInstanceSkill
                | PacketName::CStartInstanceSkillEx
                | PacketName::CPressSkill
                | PacketName::CNotimelineSkill
        )
    }
}

pub const ALL_NAMES: [PacketName; 53] = [
    PacketName::SLogin,
    PacketName::SLoadTopo,
    PacketName::SSpawnMe,
    PacketName::SCreatureLife,
    PacketName::SCreatureChangeHp,
    PacketName::SPlayerStatUpdate,
    PacketName::SSpawnUser,
    PacketName::SSpawnNpc,
    PacketName::SDespawn,
    PacketName::SUserLocation,
    PacketName::SNpcLocation,
    PacketName::SInstantMove,
    PacketName::SActionStage,
    PacketName::SActionEnd,
    PacketName::SEachSkillResult,
    PacketName::SStartCooltimeSkill,
    PacketName::SDecreaseCooltimeSkill,
    PacketName::SCrestMessage,
    PacketName::SCrestInfo,
    PacketName::SCrestApply,
    PacketName::SAbnormalityBegin,
    PacketName::SAbnormalityRefresh,
    PacketName::SAbnormalityEnd,
    PacketName::SHoldAbnormalityAdd,
    PacketName::SHoldAbnormalityDel,
    PacketName::SGrantSkill,
    PacketName::SConnectSkillArrow,
    PacketName::SCanLockonTarget,
    PacketName::SCannotStartSkill,
    PacketName::SDefendSuccess,
    PacketName::SMountVehicle,
    PacketName::SUnmountVehicle,
    PacketName::SResponseGamestatPong,
    PacketName::SChat,
    PacketName::SPartyMemberList,
    PacketName::SLeaveParty,
    PacketName::SSkillCategory,
    PacketName::SLoadEpPerkInfo,
    PacketName::SSkillPolishingList,
    PacketName::SArmorRollList,
    PacketName::CStartSkill,
    PacketName::CStartTargetedSkill,
    PacketName::CStartComboInstantSkill,
    PacketName::CStartInstanceSkill,
    PacketName::CStartInstanceSkillEx,
    PacketName::CPressSkill,
    PacketName::CNotimelineSkill,
    PacketName::CCancelSkill,
    PacketName::CPlayerLocation,
    PacketName::CNotifyLocationInAction,
    PacketName::CCanLockonTarget,
    PacketName::CChat,
    PacketName::CRequestGamestatPing,
];

// ============================================================
// Shared sub-records
// ============================================================

/// One step of a skill animation: how long it plays and how far it moves
/// the actor along the facing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnimSeq {
    pub duration: i32,
    pub distance: f32,
}

impl Wire for AnimSeq {
    fn encode(&self, w: &mut WireWriter) {
        w.i32(self.duration);
        w.f32(self.distance);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            duration: r.i32()?,
            distance: r.f32()?,
        })
    }
}

/// Forced-animation payload of a skill result (knockdown, push, stun).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reaction {
    pub enable: bool,
    pub push: bool,
    pub air: bool,
    pub anim_seq: Vec<AnimSeq>,
}

impl Wire for Reaction {
    fn encode(&self, w: &mut WireWriter) {
        w.bool(self.enable);
        w.bool(self.push);
        w.bool(self.air);
        encode_vec(w, &self.anim_seq);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            enable: r.bool()?,
            push: r.bool()?,
            air: r.bool()?,
            anim_seq: decode_vec(r)?,
        })
    }
}

bitflags! {
    /// Flag bits on a skill-result packet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HitFlags: u32 {
        /// Target keeps its animation through the hit.
        const SUPER_ARMOR = 0x01;
        /// Target cannot be displaced by the hit.
        const PUSH_IMMUNE = 0x02;
        const CRIT = 0x04;
        const BLOCKED = 0x08;
        const PERFECT_BLOCK = 0x10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrestSlot {
    pub id: u32,
    pub enable: bool,
}

impl Wire for CrestSlot {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.id);
        w.bool(self.enable);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            id: r.u32()?,
            enable: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartyMember {
    pub server_id: u32,
    pub player_id: u32,
    pub name: String,
}

impl Wire for PartyMember {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.server_id);
        w.u32(self.player_id);
        w.str(&self.name);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            server_id: r.u32()?,
            player_id: r.u32()?,
            name: r.str()?,
        })
    }
}

// ============================================================
// Server → client records
// ============================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SLogin {
    pub game_id: u64,
    pub server_id: u32,
    pub player_id: u32,
    pub template_id: u32,
    pub level: i32,
    pub name: String,
}

impl Wire for SLogin {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.u32(self.server_id);
        w.u32(self.player_id);
        w.u32(self.template_id);
        w.i32(self.level);
        w.str(&self.name);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            server_id: r.u32()?,
            player_id: r.u32()?,
            template_id: r.u32()?,
            level: r.i32()?,
            name: r.str()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SLoadTopo {
    pub zone: i32,
    pub loc: Vec3,
    pub quick: bool,
}

impl Wire for SLoadTopo {
    fn encode(&self, w: &mut WireWriter) {
        w.i32(self.zone);
        w.vec3(self.loc);
        w.bool(self.quick);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            zone: r.i32()?,
            loc: r.vec3()?,
            quick: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SSpawnMe {
    pub game_id: u64,
    pub loc: Vec3,
    pub w: f32,
    pub alive: bool,
}

impl Wire for SSpawnMe {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.vec3(self.loc);
        w.f32(self.w);
        w.bool(self.alive);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            loc: r.vec3()?,
            w: r.f32()?,
            alive: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SCreatureLife {
    pub target: u64,
    pub alive: bool,
    pub loc: Vec3,
}

impl Wire for SCreatureLife {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.target);
        w.bool(self.alive);
        w.vec3(self.loc);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            target: r.u64()?,
            alive: r.bool()?,
            loc: r.vec3()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SCreatureChangeHp {
    pub target: u64,
    pub source: u64,
    pub hp: i64,
    pub max_hp: i64,
}

impl Wire for SCreatureChangeHp {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.target);
        w.u64(self.source);
        w.i64(self.hp);
        w.i64(self.max_hp);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            target: r.u64()?,
            source: r.u64()?,
            hp: r.i64()?,
            max_hp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SPlayerStatUpdate {
    pub hp: i64,
    pub max_hp: i64,
    pub mp: i32,
    pub max_mp: i32,
    pub stamina: i32,
    pub max_stamina: i32,
    pub attack_speed: f32,
    pub attack_speed_bonus: f32,
}

impl Wire for SPlayerStatUpdate {
    fn encode(&self, w: &mut WireWriter) {
        w.i64(self.hp);
        w.i64(self.max_hp);
        w.i32(self.mp);
        w.i32(self.max_mp);
        w.i32(self.stamina);
        w.i32(self.max_stamina);
        w.f32(self.attack_speed);
        w.f32(self.attack_speed_bonus);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hp: r.i64()?,
            max_hp: r.i64()?,
            mp: r.i32()?,
            max_mp: r.i32()?,
            stamina: r.i32()?,
            max_stamina: r.i32()?,
            attack_speed: r.f32()?,
            attack_speed_bonus: r.f32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SSpawnUser {
    pub game_id: u64,
    pub server_id: u32,
    pub player_id: u32,
    pub template_id: u32,
    pub loc: Vec3,
    pub w: f32,
    pub relation: i32,
    pub alive: bool,
    pub name: String,
}

impl Wire for SSpawnUser {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.u32(self.server_id);
        w.u32(self.player_id);
        w.u32(self.template_id);
        w.vec3(self.loc);
        w.f32(self.w);
        w.i32(self.relation);
        w.bool(self.alive);
        w.str(&self.name);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            server_id: r.u32()?,
            player_id: r.u32()?,
            template_id: r.u32()?,
            loc: r.vec3()?,
            w: r.f32()?,
            relation: r.i32()?,
            alive: r.bool()?,
            name: r.str()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SSpawnNpc {
    pub game_id: u64,
    pub template_id: u32,
    pub hunting_zone_id: u32,
    pub loc: Vec3,
    pub w: f32,
    pub relation: i32,
    pub villager: bool,
}

impl Wire for SSpawnNpc {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.u32(self.template_id);
        w.u32(self.hunting_zone_id);
        w.vec3(self.loc);
        w.f32(self.w);
        w.i32(self.relation);
        w.bool(self.villager);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            template_id: r.u32()?,
            hunting_zone_id: r.u32()?,
            loc: r.vec3()?,
            w: r.f32()?,
            relation: r.i32()?,
            villager: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SDespawn {
    pub game_id: u64,
    pub loc: Vec3,
}

impl Wire for SDespawn {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.vec3(self.loc);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            loc: r.vec3()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SUserLocation {
    pub game_id: u64,
    pub loc: Vec3,
    pub w: f32,
    pub dest: Vec3,
    pub speed: i32,
}

impl Wire for SUserLocation {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.vec3(self.loc);
        w.f32(self.w);
        w.vec3(self.dest);
        w.i32(self.speed);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            loc: r.vec3()?,
            w: r.f32()?,
            dest: r.vec3()?,
            speed: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SNpcLocation {
    pub game_id: u64,
    pub loc: Vec3,
    pub w: f32,
    pub dest: Vec3,
    pub speed: i32,
}

impl Wire for SNpcLocation {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.vec3(self.loc);
        w.f32(self.w);
        w.vec3(self.dest);
        w.i32(self.speed);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            loc: r.vec3()?,
            w: r.f32()?,
            dest: r.vec3()?,
            speed: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SInstantMove {
    pub game_id: u64,
    pub loc: Vec3,
    pub w: f32,
}

impl Wire for SInstantMove {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.vec3(self.loc);
        w.f32(self.w);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            loc: r.vec3()?,
            w: r.f32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SActionStage {
    pub game_id: u64,
    pub loc: Vec3,
    pub w: f32,
    pub template_id: u32,
    pub skill: u32,
    pub stage: i32,
    pub speed: f32,
    pub effect_scale: f32,
    pub moving: bool,
    pub dest: Vec3,
    pub target: u64,
    pub action_id: u32,
    pub anim_seq: Vec<AnimSeq>,
}

impl Wire for SActionStage {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.vec3(self.loc);
        w.f32(self.w);
        w.u32(self.template_id);
        w.u32(self.skill);
        w.i32(self.stage);
        w.f32(self.speed);
        w.f32(self.effect_scale);
        w.bool(self.moving);
        w.vec3(self.dest);
        w.u64(self.target);
        w.u32(self.action_id);
        encode_vec(w, &self.anim_seq);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            loc: r.vec3()?,
            w: r.f32()?,
            template_id: r.u32()?,
            skill: r.u32()?,
            stage: r.i32()?,
            speed: r.f32()?,
            effect_scale: r.f32()?,
            moving: r.bool()?,
            dest: r.vec3()?,
            target: r.u64()?,
            action_id: r.u32()?,
            anim_seq: decode_vec(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SActionEnd {
    pub game_id: u64,
    pub loc: Vec3,
    pub w: f32,
    pub template_id: u32,
    pub skill: u32,
    pub end_type: i32,
    pub action_id: u32,
}

impl Wire for SActionEnd {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.vec3(self.loc);
        w.f32(self.w);
        w.u32(self.template_id);
        w.u32(self.skill);
        w.i32(self.end_type);
        w.u32(self.action_id);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            loc: r.vec3()?,
            w: r.f32()?,
            template_id: r.u32()?,
            skill: r.u32()?,
            end_type: r.i32()?,
            action_id: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SEachSkillResult {
    pub source: u64,
    /// Projectiles report the owner separately from the projectile entity.
    pub owner: u64,
    pub target: u64,
    pub skill: u32,
    pub stage: i32,
    pub action_id: u32,
    pub flags: HitFlags,
    pub reaction: Reaction,
}

impl Wire for SEachSkillResult {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.source);
        w.u64(self.owner);
        w.u64(self.target);
        w.u32(self.skill);
        w.i32(self.stage);
        w.u32(self.action_id);
        w.u32(self.flags.bits());
        self.reaction.encode(w);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            source: r.u64()?,
            owner: r.u64()?,
            target: r.u64()?,
            skill: r.u32()?,
            stage: r.i32()?,
            action_id: r.u32()?,
            flags: HitFlags::from_bits_truncate(r.u32()?),
            reaction: Reaction::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SStartCooltimeSkill {
    pub skill: u32,
    pub cooldown_ms: i32,
    /// Stack fields are zero for skills without charge stacks.
    pub used_stacks: i32,
    pub max_stacks: i32,
    pub next_stack_cooldown_ms: i32,
}

impl Wire for SStartCooltimeSkill {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.skill);
        w.i32(self.cooldown_ms);
        w.i32(self.used_stacks);
        w.i32(self.max_stacks);
        w.i32(self.next_stack_cooldown_ms);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            skill: r.u32()?,
            cooldown_ms: r.i32()?,
            used_stacks: r.i32()?,
            max_stacks: r.i32()?,
            next_stack_cooldown_ms: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SDecreaseCooltimeSkill {
    pub skill: u32,
    pub cooldown_ms: i32,
}

impl Wire for SDecreaseCooltimeSkill {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.skill);
        w.i32(self.cooldown_ms);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            skill: r.u32()?,
            cooldown_ms: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SCrestMessage {
    pub kind: i32,
    pub skill: u32,
}

impl Wire for SCrestMessage {
    fn encode(&self, w: &mut WireWriter) {
        w.i32(self.kind);
        w.u32(self.skill);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            kind: r.i32()?,
            skill: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SCrestInfo {
    pub crests: Vec<CrestSlot>,
}

impl Wire for SCrestInfo {
    fn encode(&self, w: &mut WireWriter) {
        encode_vec(w, &self.crests);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            crests: decode_vec(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SCrestApply {
    pub id: u32,
    pub enable: bool,
}

impl Wire for SCrestApply {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.id);
        w.bool(self.enable);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            id: r.u32()?,
            enable: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SAbnormalityBegin {
    pub target: u64,
    pub source: u64,
    pub id: u32,
    pub duration_ms: i64,
    pub stacks: i32,
}

impl Wire for SAbnormalityBegin {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.target);
        w.u64(self.source);
        w.u32(self.id);
        w.i64(self.duration_ms);
        w.i32(self.stacks);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            target: r.u64()?,
            source: r.u64()?,
            id: r.u32()?,
            duration_ms: r.i64()?,
            stacks: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SAbnormalityRefresh {
    pub target: u64,
    pub id: u32,
    pub duration_ms: i64,
    pub stacks: i32,
}

impl Wire for SAbnormalityRefresh {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.target);
        w.u32(self.id);
        w.i64(self.duration_ms);
        w.i32(self.stacks);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            target: r.u64()?,
            id: r.u32()?,
            duration_ms: r.i64()?,
            stacks: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SAbnormalityEnd {
    pub target: u64,
    pub id: u32,
}

impl Wire for SAbnormalityEnd {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.target);
        w.u32(self.id);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            target: r.u64()?,
            id: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SHoldAbnormalityAdd {
    pub id: u32,
}

impl Wire for SHoldAbnormalityAdd {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.id);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self { id: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SHoldAbnormalityDel {
    pub id: u32,
}

impl Wire for SHoldAbnormalityDel {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.id);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self { id: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SGrantSkill {
    pub skill: u32,
}

impl Wire for SGrantSkill {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.skill);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self { skill: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SConnectSkillArrow {
    pub skill: u32,
}

impl Wire for SConnectSkillArrow {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.skill);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self { skill: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SCanLockonTarget {
    pub target: u64,
    pub skill: u32,
    pub success: bool,
}

impl Wire for SCanLockonTarget {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.target);
        w.u32(self.skill);
        w.bool(self.success);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            target: r.u64()?,
            skill: r.u32()?,
            success: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SCannotStartSkill {
    pub skill: u32,
}

impl Wire for SCannotStartSkill {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.skill);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self { skill: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SDefendSuccess {
    pub game_id: u64,
    pub skill: u32,
    pub perfect: bool,
}

impl Wire for SDefendSuccess {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.u32(self.skill);
        w.bool(self.perfect);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            skill: r.u32()?,
            perfect: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SMountVehicle {
    pub game_id: u64,
    pub skill: u32,
}

impl Wire for SMountVehicle {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.u32(self.skill);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            skill: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SUnmountVehicle {
    pub game_id: u64,
    pub skill: u32,
}

impl Wire for SUnmountVehicle {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.game_id);
        w.u32(self.skill);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            game_id: r.u64()?,
            skill: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SResponseGamestatPong {}

impl Wire for SResponseGamestatPong {
    fn encode(&self, _w: &mut WireWriter) {}

    fn decode(_r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {})
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SChat {
    pub channel: i32,
    pub author_id: u64,
    pub author_name: String,
    pub message: String,
}

impl Wire for SChat {
    fn encode(&self, w: &mut WireWriter) {
        w.i32(self.channel);
        w.u64(self.author_id);
        w.str(&self.author_name);
        w.str(&self.message);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            channel: r.i32()?,
            author_id: r.u64()?,
            author_name: r.str()?,
            message: r.str()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SPartyMemberList {
    pub members: Vec<PartyMember>,
}

impl Wire for SPartyMemberList {
    fn encode(&self, w: &mut WireWriter) {
        encode_vec(w, &self.members);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            members: decode_vec(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SLeaveParty {}

impl Wire for SLeaveParty {
    fn encode(&self, _w: &mut WireWriter) {}

    fn decode(_r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {})
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SSkillCategory {
    pub category: u32,
    pub enabled: bool,
}

impl Wire for SSkillCategory {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.category);
        w.bool(self.enabled);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            category: r.u32()?,
            enabled: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerkSlot {
    pub id: u32,
    pub level: u32,
}

impl Wire for PerkSlot {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.id);
        w.u32(self.level);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            id: r.u32()?,
            level: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SLoadEpPerkInfo {
    pub perks: Vec<PerkSlot>,
}

impl Wire for SLoadEpPerkInfo {
    fn encode(&self, w: &mut WireWriter) {
        encode_vec(w, &self.perks);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            perks: decode_vec(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArmorRollSlot {
    pub id: u32,
    pub enable: bool,
}

impl Wire for ArmorRollSlot {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.id);
        w.bool(self.enable);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            id: r.u32()?,
            enable: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SArmorRollList {
    pub rolls: Vec<ArmorRollSlot>,
}

impl Wire for SArmorRollList {
    fn encode(&self, w: &mut WireWriter) {
        encode_vec(w, &self.rolls);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            rolls: decode_vec(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SSkillPolishingList {
    pub effects: Vec<u32>,
}

impl Wire for SSkillPolishingList {
    fn encode(&self, w: &mut WireWriter) {
        w.u16(self.effects.len() as u16);
        for id in &self.effects {
            w.u32(*id);
        }
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        let count = r.u16()? as usize;
        let mut effects = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            effects.push(r.u32()?);
        }
        Ok(Self { effects })
    }
}

// ============================================================
// Client → server records
// ============================================================

/// Shared body of the whole skill-start request family. `name` keeps the
/// concrete request kind so a held packet is released under its own opcode.
#[derive(Debug, Clone, PartialEq)]
pub struct CStartSkill {
    pub name: PacketName,
    pub skill: u32,
    pub loc: Vec3,
    pub w: f32,
    pub dest: Vec3,
    pub target: u64,
    pub moving: bool,
    pub continuation: bool,
    pub press: bool,
}

impl Default for CStartSkill {
    fn default() -> Self {
        Self {
            name: PacketName::CStartSkill,
            skill: 0,
            loc: Vec3::ZERO,
            w: 0.0,
            dest: Vec3::ZERO,
            target: 0,
            moving: false,
            continuation: false,
            press: false,
        }
    }
}

impl CStartSkill {
    /// Canonical identity string with position fields stripped, used for
    /// duplicate-press detection.
    pub fn dedup_string(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.name.as_str(),
            self.skill,
            self.target,
            self.moving as u8,
            self.continuation as u8,
            self.press as u8
        )
    }
}

impl Wire for CStartSkill {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.skill);
        w.vec3(self.loc);
        w.f32(self.w);
        w.vec3(self.dest);
        w.u64(self.target);
        w.bool(self.moving);
        w.bool(self.continuation);
        w.bool(self.press);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            name: PacketName::CStartSkill,
            skill: r.u32()?,
            loc: r.vec3()?,
            w: r.f32()?,
            dest: r.vec3()?,
            target: r.u64()?,
            moving: r.bool()?,
            continuation: r.bool()?,
            press: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CCancelSkill {
    pub skill: u32,
    pub end_type: i32,
}

impl Wire for CCancelSkill {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.skill);
        w.i32(self.end_type);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            skill: r.u32()?,
            end_type: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CPlayerLocation {
    pub loc: Vec3,
    pub w: f32,
    pub dest: Vec3,
    pub kind: i32,
}

impl Wire for CPlayerLocation {
    fn encode(&self, w: &mut WireWriter) {
        w.vec3(self.loc);
        w.f32(self.w);
        w.vec3(self.dest);
        w.i32(self.kind);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            loc: r.vec3()?,
            w: r.f32()?,
            dest: r.vec3()?,
            kind: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CNotifyLocationInAction {
    pub skill: u32,
    pub stage: i32,
    pub loc: Vec3,
    pub w: f32,
}

impl Wire for CNotifyLocationInAction {
    fn encode(&self, w: &mut WireWriter) {
        w.u32(self.skill);
        w.i32(self.stage);
        w.vec3(self.loc);
        w.f32(self.w);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            skill: r.u32()?,
            stage: r.i32()?,
            loc: r.vec3()?,
            w: r.f32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CCanLockonTarget {
    pub target: u64,
    pub skill: u32,
}

impl Wire for CCanLockonTarget {
    fn encode(&self, w: &mut WireWriter) {
        w.u64(self.target);
        w.u32(self.skill);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            target: r.u64()?,
            skill: r.u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CChat {
    pub channel: i32,
    pub message: String,
}

impl Wire for CChat {
    fn encode(&self, w: &mut WireWriter) {
        w.i32(self.channel);
        w.str(&self.message);
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            channel: r.i32()?,
            message: r.str()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CRequestGamestatPing {}

impl Wire for CRequestGamestatPing {
    fn encode(&self, _w: &mut WireWriter) {}

    fn decode(_r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {})
    }
}

// ============================================================
// The packet sum type
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    SLogin(SLogin),
    SLoadTopo(SLoadTopo),
    SSpawnMe(SSpawnMe),
    SCreatureLife(SCreatureLife),
    SCreatureChangeHp(SCreatureChangeHp),
    SPlayerStatUpdate(SPlayerStatUpdate),
    SSpawnUser(SSpawnUser),
    SSpawnNpc(SSpawnNpc),
    SDespawn(SDespawn),
    SUserLocation(SUserLocation),
    SNpcLocation(SNpcLocation),
    SInstantMove(SInstantMove),
    SActionStage(SActionStage),
    SActionEnd(SActionEnd),
    SEachSkillResult(SEachSkillResult),
    SStartCooltimeSkill(SStartCooltimeSkill),
    SDecreaseCooltimeSkill(SDecreaseCooltimeSkill),
    SCrestMessage(SCrestMessage),
    SCrestInfo(SCrestInfo),
    SCrestApply(SCrestApply),
    SAbnormalityBegin(SAbnormalityBegin),
    SAbnormalityRefresh(SAbnormalityRefresh),
    SAbnormalityEnd(SAbnormalityEnd),
    SHoldAbnormalityAdd(SHoldAbnormalityAdd),
    SHoldAbnormalityDel(SHoldAbnormalityDel),
    SGrantSkill(SGrantSkill),
    SConnectSkillArrow(SConnectSkillArrow),
    SCanLockonTarget(SCanLockonTarget),
    SCannotStartSkill(SCannotStartSkill),
    SDefendSuccess(SDefendSuccess),
    SMountVehicle(SMountVehicle),
    SUnmountVehicle(SUnmountVehicle),
    SResponseGamestatPong(SResponseGamestatPong),
    SChat(SChat),
    SPartyMemberList(SPartyMemberList),
    SLeaveParty(SLeaveParty),
    SSkillCategory(SSkillCategory),
    SLoadEpPerkInfo(SLoadEpPerkInfo),
    SSkillPolishingList(SSkillPolishingList),
    SArmorRollList(SArmorRollList),
    /// All seven skill-start request kinds; the record's `name` field holds
    /// the concrete one.
    SkillStart(CStartSkill),
    CCancelSkill(CCancelSkill),
    CPlayerLocation(CPlayerLocation),
    CNotifyLocationInAction(CNotifyLocationInAction),
    CCanLockonTarget(CCanLockonTarget),
    CChat(CChat),
    CRequestGamestatPing(CRequestGamestatPing),
}

impl Packet {
    pub fn name(&self) -> PacketName {
        match self {
            Packet::SLogin(_) => PacketName::SLogin,
            Packet::SLoadTopo(_) => PacketName::SLoadTopo,
            Packet::SSpawnMe(_) => PacketName::SSpawnMe,
            Packet::SCreatureLife(_) => PacketName::SCreatureLife,
            Packet::SCreatureChangeHp(_) => PacketName::SCreatureChangeHp,
            Packet::SPlayerStatUpdate(_) => PacketName::SPlayerStatUpdate,
            Packet::SSpawnUser(_) => PacketName::SSpawnUser,
            Packet::SSpawnNpc(_) => PacketName::SSpawnNpc,
            Packet::SDespawn(_) => PacketName::SDespawn,
            Packet::SUserLocation(_) => PacketName::SUserLocation,
            Packet::SNpcLocation(_) => PacketName::SNpcLocation,
            Packet::SInstantMove(_) => PacketName::SInstantMove,
            Packet::SActionStage(_) => PacketName::SActionStage,
            Packet::SActionEnd(_) => PacketName::SActionEnd,
            Packet::SEachSkillResult(_) => PacketName::SEachSkillResult,
            Packet::SStartCooltimeSkill(_) => PacketName::SStartCooltimeSkill,
            Packet::SDecreaseCooltimeSkill(_) => PacketName::SDecreaseCooltimeSkill,
            Packet::SCrestMessage(_) => PacketName::SCrestMessage,
            Packet::SCrestInfo(_) => PacketName::SCrestInfo,
            Packet::SCrestApply(_) => PacketName::SCrestApply,
            Packet::SAbnormalityBegin(_) => PacketName::SAbnormalityBegin,
            Packet::SAbnormalityRefresh(_) => PacketName::SAbnormalityRefresh,
            Packet::SAbnormalityEnd(_) => PacketName::SAbnormalityEnd,
            Packet::SHoldAbnormalityAdd(_) => PacketName::SHoldAbnormalityAdd,
            Packet::SHoldAbnormalityDel(_) => PacketName::SHoldAbnormalityDel,
            Packet::SGrantSkill(_) => PacketName::SGrantSkill,
            Packet::SConnectSkillArrow(_) => PacketName::SConnectSkillArrow,
            Packet::SCanLockonTarget(_) => PacketName::SCanLockonTarget,
            Packet::SCannotStartSkill(_) => PacketName::SCannotStartSkill,
            Packet::SDefendSuccess(_) => PacketName::SDefendSuccess,
            Packet::SMountVehicle(_) => PacketName::SMountVehicle,
            Packet::SUnmountVehicle(_) => PacketName::SUnmountVehicle,
            Packet::SResponseGamestatPong(_) => PacketName::SResponseGamestatPong,
            Packet::SChat(_) => PacketName::SChat,
            Packet::SPartyMemberList(_) => PacketName::SPartyMemberList,
            Packet::SLeaveParty(_) => PacketName::SLeaveParty,
            Packet::SSkillCategory(_) => PacketName::SSkillCategory,
            Packet::SLoadEpPerkInfo(_) => PacketName::SLoadEpPerkInfo,
            Packet::SSkillPolishingList(_) => PacketName::SSkillPolishingList,
            Packet::SArmorRollList(_) => PacketName::SArmorRollList,
            Packet::SkillStart(p) => p.name,
            Packet::CCancelSkill(_) => PacketName::CCancelSkill,
            Packet::CPlayerLocation(_) => PacketName::CPlayerLocation,
            Packet::CNotifyLocationInAction(_) => PacketName::CNotifyLocationInAction,
            Packet::CCanLockonTarget(_) => PacketName::CCanLockonTarget,
            Packet::CChat(_) => PacketName::CChat,
            Packet::CRequestGamestatPing(_) => PacketName::CRequestGamestatPing,
        }
    }

    pub fn direction(&self) -> Direction {
        self.name().direction()
    }
}

/// A packet travelling through the hook pipeline.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    pub name: PacketName,
    /// True when this packet was synthesized locally rather than received
    /// over the wire.
    pub fake: bool,
    /// Set once any subscriber suppressed the packet. Later subscribers
    /// still run, but delivery is off.
    pub silenced: bool,
    pub packet: Packet,
    pub received_at: i64,
}

impl PacketEvent {
    pub fn real(packet: Packet, received_at: i64) -> Self {
        Self {
            name: packet.name(),
            fake: false,
            silenced: false,
            packet,
            received_at,
        }
    }

    pub fn fake(packet: Packet, received_at: i64) -> Self {
        Self {
            name: packet.name(),
            fake: true,
            silenced: false,
            packet,
            received_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_direction() {
        assert_eq!(PacketName::SActionStage.direction(), Direction::ToClient);
        assert_eq!(PacketName::CStartSkill.direction(), Direction::ToServer);
    }

    #[test]
    fn test_name_round_trip() {
        for name in ALL_NAMES {
            assert_eq!(PacketName::from_str(name.as_str()), Some(name));
        }
    }

    #[test]
    fn test_action_stage_wire_round_trip() {
        let pkt = SActionStage {
            game_id: 0xAABB_CCDD_0011_2233,
            loc: Vec3::new(100.0, 200.0, 8.0),
            w: 1.5,
            template_id: 10101,
            skill: 200200,
            stage: 0,
            speed: 1.1,
            effect_scale: 1.0,
            moving: false,
            dest: Vec3::ZERO,
            target: 0,
            action_id: 77,
            anim_seq: vec![AnimSeq { duration: 500, distance: 150.0 }],
        };
        let mut w = WireWriter::new();
        pkt.encode(&mut w);
        let bytes = w.into_bytes();
        let got = SActionStage::decode(&mut WireReader::new(&bytes)).unwrap();
        assert_eq!(got, pkt);
    }

    #[test]
    fn test_skill_start_dedup_string_ignores_position() {
        let mut a = CStartSkill {
            skill: 200200,
            loc: Vec3::new(1.0, 2.0, 3.0),
            w: 0.4,
            ..Default::default()
        };
        let b = CStartSkill {
            skill: 200200,
            loc: Vec3::new(9.0, 9.0, 9.0),
            w: 2.2,
            ..Default::default()
        };
        assert_eq!(a.dedup_string(), b.dedup_string());
        a.press = true;
        assert_ne!(a.dedup_string(), b.dedup_string());
    }

    #[test]
    fn test_skill_start_keeps_kind_name() {
        let p = Packet::SkillStart(CStartSkill {
            name: PacketName::CPressSkill,
            ..Default::default()
        });
        assert_eq!(p.name(), PacketName::CPressSkill);
    }
}
