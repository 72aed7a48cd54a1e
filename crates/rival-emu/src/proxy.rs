// proxy.rs -- the interceptor root
//
// Owns every store, the hook pipeline, the timer queue and the outbound
// delivery buffer. The host feeds wire packets through `process_real` and
// pumps time through `tick`; everything else happens inside the pipeline.
//
// Handlers are plain function pointers over `&mut Rival`, so a dispatch
// snapshot is a cheap copy and synthetic sends may recurse freely. Write
// discipline is the load-bearing rule here: each store mutates only from
// its own subscriptions, and the emulation engine only ever writes
// outbound packets and timers.

use rival_common::codec::Codec;
use rival_common::hooks::{FakeFilter, HookFlow, HookList, ORDER_MODIFY, ORDER_MODIFY_INTERNAL,
    ORDER_READ_DEST, ORDER_READ_REAL};
use rival_common::packets::{Direction, Packet, PacketEvent, PacketName};
use rival_common::settings::Settings;
use rival_common::timer::TimerQueue;

use rival_game::action::ActionTracker;
use rival_game::cooldown::CooldownLedger;
use rival_game::data::GameData;
use rival_game::effects::Effects;
use rival_game::entity_list::EntityList;
use rival_game::last_packets::LastPackets;
use rival_game::ping::PingMeter;
use rival_game::player::Player;
use rival_game::position::PositionTracker;
use rival_game::skills::{CastContext, SkillMeta};

use crate::abnorm::{self, AbnormScheduler};
use crate::crowd_control::{self, CrowdControl};
use crate::debug_log::DebugLog;
use crate::desync;
use crate::emulate::{self, Emulation};
use crate::lockon::{self, LockonManager};
use crate::shell::{self, Shell};
use crate::smooth_block;
use crate::task::Task;
use crate::tracker;

pub type HookFn = fn(&mut Rival, &mut PacketEvent) -> HookFlow;

/// Hook owner tags, one per component, so teardown can drop a component's
/// subscriptions wholesale.
pub const OWNER_TRACKER: u32 = 1;
pub const OWNER_EMU: u32 = 2;
pub const OWNER_ABNORM: u32 = 3;
pub const OWNER_CC: u32 = 4;
pub const OWNER_DESYNC: u32 = 5;
pub const OWNER_LOCKON: u32 = 6;
pub const OWNER_SMOOTH: u32 = 7;
pub const OWNER_SHELL: u32 = 8;
pub const OWNER_PING: u32 = 9;

const ALL_OWNERS: [u32; 9] = [
    OWNER_TRACKER,
    OWNER_EMU,
    OWNER_ABNORM,
    OWNER_CC,
    OWNER_DESYNC,
    OWNER_LOCKON,
    OWNER_SMOOTH,
    OWNER_SHELL,
    OWNER_PING,
];

/// A packet that survived the pipeline, ready for its socket.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub dir: Direction,
    pub event: PacketEvent,
}

pub struct Rival {
    pub now: i64,
    pub settings: Settings,
    pub codec: Codec,
    pub pipeline: HookList<PacketName, HookFn>,
    pub timers: TimerQueue<Task>,
    deliveries: Vec<Delivery>,

    // state stores
    pub data: GameData,
    pub entities: EntityList,
    pub player: Player,
    pub effects: Effects,
    pub last: LastPackets,
    pub action: ActionTracker,
    pub cooldowns: CooldownLedger,
    pub position: PositionTracker,
    pub ping: PingMeter,
    pub skills: SkillMeta,

    // interceptor components
    pub emu: Emulation,
    pub abnorm: AbnormScheduler,
    pub cc: CrowdControl,
    pub lockon: LockonManager,
    pub shell: Shell,
    pub debug: DebugLog,
}

impl Rival {
    pub fn new(settings: Settings, codec: Codec) -> Self {
        let ping = PingMeter::new(settings.ping.samples, settings.ping.timeout_ms);
        let mut rival = Self {
            now: 0,
            settings,
            codec,
            pipeline: HookList::new(),
            timers: TimerQueue::new(),
            deliveries: Vec::new(),
            data: GameData::new(),
            entities: EntityList::new(),
            player: Player::new(),
            effects: Effects::new(),
            last: LastPackets::new(),
            action: ActionTracker::new(),
            cooldowns: CooldownLedger::new(),
            position: PositionTracker::new(),
            ping,
            skills: SkillMeta::new(),
            emu: Emulation::new(),
            abnorm: AbnormScheduler::new(),
            cc: CrowdControl::new(),
            lockon: LockonManager::new(),
            shell: Shell::new(),
            debug: DebugLog::new(),
        };
        rival.register_hooks();
        rival
    }

    /// Kick off periodic work. Call once after construction.
    pub fn start(&mut self, now: i64) {
        self.now = now;
        let interval = self.settings.ping.interval_ms;
        self.timers.schedule(now, interval, Task::PingProbe);
    }

    /// Component teardown: after this, no hook executes and no timer fires.
    pub fn destruct(&mut self) {
        for owner in ALL_OWNERS {
            self.pipeline.unhook_owner(owner);
        }
        self.timers = TimerQueue::new();
    }

    // ------------------------------------------------------------
    // Pipeline plumbing
    // ------------------------------------------------------------

    /// Run the pipeline over an event. Returns false when suppressed.
    pub fn dispatch(&mut self, ev: &mut PacketEvent) -> bool {
        let hooks = self.pipeline.matching(ev.name, ev.fake);
        for hook in hooks {
            if let HookFlow::Suppress = hook(self, ev) {
                ev.silenced = true;
            }
        }
        !ev.silenced
    }

    fn process(&mut self, mut ev: PacketEvent) -> bool {
        let delivered = self.dispatch(&mut ev);
        if delivered {
            self.deliveries.push(Delivery { dir: ev.packet.direction(), event: ev });
        }
        self.pump_store_events();
        delivered
    }

    /// Entry point for wire traffic.
    pub fn process_real(&mut self, packet: Packet) -> bool {
        self.process(PacketEvent::real(packet, self.now))
    }

    /// Emit a synthetic packet through the pipeline. Delivery direction
    /// follows the packet name.
    pub fn send_fake(&mut self, packet: Packet) -> bool {
        self.process(PacketEvent::fake(packet, self.now))
    }

    /// Emulation-originated outbound: the re-entrancy guard stays up for
    /// the whole send so the engine never loops through itself.
    pub fn release_outbound(&mut self, packet: Packet) -> bool {
        let prev = self.emu.block_send;
        self.emu.block_send = true;
        let delivered = self.send_fake(packet);
        self.emu.block_send = prev;
        delivered
    }

    pub fn drain_deliveries(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.deliveries)
    }

    // ------------------------------------------------------------
    // Time
    // ------------------------------------------------------------

    /// Advance the clock and run everything that came due.
    pub fn tick(&mut self, now: i64) {
        self.now = now;
        while let Some((_, task)) = self.timers.pop_due(self.now) {
            self.run_task(task);
        }
        self.pump_store_events();
    }

    pub fn next_deadline(&mut self) -> Option<i64> {
        self.timers.next_deadline()
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::ExecuteSkill { exec } => emulate::on_execute_timer(self, exec),
            Task::SkillRetry { exec, attempt } => emulate::skill_retry(self, exec, attempt),
            Task::SendActionStage { exec, skill, stage, continuation } => {
                emulate::send_action_stage(self, exec, skill, stage, continuation)
            }
            Task::ChargeGrant { exec, moving_ab } => emulate::charge_grant(self, exec, moving_ab),
            Task::ReleaseCancel { pkt } => {
                self.release_outbound(Packet::CCancelSkill(pkt));
            }
            Task::AbnormStart { id, source_skill, duration_override } => {
                abnorm::start_abnormality(self, id, source_skill, duration_override)
            }
            Task::AbnormEnd { id, tracked } => abnorm::end_abnormality(self, id, tracked),
            Task::AbnormRevert { id, ending } => abnorm::revert_abnormality_state(self, id, ending),
            Task::ReactionEnd { action_id, skill, loc, w } => {
                crowd_control::reaction_end(self, action_id, skill, loc, w)
            }
            Task::PositionTick { distance } => {
                let now = self.now;
                self.position.step_along(distance, now);
            }
            Task::PingProbe => self.ping_probe(),
            Task::DefenceChain { pkt } => emulate::defence_chain(self, pkt),
        }
    }

    /// Drain store-side event channels. Single consumer by construction.
    fn pump_store_events(&mut self) {
        let reactions = self.action.drain_events();
        for ev in reactions {
            emulate::on_reaction(self, &ev);
            // walk the position through the forced animation
            let mut at = 0i64;
            for step in &ev.anim_seq {
                if step.distance > 0.0 {
                    self.timers.schedule(self.now, at, Task::PositionTick { distance: step.distance });
                }
                at += step.duration as i64;
            }
        }
        for reset in self.cooldowns.drain_events() {
            if self.settings.debug.skills {
                self.debug.push(self.now, format!("cooldown reset: {} (server={})", reset.skill, reset.from_server));
            }
        }
    }

    fn ping_probe(&mut self) {
        self.ping.probe_sent(self.now);
        self.release_outbound(Packet::CRequestGamestatPing(Default::default()));
        let interval = self.settings.ping.interval_ms;
        self.timers.schedule(self.now, interval, Task::PingProbe);
    }

    // ------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------

    pub fn ping_ms(&self) -> i64 {
        self.ping.ping()
    }

    pub fn jitter(&self) -> i64 {
        self.ping.jitter()
    }

    /// Tolerance window for deduplicating emulated against real packets.
    pub fn packet_buffer(&self, offset: i64) -> i64 {
        (2 * self.jitter() + 100).max(120) + offset
    }

    /// Snapshot of everything the skill metadata service resolves against.
    pub fn cast_ctx(&self) -> CastContext<'_> {
        CastContext {
            data: &self.data,
            player: &self.player,
            effects: &self.effects,
            action: &self.action,
            cooldowns: &self.cooldowns,
            skills_enabled: self.settings.enabled && self.settings.skills.enabled,
            recent_defence: self.emu.defence_window_active(self.now, self.ping.ping()),
            now: self.now,
        }
    }

    /// Module-reload state handoff: settings round-trip as JSON.
    pub fn state_snapshot(&self) -> Vec<u8> {
        serde_json::to_vec(&self.settings).unwrap_or_default()
    }

    pub fn restore_state(&mut self, bytes: &[u8]) {
        if let Ok(value) = serde_json::from_slice(bytes) {
            if let Ok(settings) = Settings::from_value(value) {
                self.settings = settings;
            }
        }
    }

    // ------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------

    fn register_hooks(&mut self) {
        use FakeFilter::{Both, Real};
        use PacketName::*;

        fn hook(
            p: &mut HookList<PacketName, HookFn>,
            name: PacketName,
            order: i32,
            fake: FakeFilter,
            owner: u32,
            f: HookFn,
        ) {
            p.hook(name, order, fake, owner, f);
        }
        let p = &mut self.pipeline;

        // --- state trackers ---
        // The server view reads the wire before anything can silence it;
        // the client view reads at the destination stage so it reflects
        // exactly what the client ends up seeing, fakes included.
        hook(p, SActionStage, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_stage_server);
        hook(p, SActionEnd, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_end_server);
        hook(p, SActionStage, ORDER_READ_DEST, Both, OWNER_TRACKER, tracker::on_stage_client);
        hook(p, SActionEnd, ORDER_READ_DEST, Both, OWNER_TRACKER, tracker::on_end_client);
        hook(p, SEachSkillResult, ORDER_READ_DEST, Both, OWNER_TRACKER, tracker::on_result_client);

        hook(p, SLogin, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_login);
        hook(p, SLoadTopo, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_load_topo);
        hook(p, SSpawnMe, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_spawn_me);
        hook(p, SCreatureLife, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_creature_life);
        hook(p, SCreatureChangeHp, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_change_hp);
        hook(p, SPlayerStatUpdate, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_stat_update);
        hook(p, SSpawnUser, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_spawn_user);
        hook(p, SSpawnNpc, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_spawn_npc);
        hook(p, SDespawn, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_despawn);
        hook(p, SUserLocation, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_user_location);
        hook(p, SNpcLocation, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_npc_location);
        hook(p, SInstantMove, ORDER_READ_DEST, Both, OWNER_TRACKER, tracker::on_instant_move);
        hook(p, SStartCooltimeSkill, ORDER_READ_REAL, Both, OWNER_TRACKER, tracker::on_start_cooltime);
        hook(p, SDecreaseCooltimeSkill, ORDER_READ_REAL, Both, OWNER_TRACKER, tracker::on_decrease_cooltime);
        hook(p, SCrestMessage, ORDER_READ_REAL, Both, OWNER_TRACKER, tracker::on_crest_message);
        hook(p, SCrestInfo, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_crest_info);
        hook(p, SCrestApply, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_crest_apply);
        hook(p, SHoldAbnormalityAdd, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_hold_add);
        hook(p, SHoldAbnormalityDel, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_hold_del);
        hook(p, SLoadEpPerkInfo, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_ep_perks);
        hook(p, SSkillPolishingList, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_polishing);
        hook(p, SSkillCategory, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_skill_category);
        hook(p, SArmorRollList, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_armor_rolls);
        hook(p, SPartyMemberList, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_party_list);
        hook(p, SLeaveParty, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_leave_party);
        hook(p, SMountVehicle, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_mount);
        hook(p, SUnmountVehicle, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_unmount);
        hook(p, SAbnormalityBegin, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_abnorm_begin_server);
        hook(p, SAbnormalityRefresh, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_abnorm_refresh_server);
        hook(p, SAbnormalityEnd, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_abnorm_end_server);
        hook(p, SAbnormalityBegin, ORDER_READ_DEST, Both, OWNER_TRACKER, tracker::on_abnorm_begin_client);
        hook(p, SAbnormalityRefresh, ORDER_READ_DEST, Both, OWNER_TRACKER, tracker::on_abnorm_refresh_client);
        hook(p, SAbnormalityEnd, ORDER_READ_DEST, Both, OWNER_TRACKER, tracker::on_abnorm_end_client);
        hook(p, CPlayerLocation, ORDER_READ_DEST, Real, OWNER_TRACKER, tracker::on_player_location_out);
        hook(p, CNotifyLocationInAction, ORDER_READ_DEST, Real, OWNER_TRACKER, tracker::on_notify_location_out);
        for name in [
            CStartSkill,
            CStartTargetedSkill,
            CStartComboInstantSkill,
            CStartInstanceSkill,
            CStartInstanceSkillEx,
            CPressSkill,
            CNotimelineSkill,
        ] {
            hook(p, name, ORDER_READ_REAL, Real, OWNER_TRACKER, tracker::on_skill_start_out);
        }

        // --- ping meter ---
        hook(p, SResponseGamestatPong, ORDER_MODIFY_INTERNAL, Real, OWNER_PING, tracker::on_pong);

        // --- command shell ---
        hook(p, CChat, ORDER_MODIFY_INTERNAL, Real, OWNER_SHELL, shell::on_chat_out);

        // --- smooth block (flag strip) ---
        hook(p, SEachSkillResult, ORDER_MODIFY, Real, OWNER_SMOOTH, smooth_block::on_skill_result);

        // --- crowd control (before emulation on the same packets) ---
        hook(p, SEachSkillResult, ORDER_MODIFY_INTERNAL, Real, OWNER_CC, crowd_control::on_skill_result);
        hook(p, SActionStage, ORDER_MODIFY_INTERNAL, Real, OWNER_CC, crowd_control::on_action_stage);
        hook(p, SActionEnd, ORDER_MODIFY_INTERNAL, Real, OWNER_CC, crowd_control::on_action_end);
        hook(p, SAbnormalityBegin, ORDER_MODIFY_INTERNAL, Real, OWNER_CC, crowd_control::on_abnormality_begin);

        // --- anti-desync (rewrites before the engine holds the packet) ---
        for name in [
            CStartSkill,
            CStartTargetedSkill,
            CStartComboInstantSkill,
            CStartInstanceSkill,
            CStartInstanceSkillEx,
            CPressSkill,
            CNotimelineSkill,
        ] {
            hook(p, name, ORDER_MODIFY_INTERNAL, Real, OWNER_DESYNC, desync::on_skill_start_out);
        }
        hook(p, CPlayerLocation, ORDER_MODIFY_INTERNAL, Real, OWNER_DESYNC, desync::on_player_location_out);
        hook(p, CNotifyLocationInAction, ORDER_MODIFY_INTERNAL, Real, OWNER_DESYNC, desync::on_notify_location_out);

        // --- lockon ---
        hook(p, SCanLockonTarget, ORDER_MODIFY, Real, OWNER_LOCKON, lockon::on_can_lockon_server);
        hook(p, CCanLockonTarget, ORDER_MODIFY, Real, OWNER_LOCKON, lockon::on_can_lockon_client);

        // --- the emulation engine ---
        for name in [
            CStartSkill,
            CStartTargetedSkill,
            CStartComboInstantSkill,
            CStartInstanceSkill,
            CStartInstanceSkillEx,
            CPressSkill,
            CNotimelineSkill,
        ] {
            hook(p, name, ORDER_MODIFY, Real, OWNER_EMU, emulate::on_skill_start);
        }
        hook(p, CCancelSkill, ORDER_MODIFY, Real, OWNER_EMU, emulate::on_cancel_skill);
        hook(p, CNotifyLocationInAction, ORDER_MODIFY, Real, OWNER_EMU, emulate::on_notify_location);
        hook(p, SActionStage, ORDER_MODIFY, Real, OWNER_EMU, emulate::on_action_stage_real);
        hook(p, SActionEnd, ORDER_MODIFY, Real, OWNER_EMU, emulate::on_action_end_real);
        hook(p, SGrantSkill, ORDER_MODIFY, Real, OWNER_EMU, emulate::on_grant_skill_real);
        hook(p, SConnectSkillArrow, ORDER_MODIFY, Real, OWNER_EMU, emulate::on_connect_arrow_real);
        hook(p, SDefendSuccess, ORDER_MODIFY, Real, OWNER_EMU, emulate::on_defend_success);
        hook(p, SCreatureLife, ORDER_MODIFY, Real, OWNER_EMU, emulate::on_creature_life_death);
        hook(p, SCannotStartSkill, ORDER_MODIFY, Real, OWNER_EMU, emulate::on_cannot_start_skill);

        // --- abnormality scheduler ---
        hook(p, SAbnormalityBegin, ORDER_MODIFY, Real, OWNER_ABNORM, abnorm::on_begin_real);
        hook(p, SAbnormalityRefresh, ORDER_MODIFY, Real, OWNER_ABNORM, abnorm::on_refresh_real);
        hook(p, SAbnormalityEnd, ORDER_MODIFY, Real, OWNER_ABNORM, abnorm::on_end_real);
        hook(p, SActionStage, ORDER_READ_DEST, Both, OWNER_ABNORM, abnorm::on_stage_client);
        hook(p, SActionEnd, ORDER_READ_DEST, Both, OWNER_ABNORM, abnorm::on_end_client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rival_common::geom::Vec3;
    use rival_common::packets::*;
    use rival_game::data::{AbnormalityDef, GameDataFile, SkillTemplate, StageDef};

    const ME: u64 = 0x10;

    fn template(id: u32, stage_ms: i32) -> SkillTemplate {
        SkillTemplate {
            id,
            stages: vec![StageDef { duration_ms: stage_ms, ..Default::default() }],
            cooldown_ms: 5000,
            ..Default::default()
        }
    }

    fn rival_ready(skills: Vec<SkillTemplate>, abnormalities: Vec<AbnormalityDef>) -> Rival {
        let mut settings = Settings::default();
        // retries are covered by their own test; keep the base scenarios quiet
        settings.emulation.enable_predictive_retries = false;
        let mut r = Rival::new(settings, Codec::new(100, None));
        r.data.load(GameDataFile { skills, abnormalities, npcs: vec![] });
        r.process_real(Packet::SLogin(SLogin {
            game_id: ME,
            server_id: 1,
            player_id: 7,
            template_id: 10101,
            level: 65,
            name: "Seris".into(),
        }));
        r.process_real(Packet::SSpawnMe(SSpawnMe {
            game_id: ME,
            loc: Vec3::ZERO,
            w: 0.0,
            alive: true,
        }));
        r.drain_deliveries();
        r
    }

    /// Three samples: min 70, avg 80, max 90, jitter 10.
    fn seed_ping(r: &mut Rival) {
        for (i, rtt) in [70i64, 80, 90].into_iter().enumerate() {
            let t = i as i64 * 1000;
            r.ping.probe_sent(t);
            r.ping.pong_received(t + rtt);
        }
    }

    fn start_request(skill: u32, loc: Vec3) -> Packet {
        Packet::SkillStart(CStartSkill { skill, loc, ..Default::default() })
    }

    fn to_server(deliveries: &[Delivery]) -> Vec<&Delivery> {
        deliveries.iter().filter(|d| d.dir == Direction::ToServer).collect()
    }

    fn stages(deliveries: &[Delivery]) -> Vec<&SActionStage> {
        deliveries
            .iter()
            .filter_map(|d| match &d.event.packet {
                Packet::SActionStage(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn ends(deliveries: &[Delivery]) -> Vec<&SActionEnd> {
        deliveries
            .iter()
            .filter_map(|d| match &d.event.packet {
                Packet::SActionEnd(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    // S1: instant skill, server confirms
    #[test]
    fn test_instant_skill_emulated_and_server_confirmation_suppressed() {
        let mut r = rival_ready(vec![template(200200, 500)], vec![]);
        seed_ping(&mut r);
        r.tick(0);

        let delivered = r.process_real(start_request(200200, Vec3::ZERO));
        assert!(!delivered, "the original request must be held");
        assert!(to_server(&r.drain_deliveries()).is_empty(), "nothing released yet");

        // jitter(10) + SKILL_RETRY_MS(2)
        r.tick(15);
        let deliveries = r.drain_deliveries();
        let out = to_server(&deliveries);
        assert_eq!(out.len(), 1, "outbound released once within 15ms");
        let st = stages(&deliveries);
        assert_eq!(st.len(), 1);
        assert_eq!(st[0].skill, 200200);
        assert_eq!(st[0].stage, 0);
        assert!(r.action.in_action);

        // the server's own stage arrives a round trip later: no duplicate
        r.tick(160);
        let delivered = r.process_real(Packet::SActionStage(SActionStage {
            game_id: ME,
            skill: 200200,
            stage: 0,
            action_id: 9000,
            ..Default::default()
        }));
        assert!(!delivered, "matching server stage is suppressed");
        assert!(r.action.in_action_server);

        // terminal end after the 500ms stage
        r.tick(600);
        let deliveries = r.drain_deliveries();
        let en = ends(&deliveries);
        assert_eq!(en.len(), 1);
        assert_eq!(en[0].end_type, 0);
        assert!(!r.action.in_action);
    }

    // S2: cooldown veto
    #[test]
    fn test_cooldown_veto_refuses_without_side_effects() {
        let mut r = rival_ready(vec![template(359076, 400)], vec![]);
        r.tick(0);
        r.process_real(Packet::SStartCooltimeSkill(SStartCooltimeSkill {
            skill: 359076,
            cooldown_ms: 5000,
            ..Default::default()
        }));
        r.drain_deliveries();

        r.tick(500);
        let delivered = r.process_real(start_request(359076, Vec3::ZERO));
        assert!(!delivered);
        let deliveries = r.drain_deliveries();
        assert!(to_server(&deliveries).is_empty(), "no outbound");
        assert!(stages(&deliveries).is_empty(), "no animation");
        let refusals: Vec<_> = deliveries
            .iter()
            .filter_map(|d| match &d.event.packet {
                Packet::SCannotStartSkill(p) => Some(p.skill),
                _ => None,
            })
            .collect();
        assert_eq!(refusals, vec![359076]);
        // the ledger entry is untouched
        let entry = r.cooldowns.entry(359076).unwrap();
        assert_eq!(entry.start_time, 0);
        assert_eq!(entry.cooldown_ms, 5000);
        // and nothing fires later
        r.tick(1000);
        assert!(stages(&r.drain_deliveries()).is_empty());
    }

    // S3: multi-stage group cooldown
    #[test]
    fn test_group_cooldown_vetoes_family_member() {
        let mut first = template(200100, 400);
        first.next_skill = 200101;
        let mut second = template(200102, 400);
        second.next_skill = 200103;
        let mut r = rival_ready(vec![first, second], vec![]);
        r.tick(0);
        r.process_real(Packet::SStartCooltimeSkill(SStartCooltimeSkill {
            skill: 200100,
            cooldown_ms: 3000,
            ..Default::default()
        }));
        r.drain_deliveries();

        r.tick(100);
        assert!(r.cooldowns.is_on_cooldown(200102, 200102, &r.data, None, 100));
        let delivered = r.process_real(start_request(200102, Vec3::ZERO));
        assert!(!delivered);
        let deliveries = r.drain_deliveries();
        assert!(to_server(&deliveries).is_empty());
        assert!(deliveries
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::SCannotStartSkill(p) if p.skill == 200102)));
    }

    // S4: reaction cancels the running action, early-ends, and dedups
    #[test]
    fn test_reaction_preempts_and_suppresses_real_end() {
        let mut r = rival_ready(vec![template(101100, 600)], vec![]);
        seed_ping(&mut r);
        r.tick(0);
        r.process_real(start_request(101100, Vec3::ZERO));
        r.tick(15);
        r.drain_deliveries();
        assert!(r.action.in_action);

        let t0 = 100;
        r.tick(t0);
        r.process_real(Packet::SEachSkillResult(SEachSkillResult {
            source: 2,
            target: ME,
            skill: 999,
            action_id: 50,
            reaction: Reaction {
                enable: true,
                push: false,
                air: false,
                anim_seq: vec![AnimSeq { duration: 800, distance: 0.0 }],
            },
            ..Default::default()
        }));
        let deliveries = r.drain_deliveries();
        let en = ends(&deliveries);
        assert_eq!(en.len(), 1, "the running action ends immediately");
        assert_eq!(en[0].skill, 101100);

        // pre-emptive end at duration - ping
        r.tick(t0 + 800 - 80);
        let deliveries = r.drain_deliveries();
        let en = ends(&deliveries);
        assert_eq!(en.len(), 1);
        assert_eq!(en[0].action_id, 50);
        assert_eq!(en[0].end_type, 0);

        // the real end for the same reaction is swallowed
        let delivered = r.process_real(Packet::SActionEnd(SActionEnd {
            game_id: ME,
            action_id: 50,
            skill: 999,
            ..Default::default()
        }));
        assert!(!delivered);
    }

    // S5: abnormality reversion when the server never confirms
    #[test]
    fn test_abnormality_reversion_cancels_unconfirmed_start() {
        let mut r = rival_ready(
            vec![template(200200, 500)],
            vec![AbnormalityDef { id: 103104, time_ms: 5000, ..Default::default() }],
        );
        r.tick(0);
        crate::abnorm::start_abnormality(&mut r, 103104, 200200, None);
        let deliveries = r.drain_deliveries();
        assert!(deliveries
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::SAbnormalityBegin(p) if p.id == 103104)));
        assert!(r.effects.has(rival_game::effects::View::Client, 103104));

        // no server confirmation arrives; the probe fires and reverts
        r.tick(400);
        let deliveries = r.drain_deliveries();
        assert!(deliveries
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::SAbnormalityEnd(p) if p.id == 103104)));
        assert!(!r.effects.has(rival_game::effects::View::Client, 103104));

        // the 5000ms end timer was detached with the reversion
        r.tick(6000);
        assert!(!r
            .drain_deliveries()
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::SAbnormalityEnd(_))));
    }

    // S6: anti-desync rewrites the outbound start location
    #[test]
    fn test_desync_rewrites_outbound_skill_location() {
        let mut r = rival_ready(vec![template(100, 500)], vec![]);
        r.tick(0);
        // server believes we are mid-skill, displaced 150 along w=0
        r.process_real(Packet::SActionStage(SActionStage {
            game_id: ME,
            loc: Vec3::ZERO,
            w: 0.0,
            skill: 100,
            stage: 0,
            anim_seq: vec![AnimSeq { duration: 500, distance: 150.0 }],
            ..Default::default()
        }));
        r.drain_deliveries();
        r.position.update(Vec3::new(200.0, 0.0, 0.0), 0.0, 0);

        r.process_real(start_request(100, Vec3::new(300.0, 0.0, 0.0)));
        r.tick(50);
        let deliveries = r.drain_deliveries();
        let out = to_server(&deliveries);
        assert_eq!(out.len(), 1);
        if let Packet::SkillStart(p) = &out[0].event.packet {
            assert!((p.loc.x - 150.0).abs() < 1e-3, "rewritten to the server expectation");
        } else {
            unreachable!();
        }
    }

    #[test]
    fn test_duplicate_press_refused_while_pending() {
        let mut r = rival_ready(vec![template(200200, 500)], vec![]);
        seed_ping(&mut r);
        r.tick(0);
        r.process_real(start_request(200200, Vec3::ZERO));
        r.drain_deliveries();
        // identical press while the first is still scheduled
        let delivered = r.process_real(start_request(200200, Vec3::ZERO));
        assert!(!delivered);
        let deliveries = r.drain_deliveries();
        assert!(deliveries
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::SCannotStartSkill(_))));
        // still exactly one release
        r.tick(100);
        assert_eq!(to_server(&r.drain_deliveries()).len(), 1);
    }

    #[test]
    fn test_predictive_retry_rereleases() {
        let mut settings = Settings::default();
        settings.skills.retry_count = 2;
        settings.skills.retry_ms = 30;
        let mut r = Rival::new(settings, Codec::new(100, None));
        r.data.load(GameDataFile {
            skills: vec![template(200200, 500)],
            abnormalities: vec![],
            npcs: vec![],
        });
        r.process_real(Packet::SLogin(SLogin {
            game_id: ME,
            template_id: 10101,
            ..Default::default()
        }));
        r.process_real(Packet::SSpawnMe(SSpawnMe { game_id: ME, alive: true, ..Default::default() }));
        r.drain_deliveries();
        r.tick(0);
        r.process_real(start_request(200200, Vec3::ZERO));
        r.tick(200);
        let releases = to_server(&r.drain_deliveries()).len();
        assert!(releases >= 2, "retries re-release the outbound, saw {}", releases);
        assert!(releases <= 3, "bounded by retry count, saw {}", releases);
    }

    #[test]
    fn test_cancel_emits_end_and_defers_outbound() {
        let mut r = rival_ready(vec![template(200200, 5000)], vec![]);
        seed_ping(&mut r);
        r.tick(0);
        r.process_real(start_request(200200, Vec3::ZERO));
        r.tick(15);
        r.drain_deliveries();
        assert!(r.action.in_action);

        r.tick(100);
        let delivered = r.process_real(Packet::CCancelSkill(CCancelSkill {
            skill: 200200,
            end_type: 2,
        }));
        assert!(!delivered);
        let deliveries = r.drain_deliveries();
        let en = ends(&deliveries);
        assert_eq!(en.len(), 1);
        assert_eq!(en[0].end_type, 2);
        assert!(to_server(&deliveries).is_empty(), "cancel waits out the jitter");
        r.tick(200);
        let deliveries = r.drain_deliveries();
        assert!(deliveries
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::CCancelSkill(_))));
    }

    #[test]
    fn test_death_ends_emulated_action() {
        let mut r = rival_ready(vec![template(200200, 5000)], vec![]);
        r.tick(0);
        r.process_real(start_request(200200, Vec3::ZERO));
        r.tick(15);
        r.drain_deliveries();
        assert!(r.action.in_action);
        r.process_real(Packet::SCreatureLife(SCreatureLife {
            target: ME,
            alive: false,
            loc: Vec3::ZERO,
        }));
        let deliveries = r.drain_deliveries();
        let en = ends(&deliveries);
        assert_eq!(en.len(), 1);
        assert_eq!(en[0].end_type, 699);
        assert!(!r.action.in_action);
    }

    #[test]
    fn test_charge_skill_grants_and_buffers() {
        let mut base = template(300100, 1200);
        base.grant_skill = 300130;
        let granted = template(300130, 400);
        let mut r = rival_ready(vec![base, granted], vec![]);
        r.tick(0);
        r.process_real(start_request(300100, Vec3::ZERO));
        r.tick(20);
        let deliveries = r.drain_deliveries();
        assert!(deliveries
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::SGrantSkill(p) if p.skill == 300130)));
        assert!(to_server(&deliveries).is_empty(), "original held until release");
        assert!(r.emu.pending_start_skill.is_some());

        // inbound real grant inside the window is ours already
        let delivered = r.process_real(Packet::SGrantSkill(SGrantSkill { skill: 300130 }));
        assert!(!delivered);

        // the client answers the grant: buffered outbound flushes first
        r.process_real(start_request(300100, Vec3::ZERO));
        r.tick(100);
        let out = r.drain_deliveries();
        assert!(to_server(&out).len() >= 2, "buffered start plus the release");
        assert!(r.emu.pending_start_skill.is_none());
    }

    #[test]
    fn test_grant_window_expires() {
        let mut r = rival_ready(vec![template(200200, 500)], vec![]);
        r.tick(0);
        r.emu.grant_skill_until = 50;
        r.tick(100);
        let delivered = r.process_real(Packet::SGrantSkill(SGrantSkill { skill: 1 }));
        assert!(delivered, "outside the window the real grant passes");
    }

    // invariant 6: nothing owned by a destructed component runs
    #[test]
    fn test_destruct_detaches_hooks_and_timers() {
        let mut r = rival_ready(vec![template(200200, 500)], vec![]);
        r.tick(0);
        r.process_real(start_request(200200, Vec3::ZERO));
        r.drain_deliveries();
        r.destruct();
        r.tick(10_000);
        assert!(r.drain_deliveries().is_empty(), "no timer fired after destruct");
        // hooks are gone: the same request now passes straight through
        let delivered = r.process_real(start_request(200200, Vec3::ZERO));
        assert!(delivered);
    }

    // invariant 7: an engine-originated outbound never re-enters the engine
    #[test]
    fn test_release_does_not_recurse() {
        let mut r = rival_ready(vec![template(200200, 500)], vec![]);
        r.tick(0);
        r.process_real(start_request(200200, Vec3::ZERO));
        r.tick(100);
        let deliveries = r.drain_deliveries();
        assert_eq!(to_server(&deliveries).len(), 1);
        assert_eq!(stages(&deliveries).len(), 1, "one execution, one animation");
        assert_eq!(r.emu.counter, 0);
    }

    // invariant 1: synthetic stages reach the client in the same pump
    #[test]
    fn test_synthetic_stage_delivered_immediately() {
        let mut r = rival_ready(vec![template(200200, 500)], vec![]);
        r.tick(0);
        r.process_real(start_request(200200, Vec3::ZERO));
        r.tick(2);
        let deliveries = r.drain_deliveries();
        let st = stages(&deliveries);
        assert_eq!(st.len(), 1);
        assert!(st[0].action_id >= 1_000_000, "synthetic action id space");
    }

    #[test]
    fn test_interrupt_on_unknown_server_skill() {
        let mut r = rival_ready(vec![template(200200, 5000)], vec![]);
        r.tick(0);
        r.process_real(start_request(200200, Vec3::ZERO));
        r.tick(15);
        r.drain_deliveries();
        assert!(r.action.in_action);
        // a skill outside our data: we stop emulating and let it through
        let delivered = r.process_real(Packet::SActionStage(SActionStage {
            game_id: ME,
            skill: 999999,
            stage: 0,
            ..Default::default()
        }));
        assert!(delivered);
        let deliveries = r.drain_deliveries();
        let en = ends(&deliveries);
        assert_eq!(en.len(), 1);
        assert_eq!(en[0].end_type, 60);
    }
}
