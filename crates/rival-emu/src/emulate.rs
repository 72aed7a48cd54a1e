// emulate.rs -- the skill emulation state machine
//
// Holds outbound skill starts, plays the authoritative response locally
// (stages, ends, grants, arrows), releases the original with a computed
// delay, retries releases the server ignored, and reconciles the inbound
// truth against the prediction. Everything time-shaped here is a task on
// the proxy's timer queue; a bumped execution generation kills stale
// continuations.

use std::collections::HashMap;

use rival_common::geom::Vec3;
use rival_common::packets::{
    AnimSeq, CStartSkill, Packet, PacketEvent, PacketName, SActionEnd, SActionStage,
    SCannotStartSkill, SConnectSkillArrow, SGrantSkill, SInstantMove,
};
use rival_common::ring::Ring;
use rival_common::skill_id::SkillId;
use rival_common::timer::TimerHandle;

use rival_game::action::ReactionEvent;
use rival_game::data::SkillType;
use rival_game::skills::{
    is_excluded_cast_error, CastOptions, NewSkillData, CAST_COOLDOWN, CAST_FUTURE,
    CAST_PRESS_SPECIAL,
};

use rival_common::hooks::HookFlow;

use crate::desync;
use crate::proxy::Rival;
use crate::task::Task;

/// Safety margin added to every computed outbound delay.
pub const SKILL_RETRY_MS: i64 = 2;

const HISTORY_CAPACITY: usize = 500;

const END_TYPE_CHAIN_CANCEL: i32 = 4;
const END_TYPE_MOVING_CHARGE_HANDOFF: i32 = 6;
const END_TYPE_REACTION: i32 = 9;
const END_TYPE_RAPID_FIRE: i32 = 25;
const END_TYPE_INSTANT_MOVE_EXEMPT: i32 = 28;
const END_TYPE_DASH: i32 = 39;
const END_TYPE_INTERRUPT: i32 = 60;
const END_TYPE_DEATH: i32 = 699;

/// Server end types the client accepts as-is during an emulated action.
const ACCEPTED_END_TYPES: [i32; 12] = [0, 1, 2, 3, 4, 5, 6, 10, 11, 34, 36, 51];

/// Abnormality kind converting a moving charge into its terminal stage.
const MOVING_CHARGE_CONVERT_KIND: i32 = 327;

/// Retries keep going while the request sits this deep inside the future
/// window.
const FUTURE_RETRY_WINDOW_MS: i64 = -25;

const ARCHER_CLASS: u32 = 7;

fn class_of(template_id: u32) -> u32 {
    (template_id % 100).saturating_sub(1)
}

#[derive(Debug, Clone, Copy)]
pub struct SkillHistory {
    pub delay: i64,
    pub jitter: i64,
    pub excess_time: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct EmulatedEnd {
    pub end_type: i32,
    pub skill: u32,
    pub at: i64,
}

#[derive(Debug, Clone)]
struct ExecState {
    pkt: CStartSkill,
    opts: CastOptions,
    sig: (SkillType, u32, bool),
    started_at: i64,
    emitted_action_id: Option<u32>,
    moving_ab: bool,
}

#[derive(Debug)]
pub struct Emulation {
    pub expected_skill_id: u32,
    pub expected_end_type: i32,
    /// Skill-time tracker: when the last request arrived and when its
    /// execution is projected to run.
    pub arrived: i64,
    pub estimate: i64,
    pub counter: u32,
    /// Re-entrancy guard: emulation-originated sends skip the engine.
    pub block_send: bool,
    pub action_stage_timeout: Option<TimerHandle>,
    pub last_move_location: Option<Vec3>,
    pub connect_skill_arrow_until: i64,
    pub grant_skill_until: i64,
    pub is_charging: bool,
    pub last_skill_string: Option<String>,
    pub pending_start_skill: Option<CStartSkill>,
    pub history: Ring<SkillHistory>,
    pub last_defend: Option<(u32, i64)>,
    pub last_emulated_end: Option<EmulatedEnd>,
    execs: HashMap<u64, ExecState>,
    next_exec: u64,
}

impl Default for Emulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulation {
    pub fn new() -> Self {
        Self {
            expected_skill_id: 0,
            expected_end_type: 0,
            arrived: 0,
            estimate: 0,
            counter: 0,
            block_send: false,
            action_stage_timeout: None,
            last_move_location: None,
            connect_skill_arrow_until: 0,
            grant_skill_until: 0,
            is_charging: false,
            last_skill_string: None,
            pending_start_skill: None,
            history: Ring::new(HISTORY_CAPACITY),
            last_defend: None,
            last_emulated_end: None,
            execs: HashMap::new(),
            next_exec: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn new_exec(&mut self, state: ExecState) -> u64 {
        let id = self.next_exec;
        self.next_exec += 1;
        self.execs.insert(id, state);
        // executions more than a handful of requests old have no live
        // continuations left
        let floor = id.saturating_sub(32);
        self.execs.retain(|&k, _| k >= floor);
        id
    }

    /// A defence success counts while the half-ping window around it is
    /// still open.
    pub fn defence_window_active(&self, now: i64, ping: i64) -> bool {
        self.last_defend
            .is_some_and(|(_, at)| at + ping / 2 > now - ping / 2)
    }
}

// ------------------------------------------------------------
// The skill-start handler
// ------------------------------------------------------------

pub fn on_skill_start(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SkillStart(p) => p.clone(),
        _ => return HookFlow::Continue,
    };
    let press_packet = ev.name == PacketName::CPressSkill;
    handle_skill_start(rival, pkt, press_packet)
}

pub fn handle_skill_start(rival: &mut Rival, pkt: CStartSkill, press_packet: bool) -> HookFlow {
    // step 1: pass through when guarded, disabled, or the player cannot act
    if rival.emu.block_send
        || !rival.settings.enabled
        || !rival.settings.skills.enabled
        || !rival.data.is_loaded()
        || !rival.player.can_act()
    {
        return HookFlow::Continue;
    }
    let now = rival.now;

    // step 2: resolve the request
    let opts = CastOptions {
        by_grant: rival.emu.grant_skill_until > now,
        press: pkt.press,
        press_packet,
    };
    let (nd, can) = {
        let ctx = rival.cast_ctx();
        let nd = rival.skills.get_new_skill_data(pkt.skill, opts, &ctx);
        (nd, rival.skills.can_cast(&nd, &ctx))
    };

    // chain redirects only play instantly when the operator allows it
    if !opts.by_grant
        && nd.info.id != SkillId::parse(pkt.skill, true).id
        && !rival.settings.emulation.enable_instant_chains
    {
        return HookFlow::Continue;
    }

    // step 3: early cooldown veto
    if cooldown_veto(rival, &nd, can) {
        if rival.settings.debug.skills {
            let msg = rival_common::sysmsg::SystemMessage::new("SMT_SKILL_FAIL_CATEGORY")
                .with("SkillName", &nd.info.id.to_string());
            let line = rival_common::sysmsg::build_system_message(&msg);
            rival.debug.push(now, line);
        }
        rival.send_fake(Packet::SCannotStartSkill(SCannotStartSkill { skill: pkt.skill }));
        return HookFlow::Suppress;
    }

    // step 4: computed outbound delay
    let jitter = if rival.settings.skills.jitter_compensation { rival.jitter() } else { 0 };
    let mut delay = compute_delay(rival, &nd);

    // step 5: slow failures are refused up front
    if rival.settings.skills.delay_on_fail && delay > 100 && nd.failed {
        rival.send_fake(Packet::SCannotStartSkill(SCannotStartSkill { skill: pkt.skill }));
        return HookFlow::Suppress;
    }

    // step 6: duplicate press
    let dedup = pkt.dedup_string();
    if rival.emu.counter > 0 && rival.emu.last_skill_string.as_deref() == Some(dedup.as_str()) {
        rival.send_fake(Packet::SCannotStartSkill(SCannotStartSkill { skill: pkt.skill }));
        return HookFlow::Suppress;
    }

    // step 7: serialize against the previous scheduled execution
    delay = (now + delay).max(rival.emu.estimate + (now - rival.emu.arrived)) - now;

    // step 8: record timing
    rival.emu.arrived = now;
    rival.emu.estimate = now + delay;
    rival.emu.history.push(SkillHistory {
        delay,
        jitter,
        excess_time: nd.time.unwrap_or(0),
    });

    // step 9: run or schedule
    let exec = rival.emu.new_exec(ExecState {
        pkt,
        opts,
        sig: nd.signature(),
        started_at: now,
        emitted_action_id: None,
        moving_ab: false,
    });
    if delay == 0 && rival.emu.counter == 0 {
        execute_skill(rival, exec);
    } else {
        rival.emu.counter += 1;
        rival.timers.schedule(now, delay, Task::ExecuteSkill { exec });
    }

    // step 10
    rival.emu.last_skill_string = Some(dedup);
    HookFlow::Suppress
}

fn cooldown_veto(rival: &Rival, nd: &NewSkillData, can: i32) -> bool {
    if can == CAST_COOLDOWN {
        return true;
    }
    let now = rival.now;
    let info = nd.info;
    let individual = rival
        .cooldowns
        .entry(info.id)
        .is_some_and(|e| now < e.start_time + e.cooldown_ms);
    if individual {
        return true;
    }
    let template = rival.data.skill(info.id);
    let grouped = template.is_some_and(|t| t.is_multi_stage() && !t.kind.is_special());
    if grouped {
        let in_family = match rival.action.current_skill() {
            None => true,
            Some(active) => SkillId::parse(active, true).skill == info.skill,
        };
        if in_family {
            return rival
                .cooldowns
                .group_entry(&info.group_key())
                .is_some_and(|e| now < e.start_time + e.cooldown_ms);
        }
    }
    false
}

fn compute_delay(rival: &Rival, nd: &NewSkillData) -> i64 {
    let mut jitter = if rival.settings.skills.jitter_compensation { rival.jitter() } else { 0 };
    if rival.emu.is_charging {
        jitter = jitter.min(rival.settings.skills.charge_jitter_max);
    }
    let mut delay =
        jitter + rival.settings.packets.queue_throttle_ms + rival.skills.skill_delay(nd.info.id, &rival.data);
    if let Some(t) = nd.time {
        if !rival.emu.is_charging {
            delay -= t;
        }
    } else if let Some(end) = rival.action.end.as_ref() {
        delay -= rival.now - end.received_at;
    }
    delay.max(0) + SKILL_RETRY_MS
}

// ------------------------------------------------------------
// execute_skill and its continuations
// ------------------------------------------------------------

pub fn on_execute_timer(rival: &mut Rival, exec: u64) {
    if rival.emu.counter > 0 {
        rival.emu.counter -= 1;
    }
    execute_skill(rival, exec);
}

pub fn execute_skill(rival: &mut Rival, exec: u64) {
    let state = match rival.emu.execs.get(&exec) {
        Some(s) => s.clone(),
        None => return,
    };
    let now = rival.now;

    // flush the buffered outbound of a charge release
    if let Some(pending) = rival.emu.pending_start_skill.take() {
        rival.release_outbound(Packet::SkillStart(pending));
    }

    // re-derive; state may have moved while we slept
    let (nd, can) = {
        let ctx = rival.cast_ctx();
        let nd = rival.skills.get_new_skill_data(state.pkt.skill, state.opts, &ctx);
        (nd, rival.skills.can_cast(&nd, &ctx))
    };
    if nd.signature() != state.sig {
        let failed_changed = nd.failed != state.sig.2;
        if let Some(s) = rival.emu.execs.get_mut(&exec) {
            s.sig = nd.signature();
        }
        if failed_changed && nd.time.is_some_and(|t| t < 0) {
            rival.send_fake(Packet::SCannotStartSkill(SCannotStartSkill { skill: state.pkt.skill }));
            rival.release_outbound(Packet::SkillStart(state.pkt.clone()));
            return;
        }
        let delay = compute_delay(rival, &nd) - SKILL_RETRY_MS;
        if delay > 0 {
            rival.timers.schedule(now, delay, Task::ExecuteSkill { exec });
            return;
        }
    }

    // a chargeable start is buffered until its release; everything else
    // goes to the server now unless the error class swallows it
    let charge_pending = !state.opts.by_grant
        && rival.data.skill(nd.info.id).is_some_and(|t| t.grant_skill != 0);
    if !charge_pending && !is_excluded_cast_error(can) {
        rival.release_outbound(Packet::SkillStart(state.pkt.clone()));
    }

    // no animation to play
    if !rival.settings.emulation.enable_instant_skills
        || rival.skills.raw_animation_length(nd.info.id, &rival.data) == 0
        || can == CAST_COOLDOWN
    {
        return;
    }
    if can < CAST_PRESS_SPECIAL {
        rival.send_fake(Packet::SCannotStartSkill(SCannotStartSkill { skill: state.pkt.skill }));
        return;
    }
    if can == CAST_PRESS_SPECIAL {
        return;
    }

    let template = match rival.data.skill(nd.info.id) {
        Some(t) => t.clone(),
        None => return,
    };

    // moving charge converted to its terminal stage by an active effect
    let mut charge_stage = 0;
    let mut moving_ab = false;
    if template.kind == SkillType::MovingCharge
        && rival
            .effects
            .category_abnormality_active(nd.info.id, MOVING_CHARGE_CONVERT_KIND, &rival.data)
    {
        charge_stage = template.stage_count().saturating_sub(1) as i32;
        moving_ab = true;
        if let Some(s) = rival.emu.execs.get_mut(&exec) {
            s.moving_ab = true;
        }
    }

    // press release cancelling the running action
    if nd.cancel {
        emit_current_action_end(rival, template.end_type);
        return;
    }

    // connect-arrow skills flip to their arrow form instead of animating
    if template.arrow_skill != 0 {
        rival.emu.connect_skill_arrow_until = now + rival.packet_buffer(0);
        rival.send_fake(Packet::SConnectSkillArrow(SConnectSkillArrow {
            skill: template.arrow_skill,
        }));
        emit_current_action_end(rival, 0);
        return;
    }

    // chargeable: grant, buffer the outbound, await the client's release
    if charge_pending {
        let wait = if moving_ab { 25 } else { 0 };
        rival.timers.schedule(now, wait, Task::ChargeGrant { exec, moving_ab });
        if !moving_ab {
            return;
        }
    }

    // a running action yields to the new one
    if rival.action.in_action {
        let current_kind = rival
            .action
            .current_skill()
            .and_then(|s| rival.data.skill(s))
            .map(|t| t.kind);
        if template.end_type != 0 && current_kind != Some(SkillType::MovingCharge) {
            let end_type = if moving_ab { END_TYPE_MOVING_CHARGE_HANDOFF } else { template.end_type };
            emit_current_action_end(rival, end_type);
        }
    }

    // first synthetic stage
    let stage_delay = rival.skills.stage_delay(nd.info.id, &rival.data);
    if stage_delay == 0 {
        send_action_stage(rival, exec, nd.info.id, charge_stage, false);
    } else {
        rival.timers.schedule(now, stage_delay, Task::SendActionStage {
            exec,
            skill: nd.info.id,
            stage: charge_stage,
            continuation: false,
        });
    }

    // predictive retries
    if rival.settings.emulation.enable_predictive_retries {
        let (count, retry_delay) = retry_params(rival, nd.info.id);
        if count > 0 {
            rival.timers.schedule(now, retry_delay, Task::SkillRetry { exec, attempt: 1 });
        }
    }
}

fn retry_params(rival: &Rival, skill: u32) -> (u32, i64) {
    let template_count = rival.skills.retry_count(skill, &rival.data);
    let count = if template_count > 0 { template_count } else { rival.settings.skills.retry_count };
    let mut delay = if template_count > 0 {
        rival.skills.retry_delay(skill, &rival.data)
    } else {
        rival.settings.skills.retry_ms
    };
    // pad retries against short-term ping variance, capped by settings
    if rival.settings.skills.jitter_compensation {
        delay += rival.jitter().min(rival.settings.skills.retry_jitter_comp);
    }
    (count, delay.max(1))
}

pub fn charge_grant(rival: &mut Rival, exec: u64, moving_ab: bool) {
    let state = match rival.emu.execs.get(&exec) {
        Some(s) => s.clone(),
        None => return,
    };
    let grant = {
        let ctx = rival.cast_ctx();
        let nd = rival.skills.get_new_skill_data(state.pkt.skill, state.opts, &ctx);
        rival.data.skill(nd.info.id).map_or(0, |t| t.grant_skill)
    };
    if grant == 0 {
        return;
    }
    rival.emu.grant_skill_until = rival.now + rival.packet_buffer(0);
    rival.send_fake(Packet::SGrantSkill(SGrantSkill { skill: grant }));
    rival.emu.pending_start_skill = Some(state.pkt);
    if moving_ab {
        rival.emu.is_charging = true;
    }
}

pub fn send_action_stage(rival: &mut Rival, exec: u64, skill: u32, stage: i32, continuation: bool) {
    if let Some(handle) = rival.emu.action_stage_timeout.take() {
        rival.timers.clear(handle);
    }
    let template = match rival.data.skill(skill) {
        Some(t) => t.clone(),
        None => return,
    };
    if continuation {
        // strict clipping demands the running stage is still the one we
        // emitted; the lax mode only asks that some action is live
        let ours = rival
            .action
            .stage
            .as_ref()
            .is_some_and(|s| s.action_id == rival.skills.counter());
        let live = rival.action.in_action
            && (ours || !rival.settings.skills.force_clip_strict);
        if !live {
            return;
        }
    }

    // past the last stage: finish the action
    if stage as usize >= template.stage_count() {
        match template.kind {
            SkillType::MovingCharge => {}
            SkillType::Dash => emit_current_action_end(rival, END_TYPE_DASH),
            _ => emit_current_action_end(rival, 0),
        }
        return;
    }

    let (speed, fx) = {
        let ctx = rival.cast_ctx();
        let speed = rival.skills.get_speed(skill, &ctx);
        let fx = rival.effects.get_applied(skill, &rival.data);
        (speed, fx)
    };
    let def = template.stages[stage as usize];
    let action_id = rival.skills.next_action_id();
    if let Some(s) = rival.emu.execs.get_mut(&exec) {
        s.emitted_action_id = Some(action_id);
    }
    rival.emu.last_move_location = None;
    rival.emu.expected_skill_id = skill;
    rival.emu.expected_end_type = template.end_type;

    let target = rival
        .emu
        .execs
        .get(&exec)
        .map_or(0, |s| s.pkt.target);
    let me = rival.player.game_id;
    let (loc, w) = (rival.position.loc, rival.position.w);
    rival.send_fake(Packet::SActionStage(SActionStage {
        game_id: me,
        loc,
        w,
        template_id: rival.player.template_id,
        skill,
        stage,
        speed: speed.variable,
        effect_scale: fx.effect_scale,
        moving: def.movable,
        dest: Vec3::ZERO,
        target,
        action_id,
        anim_seq: vec![AnimSeq { duration: def.duration_ms, distance: def.distance }],
    }));

    let len = rival.skills.animation_length(skill, stage, &speed, &rival.data);
    if len >= 0 {
        let now = rival.now;
        let handle = rival.timers.schedule(now, len, Task::SendActionStage {
            exec,
            skill,
            stage: stage + 1,
            continuation: true,
        });
        rival.emu.action_stage_timeout = Some(handle);
    }
}

pub fn skill_retry(rival: &mut Rival, exec: u64, attempt: u32) {
    let state = match rival.emu.execs.get(&exec) {
        Some(s) => s.clone(),
        None => return,
    };
    let now = rival.now;

    // past the server answer window there is nothing left to nudge
    if now - state.started_at > rival.settings.skills.server_timeout_ms.max(rival.ping_ms()) {
        return;
    }
    // the server answered this execution: stop
    if let Some(ss) = rival.action.stage_server.as_ref() {
        if ss.stage_time > state.started_at && ss.stage_time - state.started_at >= rival.ping_ms() {
            return;
        }
    }
    // the client moved on to another action: stop
    if let Some(emitted) = state.emitted_action_id {
        let still_ours = rival
            .action
            .stage
            .as_ref()
            .is_some_and(|s| s.action_id == emitted);
        if !still_ours {
            return;
        }
    }

    let (nd, can) = {
        let ctx = rival.cast_ctx();
        let nd = rival.skills.get_new_skill_data(state.pkt.skill, state.opts, &ctx);
        (nd, rival.skills.can_cast(&nd, &ctx))
    };
    let allow_through = rival.skills.allow_through_future_retry(nd.info.id, &rival.data);
    let deep_future = nd.future && nd.time.is_some_and(|t| t <= FUTURE_RETRY_WINDOW_MS);
    if !allow_through && can >= CAST_FUTURE && !deep_future {
        return;
    }

    rival.release_outbound(Packet::SkillStart(state.pkt.clone()));

    let (count, retry_delay) = retry_params(rival, nd.info.id);
    if attempt < count {
        rival.timers.schedule(now, retry_delay, Task::SkillRetry { exec, attempt: attempt + 1 });
    }
}

// ------------------------------------------------------------
// Synthetic ends
// ------------------------------------------------------------

/// End the current client action with `end_type`, correcting position if
/// the server disagrees about where we are.
pub fn emit_current_action_end(rival: &mut Rival, end_type: i32) {
    if !rival.action.in_action {
        return;
    }
    let stage = match rival.action.stage.as_ref() {
        Some(s) => (s.skill, s.action_id),
        None => return,
    };
    let me = rival.player.game_id;
    let w = rival.position.w;
    let mut loc = rival
        .emu
        .last_move_location
        .take()
        .unwrap_or(rival.position.loc);
    if let Some(expected) = desync::check(rival, loc) {
        loc = expected;
        rival.send_fake(Packet::SInstantMove(SInstantMove { game_id: me, loc, w }));
    }
    rival.emu.last_emulated_end = Some(EmulatedEnd { end_type, skill: stage.0, at: rival.now });
    rival.send_fake(Packet::SActionEnd(SActionEnd {
        game_id: me,
        loc,
        w,
        template_id: rival.player.template_id,
        skill: stage.0,
        end_type,
        action_id: stage.1,
    }));
}

// ------------------------------------------------------------
// Inbound reconciliation
// ------------------------------------------------------------

pub fn on_action_stage_real(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SActionStage(p) => p.clone(),
        _ => return HookFlow::Continue,
    };
    if ev.silenced || !rival.player.is_me(pkt.game_id) {
        return HookFlow::Continue;
    }
    let enabled = rival.settings.enabled
        && rival.settings.skills.enabled
        && rival.data.skill(pkt.skill).is_some();
    if !enabled {
        // a skill we do not emulate interrupts whatever we were playing
        if rival.action.in_action {
            emit_current_action_end(rival, END_TYPE_INTERRUPT);
        }
        return HookFlow::Continue;
    }

    // an unchained server restart after a type-4 end: mirror it locally
    if pkt.stage == 0 {
        let chain_break = rival.action.end_server.as_ref().is_some_and(|se| {
            se.end_type == END_TYPE_CHAIN_CANCEL
                && !rival
                    .skills
                    .is_chained(se.skill, se.end_type, pkt.skill, &rival.data)
                && rival
                    .emu
                    .last_emulated_end
                    .map_or(true, |e| e.skill != se.skill || e.end_type != END_TYPE_CHAIN_CANCEL)
        });
        if chain_break {
            emit_current_action_end(rival, END_TYPE_CHAIN_CANCEL);
            let mut local = pkt.clone();
            local.action_id = rival.skills.next_action_id();
            rival.send_fake(Packet::SActionStage(local));
            return HookFlow::Suppress;
        }
    }

    // ordinary confirmation of a predicted stage: the client saw ours
    if rival.settings.debug.skills && pkt.skill != rival.emu.expected_skill_id {
        let expected = rival.emu.expected_skill_id;
        rival.debug.push(
            rival.now,
            format!("server stage for {} while expecting {}", pkt.skill, expected),
        );
    }
    HookFlow::Suppress
}

pub fn on_action_end_real(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SActionEnd(p) => *p,
        _ => return HookFlow::Continue,
    };
    if ev.silenced || !rival.player.is_me(pkt.game_id) {
        return HookFlow::Continue;
    }
    let enabled = rival.settings.enabled && rival.settings.skills.enabled;
    if !enabled {
        return HookFlow::Continue;
    }
    let now = rival.now;

    if rival.action.in_action {
        let t = pkt.end_type;
        let matches_recent = rival.emu.last_emulated_end.is_some_and(|e| {
            e.end_type == t && now - e.at <= rival.packet_buffer(0)
        }) || t == rival.emu.expected_end_type;
        let dash_handoff =
            t == END_TYPE_DASH && rival.action.current_skill() != Some(pkt.skill);
        if !ACCEPTED_END_TYPES.contains(&t) && !matches_recent && !dash_handoff {
            // the server knows something we do not: follow it
            emit_current_action_end(rival, t);
            if t != END_TYPE_INSTANT_MOVE_EXEMPT {
                let me = rival.player.game_id;
                rival.send_fake(Packet::SInstantMove(SInstantMove {
                    game_id: me,
                    loc: pkt.loc,
                    w: pkt.w,
                }));
            }
        }
        return HookFlow::Suppress;
    }

    // already ended locally: correct gross position drift, then swallow
    if let Some(end) = rival.action.end.as_ref() {
        let recent = now - end.received_at <= rival.packet_buffer(0);
        let moving = rival.data.skill(pkt.skill).is_some_and(|t| {
            matches!(t.kind, SkillType::MovingSkill | SkillType::MovingCharge | SkillType::Dash)
        });
        if recent && !moving && pkt.loc.dist(&end.loc) > 100.0 {
            let me = rival.player.game_id;
            rival.send_fake(Packet::SInstantMove(SInstantMove {
                game_id: me,
                loc: pkt.loc,
                w: pkt.w,
            }));
        }
        return HookFlow::Suppress;
    }
    HookFlow::Continue
}

pub fn on_cannot_start_skill(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SCannotStartSkill(p) => *p,
        _ => return HookFlow::Continue,
    };
    if !rival.settings.enabled {
        return HookFlow::Continue;
    }
    // the server refused a start we already played: roll the action back,
    // along with any abnormalities that start applied
    if rival.action.in_action
        && !rival.action.in_action_server
        && rival.action.current_skill() == Some(pkt.skill)
    {
        emit_current_action_end(rival, END_TYPE_CHAIN_CANCEL);
        let applied = rival.abnorm.started_by(pkt.skill).to_vec();
        for id in applied {
            crate::abnorm::end_abnormality(rival, id, true);
        }
        // consumed-on-end abnormalities may need restoring from the server
        let now = rival.now;
        let consumed = rival.abnorm.ended_by(pkt.skill).to_vec();
        for id in consumed {
            rival.timers.schedule(now, 0, Task::AbnormRevert { id, ending: true });
        }
    }
    HookFlow::Continue
}

// ------------------------------------------------------------
// Cancel, death, defence, reaction, suppression windows
// ------------------------------------------------------------

pub fn on_cancel_skill(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::CCancelSkill(p) => *p,
        _ => return HookFlow::Continue,
    };
    if rival.emu.block_send || !rival.settings.enabled || !rival.settings.skills.enabled {
        return HookFlow::Continue;
    }
    if !rival.action.in_action {
        return HookFlow::Continue;
    }
    let rapid_fire = class_of(rival.player.template_id) == ARCHER_CLASS
        && rival
            .action
            .current_skill()
            .and_then(|s| rival.data.skill(s))
            .is_some_and(|t| t.kind == SkillType::Hold);
    let end_type = if rapid_fire { END_TYPE_RAPID_FIRE } else { pkt.end_type };
    emit_current_action_end(rival, end_type);
    let jitter = rival.jitter();
    let now = rival.now;
    rival.timers.schedule(now, jitter, Task::ReleaseCancel { pkt });
    HookFlow::Suppress
}

pub fn on_creature_life_death(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SCreatureLife(pkt) = &ev.packet {
        let pkt = *pkt;
        if rival.player.is_me(pkt.target) && !pkt.alive && rival.action.in_action {
            emit_current_action_end(rival, END_TYPE_DEATH);
        }
    }
    HookFlow::Continue
}

pub fn on_defend_success(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SDefendSuccess(p) => *p,
        _ => return HookFlow::Continue,
    };
    if !rival.player.is_me(pkt.game_id) {
        return HookFlow::Continue;
    }
    let now = rival.now;
    rival.emu.last_defend = Some((pkt.skill, now));

    if rival.settings.skills.defend_success_strict {
        let defending = rival
            .action
            .current_skill()
            .and_then(|s| rival.data.skill(s))
            .is_some_and(|t| matches!(t.kind, SkillType::Defence | SkillType::MovingDefence));
        if !defending {
            return HookFlow::Continue;
        }
    }

    // a held follow-up that requires this defence fires immediately
    let chained = rival.last.latest_start().and_then(|cached| {
        let gated = {
            let ctx = rival.cast_ctx();
            let nd = rival
                .skills
                .get_new_skill_data(cached.pkt.skill, CastOptions::default(), &ctx);
            rival.data.skill(nd.info.id).is_some_and(|t| t.only_after_defence)
        };
        let ping = rival.ping_ms();
        let window = cached.received_at + ping / 2 > now - ping / 2;
        if gated && window {
            Some(cached.pkt.clone())
        } else {
            None
        }
    });
    if let Some(pkt) = chained {
        rival.timers.schedule(now, 0, Task::DefenceChain { pkt });
    }
    HookFlow::Continue
}

pub fn defence_chain(rival: &mut Rival, pkt: CStartSkill) {
    let press = pkt.name == PacketName::CPressSkill;
    handle_skill_start(rival, pkt, press);
}

/// Reaction events from the action tracker: a non-push reaction with an
/// animation ends whatever we were doing.
pub fn on_reaction(rival: &mut Rival, ev: &ReactionEvent) {
    if !rival.settings.enabled {
        return;
    }
    if !ev.push && !ev.anim_seq.is_empty() && rival.action.in_action {
        emit_current_action_end(rival, END_TYPE_REACTION);
    }
}

pub fn on_grant_skill_real(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SGrantSkill(_) = &ev.packet {
        if rival.emu.grant_skill_until > rival.now {
            return HookFlow::Suppress;
        }
    }
    HookFlow::Continue
}

pub fn on_connect_arrow_real(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::SConnectSkillArrow(_) = &ev.packet {
        if rival.emu.connect_skill_arrow_until > rival.now {
            return HookFlow::Suppress;
        }
    }
    HookFlow::Continue
}

/// Tracks the client's in-action location report for position-corrected
/// synthetic ends.
pub fn on_notify_location(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if let Packet::CNotifyLocationInAction(pkt) = &ev.packet {
        rival.emu.last_move_location = Some(pkt.loc);
    }
    HookFlow::Continue
}
