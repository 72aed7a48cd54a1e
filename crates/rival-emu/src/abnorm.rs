// abnorm.rs -- abnormality begin/end scheduling and reversion
//
// Skills apply and consume abnormalities at stage boundaries; the server's
// packets for those transitions arrive a round trip late. This component
// emits them locally at the animation-scaled offsets, deduplicates the
// real packets when they match the prediction, shortens real durations by
// ping + jitter, and heals mispredictions by comparing against the server
// view shortly after each emulated transition.

use std::collections::HashMap;

use rival_common::hooks::HookFlow;
use rival_common::packets::{
    Packet, PacketEvent, SAbnormalityBegin, SAbnormalityEnd, SAbnormalityRefresh,
};
use rival_common::timer::TimerHandle;

use rival_game::data::AbnormHook;
use rival_game::effects::View;
use rival_game::skills::SpeedInfo;

use crate::proxy::Rival;
use crate::task::Task;

#[derive(Debug, Default)]
pub struct AbnormScheduler {
    /// When an emulated begin/refresh stops being fresh enough to dedup
    /// the real one (now + packet buffer at emission).
    start_times: HashMap<u32, i64>,
    /// Same, for emulated ends.
    end_times: HashMap<u32, i64>,
    /// Tracked end timeout per abnormality id.
    timeouts: HashMap<u32, TimerHandle>,
    /// Abnormality ids this session started per source skill.
    skill_starts: HashMap<u32, Vec<u32>>,
    skill_ends: HashMap<u32, Vec<u32>>,
}

impl AbnormScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn started_by(&self, skill: u32) -> &[u32] {
        self.skill_starts.get(&skill).map_or(&[], |v| v.as_slice())
    }

    pub fn ended_by(&self, skill: u32) -> &[u32] {
        self.skill_ends.get(&skill).map_or(&[], |v| v.as_slice())
    }
}

fn scaled_delay(hook: &AbnormHook, speed: &SpeedInfo) -> i64 {
    let rate = if hook.fixed_speed { speed.fixed } else { speed.variable };
    let rate = rate.max(0.01);
    (hook.delay_ms as f32 / rate) as i64
}

// ------------------------------------------------------------
// Stage / end triggers
// ------------------------------------------------------------

pub fn on_stage_client(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SActionStage(p) => p.clone(),
        _ => return HookFlow::Continue,
    };
    if ev.silenced
        || !rival.settings.enabled
        || !rival.player.is_me(pkt.game_id)
        || pkt.stage != 0
    {
        return HookFlow::Continue;
    }
    let template = match rival.data.skill(pkt.skill) {
        Some(t) => t.clone(),
        None => return HookFlow::Continue,
    };
    let speed = rival
        .action
        .stage
        .as_ref()
        .map(|s| s.speed)
        .unwrap_or_default();
    let now = rival.now;

    for hook in &template.abnormality_consume_stage {
        let scaled = scaled_delay(hook, &speed);
        if scaled == 0 {
            end_abnormality(rival, hook.id, true);
        } else {
            let handle = rival.timers.schedule(now, scaled, Task::AbnormEnd {
                id: hook.id,
                tracked: true,
            });
            replace_timeout(rival, hook.id, handle);
        }
    }

    for hook in &template.abnormality_apply {
        let scaled = scaled_delay(hook, &speed);
        rival
            .abnorm
            .skill_starts
            .entry(pkt.skill)
            .or_default()
            .push(hook.id);
        if scaled == 0 {
            start_abnormality(rival, hook.id, pkt.skill, hook.duration_override);
        } else {
            rival.timers.schedule(now, scaled, Task::AbnormStart {
                id: hook.id,
                source_skill: pkt.skill,
                duration_override: hook.duration_override,
            });
        }
    }
    HookFlow::Continue
}

pub fn on_end_client(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SActionEnd(p) => *p,
        _ => return HookFlow::Continue,
    };
    if ev.silenced || !rival.settings.enabled || !rival.player.is_me(pkt.game_id) {
        return HookFlow::Continue;
    }
    let template = match rival.data.skill(pkt.skill) {
        Some(t) => t.clone(),
        None => return HookFlow::Continue,
    };
    let speed = {
        let ctx = rival.cast_ctx();
        rival.skills.get_speed(pkt.skill, &ctx)
    };
    let now = rival.now;

    for hook in &template.abnormality_consume_end {
        let scaled = scaled_delay(hook, &speed);
        rival
            .abnorm
            .skill_ends
            .entry(pkt.skill)
            .or_default()
            .push(hook.id);
        let handle = rival.timers.schedule(now, scaled, Task::AbnormEnd {
            id: hook.id,
            tracked: !hook.no_timer,
        });
        if !hook.no_timer {
            replace_timeout(rival, hook.id, handle);
        }
    }
    HookFlow::Continue
}

fn replace_timeout(rival: &mut Rival, id: u32, handle: TimerHandle) {
    if let Some(old) = rival.abnorm.timeouts.insert(id, handle) {
        rival.timers.clear(old);
    }
}

fn clear_timeout(rival: &mut Rival, id: u32) {
    if let Some(old) = rival.abnorm.timeouts.remove(&id) {
        rival.timers.clear(old);
    }
}

// ------------------------------------------------------------
// Emulated transitions
// ------------------------------------------------------------

pub fn start_abnormality(rival: &mut Rival, id: u32, source_skill: u32, duration_override: Option<i64>) {
    let def = match rival.data.abnormality(id) {
        Some(d) => d.clone(),
        None => {
            log::warn!("abnormality {} missing from game data (skill {})", id, source_skill);
            return;
        }
    };
    let duration = duration_override.unwrap_or(def.time_ms);
    let existing = rival.effects.get(View::Client, id).copied();
    let stacks = existing.map_or(1, |e| e.stacks);
    let me = rival.player.game_id;
    let now = rival.now;

    if existing.is_some() {
        rival.send_fake(Packet::SAbnormalityRefresh(SAbnormalityRefresh {
            target: me,
            id,
            duration_ms: duration,
            stacks,
        }));
    } else {
        rival.send_fake(Packet::SAbnormalityBegin(SAbnormalityBegin {
            target: me,
            source: 0,
            id,
            duration_ms: duration,
            stacks,
        }));
    }

    rival.abnorm.start_times.insert(id, now + rival.packet_buffer(0));
    clear_timeout(rival, id);
    if duration <= i32::MAX as i64 {
        let handle = rival.timers.schedule(now, duration, Task::AbnormEnd { id, tracked: true });
        rival.abnorm.timeouts.insert(id, handle);
    }
    let probe = rival.packet_buffer(100);
    rival.timers.schedule(now, probe, Task::AbnormRevert { id, ending: false });
}

pub fn end_abnormality(rival: &mut Rival, id: u32, tracked: bool) {
    if tracked {
        clear_timeout(rival, id);
    }
    if !rival.effects.has(View::Client, id) {
        return;
    }
    let me = rival.player.game_id;
    let now = rival.now;
    rival.send_fake(Packet::SAbnormalityEnd(SAbnormalityEnd { target: me, id }));
    rival.abnorm.end_times.insert(id, now + rival.packet_buffer(0));
    let probe = rival.packet_buffer(100);
    rival.timers.schedule(now, probe, Task::AbnormRevert { id, ending: true });
}

/// Compare the emulated transition with what the server settled on, and
/// send the inverse packet when the server disagrees.
pub fn revert_abnormality_state(rival: &mut Rival, id: u32, ending: bool) {
    let me = rival.player.game_id;
    if !ending {
        // emulated a start; server never confirmed it
        if !rival.effects.has(View::Server, id) && rival.effects.has(View::Client, id) {
            rival.abnorm.start_times.remove(&id);
            clear_timeout(rival, id);
            rival.send_fake(Packet::SAbnormalityEnd(SAbnormalityEnd { target: me, id }));
            if rival.settings.debug.abnormals {
                rival.debug.push(rival.now, format!("reverted emulated start of {}", id));
            }
        }
    } else {
        // emulated an end; server still holds the abnormality
        if let Some(server) = rival.effects.get(View::Server, id).copied() {
            rival.abnorm.end_times.remove(&id);
            let remaining = (server.duration_ms - (rival.now - server.start_time)).max(0);
            if remaining > 0 {
                start_abnormality(rival, id, 0, Some(remaining));
                if rival.settings.debug.abnormals {
                    rival.debug.push(rival.now, format!("restored {} for {}ms", id, remaining));
                }
            }
        }
    }
}

// ------------------------------------------------------------
// Inbound reconciliation
// ------------------------------------------------------------

fn duration_matches(rival: &Rival, emulated: i64, real: i64) -> bool {
    (emulated - real).abs() <= rival.packet_buffer(0)
}

pub fn on_begin_real(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SAbnormalityBegin(p) => *p,
        _ => return HookFlow::Continue,
    };
    if !rival.settings.enabled || !rival.player.is_me(pkt.target) {
        return HookFlow::Continue;
    }
    let now = rival.now;

    // duplicate of a fresh emulation: drop it
    if let Some(client) = rival.effects.get(View::Client, pkt.id).copied() {
        let fresh = rival.abnorm.start_times.get(&pkt.id).copied().unwrap_or(0) > now;
        if client.fake
            && fresh
            && client.stacks == pkt.stacks
            && duration_matches(rival, client.duration_ms, pkt.duration_ms)
        {
            return HookFlow::Suppress;
        }
    }

    let adjusted = (pkt.duration_ms - rival.ping_ms() - rival.jitter()).max(0);

    // client already believes it is active: hand it a refresh instead
    if rival.effects.has(View::Client, pkt.id) {
        reschedule_end(rival, pkt.id, adjusted);
        rival.send_fake(Packet::SAbnormalityRefresh(SAbnormalityRefresh {
            target: pkt.target,
            id: pkt.id,
            duration_ms: adjusted,
            stacks: pkt.stacks,
        }));
        return HookFlow::Suppress;
    }

    if let Packet::SAbnormalityBegin(p) = &mut ev.packet {
        p.duration_ms = adjusted;
    }
    reschedule_end(rival, pkt.id, adjusted);
    HookFlow::Continue
}

pub fn on_refresh_real(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SAbnormalityRefresh(p) => *p,
        _ => return HookFlow::Continue,
    };
    if !rival.settings.enabled || !rival.player.is_me(pkt.target) {
        return HookFlow::Continue;
    }
    let now = rival.now;

    if let Some(client) = rival.effects.get(View::Client, pkt.id).copied() {
        let fresh = rival.abnorm.start_times.get(&pkt.id).copied().unwrap_or(0) > now;
        if client.fake
            && fresh
            && client.stacks == pkt.stacks
            && duration_matches(rival, client.duration_ms, pkt.duration_ms)
        {
            return HookFlow::Suppress;
        }
    }

    let adjusted = (pkt.duration_ms - rival.ping_ms() - rival.jitter()).max(0);

    // client never saw it begin: promote the refresh
    if !rival.effects.has(View::Client, pkt.id) {
        reschedule_end(rival, pkt.id, adjusted);
        rival.send_fake(Packet::SAbnormalityBegin(SAbnormalityBegin {
            target: pkt.target,
            source: 0,
            id: pkt.id,
            duration_ms: adjusted,
            stacks: pkt.stacks,
        }));
        return HookFlow::Suppress;
    }

    if let Packet::SAbnormalityRefresh(p) = &mut ev.packet {
        p.duration_ms = adjusted;
    }
    reschedule_end(rival, pkt.id, adjusted);
    HookFlow::Continue
}

pub fn on_end_real(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::SAbnormalityEnd(p) => *p,
        _ => return HookFlow::Continue,
    };
    if !rival.settings.enabled || !rival.player.is_me(pkt.target) {
        return HookFlow::Continue;
    }
    let now = rival.now;
    if rival.abnorm.end_times.get(&pkt.id).copied().unwrap_or(0) > now {
        rival.abnorm.end_times.remove(&pkt.id);
        return HookFlow::Suppress;
    }
    rival.abnorm.start_times.remove(&pkt.id);
    clear_timeout(rival, pkt.id);
    HookFlow::Continue
}

fn reschedule_end(rival: &mut Rival, id: u32, duration: i64) {
    clear_timeout(rival, id);
    if duration > 0 && duration <= i32::MAX as i64 {
        let now = rival.now;
        let handle = rival.timers.schedule(now, duration, Task::AbnormEnd { id, tracked: true });
        rival.abnorm.timeouts.insert(id, handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rival_common::codec::Codec;
    use rival_common::packets::{SActionStage, SLogin, SSpawnMe};
    use rival_common::settings::Settings;
    use rival_game::data::{AbnormalityDef, GameDataFile, SkillTemplate, StageDef};

    const ME: u64 = 0x10;

    fn rival_with(skills: Vec<SkillTemplate>, abnormalities: Vec<AbnormalityDef>) -> Rival {
        let mut r = Rival::new(Settings::default(), Codec::new(100, None));
        r.data.load(GameDataFile { skills, abnormalities, npcs: vec![] });
        r.process_real(Packet::SLogin(SLogin {
            game_id: ME,
            template_id: 10101,
            ..Default::default()
        }));
        r.process_real(Packet::SSpawnMe(SSpawnMe { game_id: ME, alive: true, ..Default::default() }));
        r.drain_deliveries();
        r
    }

    fn abnorm_def(id: u32, time_ms: i64) -> AbnormalityDef {
        AbnormalityDef { id, time_ms, ..Default::default() }
    }

    /// avg 80, jitter 10
    fn seed_ping(r: &mut Rival) {
        for (i, rtt) in [70i64, 80, 90].into_iter().enumerate() {
            let t = i as i64 * 1000;
            r.ping.probe_sent(t);
            r.ping.pong_received(t + rtt);
        }
    }

    #[test]
    fn test_real_begin_matching_emulation_suppressed() {
        let mut r = rival_with(vec![], vec![abnorm_def(103104, 5000)]);
        r.tick(0);
        start_abnormality(&mut r, 103104, 200200, None);
        r.drain_deliveries();

        // inside the start window, same stacks, same duration
        r.tick(50);
        let delivered = r.process_real(Packet::SAbnormalityBegin(SAbnormalityBegin {
            target: ME,
            source: 9,
            id: 103104,
            duration_ms: 5000,
            stacks: 1,
        }));
        assert!(!delivered);
    }

    #[test]
    fn test_unmatched_begin_forwarded_with_ping_compensation() {
        let mut r = rival_with(vec![], vec![abnorm_def(2000, 5000)]);
        seed_ping(&mut r);
        r.tick(0);
        let delivered = r.process_real(Packet::SAbnormalityBegin(SAbnormalityBegin {
            target: ME,
            source: 9,
            id: 2000,
            duration_ms: 5000,
            stacks: 1,
        }));
        assert!(delivered);
        let deliveries = r.drain_deliveries();
        let begin = deliveries
            .iter()
            .find_map(|d| match &d.event.packet {
                Packet::SAbnormalityBegin(p) => Some(*p),
                _ => None,
            })
            .unwrap();
        // 5000 - ping(80) - jitter(10)
        assert_eq!(begin.duration_ms, 4910);
        // and a local end timer now runs at the compensated duration
        r.tick(5000);
        assert!(r
            .drain_deliveries()
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::SAbnormalityEnd(p) if p.id == 2000)));
    }

    #[test]
    fn test_begin_on_active_becomes_refresh() {
        let mut r = rival_with(vec![], vec![abnorm_def(2000, 5000)]);
        r.tick(0);
        r.process_real(Packet::SAbnormalityBegin(SAbnormalityBegin {
            target: ME,
            source: 9,
            id: 2000,
            duration_ms: 5000,
            stacks: 1,
        }));
        r.drain_deliveries();

        // far past the dedup window, a second real begin arrives
        r.tick(3000);
        let delivered = r.process_real(Packet::SAbnormalityBegin(SAbnormalityBegin {
            target: ME,
            source: 9,
            id: 2000,
            duration_ms: 5000,
            stacks: 2,
        }));
        assert!(!delivered, "the begin itself is withheld");
        let deliveries = r.drain_deliveries();
        assert!(deliveries
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::SAbnormalityRefresh(p) if p.id == 2000 && p.stacks == 2)));
    }

    #[test]
    fn test_refresh_without_begin_promoted() {
        let mut r = rival_with(vec![], vec![abnorm_def(2000, 5000)]);
        r.tick(0);
        let delivered = r.process_real(Packet::SAbnormalityRefresh(SAbnormalityRefresh {
            target: ME,
            id: 2000,
            duration_ms: 5000,
            stacks: 1,
        }));
        assert!(!delivered);
        assert!(r
            .drain_deliveries()
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::SAbnormalityBegin(p) if p.id == 2000)));
    }

    #[test]
    fn test_real_end_after_emulated_end_suppressed() {
        let mut r = rival_with(vec![], vec![abnorm_def(103104, 5000)]);
        r.tick(0);
        start_abnormality(&mut r, 103104, 0, None);
        r.tick(10);
        end_abnormality(&mut r, 103104, true);
        r.drain_deliveries();

        r.tick(50);
        let delivered = r.process_real(Packet::SAbnormalityEnd(SAbnormalityEnd {
            target: ME,
            id: 103104,
        }));
        assert!(!delivered);
        // a second real end outside the window passes
        r.tick(1000);
        let delivered = r.process_real(Packet::SAbnormalityEnd(SAbnormalityEnd {
            target: ME,
            id: 103104,
        }));
        assert!(delivered);
    }

    #[test]
    fn test_consume_on_stage_ends_immediately() {
        let skill = SkillTemplate {
            id: 200200,
            stages: vec![StageDef { duration_ms: 500, ..Default::default() }],
            abnormality_consume_stage: vec![AbnormHook { id: 9000, ..Default::default() }],
            ..Default::default()
        };
        let mut r = rival_with(vec![skill], vec![abnorm_def(9000, 60_000)]);
        r.tick(0);
        r.send_fake(Packet::SAbnormalityBegin(SAbnormalityBegin {
            target: ME,
            source: 0,
            id: 9000,
            duration_ms: 60_000,
            stacks: 1,
        }));
        r.drain_deliveries();

        r.send_fake(Packet::SActionStage(SActionStage {
            game_id: ME,
            skill: 200200,
            stage: 0,
            ..Default::default()
        }));
        assert!(r
            .drain_deliveries()
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::SAbnormalityEnd(p) if p.id == 9000)));
    }

    #[test]
    fn test_apply_on_stage_starts_after_scaled_delay() {
        let skill = SkillTemplate {
            id: 200200,
            stages: vec![StageDef { duration_ms: 500, ..Default::default() }],
            abnormality_apply: vec![AbnormHook { id: 9100, delay_ms: 200, ..Default::default() }],
            ..Default::default()
        };
        let mut r = rival_with(vec![skill], vec![abnorm_def(9100, 8000)]);
        r.tick(0);
        r.send_fake(Packet::SActionStage(SActionStage {
            game_id: ME,
            skill: 200200,
            stage: 0,
            ..Default::default()
        }));
        assert!(!r
            .drain_deliveries()
            .iter()
            .any(|d| matches!(&d.event.packet, Packet::SAbnormalityBegin(_))));

        r.tick(200);
        let deliveries = r.drain_deliveries();
        let begin = deliveries
            .iter()
            .find_map(|d| match &d.event.packet {
                Packet::SAbnormalityBegin(p) => Some(*p),
                _ => None,
            })
            .unwrap();
        assert_eq!(begin.id, 9100);
        assert_eq!(begin.duration_ms, 8000);
        assert_eq!(r.abnorm.started_by(200200), &[9100]);
    }
}
