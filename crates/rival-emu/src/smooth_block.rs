// smooth_block.rs -- super-armor flag strip
//
// A skill result carrying super-armor would stop the client from playing
// its own reaction. Stripping the flags on the way in keeps blocks and
// reactions smooth while the emulation owns the timing.

use rival_common::hooks::HookFlow;
use rival_common::packets::{HitFlags, Packet, PacketEvent};

use crate::proxy::Rival;

pub fn on_skill_result(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    if !rival.settings.enabled {
        return HookFlow::Continue;
    }
    if let Packet::SEachSkillResult(pkt) = &mut ev.packet {
        if pkt.target == rival.player.game_id
            && pkt.flags.intersects(HitFlags::SUPER_ARMOR | HitFlags::PUSH_IMMUNE)
        {
            pkt.flags.remove(HitFlags::SUPER_ARMOR | HitFlags::PUSH_IMMUNE);
        }
    }
    HookFlow::Continue
}
