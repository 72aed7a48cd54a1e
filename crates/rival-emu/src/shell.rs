// shell.rs -- chat-channel command shell
//
// Operator commands ride the chat pipe: outbound lines matching a command
// are suppressed before the server sees them and answered with synthetic
// inbound chat. No modal UI, no extra socket.

use std::path::PathBuf;

use rival_common::hooks::HookFlow;
use rival_common::packets::{CChat, Packet, PacketEvent, SChat};

use crate::proxy::Rival;

const REPLY_NAME: &str = "Rival";

#[derive(Debug)]
pub struct Shell {
    pub log_dir: PathBuf,
    reload_requested: bool,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    pub fn new() -> Self {
        Self {
            log_dir: PathBuf::from("."),
            reload_requested: false,
        }
    }

    /// Polled by the host after each pump.
    pub fn take_reload_request(&mut self) -> bool {
        std::mem::take(&mut self.reload_requested)
    }
}

pub fn on_chat_out(rival: &mut Rival, ev: &mut PacketEvent) -> HookFlow {
    let pkt = match &ev.packet {
        Packet::CChat(p) => p.clone(),
        _ => return HookFlow::Continue,
    };
    let line = pkt.message.trim();
    let mut words = line.split_whitespace();
    let head = match words.next() {
        Some(w) => w,
        None => return HookFlow::Continue,
    };
    let rest: Vec<&str> = words.collect();

    let handled = match head {
        "rival" => Some(rival_command(rival, &rest)),
        "save" => Some(save_command(rival, rest.first().copied())),
        "desync" => rest.first().and_then(|v| v.parse::<f32>().ok()).map(|v| {
            rival.settings.desync.back_correction = -v;
            format!("back-correction set to {}", -v)
        }),
        "tracker" => Some(tracker_command(rival)),
        _ => None,
    };

    match handled {
        Some(reply) => {
            send_reply(rival, &pkt, &reply);
            HookFlow::Suppress
        }
        None => HookFlow::Continue,
    }
}

fn rival_command(rival: &mut Rival, args: &[&str]) -> String {
    match args.first().copied() {
        None => {
            rival.settings.enabled = !rival.settings.enabled;
            if rival.settings.enabled {
                "enabled".to_string()
            } else {
                "disabled".to_string()
            }
        }
        Some("help") => "commands: rival | rival debug | rival ping | rival reload | \
                         save [name] | desync <dist> | tracker"
            .to_string(),
        Some("debug") => {
            rival.settings.debug.enabled = !rival.settings.debug.enabled;
            let on = rival.settings.debug.enabled;
            rival.settings.debug.skills = on;
            rival.settings.debug.packets = on;
            rival.settings.debug.abnormals = on;
            rival.settings.debug.ping = on;
            format!("debug logging {}", if on { "on" } else { "off" })
        }
        Some("ping") => {
            let s = rival.ping.stats();
            format!("ping min {} avg {} max {} over {} samples", s.min, s.avg, s.max, s.samples)
        }
        Some("reload") => {
            rival.shell.reload_requested = true;
            "reload requested".to_string()
        }
        Some(other) => format!("unknown subcommand: {}", other),
    }
}

fn save_command(rival: &mut Rival, name: Option<&str>) -> String {
    let dir = rival.shell.log_dir.clone();
    match rival.debug.save(&dir, name) {
        Ok(path) => format!("saved {} entries to {}", rival.debug.len(), path.display()),
        Err(e) => format!("save failed: {}", e),
    }
}

fn tracker_command(rival: &Rival) -> String {
    let n = rival.emu.history.len();
    if n == 0 {
        return "no skill records yet".to_string();
    }
    let (mut delay, mut jitter, mut excess) = (0i64, 0i64, 0i64);
    for h in rival.emu.history.iter() {
        delay += h.delay;
        jitter += h.jitter;
        excess += h.excess_time;
    }
    let n = n as i64;
    format!(
        "over {} skills: avg delay {}ms, avg jitter {}ms, avg chain excess {}ms",
        n,
        delay / n,
        jitter / n,
        excess / n
    )
}

fn send_reply(rival: &mut Rival, origin: &CChat, text: &str) {
    rival.send_fake(Packet::SChat(SChat {
        channel: origin.channel,
        author_id: 0,
        author_name: REPLY_NAME.to_string(),
        message: text.to_string(),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rival_common::codec::Codec;
    use rival_common::settings::Settings;

    fn rival() -> Rival {
        Rival::new(Settings::default(), Codec::new(100, None))
    }

    fn say(r: &mut Rival, line: &str) -> (bool, Vec<String>) {
        let delivered =
            r.process_real(Packet::CChat(CChat { channel: 0, message: line.to_string() }));
        let replies = r
            .drain_deliveries()
            .into_iter()
            .filter_map(|d| match d.event.packet {
                Packet::SChat(p) => Some(p.message),
                _ => None,
            })
            .collect();
        (delivered, replies)
    }

    #[test]
    fn test_toggle_command() {
        let mut r = rival();
        assert!(r.settings.enabled);
        let (delivered, replies) = say(&mut r, "rival");
        assert!(!delivered);
        assert!(!r.settings.enabled);
        assert_eq!(replies, vec!["disabled".to_string()]);
        say(&mut r, "rival");
        assert!(r.settings.enabled);
    }

    #[test]
    fn test_ordinary_chat_passes() {
        let mut r = rival();
        let (delivered, replies) = say(&mut r, "hello everyone");
        assert!(delivered);
        assert!(replies.is_empty());
    }

    #[test]
    fn test_desync_command_negates() {
        let mut r = rival();
        say(&mut r, "desync 12.5");
        assert_eq!(r.settings.desync.back_correction, -12.5);
    }

    #[test]
    fn test_debug_toggle_sets_channels() {
        let mut r = rival();
        say(&mut r, "rival debug");
        assert!(r.settings.debug.enabled);
        assert!(r.settings.debug.skills);
        say(&mut r, "rival debug");
        assert!(!r.settings.debug.enabled);
    }

    #[test]
    fn test_reload_request_latched() {
        let mut r = rival();
        say(&mut r, "rival reload");
        assert!(r.shell.take_reload_request());
        assert!(!r.shell.take_reload_request());
    }

    #[test]
    fn test_ping_report() {
        let mut r = rival();
        let (_, replies) = say(&mut r, "rival ping");
        assert!(replies[0].contains("0 samples"));
    }
}
