// main.rs -- entry point: wire the relay, the codec and the interceptor
//
// One client connects to the listen port, we connect onward to the real
// server, and every frame on either leg runs through the interceptor on
// this thread. Reader threads only move bytes; all state lives here.

mod host;
mod logger;
mod net;

use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam::channel::RecvTimeoutError;

use rival_common::codec::{Codec, DEFAULT_PATCH};
use rival_common::packets::Direction;
use rival_common::settings::Settings;

use rival_emu::proxy::{Delivery, Rival};

use host::{Module, ModuleHost};
use net::FrameQueue;

struct Args {
    listen: String,
    server: String,
    settings: PathBuf,
    data: Option<PathBuf>,
    schema_dir: Option<PathBuf>,
    patch: u32,
    log_file: Option<PathBuf>,
    verbose: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        listen: "127.0.0.1:9250".to_string(),
        server: String::new(),
        settings: PathBuf::from("rival-settings.json"),
        data: None,
        schema_dir: None,
        patch: DEFAULT_PATCH,
        log_file: None,
        verbose: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = |name: &str| it.next().ok_or(format!("{} needs a value", name));
        match flag.as_str() {
            "--listen" => args.listen = value("--listen")?,
            "--server" => args.server = value("--server")?,
            "--settings" => args.settings = PathBuf::from(value("--settings")?),
            "--data" => args.data = Some(PathBuf::from(value("--data")?)),
            "--schema-dir" => args.schema_dir = Some(PathBuf::from(value("--schema-dir")?)),
            "--patch" => {
                args.patch = value("--patch")?.parse().map_err(|e| format!("--patch: {}", e))?
            }
            "--log-file" => args.log_file = Some(PathBuf::from(value("--log-file")?)),
            "-v" | "--verbose" => args.verbose = true,
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    if args.server.is_empty() {
        return Err("--server <addr:port> is required".to_string());
    }
    Ok(args)
}

impl Module for Rival {
    fn state(&self) -> Vec<u8> {
        self.state_snapshot()
    }

    fn destruct(&mut self) {
        Rival::destruct(self);
    }
}

fn build_rival(args: &Args, prev_state: Option<Vec<u8>>) -> Result<Rival, String> {
    let settings = Settings::load(&args.settings).map_err(|e| e.to_string())?;
    let codec = Codec::new(args.patch, args.schema_dir.as_deref());
    match codec.get_all("S_ACTION_STAGE") {
        Ok((name, version)) => log::info!("patch {}: {} v{}", args.patch, name, version),
        Err(e) => log::warn!("{}", e),
    }
    let mut rival = Rival::new(settings, codec);
    if let Some(state) = prev_state {
        rival.restore_state(&state);
    }
    if let Some(data) = &args.data {
        rival.data.load_file(data).map_err(|e| e.to_string())?;
    } else {
        log::warn!("no --data file given; skill emulation will pass everything through");
    }
    Ok(rival)
}

fn flush_deliveries(
    deliveries: Vec<Delivery>,
    rival: &Rival,
    client: &mut TcpStream,
    server: &mut TcpStream,
) -> std::io::Result<()> {
    for delivery in deliveries {
        let opcode = rival.codec.opcode(delivery.event.name);
        let body = rival.codec.encode_body(&delivery.event.packet);
        let stream = match delivery.dir {
            Direction::ToClient => &mut *client,
            Direction::ToServer => &mut *server,
        };
        net::write_frame(stream, opcode, &body)?;
    }
    Ok(())
}

fn run(args: Args) -> Result<(), String> {
    let listener = TcpListener::bind(&args.listen).map_err(|e| e.to_string())?;
    log::info!("listening on {}, upstream {}", args.listen, args.server);
    let (client_stream, peer) = listener.accept().map_err(|e| e.to_string())?;
    log::info!("game client connected from {}", peer);
    let server_stream = TcpStream::connect(&args.server).map_err(|e| e.to_string())?;

    let mut client_write = client_stream.try_clone().map_err(|e| e.to_string())?;
    let mut server_write = server_stream.try_clone().map_err(|e| e.to_string())?;

    let epoch = Instant::now();
    let mut rival_host = {
        let factory_args = Args { listen: args.listen.clone(), server: args.server.clone(), ..args };
        ModuleHost::load(
            "rival",
            Box::new(move |prev| build_rival(&factory_args, prev)),
        )
        .map_err(|e| e.to_string())?
    };
    let queue_size = rival_host.module().settings.packets.max_queue_size;
    let queue = FrameQueue::new(queue_size);
    queue.spawn_reader(client_stream, Direction::ToServer, epoch);
    queue.spawn_reader(server_stream, Direction::ToClient, epoch);

    rival_host.module_mut().start(epoch.elapsed().as_millis() as i64);

    loop {
        let now = epoch.elapsed().as_millis() as i64;
        let rival = rival_host.module_mut();
        rival.tick(now);
        let deliveries = rival.drain_deliveries();
        flush_deliveries(deliveries, rival, &mut client_write, &mut server_write)
            .map_err(|e| format!("socket write: {}", e))?;

        if rival.shell.take_reload_request() {
            if let Err(e) = rival_host.reload(now) {
                log::warn!("{}", e);
            }
        }

        let rival = rival_host.module_mut();
        let timeout = match rival.next_deadline() {
            Some(goal) => (goal - now).clamp(1, 250) as u64,
            None => 100,
        };
        match queue.receiver().recv_timeout(Duration::from_millis(timeout)) {
            Ok(frame) => {
                let now = epoch.elapsed().as_millis() as i64;
                rival.tick(now);
                match rival.codec.name_of(frame.opcode) {
                    Some(name) => match rival.codec.decode_body(name, &frame.body) {
                        Ok(packet) => {
                            rival.process_real(packet);
                            let deliveries = rival.drain_deliveries();
                            flush_deliveries(deliveries, rival, &mut client_write, &mut server_write)
                                .map_err(|e| format!("socket write: {}", e))?;
                        }
                        Err(e) => {
                            log::warn!("{}; forwarding raw", e);
                            forward_raw(&frame, &mut client_write, &mut server_write)?;
                        }
                    },
                    // a packet we do not model: pure pass-through
                    None => forward_raw(&frame, &mut client_write, &mut server_write)?,
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

fn forward_raw(
    frame: &net::RelayFrame,
    client: &mut TcpStream,
    server: &mut TcpStream,
) -> Result<(), String> {
    let stream = match frame.dir {
        Direction::ToClient => client,
        Direction::ToServer => server,
    };
    net::write_frame(stream, frame.opcode, &frame.body).map_err(|e| format!("socket write: {}", e))
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("rival: {}", e);
            eprintln!(
                "usage: rival --server <addr:port> [--listen <addr:port>] [--settings <file>] \
                 [--data <file>] [--schema-dir <dir>] [--patch <n>] [--log-file <file>] [-v]"
            );
            std::process::exit(2);
        }
    };
    let level = if args.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if let Err(e) = logger::init(level, args.log_file.as_deref()) {
        eprintln!("rival: logger init failed: {}", e);
    }
    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
