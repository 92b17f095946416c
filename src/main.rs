//! Stygia Headless Driver
//!
//! Drives the deterministic core from the command line: demo playback
//! and timing runs, recording, save loading, and the netgame client
//! and relay server. Rendering and audio are external; this binary is
//! the engine's pump with nothing bolted on.

use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use stygia::compat::resolver::{self, Overrides, UserDefaults};
use stygia::demo::codec::DemoHeader;
use stygia::demo::DemoRecorder;
use stygia::game::{GameAction, GameMode, InputState, Skill, TicCmdSet};
use stygia::net::client::NetClient;
use stygia::net::server::{GameServer, ServerConfig};
use stygia::net::sync::{CmdTransport, GameClock, NetSync};
use stygia::net::GameSettings;
use stygia::options::Options;
use stygia::wad::WadDirectory;
use stygia::{Game, CompatLevel, MAXPLAYERS, TICRATE, VERSION};

/// Real 35Hz clock over the process monotonic timer.
struct SystemClock {
    start: Instant,
}

impl SystemClock {
    fn new() -> SystemClock {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl GameClock for SystemClock {
    fn time(&self) -> u32 {
        (self.start.elapsed().as_millis() as u64 * TICRATE as u64 / 1000) as u32
    }

    fn time_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

fn main() {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to set tracing subscriber");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match Options::parse(&args) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("stygia: {}", e);
            std::process::exit(2);
        }
    };

    match run(options) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("stygia: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(options: Options) -> anyhow::Result<()> {
    info!("Stygia v{}", VERSION);
    info!("Tick Rate: {} Hz", TICRATE);

    // Standalone relay server: no simulation at all.
    if options.server {
        return run_server(&options);
    }

    let wad = load_wad(&options)?;
    let mode = detect_mode(&wad);
    let defaults = load_defaults();

    let overrides = Overrides {
        complevel: options.complevel,
        gameversion: options.gameversion,
        respawn: options.respawn,
        fast: options.fast,
        nomonsters: options.nomonsters,
        beta: options.beta,
        dogs: options.dogs,
    };
    let netgame = options.connect.is_some() || options.solo_net;
    let rngseed = chrono::Utc::now().timestamp() as u32;
    let mut behavior = resolver::resolve(&defaults, wad.complvl(), &overrides, rngseed, netgame);
    if let Some(data) = wad.options_lump() {
        resolver::apply_options_lump(&mut behavior, data);
    }

    info!(
        "compatibility level: {} ({})",
        behavior.level.name(),
        behavior.level.demo_version(false)
    );

    let mut game = Game::new(behavior, mode, wad, stygia::game::MapSet::arena_only());
    game.deathmatch = options.deathmatch;
    game.netgame = options.solo_net;
    game.levelstat = options.levelstat.then(|| "levelstat.txt".to_string());
    game.ticdup = options.dup;

    let mut input = InputState::default();

    let (skill, episode, map) = startup_slot(&options);

    if let Some(addr) = options.connect.clone() {
        return run_net_client(&addr, &options, game, input);
    }

    if let Some(slot) = options.loadgame {
        let path = game.save_path(slot);
        game.load_game(path, slot, true);
    }

    if let Some(demo) = options.record.clone() {
        return run_record(&demo, &options, game, input, skill, episode, map);
    }

    if let Some(name) = options.demo_to_play().map(str::to_string) {
        let timing = options.timedemo.is_some();
        let uncapped = timing || options.fastdemo.is_some();
        return run_playdemo(&name, game, input, timing, uncapped);
    }

    // Plain start: warp in and run a bounded headless session. A
    // platform front end would loop on TryRunTics until quit; with no
    // input source attached this smoke run stands in for it. A
    // pending -loadgame keeps its slot instead of starting fresh.
    game.playeringame[0] = true;
    if game.gameaction != GameAction::LoadGame {
        game.d_skill = skill;
        game.d_episode = episode;
        game.d_map = map;
        game.gameaction = GameAction::NewGame;
    }
    let mut sync = NetSync::single_player(options.dup);
    run_singletics(&mut game, &mut input, &mut sync, Some(60 * TICRATE));
    print_levelstat(&game);
    finish(&game)
}

// =============================================================================
// STARTUP PIECES
// =============================================================================

fn load_wad(options: &Options) -> anyhow::Result<WadDirectory> {
    if let Some(path) = &options.manifest {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading lump manifest {}", path))?;
        return WadDirectory::from_manifest_json(&json).context("parsing lump manifest");
    }
    let iwad = options
        .iwad
        .clone()
        .unwrap_or_else(|| "DOOM2.WAD".to_string());
    Ok(WadDirectory::new(iwad, options.files.clone(), Vec::new()))
}

fn detect_mode(wad: &WadDirectory) -> GameMode {
    let iwad = wad.iwad_name().to_ascii_uppercase();
    if iwad.contains("DOOM2") || iwad.contains("TNT") || iwad.contains("PLUTONIA") {
        GameMode::Commercial
    } else if iwad.contains("DOOM1") {
        GameMode::Shareware
    } else {
        GameMode::Retail
    }
}

fn load_defaults() -> UserDefaults {
    let path = std::path::Path::new("stygia.json");
    match std::fs::read_to_string(path) {
        Ok(json) => serde_json::from_str(&json).unwrap_or_default(),
        Err(_) => UserDefaults::default(),
    }
}

fn startup_slot(options: &Options) -> (Skill, u32, u32) {
    let skill = options.skill.unwrap_or(Skill::Medium);
    let (episode, map) = options.warp.unwrap_or((1, 1));
    (skill, episode, map)
}

// =============================================================================
// RUN MODES
// =============================================================================

fn run_server(options: &Options) -> anyhow::Result<()> {
    let config = ServerConfig {
        private: options.privateserver,
        settings: GameSettings {
            ticdup: options.dup,
            extratics: options.extratics,
            new_sync: !options.oldsync,
            deathmatch: options.deathmatch,
            skill: options.skill.unwrap_or(Skill::Medium),
            episode: options.warp.map(|w| w.0).unwrap_or(1),
            map: options.warp.map(|w| w.1).unwrap_or(1),
            rngseed: chrono::Utc::now().timestamp() as u32,
            complevel: options
                .complevel
                .unwrap_or(CompatLevel::Mbf21)
                .demo_version(false),
            nomonsters: options.nomonsters,
            respawn: options.respawn,
            fast: options.fast,
        },
        ..Default::default()
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move { GameServer::new(config).run().await })
}

fn run_net_client(
    addr: &str,
    options: &Options,
    mut game: Game,
    mut input: InputState,
) -> anyhow::Result<()> {
    let joined = NetClient::connect(addr, "stygia", options.drone, options.extratics)?;
    let mut client = joined.client;
    let settings = joined.settings;

    info!(
        "net settings: ticdup {} extratics {} seed {:#x}",
        settings.ticdup, settings.extratics, settings.rngseed
    );

    // The server's settings override local resolution for sync.
    game.behavior.rngseed = settings.rngseed;
    if let Some(level) = CompatLevel::from_demo_version(settings.complevel) {
        game.behavior.apply_level(level);
    }
    game.deathmatch = settings.deathmatch;
    game.netgame = true;
    game.ticdup = settings.ticdup;

    if !client.wait_for_start(Duration::from_secs(120)) {
        anyhow::bail!("server never started the game");
    }

    let localplayer = if joined.player == u8::MAX {
        0
    } else {
        joined.player as usize
    };
    game.consoleplayer = localplayer;
    for slot in 0..MAXPLAYERS {
        game.playeringame[slot] = slot <= localplayer;
    }
    game.d_skill = settings.skill;
    game.d_episode = settings.episode;
    game.d_map = settings.map;
    game.gameaction = GameAction::NewGame;

    let mut sync = NetSync::new(&settings, localplayer, options.drone);
    sync.net_connected = true;
    let result = run_realtime_with_sync(&mut game, &mut input, &mut sync, Some(&mut client));
    client.quit();
    result
}

fn run_record(
    name: &str,
    options: &Options,
    mut game: Game,
    mut input: InputState,
    skill: Skill,
    episode: u32,
    map: u32,
) -> anyhow::Result<()> {
    game.playeringame[0] = true;
    game.d_skill = skill;
    game.d_episode = episode;
    game.d_map = map;
    game.gameskill = skill;
    game.gameepisode = episode;
    game.gamemap = map;

    // Recording below MBF keeps insurance configurable; MBF21 demos
    // never carry it.
    if game.behavior.mbf21() {
        game.behavior.demo_insurance = false;
        game.rng.set_insurance(false);
    }

    let header = DemoHeader {
        version: game.behavior.level.demo_version(options.longtics),
        level: game.behavior.level,
        longtics: options.longtics,
        skill,
        episode,
        map,
        deathmatch: game.deathmatch as u8,
        consoleplayer: game.consoleplayer as u8,
        playeringame: game.playeringame,
        umapinfo_map: None,
    };
    game.demo_recorder = Some(DemoRecorder::begin(
        name,
        options.maxdemo_kib,
        &game.behavior,
        &header,
        options.longtics,
    ));
    game.gameaction = GameAction::NewGame;

    // Headless recording runs a fixed-length idle session; a platform
    // front end would run until the stop-recording key instead.
    let mut sync = NetSync::single_player(options.dup);
    run_singletics(&mut game, &mut input, &mut sync, Some(30 * TICRATE));
    game.stop_recording();
    print_levelstat(&game);
    finish(&game)
}

fn run_playdemo(
    name: &str,
    mut game: Game,
    mut input: InputState,
    timing: bool,
    uncapped: bool,
) -> anyhow::Result<()> {
    game.singledemo = true;
    game.timingdemo = timing;
    game.fastdemo = uncapped;
    // -loadgame combined with -playdemo: restore first, then let the
    // demo continue from the loaded state.
    if game.gameaction == GameAction::LoadGame {
        game.drain_actions();
    }
    game.defered_play_demo(name);

    let start = Instant::now();
    let start_tic = game.gametic;

    if uncapped {
        let mut sync = NetSync::single_player(1);
        run_singletics(&mut game, &mut input, &mut sync, None);
    } else {
        run_realtime(&mut game, &mut input, 1, None)?;
    }

    if timing {
        let gametics = game.gametic - start_tic;
        let realtics =
            (start.elapsed().as_millis() as u64 * TICRATE as u64 / 1000).max(1) as u32;
        let fps = TICRATE as f64 * gametics as f64 / realtics as f64;
        println!(
            "timed {} gametics in {} realtics ({:.1} fps)",
            gametics, realtics, fps
        );
    }

    print_levelstat(&game);
    finish(&game)
}

/// Real-time pump: one `try_run_tics` per frame at roughly the tic
/// rate.
fn run_realtime(
    game: &mut Game,
    input: &mut InputState,
    ticdup: u32,
    transport: Option<&mut dyn CmdTransport>,
) -> anyhow::Result<()> {
    let mut sync = NetSync::single_player(ticdup);
    run_realtime_with_sync(game, input, &mut sync, transport)
}

/// Reborrow helper: `Option::as_deref_mut` on a `dyn Trait` reference
/// unifies its lifetime across every call site when used repeatedly in
/// a loop (the trait object is invariant), which the borrow checker
/// can't shorten on its own. Going through a function boundary with an
/// explicit lifetime gives each call its own short-lived reborrow.
fn reborrow_transport<'a>(
    transport: &'a mut Option<&mut dyn CmdTransport>,
) -> Option<&'a mut dyn CmdTransport> {
    match transport {
        Some(t) => Some(&mut **t),
        None => None,
    }
}

fn run_realtime_with_sync(
    game: &mut Game,
    input: &mut InputState,
    sync: &mut NetSync,
    mut transport: Option<&mut dyn CmdTransport>,
) -> anyhow::Result<()> {
    let clock = SystemClock::new();
    // A headless session without a demo would run forever; bound it.
    let deadline = Instant::now() + Duration::from_secs(24 * 3600);

    while !game.quit_requested && game.fatal.is_none() {
        sync.try_run_tics(game, input, &clock, reborrow_transport(&mut transport));

        // The renderer would run here, borrowing the game read-only
        // with a sub-tic interpolation fraction. Headless: drain the
        // audio queue and pace the frame instead.
        let _ = game.take_sounds();
        clock.sleep_ms(1000 / TICRATE as u64 / 2);

        if Instant::now() > deadline {
            break;
        }
    }
    finish(game)
}

/// Uncapped pump for -timedemo / -fastdemo and headless recording:
/// build and run one tic per iteration, no clock pacing.
fn run_singletics(
    game: &mut Game,
    input: &mut InputState,
    sync: &mut NetSync,
    max_tics: Option<u32>,
) {
    let start_tic = game.gametic;
    loop {
        if game.quit_requested || game.fatal.is_some() {
            break;
        }
        if let Some(max) = max_tics {
            if game.gametic - start_tic >= max {
                break;
            }
        }

        let cmd = input.build_ticcmd(game, sync.maketic);
        let mut set = TicCmdSet::default();
        set.cmds[game.consoleplayer] = cmd;
        set.ingame = game.playeringame;
        game.ticker(&set);
        game.gametic += 1;
        sync.maketic = game.gametic;
        let _ = game.take_sounds();
    }
}

fn print_levelstat(game: &Game) {
    if let Some(path) = &game.levelstat {
        if !game.levelstat_lines.is_empty() {
            let body = game.levelstat_lines.join("\n") + "\n";
            if let Err(e) = std::fs::write(path, body) {
                eprintln!("could not write {}: {}", path, e);
            }
        }
    }
}

/// Map a fatal simulation abort to the process exit contract.
fn finish(game: &Game) -> anyhow::Result<()> {
    if let Some(msg) = &game.fatal {
        anyhow::bail!("{}", msg);
    }
    Ok(())
}
